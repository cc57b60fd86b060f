//! Per-residue-type comparison of predicted against experimental CheZod Z-scores.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use polars::prelude::*;
use statrs::statistics::Statistics;
use tracing::{info, warn};

use crate::analysis::correlation::spearman_correlation;
use crate::constants::MISSING_ZSCORE;
use crate::data_handling::chezod::ChezodDataset;
use crate::data_handling::odinpred::{list_prediction_files, read_odinpred_zscores};
use crate::data_handling::representations::residue_inputs;
use crate::models::{ModelType, ResidueRecord};
use crate::prediction_tools::ZScorePredictor;

/// Residue records keyed by one-letter residue code.
pub type ResidueBuckets = BTreeMap<char, Vec<ResidueRecord>>;

/// Residue buckets for every compared model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredictedZScores {
    pub per_model: BTreeMap<ModelType, ResidueBuckets>,
}

impl PredictedZScores {
    pub fn new() -> Self {
        Self {
            per_model: ModelType::ALL
                .iter()
                .map(|&m| (m, ResidueBuckets::new()))
                .collect(),
        }
    }

    /// Adds one protein's predictions. Sequence, experimental and predicted values
    /// are walked in lockstep (the shortest wins) and residues without an
    /// experimental value are skipped. Returns how many records were added.
    pub fn append(
        &mut self,
        model: ModelType,
        sequence: &str,
        experimental: &[f64],
        predicted: &[f64],
    ) -> usize {
        let buckets = self.per_model.entry(model).or_default();
        let mut added = 0;
        for ((residue, &exp), &pred) in sequence.chars().zip(experimental).zip(predicted) {
            if exp == MISSING_ZSCORE {
                continue;
            }
            buckets
                .entry(residue)
                .or_default()
                .push(ResidueRecord::new(exp, pred));
            added += 1;
        }
        added
    }

    #[cfg(test)]
    pub fn bucket(&self, model: ModelType, residue: char) -> Option<&[ResidueRecord]> {
        self.per_model
            .get(&model)
            .and_then(|b| b.get(&residue))
            .map(Vec::as_slice)
    }
}

/// Where to look for everything the comparison needs.
pub struct CompareInputs<'a> {
    pub benchmark_dir: &'a Path,
    pub test_repr_dir: &'a Path,
    pub embedding_models: &'a [ModelType],
}

/// Runs every predictor on every protein that has an ODiNPred file and buckets
/// the results by residue type, together with the ODiNPred baseline itself.
///
/// `predictors` must hold a regressor for each embedding model; the combined
/// model is evaluated when a regressor for it is present.
pub fn get_z_score_per_residue(
    dataset: &ChezodDataset,
    inputs: &CompareInputs<'_>,
    predictors: &mut BTreeMap<ModelType, Box<dyn ZScorePredictor>>,
) -> Result<PredictedZScores> {
    let mut scores = PredictedZScores::new();
    let files = list_prediction_files(inputs.benchmark_dir)?;
    if files.is_empty() {
        warn!("No ODiNPred files in {}", inputs.benchmark_dir.display());
    }

    let mut regressed: Vec<ModelType> = Vec::new();
    for &model in inputs.embedding_models {
        if model.esm_model_dir().is_none() {
            bail!("`{model}` is not an embedding model");
        }
        if !regressed.contains(&model) {
            regressed.push(model);
        }
    }
    if predictors.contains_key(&ModelType::Combined) {
        regressed.push(ModelType::Combined);
    }

    for file in &files {
        let protein = dataset
            .test_protein(&file.brmid)
            .ok_or_else(|| anyhow!("{} has no CheZod entry for `{}`", file.path.display(), file.brmid))?;

        for &model in &regressed {
            let predictor = predictors
                .get_mut(&model)
                .ok_or_else(|| anyhow!("no regressor loaded for {model}"))?;
            let (x, _) = residue_inputs(protein, inputs.test_repr_dir, model, false)?;
            let preds = predictor
                .predict_zscores(&x)
                .with_context(|| format!("predicting {} with {}", protein.brmid, model))?;
            scores.append(model, &protein.sequence, &protein.zscore, &preds);
        }

        let odin = read_odinpred_zscores(&file.path)?;
        let added = scores.append(ModelType::Odin, &protein.sequence, &protein.zscore, &odin);
        info!("{}: {} measured residues compared", protein.brmid, added);
    }

    Ok(scores)
}

/// Sample count and Spearman rho of one residue bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResidueCorrelation {
    pub count: usize,
    pub spearman: Option<f64>,
}

pub type CorrPerResidue = BTreeMap<ModelType, BTreeMap<char, ResidueCorrelation>>;

pub struct CheZodCompare<'a> {
    predicted_z_scores: &'a PredictedZScores,
}

impl<'a> CheZodCompare<'a> {
    pub fn new(predicted_z_scores: &'a PredictedZScores) -> Self {
        Self { predicted_z_scores }
    }

    pub fn corr_per_residue(&self) -> CorrPerResidue {
        let mut corr = CorrPerResidue::new();
        for (&model, buckets) in &self.predicted_z_scores.per_model {
            let per_res = corr.entry(model).or_default();
            for (&residue, records) in buckets {
                let gt: Vec<f64> = records.iter().map(|r| r.experimental).collect();
                let pred: Vec<f64> = records.iter().map(|r| r.predicted).collect();
                let rho = spearman_correlation(&gt, &pred);

                info!("{} residue type: {}", model, residue);
                info!("number - {}", records.len());
                info!(
                    "mean - ground truth/predicted: {:.4} {:.4}",
                    gt.iter().mean(),
                    pred.iter().mean()
                );
                match rho {
                    Some(r) => info!("correlation between GT and pred: {:.4}", r),
                    None => info!("correlation between GT and pred: undefined"),
                }

                per_res.insert(
                    residue,
                    ResidueCorrelation {
                        count: records.len(),
                        spearman: rho,
                    },
                );
            }
        }
        corr
    }

    /// Flattened predictions per model, and the experimental values in the
    /// same order as the ODiNPred predictions.
    pub fn z_scores_per_model(&self) -> (Vec<f64>, BTreeMap<ModelType, Vec<f64>>) {
        let mut actual = Vec::new();
        let mut per_model = BTreeMap::new();
        for (&model, buckets) in &self.predicted_z_scores.per_model {
            let preds: &mut Vec<f64> = per_model.entry(model).or_default();
            for records in buckets.values() {
                for r in records {
                    preds.push(r.predicted);
                    if model == ModelType::Odin {
                        actual.push(r.experimental);
                    }
                }
            }
        }
        (actual, per_model)
    }
}

/// `model, residue, count, spearman` table of [`CheZodCompare::corr_per_residue`].
pub fn correlation_table(corr: &CorrPerResidue) -> PolarsResult<DataFrame> {
    let mut models = Vec::new();
    let mut residues = Vec::new();
    let mut counts = Vec::new();
    let mut rhos = Vec::new();
    for (model, per_res) in corr {
        for (residue, c) in per_res {
            models.push(model.as_str().to_string());
            residues.push(residue.to_string());
            counts.push(c.count as u64);
            rhos.push(c.spearman);
        }
    }
    DataFrame::new(vec![
        Column::new("model".into(), models),
        Column::new("residue".into(), residues),
        Column::new("count".into(), counts),
        Column::new("spearman".into(), rhos),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_handling::chezod::ChezodProtein;
    use crate::data_handling::representations::representation_path;
    use crate::lasso_model::LassoFit;
    use ndarray::{array, Array2};
    use ndarray_npy::write_npy;
    use std::fs;

    #[test]
    fn count_excludes_missing_experimental_values() {
        let mut scores = PredictedZScores::new();
        let added = scores.append(
            ModelType::Esm1b,
            "AAGA",
            &[1.0, MISSING_ZSCORE, 2.0, 3.0],
            &[0.5, 0.7, 1.0, 2.0],
        );
        assert_eq!(added, 3);

        let corr = CheZodCompare::new(&scores).corr_per_residue();
        assert_eq!(corr[&ModelType::Esm1b][&'A'].count, 2);
        assert_eq!(corr[&ModelType::Esm1b][&'G'].count, 1);
        assert_eq!(corr[&ModelType::Esm1b][&'G'].spearman, None);

        let a = scores.bucket(ModelType::Esm1b, 'A').unwrap();
        assert_eq!(a[1], ResidueRecord::new(3.0, 2.0));
    }

    #[test]
    fn shortest_input_bounds_the_walk() {
        let mut scores = PredictedZScores::new();
        let added = scores.append(ModelType::Odin, "MKPL", &[1.0, 2.0, 3.0, 4.0], &[1.0, 2.0]);
        assert_eq!(added, 2);
    }

    #[test]
    fn correlation_ignores_insertion_order() {
        let proteins = [
            ("MKVL", [1.0, 2.0, 5.0, -1.0], [0.3, 2.2, 4.0, 0.1]),
            ("KMLV", [3.0, 0.5, 2.5, 9.0], [2.0, 1.0, 1.5, 7.0]),
            ("VVKM", [4.0, 6.0, 1.5, 2.0], [5.0, 3.0, 1.0, 2.5]),
        ];

        let mut forward = PredictedZScores::new();
        for (seq, exp, pred) in &proteins {
            forward.append(ModelType::Esm1v, seq, exp, pred);
        }
        let mut backward = PredictedZScores::new();
        for (seq, exp, pred) in proteins.iter().rev() {
            backward.append(ModelType::Esm1v, seq, exp, pred);
        }

        let a = CheZodCompare::new(&forward).corr_per_residue();
        let b = CheZodCompare::new(&backward).corr_per_residue();
        assert_eq!(a[&ModelType::Esm1v].len(), 4);
        for (res, c) in &a[&ModelType::Esm1v] {
            let other = b[&ModelType::Esm1v][res];
            assert_eq!(c.count, other.count);
            let (x, y) = (c.spearman.unwrap(), other.spearman.unwrap());
            assert!((x - y).abs() < 1e-12, "{res}: {x} vs {y}");
        }
    }

    #[test]
    fn actual_values_follow_odin_buckets() {
        let mut scores = PredictedZScores::new();
        scores.append(ModelType::Odin, "GA", &[1.0, 2.0], &[1.5, 2.5]);
        scores.append(ModelType::Esm1b, "GA", &[1.0, 2.0], &[0.0, 9.0]);

        let (actual, per_model) = CheZodCompare::new(&scores).z_scores_per_model();
        // buckets iterate alphabetically: A before G
        assert_eq!(actual, vec![2.0, 1.0]);
        assert_eq!(per_model[&ModelType::Odin], vec![2.5, 1.5]);
        assert_eq!(per_model[&ModelType::Esm1b], vec![9.0, 0.0]);
        assert!(per_model[&ModelType::Combined].is_empty());
    }

    #[test]
    fn table_has_one_row_per_bucket() {
        let mut scores = PredictedZScores::new();
        scores.append(ModelType::Odin, "GAA", &[1.0, 2.0, 3.0], &[1.5, 2.5, 2.0]);
        let corr = CheZodCompare::new(&scores).corr_per_residue();
        let df = correlation_table(&corr).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.get_column_names().len(), 4);
    }

    fn write_repr(root: &Path, model: ModelType, brmid: &str, arr: &Array2<f32>) {
        let path = representation_path(root, model, brmid).unwrap();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        write_npy(&path, arr).unwrap();
    }

    #[test]
    fn end_to_end_with_linear_predictors() {
        let tmp = tempfile::tempdir().unwrap();
        let bench = tmp.path().join("odin");
        let repr = tmp.path().join("repr");
        fs::create_dir_all(&bench).unwrap();
        fs::write(
            bench.join("DisorderPredictions7.txt"),
            "Number Residue Zscore\n1 M 1.0\n2 K 4.0\n3 G 9.0\n",
        )
        .unwrap();
        write_repr(&repr, ModelType::Esm1v, "7", &array![[1.0f32], [2.0], [3.0]]);
        write_repr(&repr, ModelType::Esm1b, "7", &array![[2.0f32], [4.0], [6.0]]);

        let dataset = ChezodDataset {
            train: Vec::new(),
            test: vec![ChezodProtein {
                brmid: "7".to_string(),
                sequence: "MKG".to_string(),
                zscore: vec![0.5, MISSING_ZSCORE, 8.0],
            }],
        };

        let mut predictors: BTreeMap<ModelType, Box<dyn ZScorePredictor>> = BTreeMap::new();
        for model in [ModelType::Esm1v, ModelType::Esm1b] {
            predictors.insert(
                model,
                Box::new(LassoFit {
                    coef: array![1.0],
                    intercept: 0.0,
                }),
            );
        }
        predictors.insert(
            ModelType::Combined,
            Box::new(LassoFit {
                coef: array![1.0, 10.0],
                intercept: -1.0,
            }),
        );

        let inputs = CompareInputs {
            benchmark_dir: &bench,
            test_repr_dir: &repr,
            embedding_models: &[ModelType::Esm1v, ModelType::Esm1b],
        };
        let scores = get_z_score_per_residue(&dataset, &inputs, &mut predictors).unwrap();

        assert_eq!(scores.bucket(ModelType::Esm1v, 'M').unwrap()[0].predicted, 1.0);
        assert_eq!(scores.bucket(ModelType::Esm1b, 'G').unwrap()[0].predicted, 6.0);
        // 3 + 10 * 6 - 1
        assert_eq!(scores.bucket(ModelType::Combined, 'G').unwrap()[0].predicted, 62.0);
        assert_eq!(scores.bucket(ModelType::Odin, 'G').unwrap()[0], ResidueRecord::new(8.0, 9.0));
        assert!(scores.bucket(ModelType::Odin, 'K').is_none());
    }

    #[test]
    fn repeated_and_non_embedding_models() {
        let tmp = tempfile::tempdir().unwrap();
        let bench = tmp.path().join("odin");
        let repr = tmp.path().join("repr");
        fs::create_dir_all(&bench).unwrap();
        fs::write(bench.join("DisorderPredictions3.txt"), "Zscore\n2.0\n").unwrap();
        write_repr(&repr, ModelType::Esm1v, "3", &array![[1.0f32]]);
        write_repr(&repr, ModelType::Esm1b, "3", &array![[2.0f32]]);

        let dataset = ChezodDataset {
            train: Vec::new(),
            test: vec![ChezodProtein {
                brmid: "3".to_string(),
                sequence: "M".to_string(),
                zscore: vec![1.0],
            }],
        };
        let mut predictors: BTreeMap<ModelType, Box<dyn ZScorePredictor>> = BTreeMap::new();
        predictors.insert(ModelType::Esm1v, Box::new(LassoFit { coef: array![1.0], intercept: 0.0 }));
        predictors.insert(ModelType::Combined, Box::new(LassoFit { coef: array![1.0, 1.0], intercept: 0.0 }));

        let inputs = CompareInputs {
            benchmark_dir: &bench,
            test_repr_dir: &repr,
            embedding_models: &[ModelType::Esm1v, ModelType::Esm1v],
        };
        let scores = get_z_score_per_residue(&dataset, &inputs, &mut predictors).unwrap();
        assert_eq!(scores.bucket(ModelType::Esm1v, 'M').unwrap().len(), 1);
        assert_eq!(scores.bucket(ModelType::Combined, 'M').unwrap().len(), 1);

        let corr = CheZodCompare::new(&scores).corr_per_residue();
        assert_eq!(corr[&ModelType::Combined][&'M'].count, 1);

        for listed in [[ModelType::Esm1v, ModelType::Combined], [ModelType::Esm1v, ModelType::Odin]] {
            let inputs = CompareInputs {
                benchmark_dir: &bench,
                test_repr_dir: &repr,
                embedding_models: &listed,
            };
            assert!(get_z_score_per_residue(&dataset, &inputs, &mut predictors).is_err());
        }
    }

    #[test]
    fn unknown_protein_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("DisorderPredictions99.txt"), "Zscore\n1.0\n").unwrap();
        let dataset = ChezodDataset {
            train: Vec::new(),
            test: Vec::new(),
        };
        let inputs = CompareInputs {
            benchmark_dir: tmp.path(),
            test_repr_dir: tmp.path(),
            embedding_models: &[],
        };
        let mut predictors = BTreeMap::new();
        assert!(get_z_score_per_residue(&dataset, &inputs, &mut predictors).is_err());
    }
}
