//! Stability selection over residue representation features.
//!
//! For every regularisation strength on the grid, Lasso is fitted on many
//! random half-subsamples of the training residues; the fraction of fits in
//! which a feature keeps a non-zero coefficient is its selection probability
//! at that strength. Features that stay above a probability cutoff on enough
//! of the grid are used for a reduced ("slim") refit that is scored on the
//! held-out residues.

use std::path::Path;

use anyhow::Result;
use ndarray::{Array1, Array2, Axis};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::SeedableRng;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::analysis::correlation::spearman_correlation;
use crate::analysis::figures::plot_stability_paths;
use crate::config::StabilityParams;
use crate::data_handling::chezod::TrainTestSets;
use crate::helper_functions::dataframe_to_csv;
use crate::lasso_model::{fit_lasso, LassoFit};
use crate::models::ModelType;

/// Selection probability per feature, for each regularisation strength in grid order.
#[derive(Debug, Clone, PartialEq)]
pub struct StabilityPaths {
    pub paths: Vec<(f64, Array1<f64>)>,
}

impl StabilityPaths {
    pub fn n_features(&self) -> usize {
        self.paths.first().map_or(0, |(_, p)| p.len())
    }

    pub fn reg_params(&self) -> Vec<f64> {
        self.paths.iter().map(|(a, _)| *a).collect()
    }

    /// Path of feature `i` across the grid.
    pub fn feature_path(&self, i: usize) -> Vec<(f64, f64)> {
        self.paths.iter().map(|(a, p)| (*a, p[i])).collect()
    }
}

/// One bootstrap trial: Lasso on `sample_size` rows drawn without replacement,
/// returning the absolute coefficients.
pub fn stability_selection_prob(
    x: &Array2<f64>,
    y: &Array1<f64>,
    sample_size: usize,
    alpha: f64,
    max_iter: u32,
    rng: &mut StdRng,
) -> Result<Array1<f64>> {
    let idx = sample(rng, x.nrows(), sample_size).into_vec();
    let x_sub = x.select(Axis(0), &idx);
    let y_sub = y.select(Axis(0), &idx);
    let fit = fit_lasso(x_sub, y_sub, alpha, max_iter)?;
    Ok(fit.coef.mapv(f64::abs))
}

/// Fraction of trials in which each feature's coefficient was non-zero.
pub fn selection_frequencies(coefs: &[Array1<f64>], n_features: usize) -> Array1<f64> {
    let mut selected = Array1::<f64>::zeros(n_features);
    if coefs.is_empty() {
        return selected;
    }
    for coef in coefs {
        for (count, &c) in selected.iter_mut().zip(coef.iter()) {
            if c != 0.0 {
                *count += 1.0;
            }
        }
    }
    selected / coefs.len() as f64
}

fn trial_seed(base: u64, grid_idx: usize, trial: usize, nr_samples: usize) -> u64 {
    base.wrapping_add((grid_idx * nr_samples + trial) as u64)
}

pub fn get_stability_paths(
    x: &Array2<f64>,
    y: &Array1<f64>,
    params: &StabilityParams,
) -> Result<StabilityPaths> {
    let sample_size = x.nrows() / 2;
    let mut paths = Vec::with_capacity(params.n_points);

    for (k, alpha) in params.reg_params().into_iter().enumerate() {
        info!("Computing stability path for regularisation parameter: {alpha:.5}");
        let coefs = (0..params.nr_samples)
            .into_par_iter()
            .map(|trial| {
                let mut rng = StdRng::seed_from_u64(trial_seed(params.seed, k, trial, params.nr_samples));
                stability_selection_prob(x, y, sample_size, alpha, params.lasso_max_iter, &mut rng)
            })
            .collect::<Result<Vec<_>>>()?;

        paths.push((alpha, selection_frequencies(&coefs, x.ncols())));
    }

    Ok(StabilityPaths { paths })
}

/// Features whose selection probability exceeds `cutoff` at more than
/// `freq_cutoff` points of the grid.
pub fn relevant_coordinates(paths: &StabilityPaths, cutoff: f64, freq_cutoff: usize) -> Vec<usize> {
    (0..paths.n_features())
        .filter(|&i| {
            let above = paths.paths.iter().filter(|(_, p)| p[i] > cutoff).count();
            above > freq_cutoff
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct SlimFit {
    pub n_coordinates: usize,
    pub spearman: Option<f64>,
    /// Refit on the selected columns only; `None` when nothing was selected.
    pub fit: Option<LassoFit>,
}

/// Lasso restricted to `coordinates`, scored by Spearman rho on the test residues.
pub fn slim_refit(sets: &TrainTestSets, coordinates: &[usize], alpha: f64, max_iter: u32) -> Result<SlimFit> {
    if coordinates.is_empty() {
        warn!("No stable coordinates, skipping slim refit");
        return Ok(SlimFit {
            n_coordinates: 0,
            spearman: None,
            fit: None,
        });
    }
    let x_train = sets.x_train.select(Axis(1), coordinates);
    let x_test = sets.x_test.select(Axis(1), coordinates);
    let fit = fit_lasso(x_train, sets.y_train.clone(), alpha, max_iter)?;
    let pred = fit.predict(&x_test).to_vec();
    let truth = sets.y_test.to_vec();
    debug!("Slim refit on {} coordinates, intercept {:.4}", coordinates.len(), fit.intercept);
    Ok(SlimFit {
        n_coordinates: coordinates.len(),
        spearman: spearman_correlation(&truth, &pred),
        fit: Some(fit),
    })
}

/// Long `lambda, feature, probability` table of the paths.
pub fn stability_table(paths: &StabilityPaths) -> PolarsResult<DataFrame> {
    let mut lambdas = Vec::new();
    let mut features = Vec::new();
    let mut probs = Vec::new();
    for (alpha, p) in &paths.paths {
        for (i, &v) in p.iter().enumerate() {
            lambdas.push(*alpha);
            features.push(i as u64);
            probs.push(v);
        }
    }
    DataFrame::new(vec![
        Column::new("lambda".into(), lambdas),
        Column::new("feature".into(), features),
        Column::new("probability".into(), probs),
    ])
}

/// Paths, one plot and one slim refit per cutoff, and the probability table.
pub fn run_stability_analysis(
    sets: &TrainTestSets,
    params: &StabilityParams,
    model: ModelType,
    media_dir: &Path,
) -> Result<Vec<(f64, SlimFit)>> {
    let paths = get_stability_paths(&sets.x_train, &sets.y_train, params)?;

    let mut table = stability_table(&paths)?;
    dataframe_to_csv(&mut table, &media_dir.join(format!("stability_paths_{model}.csv")), true)?;

    let mut results = Vec::with_capacity(params.cutoffs.len());
    for &cutoff in &params.cutoffs {
        let relevant = relevant_coordinates(&paths, cutoff, params.freq_cutoff);
        let plot_path = media_dir.join(format!(
            "stability_paths__cp_{}_cf_{}.png",
            cutoff, params.freq_cutoff
        ));
        plot_stability_paths(&paths, &relevant, &plot_path)?;

        let slim = slim_refit(sets, &relevant, params.slim_alpha, params.lasso_max_iter)?;
        info!("Stability selection with cp={} and cf={}", cutoff, params.freq_cutoff);
        match slim.spearman {
            Some(rho) => info!("Coordinate {} correlation: {:.4}", slim.n_coordinates, rho),
            None => info!("Coordinate {} correlation: undefined", slim.n_coordinates),
        }
        results.push((cutoff, slim));
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::Rng;

    fn synthetic(n: usize, p: usize, seed: u64) -> (Array2<f64>, Array1<f64>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let x = Array2::from_shape_fn((n, p), |_| rng.gen::<f64>());
        let y = x.column(0).mapv(|v| 3.0 * v);
        (x, y)
    }

    fn small_grid() -> StabilityParams {
        StabilityParams {
            start: 0.001,
            end: 0.01,
            n_points: 3,
            nr_samples: 8,
            ..Default::default()
        }
    }

    #[test]
    fn frequencies_are_nonzero_counts_over_trials() {
        let coefs = vec![
            array![0.0, 1.2, 0.0],
            array![0.3, 0.4, 0.0],
            array![0.0, 0.1, 0.0],
            array![0.0, 2.0, 0.0],
        ];
        let freq = selection_frequencies(&coefs, 3);
        assert_eq!(freq, array![0.25, 1.0, 0.0]);
        assert_eq!(selection_frequencies(&[], 2), array![0.0, 0.0]);
    }

    #[test]
    fn driving_feature_is_always_selected() {
        let (x, y) = synthetic(60, 4, 7);
        let paths = get_stability_paths(&x, &y, &small_grid()).unwrap();

        assert_eq!(paths.paths.len(), 3);
        assert_eq!(paths.n_features(), 4);
        for (_, p) in &paths.paths {
            assert_eq!(p[0], 1.0);
            for &v in p.iter() {
                assert!((0.0..=1.0).contains(&v));
                // multiples of 1 / nr_samples
                assert!((v * 8.0 - (v * 8.0).round()).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let (x, y) = synthetic(40, 3, 11);
        let a = get_stability_paths(&x, &y, &small_grid()).unwrap();
        let b = get_stability_paths(&x, &y, &small_grid()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn relevance_needs_more_than_freq_cutoff_hits() {
        let paths = StabilityPaths {
            paths: vec![
                (0.1, array![0.9, 0.9, 0.1]),
                (0.2, array![0.9, 0.5, 0.1]),
                (0.3, array![0.8, 0.95, 0.7]),
            ],
        };
        assert_eq!(relevant_coordinates(&paths, 0.6, 1), vec![0, 1]);
        assert_eq!(relevant_coordinates(&paths, 0.6, 2), vec![0]);
        assert_eq!(relevant_coordinates(&paths, 0.99, 0), Vec::<usize>::new());
        assert_eq!(paths.feature_path(2), vec![(0.1, 0.1), (0.2, 0.1), (0.3, 0.7)]);
    }

    #[test]
    fn slim_refit_on_the_driving_feature() {
        let (x_train, y_train) = synthetic(50, 3, 3);
        let (x_test, y_test) = synthetic(20, 3, 4);
        let sets = TrainTestSets {
            x_train,
            y_train,
            x_test,
            y_test,
        };
        let slim = slim_refit(&sets, &[0], 1e-4, 10_000).unwrap();
        assert_eq!(slim.n_coordinates, 1);
        assert!((slim.spearman.unwrap() - 1.0).abs() < 1e-9);

        let empty = slim_refit(&sets, &[], 1e-4, 10_000).unwrap();
        assert_eq!(empty.spearman, None);
        assert!(empty.fit.is_none());
    }

    #[test]
    fn slim_refit_reproduces_offset_targets() {
        // features around 5, targets 3 * x0 with no intercept
        let offset = |(x, y): (Array2<f64>, Array1<f64>)| (x + 5.0, y + 15.0);
        let (x_train, y_train) = offset(synthetic(50, 3, 3));
        let (x_test, y_test) = offset(synthetic(20, 3, 4));
        let sets = TrainTestSets {
            x_train,
            y_train,
            x_test,
            y_test,
        };
        let slim = slim_refit(&sets, &[0, 2], 1e-4, 10_000).unwrap();
        let fit = slim.fit.unwrap();
        assert!((fit.coef[0] - 3.0).abs() < 0.01, "coef = {}", fit.coef);
        assert!(fit.coef[1].abs() < 0.01, "coef = {}", fit.coef);
        assert!(fit.intercept.abs() < 0.1, "intercept = {}", fit.intercept);

        let pred = fit.predict(&sets.x_test.select(Axis(1), &[0, 2]));
        let max_err = (&pred - &sets.y_test).mapv(f64::abs).fold(0.0f64, |a, &b| a.max(b));
        assert!(max_err < 0.05, "max_err = {max_err}");
    }

    #[test]
    fn offset_noise_feature_is_never_selected_under_strong_penalty() {
        // x0 drives y; x1 is noise shifted far from zero
        let (mut x, y) = synthetic(60, 2, 21);
        x.column_mut(1).mapv_inplace(|v| v + 10.0);
        let params = StabilityParams {
            start: 0.001,
            end: 1.0,
            n_points: 2,
            nr_samples: 8,
            ..Default::default()
        };
        let paths = get_stability_paths(&x, &y, &params).unwrap();

        // weak penalty keeps the driver
        assert_eq!(paths.paths[0].1[0], 1.0);
        // alpha = 1 exceeds |cov(x, y)| for both columns once centred
        assert_eq!(paths.paths[1].1, array![0.0, 0.0]);
        assert!(relevant_coordinates(&paths, 0.6, 0).contains(&0));
    }

    #[test]
    fn table_is_long_format() {
        let paths = StabilityPaths {
            paths: vec![(0.1, array![0.5, 1.0]), (0.2, array![0.0, 1.0])],
        };
        let df = stability_table(&paths).unwrap();
        assert_eq!(df.height(), 4);
        assert_eq!(paths.reg_params(), vec![0.1, 0.2]);
    }
}
