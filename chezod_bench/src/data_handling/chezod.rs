//! CheZod reference data: per-protein sequence plus experimental Z-scores.
//!
//! Manifests are JSON, either as a list of records
//! `[{"brmid": "...", "sequence": "...", "zscore": [...]}, ...]`
//! or in the column-oriented layout pandas writes by default
//! `{"brmid": {"0": ...}, "sequence": {"0": ...}, "zscore": {"0": [...]}}`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use ndarray::{concatenate, Array1, Array2, Axis};
use serde::Deserialize;
use tracing::{info, warn};

use crate::constants::MISSING_ZSCORE;
use crate::data_handling::representations::residue_inputs;
use crate::models::ModelType;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChezodProtein {
    pub brmid: String,
    pub sequence: String,
    pub zscore: Vec<f64>,
}

impl ChezodProtein {
    /// Number of residues with an experimental measurement.
    pub fn measured_residues(&self) -> usize {
        self.zscore.iter().filter(|&&z| z != MISSING_ZSCORE).count()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Manifest {
    Records(Vec<ChezodProtein>),
    Columns {
        brmid: BTreeMap<String, String>,
        sequence: BTreeMap<String, String>,
        zscore: BTreeMap<String, Vec<f64>>,
    },
}

impl Manifest {
    fn into_proteins(self) -> Result<Vec<ChezodProtein>> {
        match self {
            Manifest::Records(records) => Ok(records),
            Manifest::Columns {
                brmid,
                mut sequence,
                mut zscore,
            } => {
                // pandas row labels are stringified integers; keep row order
                let mut rows: Vec<(String, String)> = brmid.into_iter().collect();
                rows.sort_by_key(|(k, _)| k.parse::<usize>().unwrap_or(usize::MAX));
                rows.into_iter()
                    .map(|(key, id)| {
                        let seq = sequence
                            .remove(&key)
                            .ok_or_else(|| anyhow!("row {key} ({id}) has no sequence"))?;
                        let z = zscore
                            .remove(&key)
                            .ok_or_else(|| anyhow!("row {key} ({id}) has no zscore"))?;
                        Ok(ChezodProtein {
                            brmid: id,
                            sequence: seq,
                            zscore: z,
                        })
                    })
                    .collect()
            }
        }
    }
}

pub fn parse_chezod_json(json: &str) -> Result<Vec<ChezodProtein>> {
    let manifest: Manifest = serde_json::from_str(json).context("unrecognised CheZod manifest layout")?;
    manifest.into_proteins()
}

pub fn load_chezod_json(path: &Path) -> Result<Vec<ChezodProtein>> {
    info!("Reading CheZod proteins from {}", path.display());
    let json = fs::read_to_string(path).with_context(|| format!("opening {}", path.display()))?;
    let proteins = parse_chezod_json(&json).with_context(|| format!("parsing {}", path.display()))?;

    for p in &proteins {
        if p.sequence.chars().count() != p.zscore.len() {
            warn!(
                "{}: sequence length {} differs from {} z-scores",
                p.brmid,
                p.sequence.chars().count(),
                p.zscore.len()
            );
        }
    }
    let measured: usize = proteins.iter().map(ChezodProtein::measured_residues).sum();
    info!(
        "Loaded {} proteins ({} measured residues) from {}",
        proteins.len(),
        measured,
        path.display()
    );
    Ok(proteins)
}

/// Stacked residue features and Z-scores of one model, for both splits.
#[derive(Debug, Clone)]
pub struct TrainTestSets {
    pub x_train: Array2<f64>,
    pub y_train: Array1<f64>,
    pub x_test: Array2<f64>,
    pub y_test: Array1<f64>,
}

/// The training (CheZod 1325) and test (CheZod 117) splits.
pub struct ChezodDataset {
    pub train: Vec<ChezodProtein>,
    pub test: Vec<ChezodProtein>,
}

impl ChezodDataset {
    pub fn new(train_json: &Path, test_json: &Path) -> Result<Self> {
        Ok(Self {
            train: load_chezod_json(train_json)?,
            test: load_chezod_json(test_json)?,
        })
    }

    pub fn test_protein(&self, brmid: &str) -> Option<&ChezodProtein> {
        self.test.iter().find(|p| p.brmid == brmid)
    }

    pub fn train_test_sets(
        &self,
        train_repr_dir: &Path,
        test_repr_dir: &Path,
        model: ModelType,
    ) -> Result<TrainTestSets> {
        let (x_train, y_train) = stack_split(&self.train, train_repr_dir, model)
            .with_context(|| format!("building {model} training set"))?;
        let (x_test, y_test) = stack_split(&self.test, test_repr_dir, model)
            .with_context(|| format!("building {model} test set"))?;
        info!(
            "{}: {} training residues, {} test residues, {} features",
            model,
            x_train.nrows(),
            x_test.nrows(),
            x_train.ncols()
        );
        Ok(TrainTestSets {
            x_train,
            y_train,
            x_test,
            y_test,
        })
    }
}

/// Concatenates the measured residues of every protein in `proteins`.
fn stack_split(
    proteins: &[ChezodProtein],
    repr_dir: &Path,
    model: ModelType,
) -> Result<(Array2<f64>, Array1<f64>)> {
    let mut xs = Vec::with_capacity(proteins.len());
    let mut ys = Vec::with_capacity(proteins.len());
    for protein in proteins {
        let (x, y) = residue_inputs(protein, repr_dir, model, true)?;
        xs.push(x);
        ys.push(y);
    }
    if xs.is_empty() {
        bail!("no proteins to stack");
    }
    let x_views: Vec<_> = xs.iter().map(|a| a.view()).collect();
    let y_views: Vec<_> = ys.iter().map(|a| a.view()).collect();
    let x = concatenate(Axis(0), &x_views)?;
    let y = concatenate(Axis(0), &y_views)?;
    Ok((x, y))
}
