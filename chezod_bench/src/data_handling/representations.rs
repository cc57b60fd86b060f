//! Precomputed ESM residue representations, one `.npy` matrix
//! (residues × features, `f32`) per protein under `<repr_dir>/<esm model>/`.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use ndarray::{concatenate, Array1, Array2, Axis};
use ndarray_npy::read_npy;
use tracing::debug;

use crate::constants::{MISSING_ZSCORE, REPRESENTATION_EXTENSION};
use crate::data_handling::chezod::ChezodProtein;
use crate::models::ModelType;

pub fn representation_path(repr_dir: &Path, model: ModelType, brmid: &str) -> Result<PathBuf> {
    let esm_dir = model
        .esm_model_dir()
        .ok_or_else(|| anyhow!("{model} has no representation directory of its own"))?;
    Ok(repr_dir
        .join(esm_dir)
        .join(format!("{brmid}.{REPRESENTATION_EXTENSION}")))
}

fn read_matrix(path: &Path) -> Result<Array2<f64>> {
    let arr: Array2<f32> =
        read_npy(path).with_context(|| format!("reading representation {}", path.display()))?;
    debug!("{}: {:?}", path.display(), arr.shape());
    Ok(arr.mapv(f64::from))
}

/// Residue × feature matrix for one protein. The combined model stacks
/// ESM-1v features in front of ESM-1b features, the order its regressor was fitted on.
pub fn load_representation(repr_dir: &Path, model: ModelType, brmid: &str) -> Result<Array2<f64>> {
    match model {
        ModelType::Combined => {
            let esm1v = read_matrix(&representation_path(repr_dir, ModelType::Esm1v, brmid)?)?;
            let esm1b = read_matrix(&representation_path(repr_dir, ModelType::Esm1b, brmid)?)?;
            if esm1v.nrows() != esm1b.nrows() {
                bail!(
                    "{brmid}: esm-1v has {} residues but esm-1b has {}",
                    esm1v.nrows(),
                    esm1b.nrows()
                );
            }
            Ok(concatenate(Axis(1), &[esm1v.view(), esm1b.view()])?)
        }
        ModelType::Odin => bail!("odin predictions are read from ODiNPred files, not representations"),
        _ => read_matrix(&representation_path(repr_dir, model, brmid)?),
    }
}

/// Representation matrix of `protein` paired with its experimental Z-scores.
///
/// With `drop_missing`, residues carrying the missing-value sentinel are removed
/// from both. Otherwise every residue is kept so predictions stay aligned with
/// the sequence.
pub fn residue_inputs(
    protein: &ChezodProtein,
    repr_dir: &Path,
    model: ModelType,
    drop_missing: bool,
) -> Result<(Array2<f64>, Array1<f64>)> {
    let x = load_representation(repr_dir, model, &protein.brmid)?;
    let z = Array1::from(protein.zscore.clone());
    if x.nrows() != z.len() {
        bail!(
            "{}: {} representation rows for {} z-scores",
            protein.brmid,
            x.nrows(),
            z.len()
        );
    }
    if !drop_missing {
        return Ok((x, z));
    }
    let keep: Vec<usize> = z
        .iter()
        .enumerate()
        .filter(|(_, &v)| v != MISSING_ZSCORE)
        .map(|(i, _)| i)
        .collect();
    Ok((x.select(Axis(0), &keep), z.select(Axis(0), &keep)))
}
