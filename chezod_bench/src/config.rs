//! Run configuration.
//!
//! Every field has a default, so a config file only needs to list what it
//! overrides, e.g.
//!
//! ```json
//! { "embedding_models": ["esm-1v", "esm-1b", "esm-msa"],
//!   "stability": { "nr_samples": 200, "cutoffs": [0.8] } }
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::models::ModelType;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Directory holding the exported `lasso_<model>_<strategy>.onnx` files.
    pub models_dir: PathBuf,
    /// Directory the figures and summary tables are written to.
    pub media_dir: PathBuf,
    /// Embedding models evaluated per protein (the combined model is always added).
    pub embedding_models: Vec<ModelType>,
    /// Model whose per-residue correlations drive the bar ordering.
    pub highlight_model: ModelType,
    /// Horizontal reference line on the per-residue bar chart.
    pub reference_correlation: f64,
    pub stability: StabilityParams,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("../models"),
            media_dir: PathBuf::from("../media"),
            embedding_models: vec![ModelType::Esm1v, ModelType::Esm1b],
            highlight_model: ModelType::Esm1b,
            reference_correlation: 0.64,
            stability: StabilityParams::default(),
        }
    }
}

/// Grid and resampling parameters of the stability selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityParams {
    pub start: f64,
    pub end: f64,
    pub n_points: usize,
    /// Bootstrap trials per regularisation strength.
    pub nr_samples: usize,
    /// Selection-probability cutoffs, one stability plot and slim refit each.
    pub cutoffs: Vec<f64>,
    /// A feature is stable if it beats the cutoff at more than this many grid points.
    pub freq_cutoff: usize,
    pub lasso_max_iter: u32,
    pub slim_alpha: f64,
    pub seed: u64,
}

impl Default for StabilityParams {
    fn default() -> Self {
        Self {
            start: 0.001,
            end: 0.05,
            n_points: 20,
            nr_samples: 100,
            cutoffs: vec![0.6, 0.7, 0.8, 0.9],
            freq_cutoff: 10,
            lasso_max_iter: 10_000,
            slim_alpha: 0.0001,
            seed: 42,
        }
    }
}

impl StabilityParams {
    /// `n_points` evenly spaced values from `start` to `end`, both included.
    pub fn reg_params(&self) -> Vec<f64> {
        match self.n_points {
            0 => Vec::new(),
            1 => vec![self.start],
            n => {
                let step = (self.end - self.start) / (n - 1) as f64;
                (0..n).map(|i| self.start + step * i as f64).collect()
            }
        }
    }
}

impl BenchConfig {
    /// Reads a JSON config, or returns the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => {
                let json = std::fs::read_to_string(p)
                    .with_context(|| format!("reading config {}", p.display()))?;
                let cfg: BenchConfig = serde_json::from_str(&json)
                    .with_context(|| format!("parsing config {}", p.display()))?;
                info!("Loaded configuration from {}", p.display());
                cfg.validate()?;
                Ok(cfg)
            }
            None => Ok(Self::default()),
        }
    }

    /// Embedding models must each be backed by one ESM checkpoint.
    pub fn validate(&self) -> Result<()> {
        for model in &self.embedding_models {
            if model.esm_model_dir().is_none() {
                bail!("`{model}` is not an embedding model (expected esm-1v, esm-1b or esm-msa)");
            }
        }
        if self.stability.cutoffs.iter().any(|c| !(0.0..=1.0).contains(c)) {
            bail!("stability cutoffs must lie in [0, 1]");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reg_params_span_the_interval() {
        let p = StabilityParams {
            start: 0.0,
            end: 1.0,
            n_points: 5,
            ..Default::default()
        };
        assert_eq!(p.reg_params(), vec![0.0, 0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: BenchConfig = serde_json::from_str(
            r#"{"embedding_models": ["esm-msa"], "stability": {"nr_samples": 7}}"#,
        )
        .unwrap();
        assert_eq!(cfg.embedding_models, vec![ModelType::EsmMsa]);
        assert_eq!(cfg.stability.nr_samples, 7);
        assert_eq!(cfg.stability.freq_cutoff, 10);
        assert_eq!(cfg.models_dir, PathBuf::from("../models"));
    }

    #[test]
    fn non_embedding_models_are_rejected() {
        assert!(BenchConfig::default().validate().is_ok());
        for listed in [vec![ModelType::Esm1v, ModelType::Combined], vec![ModelType::Odin]] {
            let cfg = BenchConfig {
                embedding_models: listed,
                ..Default::default()
            };
            assert!(cfg.validate().is_err());
        }
    }

    #[test]
    fn load_validates_the_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("cfg.json");
        std::fs::write(&path, r#"{"embedding_models": ["esm-1b", "combined"]}"#).unwrap();
        assert!(BenchConfig::load(Some(&path)).is_err());

        std::fs::write(&path, r#"{"embedding_models": ["esm-msa"]}"#).unwrap();
        assert_eq!(BenchConfig::load(Some(&path)).unwrap().embedding_models, vec![ModelType::EsmMsa]);
    }
}
