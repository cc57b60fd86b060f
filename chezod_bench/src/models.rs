use std::fmt;
use std::str::FromStr;

use polars::prelude::PolarsError;
use serde::{Deserialize, Serialize};

/// Regression models compared against the experimental CheZod Z-scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModelType {
    #[serde(rename = "esm-1v")]
    Esm1v,
    #[serde(rename = "esm-1b")]
    Esm1b,
    #[serde(rename = "esm-msa")]
    EsmMsa,
    #[serde(rename = "combined")]
    Combined,
    #[serde(rename = "odin")]
    Odin,
}

impl ModelType {
    /// Every model that ends up in the per-residue comparison, in report order.
    pub const ALL: [ModelType; 5] = [
        ModelType::Esm1v,
        ModelType::Esm1b,
        ModelType::EsmMsa,
        ModelType::Combined,
        ModelType::Odin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::Esm1v => "esm-1v",
            ModelType::Esm1b => "esm-1b",
            ModelType::EsmMsa => "esm-msa",
            ModelType::Combined => "combined",
            ModelType::Odin => "odin",
        }
    }

    /// Directory name of the ESM checkpoint whose residue representations feed this model.
    /// `None` for models that are not backed by a single embedding.
    pub fn esm_model_dir(&self) -> Option<&'static str> {
        match self {
            ModelType::Esm1v => Some("esm1v_t33_650M_UR90S_1"),
            ModelType::Esm1b => Some("esm1b_t33_650M_UR50S"),
            ModelType::EsmMsa => Some("esm_msa1b_t12_100M_UR50S"),
            ModelType::Combined | ModelType::Odin => None,
        }
    }

    /// Models that have an exported Lasso regressor.
    pub fn has_regressor(&self) -> bool {
        !matches!(self, ModelType::Odin)
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelType::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| format!("unknown model type `{s}`"))
    }
}

/// Training strategies the exported regressors were fitted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainStrategy {
    ClearedResidueSplit,
    ResidueCv1325,
    TotalResidueCv,
}

impl TrainStrategy {
    pub const ALL: [TrainStrategy; 3] = [
        TrainStrategy::ClearedResidueSplit,
        TrainStrategy::ResidueCv1325,
        TrainStrategy::TotalResidueCv,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TrainStrategy::ClearedResidueSplit => "train_on_cleared_1325_test_on_117_residue_split",
            TrainStrategy::ResidueCv1325 => "train_on_1325_cv_residue_split",
            TrainStrategy::TotalResidueCv => "train_on_total_cv_residue_split",
        }
    }

    /// Short tag embedded in the exported model file names.
    pub fn tag(&self) -> &'static str {
        match self {
            TrainStrategy::ClearedResidueSplit => "cleared_residue",
            TrainStrategy::ResidueCv1325 => "1325_residue_cv",
            TrainStrategy::TotalResidueCv => "total_residue_cv",
        }
    }

    pub fn whitelist() -> Vec<&'static str> {
        Self::ALL.iter().map(|s| s.name()).collect()
    }
}

impl fmt::Display for TrainStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for TrainStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TrainStrategy::ALL
            .iter()
            .copied()
            .find(|t| t.name() == s)
            .ok_or_else(|| format!("unknown training strategy `{s}`"))
    }
}

/// One residue of one protein: experimental Z-score, model prediction and `predicted - experimental`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResidueRecord {
    pub experimental: f64,
    pub predicted: f64,
    pub residual: f64,
}

impl ResidueRecord {
    pub fn new(experimental: f64, predicted: f64) -> Self {
        Self {
            experimental,
            predicted,
            residual: predicted - experimental,
        }
    }
}

pub fn polars_err(e: Box<dyn std::error::Error>) -> PolarsError {
    PolarsError::ComputeError(e.to_string().into())
}
