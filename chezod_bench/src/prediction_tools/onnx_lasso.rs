//! Exported Lasso regressors (ONNX) mapping residue representations to Z-scores.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use ndarray::Array2;
use ort::session::Session;
use ort::value::Tensor;
use tracing::{debug, info};

use crate::models::{ModelType, TrainStrategy};

/// `<models_dir>/lasso_<model>_<strategy tag>.onnx`
pub fn model_path(models_dir: &Path, model: ModelType, strategy: TrainStrategy) -> PathBuf {
    models_dir.join(format!("lasso_{}_{}.onnx", model.as_str(), strategy.tag()))
}

pub struct OnnxLasso {
    session: Session,
    input_name: String,
    output_name: String,
    path: PathBuf,
}

impl OnnxLasso {
    pub fn load(path: &Path) -> Result<Self> {
        let session = Session::builder()?
            .commit_from_file(path)
            .with_context(|| format!("loading ONNX model {}", path.display()))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .ok_or_else(|| anyhow!("{} declares no inputs", path.display()))?;
        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| anyhow!("{} declares no outputs", path.display()))?;

        info!("Loaded {} ({} -> {})", path.display(), input_name, output_name);
        Ok(Self {
            session,
            input_name,
            output_name,
            path: path.to_path_buf(),
        })
    }

    pub fn load_for(models_dir: &Path, model: ModelType, strategy: TrainStrategy) -> Result<Self> {
        Self::load(&model_path(models_dir, model, strategy))
    }

    /// One predicted Z-score per row of `features`.
    pub fn predict(&mut self, features: &Array2<f64>) -> Result<Vec<f64>> {
        let n_rows = features.nrows();
        if n_rows == 0 {
            return Ok(Vec::new());
        }

        let shape_vec = vec![n_rows, features.ncols()];
        let data: Vec<f32> = features.iter().map(|&v| v as f32).collect();
        let input = Tensor::from_array((shape_vec.as_slice(), data))?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input])
            .with_context(|| format!("running {}", self.path.display()))?;

        let (shape, values) = outputs[self.output_name.as_str()].try_extract_tensor::<f32>()?;
        debug!("{}: output shape {:?}", self.path.display(), shape);

        if values.len() != n_rows {
            bail!(
                "{} returned {} values for {} residues",
                self.path.display(),
                values.len(),
                n_rows
            );
        }
        Ok(values.iter().map(|&v| f64::from(v)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_file_naming_convention() {
        let p = model_path(
            Path::new("../models"),
            ModelType::Combined,
            TrainStrategy::ClearedResidueSplit,
        );
        assert_eq!(p, PathBuf::from("../models/lasso_combined_cleared_residue.onnx"));

        let p = model_path(Path::new("m"), ModelType::Esm1v, TrainStrategy::TotalResidueCv);
        assert_eq!(p, PathBuf::from("m/lasso_esm-1v_total_residue_cv.onnx"));
    }
}
