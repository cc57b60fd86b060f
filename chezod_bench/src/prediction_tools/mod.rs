use anyhow::Result;
use ndarray::Array2;

pub mod onnx_lasso;

/// Anything that turns a residue × feature matrix into one Z-score per residue.
pub trait ZScorePredictor {
    fn predict_zscores(&mut self, features: &Array2<f64>) -> Result<Vec<f64>>;
}

impl ZScorePredictor for onnx_lasso::OnnxLasso {
    fn predict_zscores(&mut self, features: &Array2<f64>) -> Result<Vec<f64>> {
        self.predict(features)
    }
}

#[cfg(test)]
impl ZScorePredictor for crate::lasso_model::LassoFit {
    fn predict_zscores(&mut self, features: &Array2<f64>) -> Result<Vec<f64>> {
        if features.ncols() != self.coef.len() {
            anyhow::bail!(
                "model expects {} features, got {}",
                self.coef.len(),
                features.ncols()
            );
        }
        Ok(self.predict(features).to_vec())
    }
}
