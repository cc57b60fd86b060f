//! lasso_model.rs – L1-regularised linear regression on residue representations
//!
//! Thin wrapper around `linfa-elasticnet` with `l1_ratio = 1`, which minimises
//! `1/(2n) ||y - Xw - b||² + alpha ||w||₁`.

use anyhow::{anyhow, Context, Result};
use linfa::prelude::*;
use linfa_elasticnet::ElasticNet;
use log::debug;
use ndarray::{Array1, Array2, Axis};

/// Coefficients and intercept of a fitted Lasso.
#[derive(Debug, Clone)]
pub struct LassoFit {
    pub coef: Array1<f64>,
    pub intercept: f64,
}

impl LassoFit {
    pub fn predict(&self, x: &Array2<f64>) -> Array1<f64> {
        x.dot(&self.coef) + self.intercept
    }

    /// Number of features with a non-zero coefficient.
    pub fn n_selected(&self) -> usize {
        self.coef.iter().filter(|&&c| c != 0.0).count()
    }
}

//───────────────────────────── Training ────────────────────────────//

/// Lasso on mean-centred data; the intercept is recovered from the column
/// means as `y_mean - x_mean · w`.
pub fn fit_lasso(x: Array2<f64>, y: Array1<f64>, alpha: f64, max_iter: u32) -> Result<LassoFit> {
    let (n, p) = x.dim();
    let x_mean = x
        .mean_axis(Axis(0))
        .ok_or_else(|| anyhow!("Lasso fit on an empty matrix ({n} x {p})"))?;
    let y_mean = y.mean().unwrap_or(0.0);
    debug!("Centring {} x {} design, y mean = {:.4}", n, p, y_mean);

    let dataset = Dataset::new(x - &x_mean, y - y_mean);

    let model = ElasticNet::params()
        .penalty(alpha)
        .l1_ratio(1.0)
        .with_intercept(false)
        .max_iterations(max_iter)
        .fit(&dataset)
        .with_context(|| format!("Lasso fit failed (alpha = {alpha}, {n} x {p})"))?;

    let coef = model.hyperplane().to_owned();
    let fit = LassoFit {
        intercept: y_mean - x_mean.dot(&coef),
        coef,
    };
    debug!(
        "Lasso alpha = {:.5}: {} of {} coefficients non-zero",
        alpha,
        fit.n_selected(),
        p
    );
    Ok(fit)
}
