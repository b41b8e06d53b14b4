//! Shared estimator traits.

use crate::error::Result;
use crate::primitives::Matrix;

/// Unsupervised estimator over row-major sample matrices.
pub trait UnsupervisedEstimator {
    /// The type of labels/clusters produced.
    type Labels;

    /// Fits the model to data.
    ///
    /// # Errors
    ///
    /// Returns an error if fitting fails (empty data, invalid
    /// parameters, failed decomposition).
    fn fit(&mut self, x: &Matrix<f64>) -> Result<()>;

    /// Predicts cluster assignments for data.
    fn predict(&self, x: &Matrix<f64>) -> Self::Labels;
}
