//! Kernel trait definition

use crate::core::FeatureVector;

/// Kernel function trait
///
/// A kernel function K(x, y) must satisfy Mercer's condition to be valid for SVM.
/// The precomputed kernel is the exception: it only looks values up.
pub trait Kernel: Send + Sync {
    /// Compute kernel value K(x, y)
    fn compute(&self, x: &FeatureVector, y: &FeatureVector) -> f64;

    /// Compute K(x, y) given the precomputed squared norms of both vectors
    ///
    /// The solver keeps the norms of all training vectors; kernels built on
    /// distances (RBF) avoid a second sparse merge with them.
    fn compute_with_norms(
        &self,
        x: &FeatureVector,
        y: &FeatureVector,
        x_norm_sq: f64,
        y_norm_sq: f64,
    ) -> f64 {
        let _ = (x_norm_sq, y_norm_sq);
        self.compute(x, y)
    }
}
