//! RBF (Radial Basis Function) kernel implementation
//!
//! The RBF kernel is defined as: K(x, y) = exp(-γ * ||x - y||²)
//! where γ (gamma) is a hyperparameter that controls the kernel width.

use crate::core::FeatureVector;
use crate::kernel::Kernel;

/// RBF (Radial Basis Function) kernel: K(x, y) = exp(-γ * ||x - y||²)
///
/// The gamma parameter controls the "reach" of each training example:
/// - High gamma: close points have high influence (potential overfitting)
/// - Low gamma: distant points have influence (potential underfitting)
///
/// [`crate::core::Parameters::apply_default_gamma`] picks 1 / number of features.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RBFKernel {
    gamma: f64,
}

impl RBFKernel {
    /// Create a new RBF kernel with specified gamma parameter
    pub fn new(gamma: f64) -> Self {
        Self { gamma }
    }

    /// Get the gamma parameter
    pub fn gamma(&self) -> f64 {
        self.gamma
    }
}

impl Kernel for RBFKernel {
    fn compute(&self, x: &FeatureVector, y: &FeatureVector) -> f64 {
        (-self.gamma * x.squared_distance(y)).exp()
    }

    fn compute_with_norms(
        &self,
        x: &FeatureVector,
        y: &FeatureVector,
        x_norm_sq: f64,
        y_norm_sq: f64,
    ) -> f64 {
        // ||x - y||² = ||x||² + ||y||² - 2*x^T*y
        let squared_distance = x_norm_sq + y_norm_sq - 2.0 * x.dot(y);
        (-self.gamma * squared_distance).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rbf_kernel_creation() {
        assert_eq!(RBFKernel::new(0.5).gamma(), 0.5);
    }

    #[test]
    fn test_rbf_kernel_identical_vectors() {
        let kernel = RBFKernel::new(1.0);
        let x = FeatureVector::new(vec![1, 2, 3], vec![1.0, 2.0, 3.0]);

        assert_relative_eq!(kernel.compute(&x, &x), 1.0);
    }

    #[test]
    fn test_rbf_kernel_orthogonal_vectors() {
        let kernel = RBFKernel::new(1.0);
        let x = FeatureVector::new(vec![1, 3], vec![1.0, 1.0]);
        let y = FeatureVector::new(vec![2, 4], vec![1.0, 1.0]);

        // ||x - y||² = 4 (no overlap)
        assert_relative_eq!(kernel.compute(&x, &y), (-4.0_f64).exp(), epsilon = 1e-12);
    }

    #[test]
    fn test_rbf_kernel_symmetry() {
        let kernel = RBFKernel::new(0.5);
        let x = FeatureVector::new(vec![1, 3, 5], vec![1.0, 2.0, 3.0]);
        let y = FeatureVector::new(vec![2, 3, 4], vec![1.0, 2.0, 3.0]);

        assert_eq!(kernel.compute(&x, &y), kernel.compute(&y, &x));
    }

    #[test]
    fn test_rbf_kernel_with_norms() {
        let kernel = RBFKernel::new(2.0);
        let x = FeatureVector::new(vec![1, 2], vec![3.0, 4.0]);
        let y = FeatureVector::new(vec![1, 2], vec![1.0, 2.0]);

        let direct = kernel.compute(&x, &y);
        let with_norms = kernel.compute_with_norms(&x, &y, x.norm_squared(), y.norm_squared());

        assert_relative_eq!(direct, with_norms, epsilon = 1e-12);
    }

    #[test]
    fn test_rbf_kernel_decreases_with_distance() {
        let kernel = RBFKernel::new(1.0);
        let origin = FeatureVector::new(vec![1], vec![0.0]);
        let values: Vec<f64> = [1.0, 2.0, 3.0]
            .iter()
            .map(|&v| kernel.compute(&origin, &FeatureVector::new(vec![1], vec![v])))
            .collect();

        assert!(values[0] > values[1] && values[1] > values[2]);
        assert!(values.iter().all(|&k| (0.0..=1.0).contains(&k)));
    }
}
