//! Sigmoid (Tanh) Kernel Implementation
//!
//! K(x, y) = tanh(γ * <x, y> + r)
//!
//! The kernel is not positive semi-definite for every (γ, r), so the solver
//! must cope with non-positive curvature when it is used.

use crate::core::FeatureVector;
use crate::kernel::traits::Kernel;

/// Sigmoid (Hyperbolic Tangent) kernel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SigmoidKernel {
    /// Scaling parameter for the dot product
    pub gamma: f64,
    /// Bias/offset parameter (can be positive, negative, or zero)
    pub coef0: f64,
}

impl SigmoidKernel {
    /// Creates a new Sigmoid kernel with specified parameters
    ///
    /// # Examples
    /// ```
    /// use ferrosvm::kernel::SigmoidKernel;
    ///
    /// let kernel = SigmoidKernel::new(0.1, -1.0);
    /// assert_eq!(kernel.gamma, 0.1);
    /// assert_eq!(kernel.coef0, -1.0);
    /// ```
    pub fn new(gamma: f64, coef0: f64) -> Self {
        Self { gamma, coef0 }
    }
}

impl Kernel for SigmoidKernel {
    fn compute(&self, x: &FeatureVector, y: &FeatureVector) -> f64 {
        (self.gamma * x.dot(y) + self.coef0).tanh()
    }
}
