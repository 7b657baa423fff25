//! Polynomial Kernel Implementation
//!
//! The polynomial kernel is defined as:
//! K(x, y) = (γ * <x, y> + r)^d
//!
//! Where:
//! - γ (gamma): scaling factor for the dot product
//! - r (coef0): independent term in the polynomial
//! - d (degree): degree of the polynomial

use crate::core::FeatureVector;
use crate::kernel::traits::Kernel;

/// Polynomial kernel with configurable degree, gamma, and coefficient
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolynomialKernel {
    /// Degree of the polynomial
    pub degree: i32,
    /// Scaling factor for the dot product
    pub gamma: f64,
    /// Independent term in the polynomial
    pub coef0: f64,
}

impl PolynomialKernel {
    /// Creates a new polynomial kernel with the specified parameters
    ///
    /// # Examples
    /// ```
    /// use ferrosvm::kernel::PolynomialKernel;
    ///
    /// // Quadratic kernel: (x·y + 1)²
    /// let quad_kernel = PolynomialKernel::new(2, 1.0, 1.0);
    /// assert_eq!(quad_kernel.degree, 2);
    /// ```
    pub fn new(degree: i32, gamma: f64, coef0: f64) -> Self {
        Self {
            degree,
            gamma,
            coef0,
        }
    }
}

impl Kernel for PolynomialKernel {
    fn compute(&self, x: &FeatureVector, y: &FeatureVector) -> f64 {
        (self.gamma * x.dot(y) + self.coef0).powi(self.degree)
    }
}
