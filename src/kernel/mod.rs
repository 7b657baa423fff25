//! Kernel functions for SVM

pub mod linear;
pub mod polynomial;
pub mod precomputed;
pub mod rbf;
pub mod sigmoid;
pub mod traits;

pub use self::linear::*;
pub use self::polynomial::*;
pub use self::precomputed::*;
pub use self::rbf::*;
pub use self::sigmoid::*;
pub use self::traits::*;

use crate::core::{FeatureVector, KernelType, Parameters};

/// One of the supported kernels, chosen at runtime from [`Parameters`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KernelFunction {
    Linear(LinearKernel),
    Polynomial(PolynomialKernel),
    Rbf(RBFKernel),
    Sigmoid(SigmoidKernel),
    Precomputed(PrecomputedKernel),
}

impl KernelFunction {
    pub fn from_params(params: &Parameters) -> Self {
        Self::new(params.kernel_type, params.degree, params.gamma, params.coef0)
    }

    pub fn new(kernel_type: KernelType, degree: i32, gamma: f64, coef0: f64) -> Self {
        match kernel_type {
            KernelType::Linear => KernelFunction::Linear(LinearKernel::new()),
            KernelType::Polynomial => {
                KernelFunction::Polynomial(PolynomialKernel::new(degree, gamma, coef0))
            }
            KernelType::Rbf => KernelFunction::Rbf(RBFKernel::new(gamma)),
            KernelType::Sigmoid => KernelFunction::Sigmoid(SigmoidKernel::new(gamma, coef0)),
            KernelType::Precomputed => KernelFunction::Precomputed(PrecomputedKernel::new()),
        }
    }

    pub fn kernel_type(&self) -> KernelType {
        match self {
            KernelFunction::Linear(_) => KernelType::Linear,
            KernelFunction::Polynomial(_) => KernelType::Polynomial,
            KernelFunction::Rbf(_) => KernelType::Rbf,
            KernelFunction::Sigmoid(_) => KernelType::Sigmoid,
            KernelFunction::Precomputed(_) => KernelType::Precomputed,
        }
    }

    /// Polynomial degree (0 for the other kernels)
    pub fn degree(&self) -> i32 {
        match self {
            KernelFunction::Polynomial(k) => k.degree,
            _ => 0,
        }
    }

    /// Kernel scale (0 for kernels without one)
    pub fn gamma(&self) -> f64 {
        match self {
            KernelFunction::Polynomial(k) => k.gamma,
            KernelFunction::Rbf(k) => k.gamma(),
            KernelFunction::Sigmoid(k) => k.gamma,
            _ => 0.0,
        }
    }

    pub fn coef0(&self) -> f64 {
        match self {
            KernelFunction::Polynomial(k) => k.coef0,
            KernelFunction::Sigmoid(k) => k.coef0,
            _ => 0.0,
        }
    }

    /// Whether [`Kernel::compute_with_norms`] saves work for this kernel
    pub fn uses_norms(&self) -> bool {
        matches!(self, KernelFunction::Rbf(_))
    }
}

impl Kernel for KernelFunction {
    fn compute(&self, x: &FeatureVector, y: &FeatureVector) -> f64 {
        match self {
            KernelFunction::Linear(k) => k.compute(x, y),
            KernelFunction::Polynomial(k) => k.compute(x, y),
            KernelFunction::Rbf(k) => k.compute(x, y),
            KernelFunction::Sigmoid(k) => k.compute(x, y),
            KernelFunction::Precomputed(k) => k.compute(x, y),
        }
    }

    fn compute_with_norms(
        &self,
        x: &FeatureVector,
        y: &FeatureVector,
        x_norm_sq: f64,
        y_norm_sq: f64,
    ) -> f64 {
        match self {
            KernelFunction::Rbf(k) => k.compute_with_norms(x, y, x_norm_sq, y_norm_sq),
            other => other.compute(x, y),
        }
    }
}
