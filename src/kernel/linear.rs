//! Linear kernel implementation

use crate::core::FeatureVector;
use crate::kernel::Kernel;

/// Linear kernel: K(x, y) = x^T * y
///
/// For sparse vectors the dot product is a merge over the two sorted index
/// lists, O(nnz(x) + nnz(y)).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LinearKernel;

impl LinearKernel {
    /// Create a new linear kernel
    pub fn new() -> Self {
        Self
    }
}

impl Kernel for LinearKernel {
    fn compute(&self, x: &FeatureVector, y: &FeatureVector) -> f64 {
        x.dot(y)
    }
}
