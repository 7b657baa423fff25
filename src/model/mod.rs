//! Trained SVM model
//!
//! A [`Model`] is produced by training or by loading a model file and never
//! changes afterwards, so it can be shared across threads for prediction.

pub mod predict;

use crate::core::{FeatureVector, SvmType};
use crate::kernel::KernelFunction;

/// Trained SVM model
///
/// Support vectors are grouped by class for classification models. Each
/// support vector has `nr_class - 1` dual coefficients stored in
/// `sv_coef[0..nr_class - 1][sv]`; for the pair (i, j) the coefficients of
/// class i's vectors live in row `j - 1` and those of class j's vectors in
/// row `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub(crate) svm_type: SvmType,
    pub(crate) kernel: KernelFunction,
    pub(crate) nr_class: usize,
    pub(crate) support_vectors: Vec<FeatureVector>,
    pub(crate) sv_coef: Vec<Vec<f64>>,
    /// One offset per class pair
    pub(crate) rho: Vec<f64>,
    /// Pairwise sigmoid parameters; for regression `prob_a[0]` is the
    /// Laplace sigma
    pub(crate) prob_a: Vec<f64>,
    pub(crate) prob_b: Vec<f64>,
    pub(crate) prob_density_marks: Vec<f64>,
    pub(crate) labels: Vec<i32>,
    /// Support vectors per class
    pub(crate) n_sv: Vec<usize>,
    /// 1-based training indices of the support vectors (empty once loaded)
    pub(crate) sv_indices: Vec<usize>,
}

impl Model {
    pub fn svm_type(&self) -> SvmType {
        self.svm_type
    }

    pub fn kernel(&self) -> &KernelFunction {
        &self.kernel
    }

    /// Number of classes; 2 for regression and one-class models
    pub fn nr_class(&self) -> usize {
        self.nr_class
    }

    /// Class labels in model order (empty for regression and one-class)
    pub fn labels(&self) -> &[i32] {
        &self.labels
    }

    pub fn total_sv(&self) -> usize {
        self.support_vectors.len()
    }

    pub fn support_vectors(&self) -> &[FeatureVector] {
        &self.support_vectors
    }

    /// Dual coefficients, `nr_class - 1` rows of `total_sv` entries
    pub fn sv_coef(&self) -> &[Vec<f64>] {
        &self.sv_coef
    }

    pub fn rho(&self) -> &[f64] {
        &self.rho
    }

    /// Number of support vectors of each class, in label order
    pub fn n_sv(&self) -> &[usize] {
        &self.n_sv
    }

    /// 1-based indices of the support vectors in the training problem
    ///
    /// Empty for models read from a file.
    pub fn sv_indices(&self) -> &[usize] {
        &self.sv_indices
    }

    pub fn prob_a(&self) -> &[f64] {
        &self.prob_a
    }

    pub fn prob_b(&self) -> &[f64] {
        &self.prob_b
    }

    pub fn prob_density_marks(&self) -> &[f64] {
        &self.prob_density_marks
    }

    /// Whether [`Model::predict_probability`] is available
    pub fn has_probability_model(&self) -> bool {
        match self.svm_type {
            SvmType::CSvc | SvmType::NuSvc => !self.prob_a.is_empty() && !self.prob_b.is_empty(),
            SvmType::OneClass => !self.prob_density_marks.is_empty(),
            SvmType::EpsilonSvr | SvmType::NuSvr => false,
        }
    }

    /// Sigma of the Laplace noise model of a regression model trained with
    /// probability estimates
    pub fn svr_sigma(&self) -> Option<f64> {
        if self.svm_type.is_regression() {
            self.prob_a.first().copied()
        } else {
            None
        }
    }

    /// Number of decision values [`Model::predict_values`] returns
    pub fn n_decision_values(&self) -> usize {
        if self.svm_type.is_classification() {
            self.nr_class * (self.nr_class - 1) / 2
        } else {
            1
        }
    }

    /// Offset of each class's first support vector
    pub(crate) fn class_starts(&self) -> Vec<usize> {
        let mut starts = Vec::with_capacity(self.n_sv.len());
        let mut offset = 0;
        for &count in &self.n_sv {
            starts.push(offset);
            offset += count;
        }
        starts
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::KernelType;

    pub(crate) fn regression_model() -> Model {
        Model {
            svm_type: SvmType::EpsilonSvr,
            kernel: KernelFunction::new(KernelType::Linear, 3, 0.0, 0.0),
            nr_class: 2,
            support_vectors: vec![FeatureVector::new(vec![1], vec![1.0])],
            sv_coef: vec![vec![2.0]],
            rho: vec![0.5],
            prob_a: vec![0.25],
            prob_b: Vec::new(),
            prob_density_marks: Vec::new(),
            labels: Vec::new(),
            n_sv: Vec::new(),
            sv_indices: vec![1],
        }
    }

    #[test]
    fn test_regression_accessors() {
        let model = regression_model();
        assert_eq!(model.total_sv(), 1);
        assert_eq!(model.n_decision_values(), 1);
        assert_eq!(model.svr_sigma(), Some(0.25));
        assert!(!model.has_probability_model());
    }

    #[test]
    fn test_class_starts() {
        let model = Model {
            svm_type: SvmType::CSvc,
            nr_class: 3,
            labels: vec![1, 2, 3],
            n_sv: vec![2, 0, 3],
            ..regression_model()
        };
        assert_eq!(model.class_starts(), vec![0, 2, 2]);
        assert_eq!(model.n_decision_values(), 3);
        assert_eq!(model.svr_sigma(), None);
    }

    #[test]
    fn test_model_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Model>();
    }
}
