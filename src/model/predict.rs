//! Prediction with a trained model

use crate::core::{FeatureVector, KernelType, Prediction, Result, SVMError, SvmType};
use crate::kernel::Kernel;
use crate::model::Model;
use crate::probability::{multiclass_probability, one_class_probability, sigmoid_predict};
use std::collections::BTreeMap;

/// Pairwise probabilities are kept away from 0 and 1
const MIN_PROB: f64 = 1e-7;

impl Model {
    /// Decision values for `x`
    ///
    /// Classification models return one value per class pair in the order
    /// (0,1), (0,2), ..., (1,2), ...; regression and one-class models return
    /// a single value.
    pub fn predict_values(&self, x: &FeatureVector) -> Result<Vec<f64>> {
        Ok(self.evaluate(x)?.1)
    }

    /// Predicted label: the majority vote for classification, +1/-1 for
    /// one-class and the regression value otherwise
    pub fn predict(&self, x: &FeatureVector) -> Result<f64> {
        Ok(self.evaluate(x)?.0)
    }

    /// Predicted label together with the decision values
    pub fn predict_detailed(&self, x: &FeatureVector) -> Result<Prediction> {
        let (label, decision_values) = self.evaluate(x)?;
        Ok(Prediction::new(label, decision_values))
    }

    /// Class probabilities keyed by label
    ///
    /// One-class models report the probability of being an inlier under
    /// label +1 and of being an outlier under -1.
    pub fn predict_probability(&self, x: &FeatureVector) -> Result<BTreeMap<i32, f64>> {
        if !self.has_probability_model() {
            return Err(SVMError::NoProbabilityModel);
        }

        let (_, decision_values) = self.evaluate(x)?;

        if self.svm_type == SvmType::OneClass {
            let inlier = one_class_probability(&self.prob_density_marks, decision_values[0]);
            return Ok(BTreeMap::from([(1, inlier), (-1, 1.0 - inlier)]));
        }

        let k = self.nr_class;
        let mut pairwise = vec![vec![0.0; k]; k];
        let mut p = 0;
        for i in 0..k {
            for j in i + 1..k {
                let prob = sigmoid_predict(decision_values[p], self.prob_a[p], self.prob_b[p])
                    .clamp(MIN_PROB, 1.0 - MIN_PROB);
                pairwise[i][j] = prob;
                pairwise[j][i] = 1.0 - prob;
                p += 1;
            }
        }

        let estimates = if k == 2 {
            vec![pairwise[0][1], pairwise[1][0]]
        } else {
            multiclass_probability(&pairwise)
        };

        Ok(self.labels.iter().copied().zip(estimates).collect())
    }

    /// Label and decision values of `x`
    pub(crate) fn evaluate(&self, x: &FeatureVector) -> Result<(f64, Vec<f64>)> {
        if self.kernel.kernel_type() == KernelType::Precomputed && x.sample_id().is_none() {
            return Err(SVMError::InvalidKernel(
                "precomputed kernel input must start with 0:<sample id>".into(),
            ));
        }

        match self.svm_type {
            SvmType::OneClass | SvmType::EpsilonSvr | SvmType::NuSvr => {
                let sum: f64 = self
                    .support_vectors
                    .iter()
                    .zip(&self.sv_coef[0])
                    .map(|(sv, coef)| coef * self.kernel.compute(x, sv))
                    .sum();
                let value = sum - self.rho[0];

                let label = match self.svm_type {
                    SvmType::OneClass if value > 0.0 => 1.0,
                    SvmType::OneClass => -1.0,
                    _ => value,
                };
                Ok((label, vec![value]))
            }
            SvmType::CSvc | SvmType::NuSvc => Ok(self.vote(x)),
        }
    }

    fn vote(&self, x: &FeatureVector) -> (f64, Vec<f64>) {
        let k = self.nr_class;
        let kvalue: Vec<f64> = self
            .support_vectors
            .iter()
            .map(|sv| self.kernel.compute(x, sv))
            .collect();
        let start = self.class_starts();

        let mut votes = vec![0usize; k];
        let mut decision_values = Vec::with_capacity(self.n_decision_values());
        let mut p = 0;

        for i in 0..k {
            for j in i + 1..k {
                let class_i = start[i]..start[i] + self.n_sv[i];
                let class_j = start[j]..start[j] + self.n_sv[j];

                let sum: f64 = class_i
                    .map(|s| self.sv_coef[j - 1][s] * kvalue[s])
                    .chain(class_j.map(|s| self.sv_coef[i][s] * kvalue[s]))
                    .sum();
                let value = sum - self.rho[p];
                decision_values.push(value);

                if value > 0.0 {
                    votes[i] += 1;
                } else {
                    votes[j] += 1;
                }
                p += 1;
            }
        }

        // Ties go to the class that comes first in the model
        let mut winner = 0;
        for (class, &count) in votes.iter().enumerate() {
            if count > votes[winner] {
                winner = class;
            }
        }

        (self.labels[winner] as f64, decision_values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::KernelFunction;
    use crate::model::tests::regression_model;
    use approx::assert_relative_eq;

    fn linear() -> KernelFunction {
        KernelFunction::new(KernelType::Linear, 3, 0.0, 0.0)
    }

    /// Three classes on a line at -2, 0 and 2 with one support vector each
    fn three_class_model() -> Model {
        Model {
            svm_type: SvmType::CSvc,
            kernel: linear(),
            nr_class: 3,
            support_vectors: vec![
                FeatureVector::new(vec![1], vec![-2.0]),
                FeatureVector::new(vec![1], vec![0.0]),
                FeatureVector::new(vec![1], vec![2.0]),
            ],
            // Decision values: (0,1) = 1 - 2x, (0,2) = -2x, (1,2) = -1 - 2x
            sv_coef: vec![vec![1.0, -1.0, -0.5], vec![0.5, 1.0, -1.0]],
            rho: vec![-1.0, 0.0, 1.0],
            prob_a: Vec::new(),
            prob_b: Vec::new(),
            prob_density_marks: Vec::new(),
            labels: vec![10, 20, 30],
            n_sv: vec![1, 1, 1],
            sv_indices: vec![1, 2, 3],
        }
    }

    #[test]
    fn test_regression_prediction() {
        let model = regression_model();
        let x = FeatureVector::new(vec![1], vec![3.0]);
        // 2 * 3 - 0.5
        assert_relative_eq!(model.predict(&x).unwrap(), 5.5);
        assert_eq!(model.predict_values(&x).unwrap(), vec![5.5]);
    }

    #[test]
    fn test_one_class_prediction_is_sign() {
        let model = Model {
            svm_type: SvmType::OneClass,
            ..regression_model()
        };
        let inside = FeatureVector::new(vec![1], vec![1.0]);
        let outside = FeatureVector::new(vec![1], vec![-1.0]);
        assert_eq!(model.predict(&inside).unwrap(), 1.0);
        assert_eq!(model.predict(&outside).unwrap(), -1.0);
    }

    #[test]
    fn test_one_vs_one_voting() {
        let model = three_class_model();
        let left = FeatureVector::new(vec![1], vec![-3.0]);
        let detailed = model.predict_detailed(&left).unwrap();
        assert_eq!(detailed.decision_values, vec![7.0, 6.0, 5.0]);
        assert_eq!(detailed.label, 10.0);

        let right = FeatureVector::new(vec![1], vec![3.0]);
        assert_eq!(model.predict(&right).unwrap(), 30.0);
    }

    #[test]
    fn test_tie_goes_to_first_class() {
        let mut model = three_class_model();
        // Pair (0,1) -> 0, pair (0,2) -> 2, pair (1,2) -> 1: one vote each
        model.sv_coef = vec![vec![0.0; 3], vec![0.0; 3]];
        model.rho = vec![-1.0, 1.0, -1.0];
        let x = FeatureVector::new(vec![1], vec![0.0]);
        assert_eq!(model.predict_values(&x).unwrap(), vec![1.0, -1.0, 1.0]);
        assert_eq!(model.predict(&x).unwrap(), 10.0);
    }

    #[test]
    fn test_probability_requires_calibration() {
        let model = three_class_model();
        let x = FeatureVector::new(vec![1], vec![0.0]);
        assert!(matches!(
            model.predict_probability(&x),
            Err(SVMError::NoProbabilityModel)
        ));
        assert!(matches!(
            regression_model().predict_probability(&x),
            Err(SVMError::NoProbabilityModel)
        ));
    }

    #[test]
    fn test_probability_sums_to_one() {
        let mut model = three_class_model();
        model.prob_a = vec![-2.0, -2.0, -2.0];
        model.prob_b = vec![0.0, 0.0, 0.0];

        for v in [-3.0, -0.5, 0.0, 1.0, 3.0] {
            let x = FeatureVector::new(vec![1], vec![v]);
            let probs = model.predict_probability(&x).unwrap();
            assert_eq!(probs.keys().copied().collect::<Vec<_>>(), vec![10, 20, 30]);
            let total: f64 = probs.values().sum();
            assert_relative_eq!(total, 1.0, epsilon = 1e-6);
            assert!(probs.values().all(|&p| (0.0..=1.0).contains(&p)));
        }
    }

    #[test]
    fn test_binary_probability_uses_pairwise_value() {
        let model = Model {
            svm_type: SvmType::CSvc,
            nr_class: 2,
            labels: vec![1, -1],
            n_sv: vec![1, 0],
            sv_coef: vec![vec![1.0]],
            rho: vec![0.0],
            prob_a: vec![-1.0],
            prob_b: vec![0.0],
            ..regression_model()
        };
        let x = FeatureVector::new(vec![1], vec![2.0]);
        let probs = model.predict_probability(&x).unwrap();

        // decision value 2, P(+1) = 1 / (1 + exp(-2))
        let expected = 1.0 / (1.0 + (-2.0f64).exp());
        assert_relative_eq!(probs[&1], expected, epsilon = 1e-12);
        assert_relative_eq!(probs[&-1], 1.0 - expected, epsilon = 1e-12);
    }

    #[test]
    fn test_one_class_probability_keys() {
        let model = Model {
            svm_type: SvmType::OneClass,
            prob_density_marks: (0..10).map(|i| i as f64 - 4.5).collect(),
            ..regression_model()
        };
        let x = FeatureVector::new(vec![1], vec![100.0]);
        let probs = model.predict_probability(&x).unwrap();
        assert_relative_eq!(probs[&1], 0.999);
        assert_relative_eq!(probs[&-1], 0.001, epsilon = 1e-12);
    }

    #[test]
    fn test_precomputed_input_needs_sample_id() {
        let model = Model {
            kernel: KernelFunction::new(KernelType::Precomputed, 3, 0.0, 0.0),
            support_vectors: vec![FeatureVector::new(vec![0], vec![1.0])],
            ..regression_model()
        };

        let without_id = FeatureVector::new(vec![1], vec![4.0]);
        assert!(matches!(
            model.predict(&without_id),
            Err(SVMError::InvalidKernel(_))
        ));

        // K(x, sv) = x[1] = 4, 2 * 4 - 0.5
        let with_id = FeatureVector::new(vec![0, 1], vec![1.0, 4.0]);
        assert_relative_eq!(model.predict(&with_id).unwrap(), 7.5);
    }
}
