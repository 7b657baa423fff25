//! Core type definitions for SVM

use crate::core::{Result, SVMError};

/// Prediction result containing label and decision values
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Predicted class label, one-class sign (+1/-1) or regression output
    pub label: f64,
    /// Raw decision values, one per class pair (a single value for
    /// one-class and regression models)
    pub decision_values: Vec<f64>,
}

impl Prediction {
    /// Create a new prediction
    pub fn new(label: f64, decision_values: Vec<f64>) -> Self {
        Self {
            label,
            decision_values,
        }
    }

    /// First decision value; the only one for binary, one-class and
    /// regression models
    pub fn decision_value(&self) -> f64 {
        self.decision_values.first().copied().unwrap_or(0.0)
    }

    /// Get confidence as absolute value of the first decision value
    pub fn confidence(&self) -> f64 {
        self.decision_value().abs()
    }
}

/// Sparse feature vector with strictly increasing indices
///
/// Indices are kept exactly as they appear in data and model files (1-based
/// in the libsvm convention). Index 0 is reserved for the sample id of a
/// precomputed kernel row.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct FeatureVector {
    indices: Vec<usize>,
    values: Vec<f64>,
}

impl FeatureVector {
    /// Create a new feature vector, sorting the pairs by index
    ///
    /// # Panics
    /// Panics if the lengths differ or an index occurs twice.
    pub fn new(indices: Vec<usize>, values: Vec<f64>) -> Self {
        assert_eq!(
            indices.len(),
            values.len(),
            "Indices and values must have same length"
        );

        let mut pairs: Vec<_> = indices.into_iter().zip(values).collect();
        pairs.sort_by_key(|&(idx, _)| idx);
        assert!(
            pairs.windows(2).all(|w| w[0].0 < w[1].0),
            "Feature indices must be unique"
        );

        let (indices, values): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
        Self { indices, values }
    }

    /// Build a feature vector from `(index, value)` pairs that must already be
    /// strictly increasing by index
    pub fn try_from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (usize, f64)>,
    {
        let mut indices = Vec::new();
        let mut values = Vec::new();
        for (index, value) in pairs {
            if let Some(&last) = indices.last() {
                if index <= last {
                    return Err(SVMError::InvalidProblem(format!(
                        "feature indices must be strictly increasing, got {index} after {last}"
                    )));
                }
            }
            indices.push(index);
            values.push(value);
        }
        Ok(Self { indices, values })
    }

    /// Dense constructor: `values[k]` is stored at index `start_index + k`,
    /// zeros included
    pub fn from_dense(start_index: usize, values: &[f64]) -> Self {
        Self {
            indices: (start_index..start_index + values.len()).collect(),
            values: values.to_vec(),
        }
    }

    /// Create an empty feature vector
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Iterate over `(index, value)` pairs in index order
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }

    /// Get the value at a specific index (0 if not present)
    pub fn get(&self, index: usize) -> f64 {
        match self.indices.binary_search(&index) {
            Ok(pos) => self.values[pos],
            Err(_) => 0.0,
        }
    }

    /// Value at index 0, or `None` when the vector has no index 0 entry
    pub fn sample_id(&self) -> Option<f64> {
        match self.indices.first() {
            Some(0) => Some(self.values[0]),
            _ => None,
        }
    }

    /// Sparse dot product, merging the two sorted index lists
    pub fn dot(&self, other: &FeatureVector) -> f64 {
        let mut result = 0.0;
        let mut i = 0;
        let mut j = 0;

        while i < self.indices.len() && j < other.indices.len() {
            let x_idx = self.indices[i];
            let y_idx = other.indices[j];

            if x_idx == y_idx {
                result += self.values[i] * other.values[j];
                i += 1;
                j += 1;
            } else if x_idx < y_idx {
                i += 1;
            } else {
                j += 1;
            }
        }

        result
    }

    /// Squared Euclidean distance; indices present in only one vector
    /// contribute their squared value
    pub fn squared_distance(&self, other: &FeatureVector) -> f64 {
        let mut distance_sq = 0.0;
        let mut i = 0;
        let mut j = 0;

        while i < self.indices.len() && j < other.indices.len() {
            let x_idx = self.indices[i];
            let y_idx = other.indices[j];

            if x_idx == y_idx {
                let diff = self.values[i] - other.values[j];
                distance_sq += diff * diff;
                i += 1;
                j += 1;
            } else if x_idx < y_idx {
                distance_sq += self.values[i] * self.values[i];
                i += 1;
            } else {
                distance_sq += other.values[j] * other.values[j];
                j += 1;
            }
        }

        distance_sq += self.values[i..].iter().map(|v| v * v).sum::<f64>();
        distance_sq += other.values[j..].iter().map(|v| v * v).sum::<f64>();
        distance_sq
    }

    /// Compute squared L2 norm
    pub fn norm_squared(&self) -> f64 {
        self.values.iter().map(|&v| v * v).sum()
    }

    /// Largest index, 0 for an empty vector
    pub fn max_index(&self) -> usize {
        self.indices.last().copied().unwrap_or(0)
    }

    /// Number of stored elements
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    /// Check if vector is empty
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Training sample with features and label
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    pub features: FeatureVector,
    /// Class id for classification, real target for regression
    pub label: f64,
}

impl Sample {
    /// Create a new sample
    pub fn new(features: FeatureVector, label: f64) -> Self {
        Self { features, label }
    }
}

/// A training problem: feature vectors with their labels
///
/// Immutable once built; training only borrows it.
#[derive(Clone, Debug, Default)]
pub struct Problem {
    samples: Vec<Sample>,
}

impl Problem {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    /// Pair up feature vectors and labels
    pub fn from_parts(features: Vec<FeatureVector>, labels: Vec<f64>) -> Result<Self> {
        if features.len() != labels.len() {
            return Err(SVMError::InvalidProblem(format!(
                "{} feature vectors but {} labels",
                features.len(),
                labels.len()
            )));
        }
        Ok(Self::new(
            features
                .into_iter()
                .zip(labels)
                .map(|(x, y)| Sample::new(x, y))
                .collect(),
        ))
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn sample(&self, i: usize) -> &Sample {
        &self.samples[i]
    }

    pub fn labels(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.label).collect()
    }

    /// Largest feature index over all samples
    pub fn max_index(&self) -> usize {
        self.samples
            .iter()
            .map(|s| s.features.max_index())
            .max()
            .unwrap_or(0)
    }
}

impl FromIterator<Sample> for Problem {
    fn from_iter<T: IntoIterator<Item = Sample>>(iter: T) -> Self {
        Problem::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_vector_creation() {
        let fv = FeatureVector::new(vec![3, 1, 5], vec![2.0, 1.0, 3.0]);

        assert_eq!(fv.indices(), &[1, 3, 5]);
        assert_eq!(fv.values(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_feature_vector_get() {
        let fv = FeatureVector::new(vec![1, 3, 5], vec![1.0, 2.0, 3.0]);

        assert_eq!(fv.get(0), 0.0);
        assert_eq!(fv.get(1), 1.0);
        assert_eq!(fv.get(3), 2.0);
        assert_eq!(fv.get(5), 3.0);
        assert_eq!(fv.get(6), 0.0);
    }

    #[test]
    #[should_panic(expected = "Indices and values must have same length")]
    fn test_feature_vector_length_mismatch() {
        FeatureVector::new(vec![1, 2], vec![1.0, 2.0, 3.0]);
    }

    #[test]
    #[should_panic(expected = "Feature indices must be unique")]
    fn test_feature_vector_duplicate_index() {
        FeatureVector::new(vec![2, 2], vec![1.0, 2.0]);
    }

    #[test]
    fn test_try_from_pairs_rejects_unsorted() {
        let result = FeatureVector::try_from_pairs(vec![(2, 1.0), (1, 2.0)]);
        assert!(matches!(result, Err(SVMError::InvalidProblem(_))));

        let result = FeatureVector::try_from_pairs(vec![(1, 1.0), (1, 2.0)]);
        assert!(result.is_err());

        let fv = FeatureVector::try_from_pairs(vec![(1, 1.0), (4, 2.0)]).unwrap();
        assert_eq!(fv.max_index(), 4);
    }

    #[test]
    fn test_from_dense_keeps_zeros() {
        let fv = FeatureVector::from_dense(1, &[1.0, 0.0, 0.0, 1.0]);
        assert_eq!(fv.indices(), &[1, 2, 3, 4]);
        assert_eq!(fv.nnz(), 4);
        assert_eq!(fv.get(4), 1.0);
    }

    #[test]
    fn test_dot_and_distance() {
        let x = FeatureVector::new(vec![1, 3, 6], vec![1.0, 3.0, 2.0]);
        let y = FeatureVector::new(vec![3, 4, 6], vec![2.0, 1.0, 4.0]);

        // Overlap at 3 and 6: 3*2 + 2*4
        assert_eq!(x.dot(&y), 14.0);
        // 1 + 1 + 1 + 4
        assert_eq!(x.squared_distance(&y), 7.0);
        assert_eq!(y.squared_distance(&x), 7.0);
        assert_eq!(x.squared_distance(&x), 0.0);
    }

    #[test]
    fn test_distance_with_empty() {
        let x = FeatureVector::empty();
        let y = FeatureVector::new(vec![1, 2], vec![1.0, 2.0]);

        assert_eq!(x.dot(&y), 0.0);
        assert_eq!(x.squared_distance(&y), 5.0);
        assert_eq!(y.norm_squared(), 5.0);
        assert!(x.is_empty());
        assert_eq!(x.max_index(), 0);
    }

    #[test]
    fn test_sample_id() {
        let row = FeatureVector::new(vec![0, 1, 2], vec![3.0, 0.5, 0.7]);
        assert_eq!(row.sample_id(), Some(3.0));

        let plain = FeatureVector::new(vec![1], vec![3.0]);
        assert_eq!(plain.sample_id(), None);
    }

    #[test]
    fn test_prediction() {
        let pred = Prediction::new(1.0, vec![2.5]);
        assert_eq!(pred.label, 1.0);
        assert_eq!(pred.decision_value(), 2.5);
        assert_eq!(pred.confidence(), 2.5);

        let neg_pred = Prediction::new(-1.0, vec![-1.8, 0.3]);
        assert_eq!(neg_pred.confidence(), 1.8);
    }

    #[test]
    fn test_problem_from_parts() {
        let xs = vec![
            FeatureVector::new(vec![1], vec![1.0]),
            FeatureVector::new(vec![2, 7], vec![1.0, 2.0]),
        ];
        let problem = Problem::from_parts(xs, vec![1.0, 2.0]).unwrap();
        assert_eq!(problem.len(), 2);
        assert_eq!(problem.labels(), vec![1.0, 2.0]);
        assert_eq!(problem.max_index(), 7);

        let bad = Problem::from_parts(vec![FeatureVector::empty()], vec![]);
        assert!(matches!(bad, Err(SVMError::InvalidProblem(_))));
    }
}
