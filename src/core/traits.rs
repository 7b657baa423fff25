//! Core traits for SVM implementation

use crate::core::{Problem, Sample};

/// Dataset abstraction for efficient data access
pub trait Dataset: Send + Sync {
    /// Number of samples in the dataset
    fn len(&self) -> usize;

    /// Largest feature index seen (the dimensionality for 1-based data)
    fn dim(&self) -> usize;

    /// Get a single sample by index
    ///
    /// # Panics
    /// Panics if index >= len()
    fn get_sample(&self, i: usize) -> Sample;

    /// Get multiple samples
    fn get_batch(&self, indices: &[usize]) -> Vec<Sample> {
        indices.iter().map(|&i| self.get_sample(i)).collect()
    }

    /// Get all labels as a vector
    fn get_labels(&self) -> Vec<f64>;

    /// Check if the dataset is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy the samples into a training [`Problem`]
    fn to_problem(&self) -> Problem {
        (0..self.len()).map(|i| self.get_sample(i)).collect()
    }
}

impl Dataset for Problem {
    fn len(&self) -> usize {
        Problem::len(self)
    }

    fn dim(&self) -> usize {
        self.max_index()
    }

    fn get_sample(&self, i: usize) -> Sample {
        self.sample(i).clone()
    }

    fn get_labels(&self) -> Vec<f64> {
        self.labels()
    }

    fn to_problem(&self) -> Problem {
        self.clone()
    }
}
