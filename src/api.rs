//! High-level API for Support Vector Machine operations
//!
//! This module provides a builder for training parameters, free functions
//! for the common train/save/load/predict cycle, and evaluation metrics.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use ferrosvm::api::{self, SVM};
//! use ferrosvm::{KernelType, SvmType};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let model = SVM::new()
//!     .svm_type(SvmType::CSvc)
//!     .kernel(KernelType::Rbf)
//!     .with_gamma(0.5)
//!     .with_c(10.0)
//!     .train_from_file("data.libsvm")?;
//!
//! api::save(&model, "data.model")?;
//! let model = api::load("data.model")?;
//! let metrics = api::evaluate_from_file(&model, "test.libsvm")?;
//! println!("Accuracy: {:.2}%", metrics.accuracy() * 100.0);
//! # Ok(())
//! # }
//! ```

use crate::core::{Dataset, FeatureVector, KernelType, Parameters, Problem, Result, SvmType};
use crate::data::LibSVMDataset;
use crate::model::Model;
use crate::optimizer;
use crate::persistence;
use std::collections::BTreeMap;
use std::path::Path;

/// Version of the model format and library behaviour this crate follows
pub const LIBSVM_VERSION: u32 = 336;

/// High-level SVM interface with builder pattern
#[derive(Debug, Clone, Default)]
pub struct SVM {
    params: Parameters,
}

impl SVM {
    /// C-SVC with an RBF kernel and default parameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a full parameter set, e.g. one read from a JSON file
    pub fn with_params(params: Parameters) -> Self {
        Self { params }
    }

    pub fn svm_type(mut self, svm_type: SvmType) -> Self {
        self.params.svm_type = svm_type;
        self
    }

    pub fn kernel(mut self, kernel_type: KernelType) -> Self {
        self.params.kernel_type = kernel_type;
        self
    }

    /// Set regularization parameter C
    pub fn with_c(mut self, c: f64) -> Self {
        self.params.c = c;
        self
    }

    pub fn with_nu(mut self, nu: f64) -> Self {
        self.params.nu = nu;
        self
    }

    /// Set the epsilon-SVR tube width
    pub fn with_p(mut self, p: f64) -> Self {
        self.params.p = p;
        self
    }

    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.params.gamma = gamma;
        self
    }

    pub fn with_degree(mut self, degree: i32) -> Self {
        self.params.degree = degree;
        self
    }

    pub fn with_coef0(mut self, coef0: f64) -> Self {
        self.params.coef0 = coef0;
        self
    }

    /// Set convergence tolerance
    pub fn with_epsilon(mut self, eps: f64) -> Self {
        self.params.eps = eps;
        self
    }

    /// Set kernel cache size in MB
    pub fn with_cache_size(mut self, megabytes: f64) -> Self {
        self.params.cache_size = megabytes;
        self
    }

    pub fn with_shrinking(mut self, shrinking: bool) -> Self {
        self.params.shrinking = shrinking;
        self
    }

    pub fn with_probability(mut self, probability: bool) -> Self {
        self.params.probability = probability;
        self
    }

    /// Multiply C by `weight` for class `label`
    pub fn with_class_weight(mut self, label: i32, weight: f64) -> Self {
        self.params.class_weights.push((label, weight));
        self
    }

    /// Set maximum number of iterations per solver run
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.params.max_iterations = Some(max_iterations);
        self
    }

    /// Set a wall-clock budget in seconds per solver run
    pub fn with_time_limit(mut self, seconds: f64) -> Self {
        self.params.time_limit_secs = Some(seconds);
        self
    }

    pub fn with_threads(mut self, n_threads: usize) -> Self {
        self.params.n_threads = n_threads;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.params.seed = seed;
        self
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    /// Train on a problem
    pub fn train(&self, problem: &Problem) -> Result<Model> {
        optimizer::train(problem, &self.params)
    }

    /// Train on any dataset
    pub fn train_dataset<D: Dataset>(&self, dataset: &D) -> Result<Model> {
        self.train(&dataset.to_problem())
    }

    /// Train from LibSVM format file
    pub fn train_from_file<P: AsRef<Path>>(&self, path: P) -> Result<Model> {
        let problem = LibSVMDataset::from_file(path)?.into_problem();
        self.train(&problem)
    }
}

/// Train a model on `problem`
pub fn train(problem: &Problem, params: &Parameters) -> Result<Model> {
    optimizer::train(problem, params)
}

/// Write `model` to `path` in the libsvm text format
pub fn save<P: AsRef<Path>>(model: &Model, path: P) -> Result<()> {
    persistence::save(model, path)
}

/// Read a model in the libsvm text format from `path`
pub fn load<P: AsRef<Path>>(path: P) -> Result<Model> {
    persistence::load(path)
}

pub fn predict(model: &Model, x: &FeatureVector) -> Result<f64> {
    model.predict(x)
}

pub fn predict_probability(model: &Model, x: &FeatureVector) -> Result<BTreeMap<i32, f64>> {
    model.predict_probability(x)
}

pub fn version() -> u32 {
    LIBSVM_VERSION
}

/// Predict every sample of `dataset` and compare with its labels
pub fn evaluate<D: Dataset>(model: &Model, dataset: &D) -> Result<EvaluationMetrics> {
    let mut metrics = EvaluationMetrics::default();
    for i in 0..dataset.len() {
        let sample = dataset.get_sample(i);
        metrics.add(model.predict(&sample.features)?, sample.label);
    }
    Ok(metrics)
}

/// Evaluate from LibSVM file
pub fn evaluate_from_file<P: AsRef<Path>>(model: &Model, path: P) -> Result<EvaluationMetrics> {
    let dataset = LibSVMDataset::from_file(path)?;
    evaluate(model, &dataset)
}

/// Running comparison of predictions against targets
///
/// Accuracy is meaningful for classification; mean squared error and the
/// squared correlation coefficient for regression.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationMetrics {
    pub total: usize,
    pub correct: usize,
    sum_error: f64,
    sum_p: f64,
    sum_t: f64,
    sum_pp: f64,
    sum_tt: f64,
    sum_pt: f64,
}

impl EvaluationMetrics {
    /// Record one prediction and its target
    pub fn add(&mut self, predicted: f64, target: f64) {
        self.total += 1;
        if predicted == target {
            self.correct += 1;
        }
        self.sum_error += (predicted - target) * (predicted - target);
        self.sum_p += predicted;
        self.sum_t += target;
        self.sum_pp += predicted * predicted;
        self.sum_tt += target * target;
        self.sum_pt += predicted * target;
    }

    /// Fraction of exact label matches
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }

    pub fn mean_squared_error(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.sum_error / self.total as f64
        }
    }

    /// Squared correlation coefficient between predictions and targets
    pub fn squared_correlation(&self) -> f64 {
        let n = self.total as f64;
        let cov = n * self.sum_pt - self.sum_p * self.sum_t;
        let var_p = n * self.sum_pp - self.sum_p * self.sum_p;
        let var_t = n * self.sum_tt - self.sum_t * self.sum_t;
        if var_p == 0.0 || var_t == 0.0 {
            0.0
        } else {
            cov * cov / (var_p * var_t)
        }
    }
}
