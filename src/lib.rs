//! Support Vector Machines in pure Rust
//!
//! Training uses SMO decomposition with second-order working set selection,
//! shrinking and a byte-bounded kernel row cache. Models cover C-SVC, nu-SVC,
//! one-class SVM, epsilon-SVR and nu-SVR, with optional probability
//! estimates, and are read and written in the libsvm text format.
//!
//! ```rust
//! use ferrosvm::{FeatureVector, KernelType, Problem, Sample, SVM};
//!
//! let problem = Problem::new(vec![
//!     Sample::new(FeatureVector::new(vec![1], vec![1.0]), 1.0),
//!     Sample::new(FeatureVector::new(vec![1], vec![-1.0]), -1.0),
//! ]);
//! let model = SVM::new().kernel(KernelType::Linear).train(&problem).unwrap();
//! let x = FeatureVector::new(vec![1], vec![0.5]);
//! assert_eq!(model.predict(&x).unwrap(), 1.0);
//! ```

pub mod api;
pub mod cache;
pub mod core;
pub mod data;
pub mod kernel;
pub mod model;
pub mod optimizer;
pub mod persistence;
pub mod probability;
pub mod solver;
pub mod utils;

// Re-export main types for convenience
pub use crate::api::{
    load, predict, predict_probability, save, train, version, EvaluationMetrics, SVM,
};
pub use crate::cache::{CacheStats, KernelCache};
pub use crate::core::error::{Result, SVMError};
pub use crate::core::params::{KernelType, Parameters, SvmType};
pub use crate::core::traits::*;
pub use crate::core::types::*;
pub use crate::data::LibSVMDataset;
pub use crate::kernel::{Kernel, KernelFunction};
pub use crate::model::Model;

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
