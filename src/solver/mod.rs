//! SVM solver implementations
//!
//! A generic SMO solver over a [`QMatrix`], with shrinking, and the five
//! SVM formulations built on top of it.

pub mod formulation;
pub mod qmatrix;
pub mod shrinking;
pub mod smo;

pub use self::formulation::*;
pub use self::qmatrix::*;
pub use self::smo::*;
