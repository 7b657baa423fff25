//! Training parameters and their validation

use crate::core::{Problem, Result, SVMError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// SVM formulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SvmType {
    #[default]
    CSvc,
    NuSvc,
    OneClass,
    EpsilonSvr,
    NuSvr,
}

impl SvmType {
    /// Name used in the model file
    pub fn name(self) -> &'static str {
        match self {
            SvmType::CSvc => "c_svc",
            SvmType::NuSvc => "nu_svc",
            SvmType::OneClass => "one_class",
            SvmType::EpsilonSvr => "epsilon_svr",
            SvmType::NuSvr => "nu_svr",
        }
    }

    /// Whether the model predicts class labels through one-vs-one voting
    pub fn is_classification(self) -> bool {
        matches!(self, SvmType::CSvc | SvmType::NuSvc)
    }

    pub fn is_regression(self) -> bool {
        matches!(self, SvmType::EpsilonSvr | SvmType::NuSvr)
    }
}

impl fmt::Display for SvmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SvmType {
    type Err = SVMError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "c_svc" => Ok(SvmType::CSvc),
            "nu_svc" => Ok(SvmType::NuSvc),
            "one_class" => Ok(SvmType::OneClass),
            "epsilon_svr" => Ok(SvmType::EpsilonSvr),
            "nu_svr" => Ok(SvmType::NuSvr),
            other => Err(SVMError::InvalidParameters(format!(
                "unknown svm type '{other}'"
            ))),
        }
    }
}

impl TryFrom<i32> for SvmType {
    type Error = SVMError;

    fn try_from(code: i32) -> Result<Self> {
        match code {
            0 => Ok(SvmType::CSvc),
            1 => Ok(SvmType::NuSvc),
            2 => Ok(SvmType::OneClass),
            3 => Ok(SvmType::EpsilonSvr),
            4 => Ok(SvmType::NuSvr),
            other => Err(SVMError::InvalidParameters(format!(
                "unknown svm type code {other}"
            ))),
        }
    }
}

/// Kernel family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum KernelType {
    Linear,
    Polynomial,
    #[default]
    Rbf,
    Sigmoid,
    Precomputed,
}

impl KernelType {
    /// Name used in the model file
    pub fn name(self) -> &'static str {
        match self {
            KernelType::Linear => "linear",
            KernelType::Polynomial => "polynomial",
            KernelType::Rbf => "rbf",
            KernelType::Sigmoid => "sigmoid",
            KernelType::Precomputed => "precomputed",
        }
    }

    pub fn uses_gamma(self) -> bool {
        matches!(
            self,
            KernelType::Polynomial | KernelType::Rbf | KernelType::Sigmoid
        )
    }

    pub fn uses_coef0(self) -> bool {
        matches!(self, KernelType::Polynomial | KernelType::Sigmoid)
    }
}

impl fmt::Display for KernelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for KernelType {
    type Err = SVMError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "linear" => Ok(KernelType::Linear),
            "polynomial" => Ok(KernelType::Polynomial),
            "rbf" => Ok(KernelType::Rbf),
            "sigmoid" => Ok(KernelType::Sigmoid),
            "precomputed" => Ok(KernelType::Precomputed),
            other => Err(SVMError::InvalidKernel(format!(
                "unknown kernel type '{other}'"
            ))),
        }
    }
}

impl TryFrom<i32> for KernelType {
    type Error = SVMError;

    fn try_from(code: i32) -> Result<Self> {
        match code {
            0 => Ok(KernelType::Linear),
            1 => Ok(KernelType::Polynomial),
            2 => Ok(KernelType::Rbf),
            3 => Ok(KernelType::Sigmoid),
            4 => Ok(KernelType::Precomputed),
            other => Err(SVMError::InvalidKernel(format!(
                "unknown kernel type code {other}"
            ))),
        }
    }
}

/// Training configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    pub svm_type: SvmType,
    pub kernel_type: KernelType,
    /// Polynomial degree
    pub degree: i32,
    /// Kernel scale for polynomial, RBF and sigmoid kernels
    pub gamma: f64,
    /// Kernel offset for polynomial and sigmoid kernels
    pub coef0: f64,
    /// Kernel cache budget in MB
    pub cache_size: f64,
    /// Stopping tolerance on the KKT gap
    pub eps: f64,
    /// Cost for C-SVC, epsilon-SVR and nu-SVR
    pub c: f64,
    /// Per-class multipliers of `c` as `(label, weight)` pairs
    pub class_weights: Vec<(i32, f64)>,
    /// nu for nu-SVC, one-class and nu-SVR
    pub nu: f64,
    /// Width of the insensitive tube of epsilon-SVR
    pub p: f64,
    pub shrinking: bool,
    /// Fit probability estimates after training
    pub probability: bool,
    /// Iteration budget per solver run; defaults to max(10^7, 100 l)
    pub max_iterations: Option<usize>,
    /// Wall-clock budget per solver run, checked between iterations
    pub time_limit_secs: Option<f64>,
    /// 0 uses the global rayon pool, 1 trains sequentially, n > 1 builds a
    /// dedicated pool with n threads
    pub n_threads: usize,
    /// Seed for the fold shuffle of probability calibration
    pub seed: u64,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            svm_type: SvmType::CSvc,
            kernel_type: KernelType::Rbf,
            degree: 3,
            gamma: 0.0,
            coef0: 0.0,
            cache_size: 100.0,
            eps: 1e-3,
            c: 1.0,
            class_weights: Vec::new(),
            nu: 0.5,
            p: 0.1,
            shrinking: true,
            probability: false,
            max_iterations: None,
            time_limit_secs: None,
            n_threads: 0,
            seed: 1,
        }
    }
}

impl Parameters {
    /// Load parameters from a JSON file; missing fields keep their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| SVMError::file_io(path, e))?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| SVMError::InvalidParameters(format!("invalid parameter file: {e}")))
    }

    /// Kernel cache budget in bytes
    pub fn cache_bytes(&self) -> usize {
        (self.cache_size * 1024.0 * 1024.0) as usize
    }

    /// Set gamma to 1 / `n_features` when the kernel uses gamma and none was
    /// given; returns whether it changed
    pub fn apply_default_gamma(&mut self, n_features: usize) -> bool {
        if !self.kernel_type.uses_gamma() || self.gamma != 0.0 || n_features == 0 {
            return false;
        }
        self.gamma = 1.0 / n_features as f64;
        true
    }

    /// Weight multiplier of `c` for `label` (1.0 when not listed)
    pub fn weight_for(&self, label: i32) -> f64 {
        self.class_weights
            .iter()
            .filter(|(l, _)| *l == label)
            .map(|(_, w)| *w)
            .product()
    }

    /// Check the parameters against the problem before any training starts
    pub fn validate(&self, problem: &Problem) -> Result<()> {
        self.check_values()?;

        if problem.is_empty() {
            return Err(SVMError::InvalidProblem("problem has no samples".into()));
        }

        for (i, sample) in problem.samples().iter().enumerate() {
            if !sample.label.is_finite() {
                return Err(SVMError::InvalidProblem(format!(
                    "label of sample {} is not finite",
                    i + 1
                )));
            }
            if self.svm_type.is_classification() && sample.label.fract() != 0.0 {
                return Err(SVMError::InvalidProblem(format!(
                    "class label {} of sample {} is not an integer",
                    sample.label,
                    i + 1
                )));
            }
        }

        if self.kernel_type == KernelType::Precomputed {
            check_precomputed_rows(problem)?;
        }

        if self.svm_type == SvmType::NuSvc {
            self.check_nu_feasibility(problem)?;
        }

        Ok(())
    }

    /// Problem-independent checks
    pub fn check_values(&self) -> Result<()> {
        let invalid = |msg: &str| Err(SVMError::InvalidParameters(msg.to_string()));

        if self.kernel_type.uses_gamma() && !(self.gamma >= 0.0) {
            return invalid("gamma < 0");
        }
        if self.kernel_type == KernelType::Polynomial && self.degree < 0 {
            return invalid("degree of polynomial kernel < 0");
        }
        if !(self.cache_size > 0.0) {
            return invalid("cache_size <= 0");
        }
        if !(self.eps > 0.0) {
            return invalid("eps <= 0");
        }
        if matches!(
            self.svm_type,
            SvmType::CSvc | SvmType::EpsilonSvr | SvmType::NuSvr
        ) && !(self.c > 0.0)
        {
            return invalid("C <= 0");
        }
        if matches!(
            self.svm_type,
            SvmType::NuSvc | SvmType::OneClass | SvmType::NuSvr
        ) && !(self.nu > 0.0 && self.nu <= 1.0)
        {
            return invalid("nu <= 0 or nu > 1");
        }
        if self.svm_type == SvmType::EpsilonSvr && !(self.p >= 0.0) {
            return invalid("p < 0");
        }
        if self.class_weights.iter().any(|(_, w)| !(*w >= 0.0)) {
            return invalid("class weight < 0");
        }
        if self.max_iterations == Some(0) {
            return invalid("max_iterations must be positive");
        }
        if let Some(limit) = self.time_limit_secs {
            if !(limit > 0.0) {
                return invalid("time_limit_secs must be positive");
            }
        }
        Ok(())
    }

    fn check_nu_feasibility(&self, problem: &Problem) -> Result<()> {
        let mut counts: Vec<(i32, usize)> = Vec::new();
        for sample in problem.samples() {
            let label = sample.label as i32;
            match counts.iter_mut().find(|(l, _)| *l == label) {
                Some((_, n)) => *n += 1,
                None => counts.push((label, 1)),
            }
        }

        for (i, &(_, n1)) in counts.iter().enumerate() {
            for &(_, n2) in &counts[i + 1..] {
                if self.nu * (n1 + n2) as f64 / 2.0 > n1.min(n2) as f64 {
                    return Err(SVMError::InvalidParameters(
                        "specified nu is infeasible".into(),
                    ));
                }
            }
        }
        Ok(())
    }
}

fn check_precomputed_rows(problem: &Problem) -> Result<()> {
    for (i, sample) in problem.samples().iter().enumerate() {
        match sample.features.sample_id() {
            Some(id) if id >= 1.0 && id.fract() == 0.0 => {}
            Some(id) => {
                return Err(SVMError::InvalidKernel(format!(
                    "sample {}: precomputed sample id {id} is not a positive integer",
                    i + 1
                )))
            }
            None => {
                return Err(SVMError::InvalidKernel(format!(
                    "sample {}: precomputed kernel rows must start with 0:<sample id>",
                    i + 1
                )))
            }
        }
    }
    Ok(())
}
