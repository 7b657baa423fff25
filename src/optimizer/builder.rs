//! Assembly of a [`Model`] from trained decision functions

use crate::core::{FeatureVector, Result, SVMError, SvmType};
use crate::kernel::KernelFunction;
use crate::model::Model;
use crate::optimizer::ClassGroups;
use crate::solver::DecisionFunction;
use log::info;

/// Collects the pieces of a model and keeps only the support vectors
#[derive(Debug, Clone)]
pub struct ModelBuilder {
    svm_type: SvmType,
    kernel: KernelFunction,
    prob_a: Vec<f64>,
    prob_b: Vec<f64>,
    prob_density_marks: Vec<f64>,
}

impl ModelBuilder {
    pub fn new(svm_type: SvmType, kernel: KernelFunction) -> Self {
        Self {
            svm_type,
            kernel,
            prob_a: Vec::new(),
            prob_b: Vec::new(),
            prob_density_marks: Vec::new(),
        }
    }

    /// Pairwise sigmoid parameters, or `[sigma]` alone for regression
    pub fn with_probability(mut self, prob_a: Vec<f64>, prob_b: Vec<f64>) -> Self {
        self.prob_a = prob_a;
        self.prob_b = prob_b;
        self
    }

    pub fn with_density_marks(mut self, marks: Vec<f64>) -> Self {
        self.prob_density_marks = marks;
        self
    }

    /// Model of a one-class or regression decision function trained on `x`
    pub fn build_single(self, x: &[&FeatureVector], f: &DecisionFunction) -> Result<Model> {
        let mut support_vectors = Vec::new();
        let mut coef = Vec::new();
        let mut sv_indices = Vec::new();

        for (i, (&alpha, xi)) in f.alpha.iter().zip(x).enumerate() {
            if alpha != 0.0 {
                support_vectors.push((*xi).clone());
                coef.push(alpha);
                sv_indices.push(i + 1);
            }
        }

        if support_vectors.is_empty() {
            return Err(SVMError::DegenerateModel(format!(
                "{} training produced no support vectors",
                self.svm_type
            )));
        }

        Ok(Model {
            svm_type: self.svm_type,
            kernel: self.kernel,
            nr_class: 2,
            support_vectors,
            sv_coef: vec![coef],
            rho: vec![f.rho],
            prob_a: self.prob_a,
            prob_b: self.prob_b,
            prob_density_marks: self.prob_density_marks,
            labels: Vec::new(),
            n_sv: Vec::new(),
            sv_indices,
        })
    }

    /// Model of the one-vs-one decision functions, one per class pair in the
    /// order (0,1), (0,2), ..., (1,2), ...
    ///
    /// `x` is the training data grouped by class as described by `groups`.
    pub fn build_one_vs_one(
        self,
        groups: &ClassGroups,
        x: &[&FeatureVector],
        functions: &[DecisionFunction],
    ) -> Result<Model> {
        let nr_class = groups.labels.len();

        // A vector is kept when it is a support vector of any pair
        let mut nonzero = vec![false; x.len()];
        let mut p = 0;
        for i in 0..nr_class {
            for j in i + 1..nr_class {
                let (si, ci) = (groups.start[i], groups.count[i]);
                let (sj, cj) = (groups.start[j], groups.count[j]);
                let alpha = &functions[p].alpha;
                for k in 0..ci {
                    nonzero[si + k] |= alpha[k] != 0.0;
                }
                for k in 0..cj {
                    nonzero[sj + k] |= alpha[ci + k] != 0.0;
                }
                p += 1;
            }
        }

        let n_sv: Vec<usize> = (0..nr_class)
            .map(|c| {
                let range = groups.start[c]..groups.start[c] + groups.count[c];
                nonzero[range].iter().filter(|&&nz| nz).count()
            })
            .collect();
        let total_sv: usize = n_sv.iter().sum();
        info!("Total nSV = {total_sv}");

        if total_sv == 0 {
            return Err(SVMError::DegenerateModel(if nr_class < 2 {
                "training data contains a single class".into()
            } else {
                "training produced no support vectors".into()
            }));
        }

        let mut support_vectors = Vec::with_capacity(total_sv);
        let mut sv_indices = Vec::with_capacity(total_sv);
        for (k, xk) in x.iter().enumerate() {
            if nonzero[k] {
                support_vectors.push((*xk).clone());
                sv_indices.push(groups.perm[k] + 1);
            }
        }

        let mut nz_start = vec![0; nr_class];
        for c in 1..nr_class {
            nz_start[c] = nz_start[c - 1] + n_sv[c - 1];
        }

        let mut sv_coef = vec![vec![0.0; total_sv]; nr_class - 1];
        let mut rho = Vec::with_capacity(functions.len());
        let mut p = 0;
        for i in 0..nr_class {
            for j in i + 1..nr_class {
                let (si, ci) = (groups.start[i], groups.count[i]);
                let (sj, cj) = (groups.start[j], groups.count[j]);
                let alpha = &functions[p].alpha;

                let mut q = nz_start[i];
                for k in 0..ci {
                    if nonzero[si + k] {
                        sv_coef[j - 1][q] = alpha[k];
                        q += 1;
                    }
                }
                let mut q = nz_start[j];
                for k in 0..cj {
                    if nonzero[sj + k] {
                        sv_coef[i][q] = alpha[ci + k];
                        q += 1;
                    }
                }

                rho.push(functions[p].rho);
                p += 1;
            }
        }

        Ok(Model {
            svm_type: self.svm_type,
            kernel: self.kernel,
            nr_class,
            support_vectors,
            sv_coef,
            rho,
            prob_a: self.prob_a,
            prob_b: self.prob_b,
            prob_density_marks: self.prob_density_marks,
            labels: groups.labels.clone(),
            n_sv,
            sv_indices,
        })
    }
}
