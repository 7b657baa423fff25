//! The five SVM duals expressed as SMO problems

use crate::core::{FeatureVector, Parameters, SvmType};
use crate::kernel::{Kernel, KernelFunction};
use crate::solver::qmatrix::{OneClassQ, SvcQ, SvrQ};
use crate::solver::smo::{SMOSolver, Solution, SolverConfig, SolverKind, SolverState};
use log::info;

/// Coefficients and offset of one trained decision function
///
/// For classification `alpha[i]` already carries the sign of `y_i`.
#[derive(Debug, Clone)]
pub struct DecisionFunction {
    pub alpha: Vec<f64>,
    pub rho: f64,
    pub state: SolverState,
}

impl DecisionFunction {
    /// sum_i alpha_i K(x, x_i) - rho over the training vectors `x_train`
    pub fn decision_value(
        &self,
        kernel: &KernelFunction,
        x_train: &[&FeatureVector],
        x: &FeatureVector,
    ) -> f64 {
        let sum: f64 = self
            .alpha
            .iter()
            .zip(x_train)
            .filter(|(a, _)| **a != 0.0)
            .map(|(a, xi)| a * kernel.compute(x, xi))
            .sum();
        sum - self.rho
    }
}

/// Train one decision function on `x` with targets `y`
///
/// For the classification types `y` holds +1/-1 and `cp`/`cn` are the costs
/// of the positive and negative class. Regression and one-class ignore them.
pub fn train_one(
    x: &[&FeatureVector],
    y: &[f64],
    params: &Parameters,
    cp: f64,
    cn: f64,
) -> DecisionFunction {
    let kernel = KernelFunction::from_params(params);
    let config = SolverConfig::from_params(params);

    let (alpha, solution) = match params.svm_type {
        SvmType::CSvc => solve_c_svc(x, y, kernel, &config, cp, cn),
        SvmType::NuSvc => solve_nu_svc(x, y, kernel, &config, params.nu),
        SvmType::OneClass => solve_one_class(x, kernel, &config, params.nu),
        SvmType::EpsilonSvr => solve_epsilon_svr(x, y, kernel, &config, params.c, params.p),
        SvmType::NuSvr => solve_nu_svr(x, y, kernel, &config, params.c, params.nu),
    };

    info!("obj = {}, rho = {}", solution.objective_value, solution.rho);

    let mut n_sv = 0;
    let mut n_bsv = 0;
    for (i, &a) in alpha.iter().enumerate() {
        if a != 0.0 {
            n_sv += 1;
            if a.abs() >= solution.upper_bound[i] {
                n_bsv += 1;
            }
        }
    }
    info!("nSV = {n_sv}, nBSV = {n_bsv}");

    let stats = &solution.cache_stats;
    log::debug!(
        "kernel cache: {} hits, {} misses, {} rows",
        stats.hits,
        stats.misses,
        stats.size
    );

    DecisionFunction {
        alpha,
        rho: solution.rho,
        state: solution.state,
    }
}

fn sign(y: f64) -> f64 {
    if y > 0.0 {
        1.0
    } else {
        -1.0
    }
}

/// C-SVC: min 0.5 a^T Q a - e^T a, 0 <= a_i <= C_{y_i}, y^T a = 0
fn solve_c_svc(
    x: &[&FeatureVector],
    y: &[f64],
    kernel: KernelFunction,
    config: &SolverConfig,
    cp: f64,
    cn: f64,
) -> (Vec<f64>, Solution) {
    let l = x.len();
    let y: Vec<f64> = y.iter().map(|&v| sign(v)).collect();
    let c: Vec<f64> = y.iter().map(|&v| if v > 0.0 { cp } else { cn }).collect();

    let q = SvcQ::new(kernel, x.to_vec(), &y, config.cache_bytes);
    let solution = SMOSolver::new(
        q,
        SolverKind::Standard,
        vec![-1.0; l],
        y.clone(),
        vec![0.0; l],
        c,
        config,
    )
    .solve();

    if cp == cn && l > 0 {
        let sum_alpha: f64 = solution.alpha.iter().sum();
        info!("nu = {}", sum_alpha / (cp * l as f64));
    }

    let alpha = solution.alpha.iter().zip(&y).map(|(a, y)| a * y).collect();
    (alpha, solution)
}

/// nu-SVC, solved in the scaled form and rescaled by 1/r
fn solve_nu_svc(
    x: &[&FeatureVector],
    y: &[f64],
    kernel: KernelFunction,
    config: &SolverConfig,
    nu: f64,
) -> (Vec<f64>, Solution) {
    let l = x.len();
    let y: Vec<f64> = y.iter().map(|&v| sign(v)).collect();

    let mut sum_pos = nu * l as f64 / 2.0;
    let mut sum_neg = nu * l as f64 / 2.0;
    let alpha0: Vec<f64> = y
        .iter()
        .map(|&v| {
            let remaining = if v > 0.0 { &mut sum_pos } else { &mut sum_neg };
            let a = remaining.min(1.0);
            *remaining -= a;
            a
        })
        .collect();

    let q = SvcQ::new(kernel, x.to_vec(), &y, config.cache_bytes);
    let mut solution = SMOSolver::new(
        q,
        SolverKind::Nu,
        vec![0.0; l],
        y.clone(),
        alpha0,
        vec![1.0; l],
        config,
    )
    .solve();

    let r = solution.r;
    info!("C = {}", 1.0 / r);

    let alpha = solution
        .alpha
        .iter()
        .zip(&y)
        .map(|(a, y)| a * y / r)
        .collect();

    solution.rho /= r;
    solution.objective_value /= r * r;
    solution.upper_bound.iter_mut().for_each(|c| *c /= r);

    (alpha, solution)
}

/// One-class SVM: the first ⌊nu·l⌋ alphas start at 1
fn solve_one_class(
    x: &[&FeatureVector],
    kernel: KernelFunction,
    config: &SolverConfig,
    nu: f64,
) -> (Vec<f64>, Solution) {
    let l = x.len();
    let total = nu * l as f64;
    let n = total as usize;

    let mut alpha0 = vec![0.0; l];
    for a in alpha0.iter_mut().take(n) {
        *a = 1.0;
    }
    if n < l {
        alpha0[n] = total - n as f64;
    }

    let q = OneClassQ::new(kernel, x.to_vec(), config.cache_bytes);
    let solution = SMOSolver::new(
        q,
        SolverKind::Standard,
        vec![0.0; l],
        vec![1.0; l],
        alpha0,
        vec![1.0; l],
        config,
    )
    .solve();

    (solution.alpha.clone(), solution)
}

/// Fold the 2l regression variables back into l coefficients
fn fold_svr_alpha(alpha2: &[f64], l: usize) -> Vec<f64> {
    (0..l).map(|i| alpha2[i] - alpha2[i + l]).collect()
}

/// epsilon-SVR: 2l variables with linear term p - y / p + y
fn solve_epsilon_svr(
    x: &[&FeatureVector],
    y: &[f64],
    kernel: KernelFunction,
    config: &SolverConfig,
    c: f64,
    p: f64,
) -> (Vec<f64>, Solution) {
    let l = x.len();
    let mut linear_term = Vec::with_capacity(2 * l);
    linear_term.extend(y.iter().map(|&t| p - t));
    linear_term.extend(y.iter().map(|&t| p + t));
    let signs: Vec<f64> = (0..2 * l).map(|k| if k < l { 1.0 } else { -1.0 }).collect();

    let q = SvrQ::new(kernel, x.to_vec(), config.cache_bytes);
    let mut solution = SMOSolver::new(
        q,
        SolverKind::Standard,
        linear_term,
        signs,
        vec![0.0; 2 * l],
        vec![c; 2 * l],
        config,
    )
    .solve();

    let alpha = fold_svr_alpha(&solution.alpha, l);
    if l > 0 {
        let sum_alpha: f64 = alpha.iter().map(|a| a.abs()).sum();
        info!("nu = {}", sum_alpha / (c * l as f64));
    }
    solution.upper_bound.truncate(l);
    (alpha, solution)
}

/// nu-SVR: 2l variables initialised to C·nu·l/2 in total per side
fn solve_nu_svr(
    x: &[&FeatureVector],
    y: &[f64],
    kernel: KernelFunction,
    config: &SolverConfig,
    c: f64,
    nu: f64,
) -> (Vec<f64>, Solution) {
    let l = x.len();
    let mut sum = c * nu * l as f64 / 2.0;
    let mut alpha0 = vec![0.0; 2 * l];
    for i in 0..l {
        let a = sum.min(c);
        alpha0[i] = a;
        alpha0[i + l] = a;
        sum -= a;
    }

    let mut linear_term = Vec::with_capacity(2 * l);
    linear_term.extend(y.iter().map(|&t| -t));
    linear_term.extend(y.iter().copied());
    let signs: Vec<f64> = (0..2 * l).map(|k| if k < l { 1.0 } else { -1.0 }).collect();

    let q = SvrQ::new(kernel, x.to_vec(), config.cache_bytes);
    let mut solution = SMOSolver::new(
        q,
        SolverKind::Nu,
        linear_term,
        signs,
        alpha0,
        vec![c; 2 * l],
        config,
    )
    .solve();

    info!("epsilon = {}", -solution.r);
    let alpha = fold_svr_alpha(&solution.alpha, l);
    solution.upper_bound.truncate(l);
    (alpha, solution)
}
