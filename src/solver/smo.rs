//! Sequential Minimal Optimization (SMO) solver implementation
//!
//! Solves the dual problem
//!
//! ```text
//! min 0.5 a^T Q a + p^T a
//! s.t. y^T a = const, 0 <= a_i <= C_i
//! ```
//!
//! two variables at a time, choosing the pair by maximal violation and
//! second-order gain. All per-variable arrays keep the original variable
//! order; the active set is the prefix `order[..active_size]` of a
//! permutation, so shrinking only reorders `order`.

use crate::cache::CacheStats;
use crate::core::Parameters;
use crate::solver::qmatrix::QMatrix;
use log::{debug, info, warn};
use std::time::{Duration, Instant};

/// Curvature used when a pair's `Q_ii + Q_jj - 2 Q_ij` collapses
pub const TAU: f64 = 1e-12;

/// Lifecycle of a solver run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverState {
    Uninitialized,
    Active,
    Converged,
    /// The iteration or time budget ran out; the solution is best effort
    MaxIterReached,
}

/// Which dual the solver works on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverKind {
    /// One equality constraint y^T a = const
    Standard,
    /// Additional constraint e^T a = const; pairs are selected within the
    /// same label
    Nu,
}

/// Stopping and shrinking settings of a solver run
#[derive(Debug, Clone, PartialEq)]
pub struct SolverConfig {
    pub eps: f64,
    pub shrinking: bool,
    /// Iteration budget; `None` means max(10^7, 100 l)
    pub max_iterations: Option<usize>,
    pub time_limit: Option<Duration>,
    pub cache_bytes: usize,
}

impl SolverConfig {
    pub fn from_params(params: &Parameters) -> Self {
        Self {
            eps: params.eps,
            shrinking: params.shrinking,
            max_iterations: params.max_iterations,
            time_limit: params
                .time_limit_secs
                .filter(|secs| secs.is_finite() && *secs > 0.0)
                .map(Duration::from_secs_f64),
            cache_bytes: params.cache_bytes(),
        }
    }

    fn iteration_budget(&self, l: usize) -> usize {
        self.max_iterations
            .unwrap_or_else(|| 10_000_000usize.max(l.saturating_mul(100)))
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self::from_params(&Parameters::default())
    }
}

/// Result of a solver run
#[derive(Debug, Clone)]
pub struct Solution {
    pub alpha: Vec<f64>,
    pub objective_value: f64,
    pub rho: f64,
    /// Second offset of the nu dual (0 for the standard dual)
    pub r: f64,
    /// Upper bound C_i of every variable
    pub upper_bound: Vec<f64>,
    pub iterations: usize,
    pub state: SolverState,
    pub cache_stats: CacheStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AlphaStatus {
    LowerBound,
    UpperBound,
    Free,
}

/// SMO solver for the SVM duals
pub struct SMOSolver<Q: QMatrix> {
    pub(crate) q: Q,
    pub(crate) kind: SolverKind,
    pub(crate) y: Vec<f64>,
    pub(crate) p: Vec<f64>,
    pub(crate) c: Vec<f64>,
    pub(crate) qd: Vec<f64>,
    pub(crate) alpha: Vec<f64>,
    pub(crate) alpha_status: Vec<AlphaStatus>,
    /// Gradient of the objective
    pub(crate) g: Vec<f64>,
    /// Gradient contribution of the variables at their upper bound
    pub(crate) g_bar: Vec<f64>,
    pub(crate) order: Vec<usize>,
    pub(crate) active_size: usize,
    pub(crate) unshrink: bool,
    pub(crate) eps: f64,
    shrinking: bool,
    max_iterations: usize,
    time_limit: Option<Duration>,
    state: SolverState,
    pub(crate) row_i: Vec<f64>,
    pub(crate) row_j: Vec<f64>,
}

impl<Q: QMatrix> SMOSolver<Q> {
    /// Set up a solver for `q` with linear term `p`, labels `y` (+1/-1),
    /// initial feasible `alpha` and per-variable bounds `c`
    ///
    /// # Panics
    /// Panics if the vector lengths differ from `q.len()`.
    pub fn new(
        q: Q,
        kind: SolverKind,
        p: Vec<f64>,
        y: Vec<f64>,
        alpha: Vec<f64>,
        c: Vec<f64>,
        config: &SolverConfig,
    ) -> Self {
        let l = q.len();
        assert!(
            p.len() == l && y.len() == l && alpha.len() == l && c.len() == l,
            "Solver inputs must have one entry per variable"
        );

        let qd = q.diag().to_vec();
        Self {
            q,
            kind,
            y,
            p,
            c,
            qd,
            alpha,
            alpha_status: vec![AlphaStatus::LowerBound; l],
            g: vec![0.0; l],
            g_bar: vec![0.0; l],
            order: (0..l).collect(),
            active_size: l,
            unshrink: false,
            eps: config.eps,
            shrinking: config.shrinking,
            max_iterations: config.iteration_budget(l),
            time_limit: config.time_limit,
            state: SolverState::Uninitialized,
            row_i: vec![0.0; l],
            row_j: vec![0.0; l],
        }
    }

    pub fn state(&self) -> SolverState {
        self.state
    }

    pub(crate) fn len(&self) -> usize {
        self.alpha.len()
    }

    pub(crate) fn is_upper_bound(&self, i: usize) -> bool {
        self.alpha_status[i] == AlphaStatus::UpperBound
    }

    pub(crate) fn is_lower_bound(&self, i: usize) -> bool {
        self.alpha_status[i] == AlphaStatus::LowerBound
    }

    pub(crate) fn is_free(&self, i: usize) -> bool {
        self.alpha_status[i] == AlphaStatus::Free
    }

    pub(crate) fn update_alpha_status(&mut self, i: usize) {
        self.alpha_status[i] = if self.alpha[i] >= self.c[i] {
            AlphaStatus::UpperBound
        } else if self.alpha[i] <= 0.0 {
            AlphaStatus::LowerBound
        } else {
            AlphaStatus::Free
        };
    }

    /// Run SMO to convergence or until a budget is exhausted
    pub fn solve(mut self) -> Solution {
        let l = self.len();
        let started = Instant::now();

        self.initialize_gradient();
        self.state = SolverState::Active;

        let mut iterations = 0;
        let mut counter = l.min(1000) + 1;

        while self.state == SolverState::Active {
            if iterations >= self.max_iterations || self.out_of_time(started) {
                self.state = SolverState::MaxIterReached;
                break;
            }

            counter -= 1;
            if counter == 0 {
                counter = l.min(1000);
                if self.shrinking {
                    self.do_shrinking();
                }
            }

            let (i, j) = match self.select_working_set() {
                Some(pair) => pair,
                None => {
                    // Check optimality over the whole problem before stopping
                    self.reconstruct_gradient();
                    self.active_size = l;
                    debug!("active set exhausted, checking all {l} variables");
                    match self.select_working_set() {
                        Some(pair) => {
                            counter = 1;
                            pair
                        }
                        None => {
                            self.state = SolverState::Converged;
                            break;
                        }
                    }
                }
            };

            iterations += 1;
            self.update_pair(i, j);
        }

        if self.state == SolverState::MaxIterReached {
            if self.active_size < l {
                self.reconstruct_gradient();
                self.active_size = l;
            }
            warn!(
                "reaching max number of iterations ({iterations}), returning best-effort solution"
            );
        }

        let (rho, r) = match self.kind {
            SolverKind::Standard => (self.calculate_rho(), 0.0),
            SolverKind::Nu => self.calculate_rho_nu(),
        };

        let objective_value = (0..l)
            .map(|i| self.alpha[i] * (self.g[i] + self.p[i]))
            .sum::<f64>()
            / 2.0;

        info!("optimization finished, #iter = {iterations}");

        Solution {
            alpha: self.alpha,
            objective_value,
            rho,
            r,
            upper_bound: self.c,
            iterations,
            state: self.state,
            cache_stats: self.q.cache_stats(),
        }
    }

    fn out_of_time(&self, started: Instant) -> bool {
        self.time_limit
            .is_some_and(|limit| started.elapsed() >= limit)
    }

    pub(crate) fn initialize_gradient(&mut self) {
        let l = self.len();
        for i in 0..l {
            self.update_alpha_status(i);
        }

        self.g.copy_from_slice(&self.p);
        self.g_bar.iter_mut().for_each(|v| *v = 0.0);

        for i in 0..l {
            if self.is_lower_bound(i) {
                continue;
            }
            self.q.fill_row(i, &self.order, &mut self.row_i);
            let alpha_i = self.alpha[i];
            for j in 0..l {
                self.g[j] += alpha_i * self.row_i[j];
            }
            if self.is_upper_bound(i) {
                let c_i = self.c[i];
                for j in 0..l {
                    self.g_bar[j] += c_i * self.row_i[j];
                }
            }
        }
    }

    /// Analytic update of the pair (i, j), then gradient maintenance
    fn update_pair(&mut self, i: usize, j: usize) {
        let active = self.active_size;
        self.q.fill_row(i, &self.order[..active], &mut self.row_i);
        self.q.fill_row(j, &self.order[..active], &mut self.row_j);

        let c_i = self.c[i];
        let c_j = self.c[j];
        let old_alpha_i = self.alpha[i];
        let old_alpha_j = self.alpha[j];
        let q_ij = self.row_i[j];

        if self.y[i] != self.y[j] {
            let quad_coef = positive_or_tau(self.qd[i] + self.qd[j] + 2.0 * q_ij);
            let delta = (-self.g[i] - self.g[j]) / quad_coef;
            let diff = self.alpha[i] - self.alpha[j];
            self.alpha[i] += delta;
            self.alpha[j] += delta;

            if diff > 0.0 {
                if self.alpha[j] < 0.0 {
                    self.alpha[j] = 0.0;
                    self.alpha[i] = diff;
                }
            } else if self.alpha[i] < 0.0 {
                self.alpha[i] = 0.0;
                self.alpha[j] = -diff;
            }

            if diff > c_i - c_j {
                if self.alpha[i] > c_i {
                    self.alpha[i] = c_i;
                    self.alpha[j] = c_i - diff;
                }
            } else if self.alpha[j] > c_j {
                self.alpha[j] = c_j;
                self.alpha[i] = c_j + diff;
            }
        } else {
            let quad_coef = positive_or_tau(self.qd[i] + self.qd[j] - 2.0 * q_ij);
            let delta = (self.g[i] - self.g[j]) / quad_coef;
            let sum = self.alpha[i] + self.alpha[j];
            self.alpha[i] -= delta;
            self.alpha[j] += delta;

            if sum > c_i {
                if self.alpha[i] > c_i {
                    self.alpha[i] = c_i;
                    self.alpha[j] = sum - c_i;
                }
            } else if self.alpha[j] < 0.0 {
                self.alpha[j] = 0.0;
                self.alpha[i] = sum;
            }

            if sum > c_j {
                if self.alpha[j] > c_j {
                    self.alpha[j] = c_j;
                    self.alpha[i] = sum - c_j;
                }
            } else if self.alpha[i] < 0.0 {
                self.alpha[i] = 0.0;
                self.alpha[j] = sum;
            }
        }

        let delta_alpha_i = self.alpha[i] - old_alpha_i;
        let delta_alpha_j = self.alpha[j] - old_alpha_j;

        for &k in &self.order[..active] {
            self.g[k] += self.row_i[k] * delta_alpha_i + self.row_j[k] * delta_alpha_j;
        }

        let was_upper_i = self.is_upper_bound(i);
        let was_upper_j = self.is_upper_bound(j);
        self.update_alpha_status(i);
        self.update_alpha_status(j);

        if was_upper_i != self.is_upper_bound(i) {
            self.shift_g_bar(i, was_upper_i);
        }
        if was_upper_j != self.is_upper_bound(j) {
            self.shift_g_bar(j, was_upper_j);
        }
    }

    /// Add or remove the contribution of `i` to `G_bar` after it reached or
    /// left its upper bound
    fn shift_g_bar(&mut self, i: usize, was_upper: bool) {
        self.q.fill_row(i, &self.order, &mut self.row_i);
        let c_i = if was_upper { -self.c[i] } else { self.c[i] };
        for k in 0..self.len() {
            self.g_bar[k] += c_i * self.row_i[k];
        }
    }

    fn select_working_set(&mut self) -> Option<(usize, usize)> {
        match self.kind {
            SolverKind::Standard => self.select_working_set_standard(),
            SolverKind::Nu => self.select_working_set_nu(),
        }
    }

    /// Maximal violating i, then j by second-order gain
    fn select_working_set_standard(&mut self) -> Option<(usize, usize)> {
        let active = self.active_size;
        let mut g_max = f64::NEG_INFINITY;
        let mut g_max2 = f64::NEG_INFINITY;
        let mut i_sel = None;

        for &t in &self.order[..active] {
            if self.y[t] > 0.0 {
                if !self.is_upper_bound(t) && -self.g[t] >= g_max {
                    g_max = -self.g[t];
                    i_sel = Some(t);
                }
            } else if !self.is_lower_bound(t) && self.g[t] >= g_max {
                g_max = self.g[t];
                i_sel = Some(t);
            }
        }

        let i = i_sel?;
        self.q.fill_row(i, &self.order[..active], &mut self.row_i);

        let mut best = PartnerSearch::default();
        for &j in &self.order[..active] {
            if self.y[j] > 0.0 {
                if !self.is_lower_bound(j) {
                    let grad_diff = g_max + self.g[j];
                    g_max2 = g_max2.max(self.g[j]);
                    if grad_diff > 0.0 {
                        let quad_coef =
                            self.qd[i] + self.qd[j] - 2.0 * self.y[i] * self.row_i[j];
                        best.offer(j, grad_diff, quad_coef);
                    }
                }
            } else if !self.is_upper_bound(j) {
                let grad_diff = g_max - self.g[j];
                g_max2 = g_max2.max(-self.g[j]);
                if grad_diff > 0.0 {
                    let quad_coef = self.qd[i] + self.qd[j] + 2.0 * self.y[i] * self.row_i[j];
                    best.offer(j, grad_diff, quad_coef);
                }
            }
        }

        if g_max + g_max2 < self.eps {
            return None;
        }
        best.pick().map(|j| (i, j))
    }

    /// Working set selection of the nu dual: both variables share a label
    fn select_working_set_nu(&mut self) -> Option<(usize, usize)> {
        let active = self.active_size;
        let mut g_maxp = f64::NEG_INFINITY;
        let mut g_maxp2 = f64::NEG_INFINITY;
        let mut ip = None;
        let mut g_maxn = f64::NEG_INFINITY;
        let mut g_maxn2 = f64::NEG_INFINITY;
        let mut in_ = None;

        for &t in &self.order[..active] {
            if self.y[t] > 0.0 {
                if !self.is_upper_bound(t) && -self.g[t] >= g_maxp {
                    g_maxp = -self.g[t];
                    ip = Some(t);
                }
            } else if !self.is_lower_bound(t) && self.g[t] >= g_maxn {
                g_maxn = self.g[t];
                in_ = Some(t);
            }
        }

        if let Some(ip) = ip {
            self.q.fill_row(ip, &self.order[..active], &mut self.row_i);
        }
        if let Some(in_) = in_ {
            self.q.fill_row(in_, &self.order[..active], &mut self.row_j);
        }

        let mut best = PartnerSearch::default();
        for &j in &self.order[..active] {
            if self.y[j] > 0.0 {
                if !self.is_lower_bound(j) {
                    g_maxp2 = g_maxp2.max(self.g[j]);
                    if let Some(ip) = ip {
                        let grad_diff = g_maxp + self.g[j];
                        if grad_diff > 0.0 {
                            let quad_coef = self.qd[ip] + self.qd[j] - 2.0 * self.row_i[j];
                            best.offer(j, grad_diff, quad_coef);
                        }
                    }
                }
            } else if !self.is_upper_bound(j) {
                g_maxn2 = g_maxn2.max(-self.g[j]);
                if let Some(in_) = in_ {
                    let grad_diff = g_maxn - self.g[j];
                    if grad_diff > 0.0 {
                        let quad_coef = self.qd[in_] + self.qd[j] - 2.0 * self.row_j[j];
                        best.offer(j, grad_diff, quad_coef);
                    }
                }
            }
        }

        if (g_maxp + g_maxp2).max(g_maxn + g_maxn2) < self.eps {
            return None;
        }

        let j = best.pick()?;
        let i = if self.y[j] > 0.0 { ip } else { in_ }?;
        Some((i, j))
    }

    fn calculate_rho(&self) -> f64 {
        let mut nr_free = 0usize;
        let mut ub = f64::INFINITY;
        let mut lb = f64::NEG_INFINITY;
        let mut sum_free = 0.0;

        for &i in &self.order[..self.active_size] {
            let yg = self.y[i] * self.g[i];
            if self.is_upper_bound(i) {
                if self.y[i] < 0.0 {
                    ub = ub.min(yg);
                } else {
                    lb = lb.max(yg);
                }
            } else if self.is_lower_bound(i) {
                if self.y[i] > 0.0 {
                    ub = ub.min(yg);
                } else {
                    lb = lb.max(yg);
                }
            } else {
                nr_free += 1;
                sum_free += yg;
            }
        }

        if nr_free > 0 {
            sum_free / nr_free as f64
        } else {
            (ub + lb) / 2.0
        }
    }

    /// Returns (rho, r) of the nu dual
    fn calculate_rho_nu(&self) -> (f64, f64) {
        // Index 0 collects the +1 variables, index 1 the -1 variables
        let mut nr_free = [0usize; 2];
        let mut ub = [f64::INFINITY; 2];
        let mut lb = [f64::NEG_INFINITY; 2];
        let mut sum_free = [0.0; 2];

        for &i in &self.order[..self.active_size] {
            let side = if self.y[i] > 0.0 { 0 } else { 1 };
            if self.is_upper_bound(i) {
                lb[side] = lb[side].max(self.g[i]);
            } else if self.is_lower_bound(i) {
                ub[side] = ub[side].min(self.g[i]);
            } else {
                nr_free[side] += 1;
                sum_free[side] += self.g[i];
            }
        }

        let offset = |side: usize| {
            if nr_free[side] > 0 {
                sum_free[side] / nr_free[side] as f64
            } else {
                (ub[side] + lb[side]) / 2.0
            }
        };
        let r1 = offset(0);
        let r2 = offset(1);
        ((r1 - r2) / 2.0, (r1 + r2) / 2.0)
    }
}

fn positive_or_tau(quad_coef: f64) -> f64 {
    if quad_coef > 0.0 {
        quad_coef
    } else {
        TAU
    }
}

/// Best partner j for a fixed i
///
/// Candidates with positive curvature always win over candidates whose
/// curvature collapsed; the latter are only scored with `TAU` and used when
/// nothing else qualifies.
#[derive(Default)]
struct PartnerSearch {
    curved: Option<(usize, f64)>,
    flat: Option<(usize, f64)>,
}

impl PartnerSearch {
    fn offer(&mut self, j: usize, grad_diff: f64, quad_coef: f64) {
        let (slot, obj_diff) = if quad_coef > 0.0 {
            (&mut self.curved, -(grad_diff * grad_diff) / quad_coef)
        } else {
            (&mut self.flat, -(grad_diff * grad_diff) / TAU)
        };
        if slot.map_or(true, |(_, best)| obj_diff <= best) {
            *slot = Some((j, obj_diff));
        }
    }

    fn pick(&self) -> Option<usize> {
        self.curved.or(self.flat).map(|(j, _)| j)
    }
}
