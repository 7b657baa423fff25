//! Shrinking heuristic implementation
//!
//! Variables that sit at a bound and whose gradient says they will stay
//! there are moved out of the active set. Their gradient is not maintained
//! while they are inactive and is rebuilt from `G_bar` and the free
//! variables when the active set is restored.

use crate::solver::qmatrix::QMatrix;
use crate::solver::smo::{SMOSolver, SolverKind};
use log::debug;

impl<Q: QMatrix> SMOSolver<Q> {
    /// Shrink the active set; the first time the gap falls below 10·eps the
    /// whole problem is restored once before shrinking again
    pub(crate) fn do_shrinking(&mut self) {
        let thresholds = match self.kind {
            SolverKind::Standard => self.shrink_thresholds_standard(),
            SolverKind::Nu => self.shrink_thresholds_nu(),
        };

        if !self.unshrink && thresholds.gap(self.kind) <= self.eps * 10.0 {
            self.unshrink = true;
            self.reconstruct_gradient();
            self.active_size = self.len();
            debug!("unshrinking: gap close to eps, reactivating all variables");
        }

        let before = self.active_size;
        let mut i = 0;
        while i < self.active_size {
            if self.be_shrunk(self.order[i], &thresholds) {
                self.active_size -= 1;
                while self.active_size > i {
                    if !self.be_shrunk(self.order[self.active_size], &thresholds) {
                        self.order.swap(i, self.active_size);
                        break;
                    }
                    self.active_size -= 1;
                }
            }
            i += 1;
        }

        if self.active_size != before {
            debug!(
                "shrinking: active set {} -> {} of {}",
                before,
                self.active_size,
                self.len()
            );
        }
    }

    /// Recompute the gradient of the inactive variables
    pub(crate) fn reconstruct_gradient(&mut self) {
        let l = self.len();
        let active = self.active_size;
        if active == l {
            return;
        }

        for &j in &self.order[active..] {
            self.g[j] = self.g_bar[j] + self.p[j];
        }

        let nr_free = self.order[..active]
            .iter()
            .filter(|&&j| self.is_free(j))
            .count();

        if 2 * nr_free < active {
            debug!("most active variables are at a bound; disabling shrinking may be faster");
        }

        if nr_free * l > 2 * active * (l - active) {
            // Few inactive variables: one row per inactive variable
            for pos in active..l {
                let i = self.order[pos];
                self.q.fill_row(i, &self.order[..active], &mut self.row_i);
                let mut g_i = 0.0;
                for &j in &self.order[..active] {
                    if self.is_free(j) {
                        g_i += self.alpha[j] * self.row_i[j];
                    }
                }
                self.g[i] += g_i;
            }
        } else {
            for pos in 0..active {
                let i = self.order[pos];
                if !self.is_free(i) {
                    continue;
                }
                self.q.fill_row(i, &self.order[active..], &mut self.row_i);
                let alpha_i = self.alpha[i];
                for &j in &self.order[active..] {
                    self.g[j] += alpha_i * self.row_i[j];
                }
            }
        }
    }

    fn be_shrunk(&self, i: usize, thresholds: &ShrinkThresholds) -> bool {
        let positive = self.y[i] > 0.0;
        if self.is_upper_bound(i) {
            let bound = if positive {
                thresholds.up_pos
            } else {
                thresholds.up_neg
            };
            -self.g[i] > bound
        } else if self.is_lower_bound(i) {
            let bound = if positive {
                thresholds.low_pos
            } else {
                thresholds.low_neg
            };
            self.g[i] > bound
        } else {
            false
        }
    }

    fn shrink_thresholds_standard(&self) -> ShrinkThresholds {
        // m: max { -y G | i in I_up }, big_m: max { y G | i in I_low }
        let mut m = f64::NEG_INFINITY;
        let mut big_m = f64::NEG_INFINITY;

        for &i in &self.order[..self.active_size] {
            if self.y[i] > 0.0 {
                if !self.is_upper_bound(i) {
                    m = m.max(-self.g[i]);
                }
                if !self.is_lower_bound(i) {
                    big_m = big_m.max(self.g[i]);
                }
            } else {
                if !self.is_upper_bound(i) {
                    big_m = big_m.max(-self.g[i]);
                }
                if !self.is_lower_bound(i) {
                    m = m.max(self.g[i]);
                }
            }
        }

        ShrinkThresholds {
            up_pos: m,
            up_neg: big_m,
            low_pos: big_m,
            low_neg: m,
        }
    }

    fn shrink_thresholds_nu(&self) -> ShrinkThresholds {
        let mut up_pos = f64::NEG_INFINITY;
        let mut low_pos = f64::NEG_INFINITY;
        let mut low_neg = f64::NEG_INFINITY;
        let mut up_neg = f64::NEG_INFINITY;

        for &i in &self.order[..self.active_size] {
            let positive = self.y[i] > 0.0;
            if !self.is_upper_bound(i) {
                if positive {
                    up_pos = up_pos.max(-self.g[i]);
                } else {
                    up_neg = up_neg.max(-self.g[i]);
                }
            }
            if !self.is_lower_bound(i) {
                if positive {
                    low_pos = low_pos.max(self.g[i]);
                } else {
                    low_neg = low_neg.max(self.g[i]);
                }
            }
        }

        ShrinkThresholds {
            up_pos,
            up_neg,
            low_pos,
            low_neg,
        }
    }
}

/// Violation bounds a bounded variable must exceed to be shrunk
#[derive(Debug, Clone, Copy, PartialEq)]
struct ShrinkThresholds {
    /// Compared with -G of positive variables at the upper bound
    up_pos: f64,
    /// Compared with -G of negative variables at the upper bound
    up_neg: f64,
    /// Compared with G of positive variables at the lower bound
    low_pos: f64,
    /// Compared with G of negative variables at the lower bound
    low_neg: f64,
}

impl ShrinkThresholds {
    fn gap(&self, kind: SolverKind) -> f64 {
        match kind {
            SolverKind::Standard => self.up_pos + self.low_pos,
            SolverKind::Nu => (self.up_pos + self.low_pos).max(self.low_neg + self.up_neg),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::core::{FeatureVector, KernelType};
    use crate::kernel::KernelFunction;
    use crate::solver::qmatrix::SvcQ;
    use crate::solver::smo::{SMOSolver, SolverConfig, SolverKind};
    use approx::assert_relative_eq;

    fn solver<'a>(x: &'a [FeatureVector], y: &'a [f64]) -> SMOSolver<SvcQ<'a>> {
        let kernel = KernelFunction::new(KernelType::Linear, 3, 0.0, 0.0);
        let l = x.len();
        SMOSolver::new(
            SvcQ::new(kernel, x.iter().collect(), y, 1 << 20),
            SolverKind::Standard,
            vec![-1.0; l],
            y.to_vec(),
            vec![0.0; l],
            vec![1.0; l],
            &SolverConfig::default(),
        )
    }

    #[test]
    fn test_reconstruct_gradient_matches_full_gradient() {
        let x: Vec<FeatureVector> = (0..6)
            .map(|i| FeatureVector::new(vec![1, 2], vec![i as f64 - 2.5, (i * i) as f64 / 10.0]))
            .collect();
        let y = [1.0, -1.0, 1.0, 1.0, -1.0, -1.0];
        let mut s = solver(&x, &y);

        s.alpha = vec![0.3, 1.0, 0.0, 0.6, 0.2, 1.0];
        for i in 0..6 {
            s.update_alpha_status(i);
        }
        s.initialize_gradient();
        let full = s.g.clone();

        // Deactivate the two bounded variables at positions 4 and 5
        s.order = vec![0, 3, 4, 2, 1, 5];
        s.active_size = 4;
        s.g[1] = f64::NAN;
        s.g[5] = f64::NAN;
        s.reconstruct_gradient();

        for i in 0..6 {
            assert_relative_eq!(s.g[i], full[i], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_shrinking_keeps_order_a_permutation() {
        let x: Vec<FeatureVector> = (0..40)
            .map(|i| FeatureVector::new(vec![1], vec![i as f64 - 19.5]))
            .collect();
        let y: Vec<f64> = (0..40).map(|i| if i < 20 { -1.0 } else { 1.0 }).collect();
        let mut s = solver(&x, &y);
        s.alpha = vec![0.0; 40];
        for i in 0..40 {
            s.update_alpha_status(i);
        }
        s.initialize_gradient();
        s.do_shrinking();

        assert!(s.active_size <= 40);
        let mut seen = s.order.clone();
        seen.sort_unstable();
        assert_eq!(seen, (0..40).collect::<Vec<_>>());
    }
}
