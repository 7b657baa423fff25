//! Probability estimates
//!
//! Pairwise class probabilities come from a sigmoid fitted to decision
//! values (Platt scaling) and are combined by pairwise coupling. Regression
//! models carry the scale of a Laplace noise model and one-class models a
//! set of density marks over their decision values.

pub mod calibration;

pub use self::calibration::*;

use log::{info, warn};

/// Number of one-class density marks
pub const NR_DENSITY_MARKS: usize = 10;

/// Fit P(y = 1 | f) = 1 / (1 + exp(A f + B)) to decision values `dec` with
/// labels `labels` (> 0 is positive) by Newton's method with backtracking
///
/// Returns (A, B).
pub fn sigmoid_train(dec: &[f64], labels: &[f64]) -> (f64, f64) {
    const MAX_ITER: usize = 100;
    const MIN_STEP: f64 = 1e-10;
    const SIGMA: f64 = 1e-12;
    const EPS: f64 = 1e-5;

    let prior1 = labels.iter().filter(|&&y| y > 0.0).count() as f64;
    let prior0 = labels.len() as f64 - prior1;

    let hi_target = (prior1 + 1.0) / (prior1 + 2.0);
    let lo_target = 1.0 / (prior0 + 2.0);
    let t: Vec<f64> = labels
        .iter()
        .map(|&y| if y > 0.0 { hi_target } else { lo_target })
        .collect();

    let objective = |a: f64, b: f64| -> f64 {
        dec.iter()
            .zip(&t)
            .map(|(&d, &ti)| {
                let f_apb = d * a + b;
                if f_apb >= 0.0 {
                    ti * f_apb + (-f_apb).exp().ln_1p()
                } else {
                    (ti - 1.0) * f_apb + f_apb.exp().ln_1p()
                }
            })
            .sum()
    };

    let mut a = 0.0;
    let mut b = ((prior0 + 1.0) / (prior1 + 1.0)).ln();
    let mut fval = objective(a, b);

    let mut iter = 0;
    while iter < MAX_ITER {
        // Gradient and Hessian (with H' = H + sigma I)
        let mut h11 = SIGMA;
        let mut h22 = SIGMA;
        let mut h21 = 0.0;
        let mut g1 = 0.0;
        let mut g2 = 0.0;
        for (&d, &ti) in dec.iter().zip(&t) {
            let f_apb = d * a + b;
            let (p, q) = if f_apb >= 0.0 {
                let e = (-f_apb).exp();
                (e / (1.0 + e), 1.0 / (1.0 + e))
            } else {
                let e = f_apb.exp();
                (1.0 / (1.0 + e), e / (1.0 + e))
            };
            let d2 = p * q;
            h11 += d * d * d2;
            h22 += d2;
            h21 += d * d2;
            let d1 = ti - p;
            g1 += d * d1;
            g2 += d1;
        }

        if g1.abs() < EPS && g2.abs() < EPS {
            break;
        }

        let det = h11 * h22 - h21 * h21;
        let d_a = -(h22 * g1 - h21 * g2) / det;
        let d_b = -(-h21 * g1 + h11 * g2) / det;
        let gd = g1 * d_a + g2 * d_b;

        let mut step = 1.0;
        while step >= MIN_STEP {
            let new_a = a + step * d_a;
            let new_b = b + step * d_b;
            let new_f = objective(new_a, new_b);
            if new_f < fval + 0.0001 * step * gd {
                a = new_a;
                b = new_b;
                fval = new_f;
                break;
            }
            step /= 2.0;
        }

        if step < MIN_STEP {
            info!("line search fails in two-class probability estimates");
            break;
        }
        iter += 1;
    }

    if iter >= MAX_ITER {
        info!("reaching maximal iterations in two-class probability estimates");
    }
    (a, b)
}

/// P(y = 1 | f) for a fitted sigmoid, evaluated without overflow
pub fn sigmoid_predict(decision_value: f64, a: f64, b: f64) -> f64 {
    let f_apb = decision_value * a + b;
    if f_apb >= 0.0 {
        let e = (-f_apb).exp();
        e / (1.0 + e)
    } else {
        1.0 / (1.0 + f_apb.exp())
    }
}

/// Combine pairwise probabilities `r[i][j]` = P(i | i or j) into class
/// probabilities
///
/// If the iteration does not converge the current estimate is kept when it
/// is a valid distribution; otherwise the uniform distribution is returned.
pub fn multiclass_probability(r: &[Vec<f64>]) -> Vec<f64> {
    let k = r.len();
    if k == 0 {
        return Vec::new();
    }

    let max_iter = k.max(100);
    let eps = 0.005 / k as f64;
    let uniform = 1.0 / k as f64;

    let mut q = vec![vec![0.0; k]; k];
    for t in 0..k {
        for j in 0..t {
            q[t][t] += r[j][t] * r[j][t];
            q[t][j] = q[j][t];
        }
        for j in t + 1..k {
            q[t][t] += r[j][t] * r[j][t];
            q[t][j] = -r[j][t] * r[t][j];
        }
    }

    let mut p = vec![uniform; k];
    let mut qp = vec![0.0; k];
    let mut converged = false;

    for _ in 0..max_iter {
        // Stopping condition from the optimality of the coupling objective
        let mut pqp = 0.0;
        for t in 0..k {
            qp[t] = (0..k).map(|j| q[t][j] * p[j]).sum();
            pqp += p[t] * qp[t];
        }

        let max_error = qp
            .iter()
            .map(|&v| (v - pqp).abs())
            .fold(0.0, f64::max);
        if max_error < eps {
            converged = true;
            break;
        }

        for t in 0..k {
            let diff = (-qp[t] + pqp) / q[t][t];
            p[t] += diff;
            pqp = (pqp + diff * (diff * q[t][t] + 2.0 * qp[t])) / (1.0 + diff) / (1.0 + diff);
            for j in 0..k {
                qp[j] = (qp[j] + diff * q[t][j]) / (1.0 + diff);
                p[j] /= 1.0 + diff;
            }
        }
    }

    if !converged {
        let valid = p.iter().all(|v| v.is_finite() && *v >= 0.0)
            && (p.iter().sum::<f64>() - 1.0).abs() < 1e-6;
        if valid {
            info!("exceeds max_iter in multiclass probability coupling");
        } else {
            warn!("multiclass probability coupling diverged, falling back to uniform");
            p = vec![uniform; k];
        }
    }
    p
}

/// Ten density marks from the decision values of the training data
///
/// Returns `None` when fewer than five decision values fall on either side
/// of zero.
pub fn density_marks(decision_values: &[f64]) -> Option<Vec<f64>> {
    let mut dec = decision_values.to_vec();
    dec.sort_by(f64::total_cmp);

    let l = dec.len();
    let mid = NR_DENSITY_MARKS / 2;
    let neg_count = dec.iter().position(|&v| v >= 0.0).unwrap_or(0);
    let pos_count = l - neg_count;

    if neg_count < mid || pos_count < mid {
        warn!(
            "number of positive or negative decision values < {mid}; \
             too few to do a probability estimation"
        );
        return None;
    }

    let mut tmp = vec![0.0; NR_DENSITY_MARKS + 1];
    for (i, mark) in tmp.iter_mut().enumerate().take(mid) {
        *mark = dec[i * neg_count / mid];
    }
    tmp[mid] = 0.0;
    for (i, mark) in tmp.iter_mut().enumerate().skip(mid + 1) {
        *mark = dec[neg_count - 1 + (i - mid) * pos_count / mid];
    }

    Some(tmp.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect())
}

/// Probability that a decision value belongs to the training density
pub fn one_class_probability(marks: &[f64], decision_value: f64) -> f64 {
    let n = marks.len();
    if n == 0 {
        return 0.0;
    }
    if decision_value < marks[0] {
        return 0.001;
    }
    if decision_value >= marks[n - 1] {
        return 0.999;
    }
    (1..n)
        .find(|&i| decision_value < marks[i])
        .map_or(0.999, |i| i as f64 / n as f64)
}

/// Scale of a Laplace distribution fitted to residuals, ignoring residuals
/// beyond five standard deviations
pub fn laplace_sigma(residuals: &[f64]) -> f64 {
    if residuals.is_empty() {
        return 0.0;
    }

    let mae = residuals.iter().map(|r| r.abs()).sum::<f64>() / residuals.len() as f64;
    let std = (2.0 * mae * mae).sqrt();

    let kept: Vec<f64> = residuals
        .iter()
        .map(|r| r.abs())
        .filter(|&r| r <= 5.0 * std)
        .collect();
    if kept.is_empty() {
        return mae;
    }

    let sigma = kept.iter().sum::<f64>() / kept.len() as f64;
    info!(
        "prob. model for test data: target value = predicted value + z, \
         z: Laplace distribution e^(-|z|/sigma)/(2sigma), sigma = {sigma}"
    );
    sigma
}
