//! Cross-validated calibration of probability outputs
//!
//! Decision values used for fitting come from five folds: each fold is
//! predicted by a decision function trained on the other four, so the fit
//! never sees values from a function trained on the same point.

use crate::core::{FeatureVector, Parameters};
use crate::kernel::KernelFunction;
use crate::probability::{laplace_sigma, sigmoid_train};
use crate::solver::train_one;
use crate::utils::Parallelism;
use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Folds used for calibration
pub const NR_FOLD: usize = 5;

/// Random permutation of `0..len`, reproducible for a given seed
pub fn fold_permutation(len: usize, seed: u64) -> Vec<usize> {
    let mut perm: Vec<usize> = (0..len).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    perm.shuffle(&mut rng);
    perm
}

/// Bounds of fold `fold` within the permutation
fn fold_range(fold: usize, len: usize) -> std::ops::Range<usize> {
    fold * len / NR_FOLD..(fold + 1) * len / NR_FOLD
}

/// Run `predict_fold` on every fold and scatter its values back to the
/// original sample order
///
/// `predict_fold` receives the training indices and the held-out indices.
fn cross_validate<F>(len: usize, seed: u64, par: Parallelism, predict_fold: F) -> Vec<f64>
where
    F: Fn(&[usize], &[usize]) -> Vec<f64> + Sync + Send,
{
    let perm = fold_permutation(len, seed);

    let per_fold = par.maybe_par_map(0..NR_FOLD, |fold| {
        let held_out = fold_range(fold, len);
        let train: Vec<usize> = perm[..held_out.start]
            .iter()
            .chain(&perm[held_out.end..])
            .copied()
            .collect();
        let test = &perm[held_out];
        (test.to_vec(), predict_fold(&train, test))
    });

    let mut values = vec![0.0; len];
    for (test, fold_values) in per_fold {
        for (i, v) in test.into_iter().zip(fold_values) {
            values[i] = v;
        }
    }
    values
}

fn sub_params(params: &Parameters) -> Parameters {
    Parameters {
        probability: false,
        n_threads: 0,
        ..params.clone()
    }
}

/// Sigmoid parameters (A, B) for one binary problem with +1/-1 targets `y`
pub fn binary_svc_probability(
    x: &[&FeatureVector],
    y: &[f64],
    params: &Parameters,
    cp: f64,
    cn: f64,
    seed: u64,
    par: Parallelism,
) -> (f64, f64) {
    let sub = sub_params(params);
    let kernel = KernelFunction::from_params(params);

    let dec = cross_validate(x.len(), seed, par, |train, test| {
        let p_count = train.iter().filter(|&&i| y[i] > 0.0).count();
        let n_count = train.len() - p_count;

        let constant = match (p_count, n_count) {
            (0, 0) => Some(0.0),
            (_, 0) => Some(1.0),
            (0, _) => Some(-1.0),
            _ => None,
        };
        if let Some(value) = constant {
            return vec![value; test.len()];
        }

        let sub_x: Vec<&FeatureVector> = train.iter().map(|&i| x[i]).collect();
        let sub_y: Vec<f64> = train.iter().map(|&i| y[i]).collect();
        let f = train_one(&sub_x, &sub_y, &sub, cp, cn);

        test.iter()
            .map(|&i| f.decision_value(&kernel, &sub_x, x[i]))
            .collect()
    });

    let (a, b) = sigmoid_train(&dec, y);
    debug!("sigmoid fit: A = {a}, B = {b}");
    (a, b)
}

/// Laplace sigma of cross-validated regression residuals
pub fn svr_probability(
    x: &[&FeatureVector],
    y: &[f64],
    params: &Parameters,
    seed: u64,
    par: Parallelism,
) -> f64 {
    let sub = sub_params(params);
    let kernel = KernelFunction::from_params(params);

    let predictions = cross_validate(x.len(), seed, par, |train, test| {
        let sub_x: Vec<&FeatureVector> = train.iter().map(|&i| x[i]).collect();
        let sub_y: Vec<f64> = train.iter().map(|&i| y[i]).collect();
        let f = train_one(&sub_x, &sub_y, &sub, sub.c, sub.c);

        test.iter()
            .map(|&i| f.decision_value(&kernel, &sub_x, x[i]))
            .collect()
    });

    let residuals: Vec<f64> = y
        .iter()
        .zip(&predictions)
        .map(|(target, predicted)| target - predicted)
        .collect();
    laplace_sigma(&residuals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{KernelType, SvmType};
    use crate::probability::sigmoid_predict;

    #[test]
    fn test_fold_permutation_is_seeded() {
        let a = fold_permutation(50, 7);
        let b = fold_permutation(50, 7);
        assert_eq!(a, b);

        let mut sorted = a.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_folds_cover_everything_once() {
        let len = 23;
        let mut seen = vec![0; len];
        for fold in 0..NR_FOLD {
            for i in fold_range(fold, len) {
                seen[i] += 1;
            }
        }
        assert!(seen.iter().all(|&n| n == 1));
    }

    #[test]
    fn test_cross_validate_scatters_values() {
        for par in [Parallelism::Sequential, Parallelism::Parallel] {
            let values = cross_validate(12, 3, par, |train, test| {
                assert!(test.iter().all(|i| !train.contains(i)));
                test.iter().map(|&i| i as f64).collect()
            });
            assert_eq!(values, (0..12).map(|i| i as f64).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_binary_probability_on_separable_data() {
        let features: Vec<FeatureVector> = (0..40)
            .map(|i| {
                let v = if i < 20 { 1.0 + i as f64 * 0.1 } else { -1.0 - (i - 20) as f64 * 0.1 };
                FeatureVector::new(vec![1], vec![v])
            })
            .collect();
        let x: Vec<&FeatureVector> = features.iter().collect();
        let y: Vec<f64> = (0..40).map(|i| if i < 20 { 1.0 } else { -1.0 }).collect();
        let params = Parameters {
            kernel_type: KernelType::Linear,
            ..Default::default()
        };

        let (a, b) = binary_svc_probability(&x, &y, &params, 1.0, 1.0, 1, Parallelism::Sequential);
        assert!(a < 0.0);
        assert!(sigmoid_predict(1.0, a, b) > 0.5);
        assert!(sigmoid_predict(-1.0, a, b) < 0.5);
    }

    #[test]
    fn test_binary_probability_single_class_folds() {
        let features: Vec<FeatureVector> = (0..6)
            .map(|i| FeatureVector::new(vec![1], vec![i as f64]))
            .collect();
        let x: Vec<&FeatureVector> = features.iter().collect();
        let y = vec![1.0; 6];
        let params = Parameters::default();

        let (a, b) = binary_svc_probability(&x, &y, &params, 1.0, 1.0, 1, Parallelism::Sequential);
        assert!(a.is_finite() && b.is_finite());
    }

    #[test]
    fn test_svr_probability_on_noisy_line() {
        let features: Vec<FeatureVector> = (0..30)
            .map(|i| FeatureVector::new(vec![1], vec![i as f64 / 10.0]))
            .collect();
        let x: Vec<&FeatureVector> = features.iter().collect();
        let y: Vec<f64> = (0..30)
            .map(|i| {
                let noise = if i % 2 == 0 { 0.05 } else { -0.05 };
                2.0 * i as f64 / 10.0 + noise
            })
            .collect();
        let params = Parameters {
            svm_type: SvmType::EpsilonSvr,
            kernel_type: KernelType::Linear,
            c: 10.0,
            p: 0.01,
            ..Default::default()
        };

        let sigma = svr_probability(&x, &y, &params, 1, Parallelism::Parallel);
        assert!(sigma > 0.0);
        assert!(sigma < 0.5, "sigma = {sigma}");
    }
}
