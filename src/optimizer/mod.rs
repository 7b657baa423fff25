//! Training driver
//!
//! Classification problems are split into one binary problem per class pair
//! (one-vs-one). One-class and regression problems are solved directly.
//! Independent units of work (class pairs and calibration folds) run on the
//! rayon pool selected by [`Parameters::n_threads`].

pub mod builder;

pub use self::builder::ModelBuilder;

use crate::core::{FeatureVector, Parameters, Problem, Result, SvmType};
use crate::kernel::KernelFunction;
use crate::model::Model;
use crate::probability::{binary_svc_probability, density_marks, svr_probability};
use crate::solver::{train_one, DecisionFunction};
use crate::utils::{run_with_threads, Parallelism};
use log::{info, warn};

/// Training data grouped by class
///
/// Classes are numbered by first appearance, except that a two-class
/// problem labelled {-1, +1} with -1 first is reordered so +1 comes first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassGroups {
    pub labels: Vec<i32>,
    /// Offset of each class in the grouped order
    pub start: Vec<usize>,
    pub count: Vec<usize>,
    /// `perm[k]` is the original index of the k-th grouped sample
    pub perm: Vec<usize>,
}

impl ClassGroups {
    pub fn from_labels(labels: &[f64]) -> Self {
        let mut classes: Vec<i32> = Vec::new();
        let mut count: Vec<usize> = Vec::new();
        let mut class_of = Vec::with_capacity(labels.len());

        for &label in labels {
            let label = label as i32;
            match classes.iter().position(|&c| c == label) {
                Some(c) => {
                    count[c] += 1;
                    class_of.push(c);
                }
                None => {
                    classes.push(label);
                    count.push(1);
                    class_of.push(classes.len() - 1);
                }
            }
        }

        if classes == [-1, 1] {
            classes.swap(0, 1);
            count.swap(0, 1);
            for c in &mut class_of {
                *c = 1 - *c;
            }
        }

        let mut start = vec![0; classes.len()];
        for c in 1..classes.len() {
            start[c] = start[c - 1] + count[c - 1];
        }

        let mut next = start.clone();
        let mut perm = vec![0; labels.len()];
        for (i, &c) in class_of.iter().enumerate() {
            perm[next[c]] = i;
            next[c] += 1;
        }

        Self {
            labels: classes,
            start,
            count,
            perm,
        }
    }

    pub fn nr_class(&self) -> usize {
        self.labels.len()
    }
}

/// Train a model on `problem`
///
/// Parameters are validated against the problem first; nothing is trained
/// when validation fails.
pub fn train(problem: &Problem, params: &Parameters) -> Result<Model> {
    params.validate(problem)?;
    run_with_threads(params.n_threads, |par| match params.svm_type {
        SvmType::CSvc | SvmType::NuSvc => train_classifier(problem, params, par),
        SvmType::OneClass | SvmType::EpsilonSvr | SvmType::NuSvr => {
            train_single(problem, params, par)
        }
    })?
}

/// One-class and regression training
fn train_single(problem: &Problem, params: &Parameters, par: Parallelism) -> Result<Model> {
    let kernel = KernelFunction::from_params(params);
    let x: Vec<&FeatureVector> = problem.samples().iter().map(|s| &s.features).collect();
    let y = problem.labels();

    let mut builder = ModelBuilder::new(params.svm_type, kernel);

    if params.probability && params.svm_type.is_regression() {
        let sigma = svr_probability(&x, &y, params, params.seed, par);
        builder = builder.with_probability(vec![sigma], Vec::new());
    }

    let f = train_one(&x, &y, params, params.c, params.c);

    if params.probability && params.svm_type == SvmType::OneClass {
        let decision_values: Vec<f64> = x
            .iter()
            .map(|xi| f.decision_value(&kernel, &x, xi))
            .collect();
        if let Some(marks) = density_marks(&decision_values) {
            builder = builder.with_density_marks(marks);
        }
    }

    builder.build_single(&x, &f)
}

/// One-vs-one classification training
fn train_classifier(problem: &Problem, params: &Parameters, par: Parallelism) -> Result<Model> {
    let kernel = KernelFunction::from_params(params);
    let groups = ClassGroups::from_labels(&problem.labels());
    let nr_class = groups.nr_class();

    if nr_class == 1 {
        warn!("training data in only one class");
    }

    let x: Vec<&FeatureVector> = groups
        .perm
        .iter()
        .map(|&i| &problem.sample(i).features)
        .collect();

    for &(label, _) in &params.class_weights {
        if !groups.labels.contains(&label) {
            warn!("class label {label} specified in weight is not found");
        }
    }
    let weighted_c: Vec<f64> = groups
        .labels
        .iter()
        .map(|&label| params.c * params.weight_for(label))
        .collect();

    let mut pairs = Vec::with_capacity(nr_class * nr_class.saturating_sub(1) / 2);
    for i in 0..nr_class {
        for j in i + 1..nr_class {
            pairs.push((pairs.len(), i, j));
        }
    }

    let trained: Vec<(DecisionFunction, Option<(f64, f64)>)> =
        par.maybe_par_map(pairs, |(p, i, j)| {
            let (si, ci) = (groups.start[i], groups.count[i]);
            let (sj, cj) = (groups.start[j], groups.count[j]);

            let sub_x: Vec<&FeatureVector> = x[si..si + ci]
                .iter()
                .chain(&x[sj..sj + cj])
                .copied()
                .collect();
            let sub_y: Vec<f64> = std::iter::repeat(1.0)
                .take(ci)
                .chain(std::iter::repeat(-1.0).take(cj))
                .collect();

            let sigmoid = params.probability.then(|| {
                binary_svc_probability(
                    &sub_x,
                    &sub_y,
                    params,
                    weighted_c[i],
                    weighted_c[j],
                    params.seed.wrapping_add(p as u64),
                    par,
                )
            });

            info!(
                "training classes {} vs {}",
                groups.labels[i], groups.labels[j]
            );
            let f = train_one(&sub_x, &sub_y, params, weighted_c[i], weighted_c[j]);
            (f, sigmoid)
        });

    let mut builder = ModelBuilder::new(params.svm_type, kernel);
    if params.probability {
        let (prob_a, prob_b): (Vec<f64>, Vec<f64>) = trained
            .iter()
            .filter_map(|(_, sigmoid)| *sigmoid)
            .unzip();
        builder = builder.with_probability(prob_a, prob_b);
    }

    let functions: Vec<DecisionFunction> = trained.into_iter().map(|(f, _)| f).collect();
    builder.build_one_vs_one(&groups, &x, &functions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{KernelType, SVMError, Sample};
    use approx::assert_relative_eq;

    fn point(values: &[f64]) -> FeatureVector {
        FeatureVector::from_dense(1, values)
    }

    /// Three clusters around (0, 0), (4, 0) and (0, 4) labelled 20, 10, 30
    fn three_class_problem() -> Problem {
        let centers = [(20.0, 0.0, 0.0), (10.0, 4.0, 0.0), (30.0, 0.0, 4.0)];
        let offsets = [(0.0, 0.0), (0.3, 0.1), (-0.2, 0.3), (0.1, -0.3), (-0.3, -0.2)];
        let mut samples = Vec::new();
        for (dx, dy) in offsets {
            for (label, cx, cy) in centers {
                samples.push(Sample::new(point(&[cx + dx, cy + dy]), label));
            }
        }
        Problem::new(samples)
    }

    fn linear_params(svm_type: SvmType) -> Parameters {
        Parameters {
            svm_type,
            kernel_type: KernelType::Linear,
            ..Default::default()
        }
    }

    #[test]
    fn test_group_classes_first_appearance() {
        let groups = ClassGroups::from_labels(&[3.0, 1.0, 3.0, 2.0, 1.0]);
        assert_eq!(groups.labels, vec![3, 1, 2]);
        assert_eq!(groups.count, vec![2, 2, 1]);
        assert_eq!(groups.start, vec![0, 2, 4]);
        assert_eq!(groups.perm, vec![0, 2, 1, 4, 3]);
    }

    #[test]
    fn test_group_classes_puts_positive_first() {
        let groups = ClassGroups::from_labels(&[-1.0, 1.0, -1.0]);
        assert_eq!(groups.labels, vec![1, -1]);
        assert_eq!(groups.count, vec![1, 2]);
        assert_eq!(groups.perm, vec![1, 0, 2]);

        // Only the {-1, +1} pair is reordered
        let groups = ClassGroups::from_labels(&[-2.0, 1.0]);
        assert_eq!(groups.labels, vec![-2, 1]);
    }

    #[test]
    fn test_binary_training_separates() {
        let problem = Problem::new(vec![
            Sample::new(point(&[-2.0]), -1.0),
            Sample::new(point(&[2.0]), 1.0),
            Sample::new(point(&[-1.0]), -1.0),
            Sample::new(point(&[1.0]), 1.0),
        ]);
        let model = train(&problem, &linear_params(SvmType::CSvc)).unwrap();

        assert_eq!(model.labels(), &[1, -1]);
        assert_eq!(model.nr_class(), 2);
        for sample in problem.samples() {
            assert_eq!(model.predict(&sample.features).unwrap(), sample.label);
        }
        for &index in model.sv_indices() {
            assert!((1..=problem.len()).contains(&index));
        }
        // Decision value is positive on the +1 side
        let value = model.predict_values(&point(&[3.0])).unwrap()[0];
        assert!(value > 0.0);
    }

    #[test]
    fn test_multiclass_training() {
        let problem = three_class_problem();
        let model = train(&problem, &linear_params(SvmType::CSvc)).unwrap();

        assert_eq!(model.labels(), &[20, 10, 30]);
        assert_eq!(model.rho().len(), 3);
        assert_eq!(model.sv_coef().len(), 2);
        assert_eq!(model.n_sv().iter().sum::<usize>(), model.total_sv());
        for sample in problem.samples() {
            assert_eq!(model.predict(&sample.features).unwrap(), sample.label);
        }

        // Support vectors are stored grouped by class
        let mut offset = 0;
        for (class, &count) in model.n_sv().iter().enumerate() {
            for k in offset..offset + count {
                let original = model.sv_indices()[k] - 1;
                assert_eq!(problem.sample(original).label as i32, model.labels()[class]);
            }
            offset += count;
        }
    }

    #[test]
    fn test_parallel_and_sequential_models_match() {
        let problem = three_class_problem();
        let sequential = Parameters {
            n_threads: 1,
            ..linear_params(SvmType::CSvc)
        };
        let parallel = Parameters {
            n_threads: 3,
            ..linear_params(SvmType::CSvc)
        };
        assert_eq!(
            train(&problem, &sequential).unwrap(),
            train(&problem, &parallel).unwrap()
        );
    }

    #[test]
    fn test_multiclass_probability_training() {
        let problem = three_class_problem();
        let params = Parameters {
            probability: true,
            ..linear_params(SvmType::CSvc)
        };
        let model = train(&problem, &params).unwrap();
        assert!(model.has_probability_model());
        assert_eq!(model.prob_a().len(), 3);
        assert_eq!(model.prob_b().len(), 3);

        let probs = model.predict_probability(&point(&[4.0, 0.0])).unwrap();
        assert_relative_eq!(probs.values().sum::<f64>(), 1.0, epsilon = 1e-6);
        assert!(probs.values().all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn test_single_class_is_degenerate() {
        let problem = Problem::new(vec![
            Sample::new(point(&[1.0]), 4.0),
            Sample::new(point(&[2.0]), 4.0),
        ]);
        let result = train(&problem, &linear_params(SvmType::CSvc));
        assert!(matches!(result, Err(SVMError::DegenerateModel(_))));
    }

    #[test]
    fn test_unknown_weight_label_still_trains() {
        let problem = three_class_problem();
        let params = Parameters {
            class_weights: vec![(99, 2.0), (10, 3.0)],
            ..linear_params(SvmType::CSvc)
        };
        assert!(train(&problem, &params).is_ok());
    }

    #[test]
    fn test_invalid_parameters_stop_training() {
        let params = Parameters {
            c: -1.0,
            ..linear_params(SvmType::CSvc)
        };
        assert!(matches!(
            train(&three_class_problem(), &params),
            Err(SVMError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_regression_with_sigma() {
        let samples: Vec<Sample> = (0..25)
            .map(|i| {
                let x = i as f64 / 5.0;
                let noise = if i % 3 == 0 { 0.05 } else { -0.03 };
                Sample::new(point(&[x]), 1.5 * x + 0.5 + noise)
            })
            .collect();
        let problem = Problem::new(samples);
        let params = Parameters {
            c: 10.0,
            p: 0.01,
            probability: true,
            ..linear_params(SvmType::EpsilonSvr)
        };
        let model = train(&problem, &params).unwrap();

        assert!(model.labels().is_empty());
        let sigma = model.svr_sigma().unwrap();
        assert!(sigma > 0.0 && sigma < 0.5);
        assert_relative_eq!(model.predict(&point(&[2.0])).unwrap(), 3.5, epsilon = 0.1);
    }

    #[test]
    fn test_one_class_density_marks() {
        let samples: Vec<Sample> = (0..40)
            .map(|i| Sample::new(point(&[i as f64 / 10.0]), 1.0))
            .collect();
        let params = Parameters {
            svm_type: SvmType::OneClass,
            kernel_type: KernelType::Rbf,
            gamma: 1.0,
            nu: 0.5,
            probability: true,
            ..Default::default()
        };
        let model = train(&Problem::new(samples), &params).unwrap();

        assert_eq!(model.prob_density_marks().len(), 10);
        let probs = model.predict_probability(&point(&[2.0])).unwrap();
        assert_relative_eq!(probs[&1] + probs[&-1], 1.0, epsilon = 1e-12);
        // Far away points fall below the lowest mark
        let far = model.predict_probability(&point(&[50.0])).unwrap();
        assert_relative_eq!(far[&1], 0.001);
    }
}
