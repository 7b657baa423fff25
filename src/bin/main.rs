//! ferrosvm Command Line Interface
//!
//! Train models on libsvm-format data, predict with saved models and inspect
//! model files.

use clap::{Args, Parser, Subcommand, ValueEnum};
use env_logger::Env;
use ferrosvm::api::{self, EvaluationMetrics};
use ferrosvm::core::{Dataset, KernelType, Parameters, Result, SVMError, SvmType};
use ferrosvm::persistence::number::{format_coef, format_g};
use ferrosvm::{LibSVMDataset, Model};
use log::{error, info};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(name = "ferrosvm")]
#[command(about = "Support vector machines in the libsvm formats")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a new SVM model
    Train(TrainArgs),
    /// Make predictions using a trained model
    Predict(PredictArgs),
    /// Display model information
    Info(InfoArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CliSvmType {
    #[value(name = "c-svc")]
    CSvc,
    #[value(name = "nu-svc")]
    NuSvc,
    #[value(name = "one-class")]
    OneClass,
    #[value(name = "epsilon-svr")]
    EpsilonSvr,
    #[value(name = "nu-svr")]
    NuSvr,
}

impl From<CliSvmType> for SvmType {
    fn from(cli_type: CliSvmType) -> Self {
        match cli_type {
            CliSvmType::CSvc => SvmType::CSvc,
            CliSvmType::NuSvc => SvmType::NuSvc,
            CliSvmType::OneClass => SvmType::OneClass,
            CliSvmType::EpsilonSvr => SvmType::EpsilonSvr,
            CliSvmType::NuSvr => SvmType::NuSvr,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CliKernel {
    Linear,
    Polynomial,
    Rbf,
    Sigmoid,
    Precomputed,
}

impl From<CliKernel> for KernelType {
    fn from(cli_kernel: CliKernel) -> Self {
        match cli_kernel {
            CliKernel::Linear => KernelType::Linear,
            CliKernel::Polynomial => KernelType::Polynomial,
            CliKernel::Rbf => KernelType::Rbf,
            CliKernel::Sigmoid => KernelType::Sigmoid,
            CliKernel::Precomputed => KernelType::Precomputed,
        }
    }
}

/// Flags override the values of `--config`, which override the defaults
#[derive(Args)]
struct TrainArgs {
    /// Training data file (libsvm format)
    #[arg(long)]
    data: PathBuf,

    /// Output model file [default: <data file name>.model]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON file with training parameters
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum)]
    svm_type: Option<CliSvmType>,

    #[arg(short, long, value_enum)]
    kernel: Option<CliKernel>,

    /// Polynomial degree
    #[arg(long)]
    degree: Option<i32>,

    /// Kernel gamma [default: 1 / number of features]
    #[arg(short, long)]
    gamma: Option<f64>,

    #[arg(long)]
    coef0: Option<f64>,

    /// Cost of C-SVC, epsilon-SVR and nu-SVR
    #[arg(short = 'C', long)]
    c: Option<f64>,

    /// nu of nu-SVC, one-class SVM and nu-SVR
    #[arg(short, long)]
    nu: Option<f64>,

    /// Width of the epsilon-SVR tube
    #[arg(short, long)]
    p: Option<f64>,

    /// Stopping tolerance
    #[arg(short, long)]
    epsilon: Option<f64>,

    /// Kernel cache size in MB
    #[arg(long)]
    cache_size: Option<f64>,

    /// Disable the shrinking heuristics
    #[arg(long)]
    no_shrinking: bool,

    /// Train probability estimates
    #[arg(short = 'b', long)]
    probability: bool,

    /// Class weight as label:weight, may be repeated
    #[arg(short, long, value_parser = parse_weight)]
    weight: Vec<(i32, f64)>,

    /// Iteration budget per solver run
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Wall-clock budget in seconds per solver run
    #[arg(long)]
    time_limit: Option<f64>,

    /// Worker threads (0 = all cores, 1 = sequential)
    #[arg(long)]
    threads: Option<usize>,

    /// Seed of the calibration fold shuffle
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args)]
struct PredictArgs {
    /// Trained model file
    #[arg(short, long)]
    model: PathBuf,

    /// Input data file (libsvm format)
    #[arg(long)]
    data: PathBuf,

    /// Output predictions file (optional, prints to stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output probability estimates
    #[arg(short = 'b', long)]
    probability: bool,
}

#[derive(Args)]
struct InfoArgs {
    /// Model file
    model: PathBuf,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    let result = match cli.command {
        Commands::Train(args) => train_command(args),
        Commands::Predict(args) => predict_command(args),
        Commands::Info(args) => info_command(args),
    };

    if let Err(e) = result {
        error!("Error: {e}");
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn parse_weight(s: &str) -> std::result::Result<(i32, f64), String> {
    let (label, weight) = s
        .split_once(':')
        .ok_or_else(|| format!("expected label:weight, got '{s}'"))?;
    let label = label
        .parse::<i32>()
        .map_err(|_| format!("invalid class label '{label}'"))?;
    let weight = weight
        .parse::<f64>()
        .map_err(|_| format!("invalid weight '{weight}'"))?;
    Ok((label, weight))
}

fn io_error(path: &Path) -> impl Fn(io::Error) -> SVMError + '_ {
    move |e| SVMError::FileIo {
        path: path.to_path_buf(),
        source: e,
    }
}

/// Merge the config file and the flags into one parameter set
fn build_params(args: &TrainArgs) -> Result<Parameters> {
    let mut params = match &args.config {
        Some(path) => Parameters::from_json_file(path)?,
        None => Parameters::default(),
    };

    if let Some(svm_type) = args.svm_type {
        params.svm_type = svm_type.into();
    }
    if let Some(kernel) = args.kernel {
        params.kernel_type = kernel.into();
    }
    if let Some(degree) = args.degree {
        params.degree = degree;
    }
    if let Some(gamma) = args.gamma {
        params.gamma = gamma;
    }
    if let Some(coef0) = args.coef0 {
        params.coef0 = coef0;
    }
    if let Some(c) = args.c {
        params.c = c;
    }
    if let Some(nu) = args.nu {
        params.nu = nu;
    }
    if let Some(p) = args.p {
        params.p = p;
    }
    if let Some(eps) = args.epsilon {
        params.eps = eps;
    }
    if let Some(cache_size) = args.cache_size {
        params.cache_size = cache_size;
    }
    if args.no_shrinking {
        params.shrinking = false;
    }
    if args.probability {
        params.probability = true;
    }
    params.class_weights.extend(args.weight.iter().copied());
    if args.max_iterations.is_some() {
        params.max_iterations = args.max_iterations;
    }
    if args.time_limit.is_some() {
        params.time_limit_secs = args.time_limit;
    }
    if let Some(threads) = args.threads {
        params.n_threads = threads;
    }
    if let Some(seed) = args.seed {
        params.seed = seed;
    }
    Ok(params)
}

fn default_model_path(data: &Path) -> PathBuf {
    let name = data
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "data".to_string());
    PathBuf::from(format!("{name}.model"))
}

fn train_command(args: TrainArgs) -> Result<()> {
    info!("Training SVM model...");
    info!("Data file: {:?}", args.data);

    let mut params = build_params(&args)?;
    let dataset = LibSVMDataset::from_file(&args.data)?;
    info!(
        "Loaded {} samples with {} features",
        dataset.len(),
        dataset.dim()
    );

    if params.apply_default_gamma(dataset.dim()) {
        info!("Using gamma = {}", params.gamma);
    }

    let model = api::train(&dataset.into_problem(), &params)?;
    info!("Training completed successfully");
    info!("Support vectors: {}", model.total_sv());

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_model_path(&args.data));
    api::save(&model, &output)?;
    info!("Model saved to: {output:?}");

    Ok(())
}

fn predict_command(args: PredictArgs) -> Result<()> {
    info!("Loading model from: {:?}", args.model);
    let model = api::load(&args.model)?;

    if args.probability && !model.svm_type().is_regression() && !model.has_probability_model() {
        return Err(SVMError::NoProbabilityModel);
    }
    if !args.probability && model.has_probability_model() {
        info!("Model supports probability estimates, but disabled in prediction");
    }

    info!("Loading prediction data from: {:?}", args.data);
    let dataset = LibSVMDataset::from_file(&args.data)?;

    info!(
        "Making predictions using model with {} support vectors",
        model.total_sv()
    );

    let summary = match &args.output {
        Some(path) => {
            let file = File::create(path).map_err(io_error(path))?;
            let mut writer = BufWriter::new(file);
            let metrics = write_predictions(&model, &dataset, args.probability, &mut writer)
                .and_then(|m| writer.flush().map(|_| m).map_err(SVMError::IoError))
                .map_err(|e| match e {
                    SVMError::IoError(source) => io_error(path)(source),
                    other => other,
                })?;
            info!("Predictions saved to: {path:?}");
            metrics
        }
        None => {
            let stdout = io::stdout();
            let mut writer = stdout.lock();
            write_predictions(&model, &dataset, args.probability, &mut writer)?
        }
    };

    let report = if model.svm_type().is_regression() {
        format!(
            "Mean squared error = {} (regression)\nSquared correlation coefficient = {} (regression)",
            format_g(summary.mean_squared_error(), 6),
            format_g(summary.squared_correlation(), 6)
        )
    } else {
        format!(
            "Accuracy = {}% ({}/{}) (classification)",
            format_g(summary.accuracy() * 100.0, 6),
            summary.correct,
            summary.total
        )
    };
    if args.output.is_some() {
        println!("{report}");
    } else {
        eprintln!("{report}");
    }

    Ok(())
}

/// Write one prediction per sample and collect the metrics
fn write_predictions<W: Write>(
    model: &Model,
    dataset: &LibSVMDataset,
    probability: bool,
    out: &mut W,
) -> Result<EvaluationMetrics> {
    let mut metrics = EvaluationMetrics::default();

    let with_probabilities = probability && model.has_probability_model();
    if with_probabilities {
        let labels: Vec<i32> = if model.svm_type() == SvmType::OneClass {
            vec![1, -1]
        } else {
            model.labels().to_vec()
        };
        write!(out, "labels")?;
        for label in &labels {
            write!(out, " {label}")?;
        }
        writeln!(out)?;
    } else if probability {
        if let Some(sigma) = model.svr_sigma() {
            info!(
                "Prob. model for test data: target value = predicted value + z, \
                 z: Laplace distribution e^(-|z|/sigma)/(2sigma), sigma = {}",
                format_g(sigma, 6)
            );
        }
    }

    for sample in dataset.samples() {
        let label = model.predict(&sample.features)?;
        if with_probabilities {
            let probs = model.predict_probability(&sample.features)?;
            write!(out, "{}", format_g(label, 6))?;
            let order: Vec<i32> = if model.svm_type() == SvmType::OneClass {
                vec![1, -1]
            } else {
                model.labels().to_vec()
            };
            for class in order {
                let p = probs.get(&class).copied().unwrap_or(0.0);
                write!(out, " {}", format_g(p, 6))?;
            }
            writeln!(out)?;
        } else {
            writeln!(out, "{}", format_coef(label))?;
        }
        metrics.add(label, sample.label);
    }

    Ok(metrics)
}

fn info_command(args: InfoArgs) -> Result<()> {
    info!("Loading model from: {:?}", args.model);
    let model = api::load(&args.model)?;
    let kernel = model.kernel();

    println!("=== SVM Model Summary ===");
    println!("SVM Type: {}", model.svm_type());
    println!("Kernel Type: {}", kernel.kernel_type());
    if kernel.kernel_type() == KernelType::Polynomial {
        println!("  degree: {}", kernel.degree());
    }
    if kernel.kernel_type().uses_gamma() {
        println!("  gamma: {}", format_g(kernel.gamma(), 6));
    }
    if kernel.kernel_type().uses_coef0() {
        println!("  coef0: {}", format_g(kernel.coef0(), 6));
    }
    println!("Classes: {}", model.nr_class());
    if !model.labels().is_empty() {
        println!("Labels: {:?}", model.labels());
        println!("Support vectors per class: {:?}", model.n_sv());
    }
    println!("Support Vectors: {}", model.total_sv());

    let rho = model.rho();
    let n_show = rho.len().min(10);
    println!("Rho:");
    for (p, value) in rho.iter().enumerate().take(n_show) {
        println!("  rho[{p}]: {}", format_g(*value, 6));
    }
    if rho.len() > n_show {
        println!("  ... ({} more)", rho.len() - n_show);
    }

    let probability = if let Some(sigma) = model.svr_sigma() {
        format!("Laplace sigma {}", format_g(sigma, 6))
    } else if model.has_probability_model() {
        "yes".to_string()
    } else {
        "no".to_string()
    };
    println!("Probability estimates: {probability}");
    println!("Format version: {}", api::version());

    Ok(())
}
