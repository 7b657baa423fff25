//! Dataset compatibility and format validation tests
//!
//! Tests for ensuring libsvm-format data variations work across the pipeline

use ferrosvm::api::{self, SVM};
use ferrosvm::{Dataset, KernelType, LibSVMDataset, SVMError, SvmType};
use std::io::Write;
use tempfile::NamedTempFile;

fn write_temp(data: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
    write!(temp_file, "{data}").expect("Failed to write");
    temp_file.flush().expect("Failed to flush");
    temp_file
}

/// Test LibSVM format variations
#[test]
fn test_libsvm_format_variations() {
    let test_cases = vec![
        ("+1 1:0.5 3:1.2 7:0.8\n-1 2:0.3 5:2.1\n", "basic format"),
        (
            "# This is a comment\n+1 1:0.5 3:1.2\n\n# Another comment\n-1 2:0.3\n",
            "with comments",
        ),
        ("1 1:0.5 2:1.0\n-1 1:-0.5 2:-1.0\n", "unsigned positive label"),
        (
            "+1 1:1.0 10:2.0 100:3.0\n-1 5:1.5 50:2.5 500:3.5\n",
            "sparse indices",
        ),
        ("+1 1:2.0\n-1 1:-2.0\n+1 1:1.8\n-1 1:-1.8\n", "single feature"),
        ("+1 1:2.0\r\n-1 1:-2.0\r\n", "CRLF line endings"),
        ("+1\t1:2.0  2:1.0\n-1 1:-2.0\t2:-1.0\n", "mixed whitespace"),
        ("+1 1:2e0 2:1.5E-1\n-1 1:-2.0 2:-.15\n", "exponent notation"),
    ];

    for (data, description) in test_cases {
        let temp_file = write_temp(data);
        let dataset = LibSVMDataset::from_file(temp_file.path())
            .unwrap_or_else(|e| panic!("Failed to load {description}: {e}"));

        assert!(dataset.len() >= 2, "{description}");
        assert!(dataset.dim() > 0, "{description}");

        let model = SVM::new()
            .kernel(KernelType::Linear)
            .train_dataset(&dataset)
            .unwrap_or_else(|e| panic!("Training failed for {description}: {e}"));

        let label = model.predict(&dataset.get_sample(0).features).unwrap();
        assert!(label == 1.0 || label == -1.0, "{description}");
    }
}

/// Labels other than +1/-1 survive training and prediction untouched
#[test]
fn test_arbitrary_class_labels() {
    let data = "7 1:1.0\n7 1:1.2\n-3 1:-1.0\n-3 1:-1.2\n42 2:1.0\n42 2:1.3\n";
    let dataset = LibSVMDataset::from_reader(data.as_bytes()).unwrap();

    let model = SVM::new()
        .kernel(KernelType::Linear)
        .train_dataset(&dataset)
        .unwrap();
    assert_eq!(model.labels(), &[7, -3, 42]);

    let metrics = api::evaluate(&model, &dataset).unwrap();
    assert_eq!(metrics.accuracy(), 1.0);
}

/// Test large dimension handling
#[test]
fn test_large_dimensions() {
    let mut libsvm_data = String::new();
    libsvm_data.push_str("+1 100:1.0 1000:2.0 10000:1.5\n");
    libsvm_data.push_str("+1 150:1.2 1500:1.8 15000:1.3\n");
    libsvm_data.push_str("-1 200:1.0 2000:2.0 20000:1.5\n");
    libsvm_data.push_str("-1 250:1.2 2500:1.8 25000:1.3\n");

    let temp_file = write_temp(&libsvm_data);
    let dataset = LibSVMDataset::from_file(temp_file.path())
        .expect("Failed to load high-dimensional dataset");

    assert_eq!(dataset.len(), 4);
    // Indices are 1-based, so the largest index is the dimension
    assert_eq!(dataset.dim(), 25000);

    let model = SVM::new()
        .with_gamma(1.0 / 25000.0)
        .train_dataset(&dataset)
        .expect("Training on high-dimensional data should succeed");

    for i in 0..dataset.len() {
        let sample = dataset.get_sample(i);
        let label = model.predict(&sample.features).unwrap();
        assert!(label == 1.0 || label == -1.0);
    }
}

/// Test malformed data handling
#[test]
fn test_malformed_data_handling() {
    let malformed_cases = vec![
        ("invalid_label 1:1.0\n", "invalid label"),
        ("+1 invalid_feature\n", "invalid feature format"),
        ("+1 1:invalid_value\n", "invalid feature value"),
        ("+1 -2:1.0\n", "negative index"),
        ("+1 3:1.0 1:2.0\n", "decreasing indices"),
    ];

    for (data, description) in malformed_cases {
        let temp_file = write_temp(data);
        let result = LibSVMDataset::from_file(temp_file.path());
        assert!(
            matches!(result, Err(SVMError::ParseError(_))),
            "LibSVM should reject malformed data: {description}"
        );
    }

    let temp_file = write_temp("");
    assert!(matches!(
        LibSVMDataset::from_file(temp_file.path()),
        Err(SVMError::InvalidProblem(_))
    ));
}

/// Regression targets are read as real numbers
#[test]
fn test_regression_targets() {
    let data = "0.5 1:0.1\n1.5 1:0.3\n2.5 1:0.5\n3.5 1:0.7\n4.5 1:0.9\n";
    let dataset = LibSVMDataset::from_reader(data.as_bytes()).unwrap();
    assert_eq!(dataset.get_labels(), vec![0.5, 1.5, 2.5, 3.5, 4.5]);

    let model = SVM::new()
        .svm_type(SvmType::EpsilonSvr)
        .kernel(KernelType::Linear)
        .with_c(100.0)
        .with_p(0.01)
        .train_dataset(&dataset)
        .unwrap();

    let metrics = api::evaluate(&model, &dataset).unwrap();
    assert!(metrics.mean_squared_error() < 1e-3);
    assert!(metrics.squared_correlation() > 0.99);
}

/// Classification rejects fractional labels before training
#[test]
fn test_fractional_class_labels_rejected() {
    let dataset = LibSVMDataset::from_reader("1.5 1:1\n-1 1:-1\n".as_bytes()).unwrap();
    let result = SVM::new().kernel(KernelType::Linear).train_dataset(&dataset);
    assert!(matches!(result, Err(SVMError::InvalidProblem(_))));
}

/// Precomputed kernel rows start with the sample id column
#[test]
fn test_precomputed_format() {
    // Linear kernel values of the 1-D points 1, 2, -1, -2
    let data = "\
+1 0:1 1:1 2:2 3:-1 4:-2
+1 0:2 1:2 2:4 3:-2 4:-4
-1 0:3 1:-1 2:-2 3:1 4:2
-1 0:4 1:-2 2:-4 3:2 4:4
";
    let dataset = LibSVMDataset::from_reader(data.as_bytes()).unwrap();
    assert_eq!(dataset.get_sample(2).features.sample_id(), Some(3.0));

    let model = SVM::new()
        .kernel(KernelType::Precomputed)
        .train_dataset(&dataset)
        .unwrap();
    assert_eq!(api::evaluate(&model, &dataset).unwrap().accuracy(), 1.0);

    let missing_id = LibSVMDataset::from_reader("+1 1:1 2:2\n-1 1:-1 2:1\n".as_bytes()).unwrap();
    let result = SVM::new()
        .kernel(KernelType::Precomputed)
        .train_dataset(&missing_id);
    assert!(matches!(result, Err(SVMError::InvalidKernel(_))));
}
