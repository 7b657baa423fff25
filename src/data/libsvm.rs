//! LibSVM format dataset implementation
//!
//! Supports loading datasets in the libsvm format:
//! label index:value index:value ...
//!
//! Example:
//! +1 1:0.5 3:1.2 7:0.8
//! -1 2:0.3 5:2.1
//!
//! Indices are kept as written (1-based). Index 0 is accepted for the sample
//! id column of precomputed-kernel data.

use crate::core::{Dataset, FeatureVector, Problem, Result, SVMError, Sample};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Dataset implementation for LibSVM format files
#[derive(Debug, Clone)]
pub struct LibSVMDataset {
    samples: Vec<Sample>,
    max_index: usize,
}

impl LibSVMDataset {
    /// Load a dataset from a LibSVM format file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| SVMError::file_io(path, e))?;
        Self::from_reader(BufReader::new(file)).map_err(|e| match e {
            SVMError::IoError(source) => SVMError::file_io(path, source),
            other => other,
        })
    }

    /// Load a dataset from a reader (for testing and flexibility)
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut samples = Vec::new();
        let mut max_index = 0;

        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();

            // Skip empty lines and comments
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let sample = Self::parse_line(line).map_err(|e| {
                SVMError::ParseError(format!("line {}: {e}", line_num + 1))
            })?;
            max_index = max_index.max(sample.features.max_index());
            samples.push(sample);
        }

        if samples.is_empty() {
            return Err(SVMError::InvalidProblem("dataset has no samples".into()));
        }

        Ok(LibSVMDataset { samples, max_index })
    }

    /// Parse a single line in libsvm format
    fn parse_line(line: &str) -> std::result::Result<Sample, String> {
        let mut parts = line.split_whitespace();

        let label_str = parts.next().ok_or("empty line")?;
        let label = label_str
            .parse::<f64>()
            .map_err(|_| format!("invalid label '{label_str}'"))?;

        let mut pairs = Vec::new();
        for feature_str in parts {
            let (index_str, value_str) = feature_str
                .split_once(':')
                .ok_or_else(|| format!("invalid feature '{feature_str}'"))?;
            let index = index_str
                .parse::<usize>()
                .map_err(|_| format!("invalid feature index '{index_str}'"))?;
            let value = value_str
                .parse::<f64>()
                .map_err(|_| format!("invalid feature value '{value_str}'"))?;
            pairs.push((index, value));
        }

        let features = FeatureVector::try_from_pairs(pairs).map_err(|e| e.to_string())?;
        Ok(Sample::new(features, label))
    }

    /// Take the samples as a training [`Problem`]
    pub fn into_problem(self) -> Problem {
        Problem::new(self.samples)
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }
}

impl Dataset for LibSVMDataset {
    fn len(&self) -> usize {
        self.samples.len()
    }

    fn dim(&self) -> usize {
        self.max_index
    }

    fn get_sample(&self, i: usize) -> Sample {
        self.samples[i].clone()
    }

    fn get_labels(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.label).collect()
    }
}
