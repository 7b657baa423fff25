//! Model persistence in the libsvm text format
//!
//! A model file is a header of `keyword value...` lines terminated by a
//! line containing `SV`, followed by one line per support vector:
//!
//! ```text
//! svm_type c_svc
//! kernel_type rbf
//! gamma 0.5
//! nr_class 2
//! total_sv 3
//! rho 0.375
//! label 1 -1
//! nr_sv 2 1
//! SV
//! 1 1:0.5 3:1
//! 0.5 2:-1
//! -1.5 1:-0.25 2:0.75
//! ```
//!
//! Each support vector line starts with its `nr_class - 1` coefficients.
//! Precomputed-kernel models store only `0:<sample id>` per vector.

pub mod number;

use crate::core::{FeatureVector, KernelType, Result, SVMError, SvmType};
use crate::kernel::KernelFunction;
use crate::model::Model;
use self::number::{format_coef, format_feature, parse_number};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

/// Upper bound on the support vectors reserved up front while decoding
const MAX_RESERVED_SV: usize = 1024;

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kernel_type = self.kernel.kernel_type();

        writeln!(f, "svm_type {}", self.svm_type)?;
        writeln!(f, "kernel_type {kernel_type}")?;
        if kernel_type == KernelType::Polynomial {
            writeln!(f, "degree {}", self.kernel.degree())?;
        }
        if kernel_type.uses_gamma() {
            writeln!(f, "gamma {}", format_coef(self.kernel.gamma()))?;
        }
        if kernel_type.uses_coef0() {
            writeln!(f, "coef0 {}", format_coef(self.kernel.coef0()))?;
        }

        writeln!(f, "nr_class {}", self.nr_class)?;
        writeln!(f, "total_sv {}", self.total_sv())?;
        write_list(f, "rho", self.rho.iter().map(|&v| format_coef(v)))?;

        if !self.labels.is_empty() {
            write_list(f, "label", self.labels.iter())?;
        }
        if !self.prob_a.is_empty() {
            write_list(f, "probA", self.prob_a.iter().map(|&v| format_coef(v)))?;
        }
        if !self.prob_b.is_empty() {
            write_list(f, "probB", self.prob_b.iter().map(|&v| format_coef(v)))?;
        }
        if !self.prob_density_marks.is_empty() {
            let marks = self.prob_density_marks.iter().map(|&v| format_coef(v));
            write_list(f, "prob_density_marks", marks)?;
        }
        if !self.n_sv.is_empty() {
            write_list(f, "nr_sv", self.n_sv.iter())?;
        }

        writeln!(f, "SV")?;
        for (k, sv) in self.support_vectors.iter().enumerate() {
            for row in &self.sv_coef {
                write!(f, "{} ", format_coef(row[k]))?;
            }
            if kernel_type == KernelType::Precomputed {
                let id = sv.sample_id().unwrap_or(0.0);
                write!(f, "0:{} ", id as i64)?;
            } else {
                for (index, value) in sv.iter() {
                    write!(f, "{index}:{} ", format_feature(value))?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

fn write_list<I>(f: &mut fmt::Formatter<'_>, keyword: &str, values: I) -> fmt::Result
where
    I: IntoIterator,
    I::Item: fmt::Display,
{
    write!(f, "{keyword}")?;
    for v in values {
        write!(f, " {v}")?;
    }
    writeln!(f)
}

impl FromStr for Model {
    type Err = SVMError;

    fn from_str(text: &str) -> Result<Self> {
        Model::from_reader(text.as_bytes())
    }
}

impl Model {
    /// Decode a model from any buffered reader
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut lines = reader.lines();
        let mut line_no = 0;

        let mut header = Header::default();
        loop {
            let Some(line) = lines.next() else {
                return Err(SVMError::corrupt(line_no, "missing SV section"));
            };
            let line = line?;
            line_no += 1;

            let mut tokens = line.split_whitespace();
            let Some(keyword) = tokens.next() else {
                continue;
            };
            if keyword == "SV" {
                break;
            }
            let values: Vec<&str> = tokens.collect();
            header
                .set(keyword, &values)
                .map_err(|reason| SVMError::corrupt(line_no, reason))?;
        }

        let layout = header.validate(line_no)?;

        // The header count is untrusted until the SV lines are read
        let reserve = layout.total_sv.min(MAX_RESERVED_SV);
        let mut sv_coef = vec![Vec::with_capacity(reserve); layout.n_coef];
        let mut support_vectors = Vec::with_capacity(reserve);
        for found in 0..layout.total_sv {
            let Some(line) = lines.next() else {
                return Err(SVMError::corrupt(
                    line_no,
                    format!(
                        "expected {} support vectors, found {found}",
                        layout.total_sv
                    ),
                ));
            };
            let line = line?;
            line_no += 1;

            let (coefs, sv) = parse_sv_line(&line, layout.n_coef, layout.kernel_type)
                .map_err(|reason| SVMError::corrupt(line_no, reason))?;
            for (row, coef) in sv_coef.iter_mut().zip(coefs) {
                row.push(coef);
            }
            support_vectors.push(sv);
        }

        for line in lines {
            let line = line?;
            line_no += 1;
            if !line.trim().is_empty() {
                return Err(SVMError::corrupt(
                    line_no,
                    format!("more than {} support vectors", layout.total_sv),
                ));
            }
        }

        Ok(Model {
            svm_type: layout.svm_type,
            kernel: layout.kernel,
            nr_class: layout.nr_class,
            support_vectors,
            sv_coef,
            rho: header.rho.unwrap_or_default(),
            prob_a: header.prob_a.unwrap_or_default(),
            prob_b: header.prob_b.unwrap_or_default(),
            prob_density_marks: header.prob_density_marks.unwrap_or_default(),
            labels: header.label.unwrap_or_default(),
            n_sv: header.nr_sv.unwrap_or_default(),
            sv_indices: Vec::new(),
        })
    }

    /// Write the model to `path`
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| SVMError::file_io(path, e))?;
        let mut writer = BufWriter::new(file);
        write!(writer, "{self}").map_err(|e| SVMError::file_io(path, e))?;
        writer.flush().map_err(|e| SVMError::file_io(path, e))
    }

    /// Read a model from `path`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| SVMError::file_io(path, e))?;
        Model::from_reader(BufReader::new(file)).map_err(|e| match e {
            SVMError::IoError(source) => SVMError::file_io(path, source),
            other => other,
        })
    }
}

/// Write `model` to `path`
pub fn save<P: AsRef<Path>>(model: &Model, path: P) -> Result<()> {
    model.save(path)
}

/// Read a model from `path`
pub fn load<P: AsRef<Path>>(path: P) -> Result<Model> {
    Model::load(path)
}

/// Header fields as read, before consistency checks
#[derive(Debug, Default)]
struct Header {
    svm_type: Option<SvmType>,
    kernel_type: Option<KernelType>,
    degree: Option<i32>,
    gamma: Option<f64>,
    coef0: Option<f64>,
    nr_class: Option<usize>,
    total_sv: Option<usize>,
    rho: Option<Vec<f64>>,
    label: Option<Vec<i32>>,
    prob_a: Option<Vec<f64>>,
    prob_b: Option<Vec<f64>>,
    prob_density_marks: Option<Vec<f64>>,
    nr_sv: Option<Vec<usize>>,
}

/// Checked header values needed to read the support vectors
struct Layout {
    svm_type: SvmType,
    kernel_type: KernelType,
    kernel: KernelFunction,
    nr_class: usize,
    total_sv: usize,
    n_coef: usize,
}

fn single<T: FromStr>(keyword: &str, values: &[&str]) -> std::result::Result<T, String> {
    match values {
        [token] => parse_number(token),
        _ => Err(format!("'{keyword}' expects one value, found {}", values.len())),
    }
}

fn list<T: FromStr>(values: &[&str]) -> std::result::Result<Vec<T>, String> {
    values.iter().map(|token| parse_number(token)).collect()
}

fn store<T>(slot: &mut Option<T>, keyword: &str, value: T) -> std::result::Result<(), String> {
    if slot.is_some() {
        return Err(format!("duplicate '{keyword}'"));
    }
    *slot = Some(value);
    Ok(())
}

impl Header {
    fn set(&mut self, keyword: &str, values: &[&str]) -> std::result::Result<(), String> {
        match keyword {
            "svm_type" => {
                let name = values.first().copied().unwrap_or_default();
                let svm_type = name
                    .parse::<SvmType>()
                    .map_err(|_| format!("unknown svm type '{name}'"))?;
                store(&mut self.svm_type, keyword, svm_type)
            }
            "kernel_type" => {
                let name = values.first().copied().unwrap_or_default();
                let kernel_type = name
                    .parse::<KernelType>()
                    .map_err(|_| format!("unknown kernel type '{name}'"))?;
                store(&mut self.kernel_type, keyword, kernel_type)
            }
            "degree" => store(&mut self.degree, keyword, single(keyword, values)?),
            "gamma" => store(&mut self.gamma, keyword, single(keyword, values)?),
            "coef0" => store(&mut self.coef0, keyword, single(keyword, values)?),
            "nr_class" => store(&mut self.nr_class, keyword, single(keyword, values)?),
            "total_sv" => store(&mut self.total_sv, keyword, single(keyword, values)?),
            "rho" => store(&mut self.rho, keyword, list(values)?),
            "label" => store(&mut self.label, keyword, list(values)?),
            "probA" => store(&mut self.prob_a, keyword, list(values)?),
            "probB" => store(&mut self.prob_b, keyword, list(values)?),
            "prob_density_marks" => store(&mut self.prob_density_marks, keyword, list(values)?),
            "nr_sv" => store(&mut self.nr_sv, keyword, list(values)?),
            other => Err(format!("unknown keyword '{other}'")),
        }
    }

    /// Check that the header describes a usable model; `line` is the line
    /// of the `SV` marker
    fn validate(&self, line: usize) -> Result<Layout> {
        let missing = |field: &str| SVMError::corrupt(line, format!("missing '{field}'"));
        let inconsistent = |reason: String| SVMError::corrupt(line, reason);

        let svm_type = self.svm_type.ok_or_else(|| missing("svm_type"))?;
        let kernel_type = self.kernel_type.ok_or_else(|| missing("kernel_type"))?;
        let nr_class = self.nr_class.ok_or_else(|| missing("nr_class"))?;
        let total_sv = self.total_sv.ok_or_else(|| missing("total_sv"))?;
        let rho = self.rho.as_ref().ok_or_else(|| missing("rho"))?;

        let degree = match (kernel_type, self.degree) {
            (KernelType::Polynomial, None) => return Err(missing("degree")),
            (_, degree) => degree.unwrap_or(0),
        };
        let gamma = match (kernel_type.uses_gamma(), self.gamma) {
            (true, None) => return Err(missing("gamma")),
            (_, gamma) => gamma.unwrap_or(0.0),
        };
        let coef0 = match (kernel_type.uses_coef0(), self.coef0) {
            (true, None) => return Err(missing("coef0")),
            (_, coef0) => coef0.unwrap_or(0.0),
        };

        if nr_class < 2 {
            return Err(inconsistent(format!("nr_class {nr_class} is below 2")));
        }
        let n_pairs = nr_class
            .checked_mul(nr_class - 1)
            .map(|n| n / 2)
            .ok_or_else(|| inconsistent(format!("nr_class {nr_class} is too large")))?;

        if svm_type.is_classification() {
            if rho.len() != n_pairs {
                return Err(inconsistent(format!(
                    "expected {n_pairs} rho values for {nr_class} classes, found {}",
                    rho.len()
                )));
            }
            let labels = self.label.as_ref().ok_or_else(|| missing("label"))?;
            let nr_sv = self.nr_sv.as_ref().ok_or_else(|| missing("nr_sv"))?;
            if labels.len() != nr_class || nr_sv.len() != nr_class {
                return Err(inconsistent(format!(
                    "label and nr_sv need {nr_class} entries"
                )));
            }
            let sum = nr_sv
                .iter()
                .try_fold(0usize, |acc, &n| acc.checked_add(n))
                .ok_or_else(|| inconsistent("nr_sv counts overflow".into()))?;
            if sum != total_sv {
                return Err(inconsistent(format!(
                    "nr_sv sums to {sum} but total_sv is {total_sv}"
                )));
            }
            for (keyword, values) in [("probA", &self.prob_a), ("probB", &self.prob_b)] {
                if let Some(values) = values {
                    if values.len() != n_pairs {
                        return Err(inconsistent(format!(
                            "expected {n_pairs} {keyword} values, found {}",
                            values.len()
                        )));
                    }
                }
            }
            if self.prob_a.is_some() != self.prob_b.is_some() {
                return Err(inconsistent("probA and probB must appear together".into()));
            }
        } else {
            if nr_class != 2 {
                return Err(inconsistent(format!(
                    "{svm_type} models have nr_class 2, found {nr_class}"
                )));
            }
            if rho.len() != 1 {
                return Err(inconsistent(format!(
                    "expected 1 rho value, found {}",
                    rho.len()
                )));
            }
            if self.label.is_some() || self.nr_sv.is_some() {
                return Err(inconsistent(format!(
                    "{svm_type} models carry no label or nr_sv"
                )));
            }
            if let Some(prob_a) = &self.prob_a {
                if prob_a.len() != 1 {
                    return Err(inconsistent("expected a single probA value".into()));
                }
            }
        }

        if self.prob_density_marks.is_some() && svm_type != SvmType::OneClass {
            return Err(inconsistent(
                "prob_density_marks only apply to one_class models".into(),
            ));
        }

        Ok(Layout {
            svm_type,
            kernel_type,
            kernel: KernelFunction::new(kernel_type, degree, gamma, coef0),
            nr_class,
            total_sv,
            n_coef: nr_class - 1,
        })
    }
}

/// Coefficients and feature vector of one support vector line
fn parse_sv_line(
    line: &str,
    n_coef: usize,
    kernel_type: KernelType,
) -> std::result::Result<(Vec<f64>, FeatureVector), String> {
    let mut tokens = line.split_whitespace();

    let mut coefs = Vec::with_capacity(n_coef);
    for _ in 0..n_coef {
        let token = tokens
            .next()
            .ok_or_else(|| format!("expected {n_coef} coefficients"))?;
        if token.contains(':') {
            return Err(format!("expected {n_coef} coefficients before '{token}'"));
        }
        coefs.push(parse_number(token)?);
    }

    let mut pairs = Vec::new();
    for token in tokens {
        let (index, value) = token
            .split_once(':')
            .ok_or_else(|| format!("expected index:value, found '{token}'"))?;
        pairs.push((parse_number::<usize>(index)?, parse_number::<f64>(value)?));
    }

    let sv = FeatureVector::try_from_pairs(pairs).map_err(|e| e.to_string())?;
    if kernel_type == KernelType::Precomputed && (sv.nnz() != 1 || sv.sample_id().is_none()) {
        return Err("precomputed support vectors must be a single 0:<sample id>".into());
    }
    Ok((coefs, sv))
}
