//! Dataset matrix plus ARFF and CSV loaders.
//!
//! A [`DataMatrix`] stores every value as `f64`. Nominal columns store the index of the
//! value in the column's value list, so a nominal column with N values reports a
//! [`DataMatrix::value_count`] of N and continuous columns report 0.
use std::fs::File;
use std::io::Read;
use std::ops::Range;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, Trim};
use flate2::read::GzDecoder;
use rand::Rng;
use thiserror::Error;

/// Errors raised while loading or accessing a dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("Row {row} has {actual} values, expected {expected}")]
    RowLength {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Cannot pair matrices with {left} and {right} rows")]
    RowCountMismatch { left: usize, right: usize },

    #[error("Dataset needs at least {needed} columns, found {found}")]
    TooFewColumns { needed: usize, found: usize },

    #[error("Dataset is empty")]
    Empty,
}

/// Result type for dataset operations.
pub type DatasetResult<T> = std::result::Result<T, DatasetError>;

/// Column description: a name and, for nominal columns, the ordered value names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub values: Vec<String>,
}

impl Attribute {
    pub fn continuous(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
        }
    }

    pub fn nominal<S: Into<String>>(name: impl Into<String>, values: Vec<S>) -> Self {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_nominal(&self) -> bool {
        !self.values.is_empty()
    }
}

/// Row-major table of instances.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataMatrix {
    attributes: Vec<Attribute>,
    data: Vec<Vec<f64>>,
}

impl DataMatrix {
    /// Empty matrix with the given columns.
    pub fn new(attributes: Vec<Attribute>) -> Self {
        Self {
            attributes,
            data: Vec::new(),
        }
    }

    /// Matrix of continuous columns named `x0`, `x1`, ...
    pub fn from_rows(rows: Vec<Vec<f64>>) -> DatasetResult<Self> {
        let cols = rows.first().map(Vec::len).ok_or(DatasetError::Empty)?;
        let attributes = (0..cols)
            .map(|c| Attribute::continuous(format!("x{c}")))
            .collect();
        let mut matrix = Self::new(attributes);
        for row in rows {
            matrix.push_row(row)?;
        }
        Ok(matrix)
    }

    pub fn push_row(&mut self, row: Vec<f64>) -> DatasetResult<()> {
        if row.len() != self.cols() {
            return Err(DatasetError::RowLength {
                row: self.rows(),
                expected: self.cols(),
                actual: row.len(),
            });
        }
        self.data.push(row);
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.data.len()
    }

    pub fn cols(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i]
    }

    pub fn get(&self, i: usize, col: usize) -> f64 {
        self.data[i][col]
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Number of nominal values of a column; 0 for continuous columns.
    pub fn value_count(&self, col: usize) -> usize {
        self.attributes[col].values.len()
    }

    pub fn attr_name(&self, col: usize) -> &str {
        &self.attributes[col].name
    }

    /// Name of nominal value `code` in `col`.
    pub fn attr_value(&self, col: usize, code: usize) -> Option<&str> {
        self.attributes[col].values.get(code).map(String::as_str)
    }

    /// Shuffles rows in place. When `paired` is given it receives the same permutation,
    /// so row `i` of both matrices still describes the same instance.
    pub fn shuffle<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        mut paired: Option<&mut DataMatrix>,
    ) -> DatasetResult<()> {
        if let Some(other) = paired.as_deref() {
            if other.rows() != self.rows() {
                return Err(DatasetError::RowCountMismatch {
                    left: self.rows(),
                    right: other.rows(),
                });
            }
        }
        for n in (1..self.rows()).rev() {
            let i = rng.gen_range(0..=n);
            self.data.swap(n, i);
            if let Some(other) = paired.as_deref_mut() {
                other.data.swap(n, i);
            }
        }
        Ok(())
    }

    /// Copy of a contiguous range of columns.
    pub fn select_columns(&self, cols: Range<usize>) -> DataMatrix {
        DataMatrix {
            attributes: self.attributes[cols.clone()].to_vec(),
            data: self.data.iter().map(|r| r[cols.clone()].to_vec()).collect(),
        }
    }

    /// Copy of a contiguous range of rows.
    pub fn select_rows(&self, rows: Range<usize>) -> DataMatrix {
        DataMatrix {
            attributes: self.attributes.clone(),
            data: self.data[rows].to_vec(),
        }
    }

    /// Splits the last column off as the label column.
    pub fn split_labels(&self) -> DatasetResult<(DataMatrix, DataMatrix)> {
        let cols = self.cols();
        if cols < 2 {
            return Err(DatasetError::TooFewColumns {
                needed: 2,
                found: cols,
            });
        }
        Ok((
            self.select_columns(0..cols - 1),
            self.select_columns(cols - 1..cols),
        ))
    }

    /// Rescales every continuous column to `[0, 1]`. Constant columns are left alone.
    pub fn normalize(&mut self) {
        for col in 0..self.cols() {
            if self.attributes[col].is_nominal() {
                continue;
            }
            let (min, max) = self
                .data
                .iter()
                .map(|r| r[col])
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                    (lo.min(v), hi.max(v))
                });
            let span = max - min;
            if !(span.is_finite() && span > 0.0) {
                continue;
            }
            for row in &mut self.data {
                row[col] = (row[col] - min) / span;
            }
        }
    }
}

/// One-hot encode
pub fn one_hot(label: usize, num_classes: usize) -> Vec<f64> {
    let mut v = vec![0.0; num_classes];
    if label < num_classes {
        v[label] = 1.0;
    }
    v
}

fn open_reader(path: &Path) -> DatasetResult<Box<dyn Read>> {
    let file = File::open(path).map_err(|source| DatasetError::Open {
        path: path.display().to_string(),
        source,
    })?;
    if path.extension().map_or(false, |ext| ext == "gz") {
        Ok(Box::new(GzDecoder::new(file)))
    } else {
        Ok(Box::new(file))
    }
}

/// Load an ARFF file (optionally gzip-compressed).
pub fn load_arff<P: AsRef<Path>>(path: P) -> DatasetResult<DataMatrix> {
    let mut text = String::new();
    open_reader(path.as_ref())?.read_to_string(&mut text)?;
    parse_arff(&text)
}

/// Parse ARFF text with nominal (`{a,b}`) and numeric (`real`, `numeric`,
/// `continuous`, `integer`) attributes. Missing values are rejected.
pub fn parse_arff(text: &str) -> DatasetResult<DataMatrix> {
    let mut attributes = Vec::new();
    let mut matrix: Option<DataMatrix> = None;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('%') {
            continue;
        }
        let parse_err = |reason: String| DatasetError::Parse {
            line: line_no,
            reason,
        };

        if let Some(m) = matrix.as_mut() {
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            if fields.len() != m.cols() {
                return Err(parse_err(format!(
                    "expected {} values, found {}",
                    m.cols(),
                    fields.len()
                )));
            }
            let mut row = Vec::with_capacity(fields.len());
            for (attr, field) in m.attributes.iter().zip(&fields) {
                let field = unquote(field);
                if field == "?" {
                    return Err(parse_err(format!("missing value for `{}`", attr.name)));
                }
                let value = if attr.is_nominal() {
                    attr.values.iter().position(|v| v == field).ok_or_else(|| {
                        parse_err(format!("unknown value `{field}` for `{}`", attr.name))
                    })? as f64
                } else {
                    field
                        .parse::<f64>()
                        .map_err(|_| parse_err(format!("`{field}` is not a number")))?
                };
                row.push(value);
            }
            m.data.push(row);
            continue;
        }

        let lower = line.to_ascii_lowercase();
        if lower.starts_with("@relation") {
            continue;
        } else if lower.starts_with("@attribute") {
            let rest = line["@attribute".len()..].trim();
            let (name, kind) = split_name(rest)
                .ok_or_else(|| parse_err("missing attribute name".into()))?;
            let kind = kind.trim();
            if let Some(body) = kind.strip_prefix('{') {
                let body = body
                    .strip_suffix('}')
                    .ok_or_else(|| parse_err("unterminated nominal value list".into()))?;
                let values: Vec<String> = body
                    .split(',')
                    .map(|v| unquote(v.trim()).to_string())
                    .filter(|v| !v.is_empty())
                    .collect();
                attributes.push(Attribute::nominal(name, values));
            } else {
                match kind.to_ascii_lowercase().as_str() {
                    "real" | "numeric" | "continuous" | "integer" => {
                        attributes.push(Attribute::continuous(name))
                    }
                    other => {
                        return Err(parse_err(format!("unsupported attribute type `{other}`")))
                    }
                }
            }
        } else if lower.starts_with("@data") {
            matrix = Some(DataMatrix::new(std::mem::take(&mut attributes)));
        } else {
            return Err(parse_err(format!("unexpected line `{line}`")));
        }
    }

    match matrix {
        Some(m) if !m.is_empty() => Ok(m),
        _ => Err(DatasetError::Empty),
    }
}

fn unquote(s: &str) -> &str {
    s.trim_matches(|c: char| c == '\'' || c == '"')
}

fn split_name(rest: &str) -> Option<(String, &str)> {
    let quote = rest.chars().next()?;
    if quote == '\'' || quote == '"' {
        let end = rest[1..].find(quote)? + 1;
        Some((rest[1..end].to_string(), &rest[end + 1..]))
    } else {
        let end = rest.find(char::is_whitespace)?;
        Some((rest[..end].to_string(), &rest[end..]))
    }
}

/// Load a CSV file (optionally gzip-compressed). Columns where every value parses as a
/// number are continuous; any other column becomes nominal, with codes assigned in
/// order of first appearance.
pub fn load_csv<P: AsRef<Path>>(path: P, has_headers: bool) -> DatasetResult<DataMatrix> {
    let reader = open_reader(path.as_ref())?;
    let mut rdr = ReaderBuilder::new()
        .has_headers(has_headers)
        .trim(Trim::All)
        .from_reader(reader);
    let headers: Option<StringRecord> = if has_headers {
        Some(rdr.headers()?.clone())
    } else {
        None
    };
    let records = rdr.records().collect::<Result<Vec<_>, _>>()?;
    let cols = records.first().map(StringRecord::len).ok_or(DatasetError::Empty)?;

    let mut attributes = Vec::with_capacity(cols);
    for c in 0..cols {
        let name = headers
            .as_ref()
            .and_then(|h| h.get(c))
            .map(str::to_string)
            .unwrap_or_else(|| format!("col{c}"));
        let numeric = records.iter().all(|r| r[c].parse::<f64>().is_ok());
        if numeric {
            attributes.push(Attribute::continuous(name));
        } else {
            let mut values: Vec<String> = Vec::new();
            for r in &records {
                if !values.iter().any(|v| v == &r[c]) {
                    values.push(r[c].to_string());
                }
            }
            attributes.push(Attribute::nominal(name, values));
        }
    }

    let mut matrix = DataMatrix::new(attributes);
    for record in &records {
        let row = matrix
            .attributes
            .iter()
            .zip(record.iter())
            .map(|(attr, field)| {
                if attr.is_nominal() {
                    attr.values.iter().position(|v| v == field).unwrap_or(0) as f64
                } else {
                    field.parse().unwrap_or(0.0)
                }
            })
            .collect();
        matrix.push_row(row)?;
    }
    Ok(matrix)
}
