//! Run result types: summary statistics and the per-iteration data table.

use crate::config::TestConfig;
use crate::error::{BenchError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Summary statistics for one step, in nanoseconds.
///
/// Every field is NaN when the step recorded no samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    /// Sum of all sample durations.
    #[serde(with = "nan_serde")]
    pub duration: f64,
    #[serde(with = "nan_serde")]
    pub min: f64,
    #[serde(with = "nan_serde")]
    pub max: f64,
    #[serde(with = "nan_serde")]
    pub mean: f64,
}

impl Stats {
    pub fn nan() -> Self {
        Self {
            duration: f64::NAN,
            min: f64::NAN,
            max: f64::NAN,
            mean: f64::NAN,
        }
    }

    pub fn from_durations(durations: &[Duration]) -> Self {
        if durations.is_empty() {
            return Self::nan();
        }
        let nanos: Vec<f64> = durations.iter().map(|d| d.as_nanos() as f64).collect();
        let duration: f64 = nanos.iter().sum();
        let min = nanos.iter().copied().fold(f64::INFINITY, f64::min);
        let max = nanos.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Self {
            duration,
            min,
            max,
            mean: duration / nanos.len() as f64,
        }
    }

    /// True when no samples contributed (all fields NaN).
    pub fn is_empty(&self) -> bool {
        self.duration.is_nan()
    }
}

/// Row-oriented table of per-iteration durations: one column per step, one row
/// per iteration, cells in nanoseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDataTable")]
pub struct DataTable {
    columns: Vec<String>,
    rows: Vec<Vec<u64>>,
}

/// Unchecked wire form of [`DataTable`]; rows are width-checked on conversion.
#[derive(Deserialize)]
struct RawDataTable {
    columns: Vec<String>,
    rows: Vec<Vec<u64>>,
}

impl TryFrom<RawDataTable> for DataTable {
    type Error = BenchError;

    fn try_from(raw: RawDataTable) -> Result<Self> {
        for (i, row) in raw.rows.iter().enumerate() {
            if row.len() != raw.columns.len() {
                return Err(BenchError::Table(row_width_message(i + 1, row.len(), raw.columns.len())));
            }
        }
        Ok(Self {
            columns: raw.columns,
            rows: raw.rows,
        })
    }
}

impl DataTable {
    /// Build a table from per-column samples.
    ///
    /// The first column fixes the row count; any other column with a different
    /// number of samples is an error rather than being truncated or padded.
    pub fn from_columns(columns: Vec<(String, Vec<u64>)>) -> Result<Self> {
        let expected = columns.first().map(|(_, v)| v.len()).unwrap_or(0);
        if let Some((name, values)) = columns.iter().find(|(_, v)| v.len() != expected) {
            return Err(BenchError::SampleCountMismatch {
                step: name.clone(),
                expected,
                actual: values.len(),
            });
        }

        let rows = (0..expected)
            .map(|i| columns.iter().map(|(_, v)| v[i]).collect())
            .collect();
        Ok(Self {
            columns: columns.into_iter().map(|(name, _)| name).collect(),
            rows,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of rows (iterations).
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<DataRow<'_>> {
        self.rows.get(index).map(|values| DataRow {
            columns: &self.columns,
            values,
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = DataRow<'_>> {
        self.rows.iter().map(move |values| DataRow {
            columns: &self.columns,
            values,
        })
    }

    /// All values of one column, in row order.
    pub fn column(&self, name: &str) -> Option<Vec<u64>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        self.rows.iter().map(|row| row.get(idx).copied()).collect()
    }

    /// The table as a sequence of step-name to nanoseconds mappings.
    pub fn to_maps(&self) -> Vec<BTreeMap<String, u64>> {
        self.rows()
            .map(|row| row.iter().map(|(k, v)| (k.to_string(), v)).collect())
            .collect()
    }

    /// Render as CSV: a header of step names followed by one line per iteration.
    pub fn to_csv(&self) -> String {
        if self.columns.is_empty() {
            return String::new();
        }
        let mut out = String::new();
        let header: Vec<_> = self.columns.iter().map(|c| csv_field(c)).collect();
        out.push_str(&header.join(","));
        out.push('\n');
        for row in &self.rows {
            let line: Vec<_> = row.iter().map(u64::to_string).collect();
            out.push_str(&line.join(","));
            out.push('\n');
        }
        out
    }

    /// Parse CSV produced by [`DataTable::to_csv`]. Blank lines are skipped.
    pub fn from_csv(input: &str) -> Result<Self> {
        let mut records = parse_csv_records(input)?
            .into_iter()
            .filter(|r| !(r.len() == 1 && r[0].is_empty()));

        let Some(columns) = records.next() else {
            return Ok(Self::default());
        };

        let mut rows = Vec::new();
        for (line, record) in records.enumerate() {
            if record.len() != columns.len() {
                return Err(BenchError::Csv(row_width_message(
                    line + 1,
                    record.len(),
                    columns.len(),
                )));
            }
            let values = record
                .iter()
                .map(|field| {
                    field.trim().parse::<u64>().map_err(|e| {
                        BenchError::Csv(format!("row {}: invalid value '{}': {}", line + 1, field, e))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            rows.push(values);
        }

        Ok(Self { columns, rows })
    }
}

/// One iteration's row of a [`DataTable`].
#[derive(Debug, Clone, Copy)]
pub struct DataRow<'a> {
    columns: &'a [String],
    values: &'a [u64],
}

impl<'a> DataRow<'a> {
    pub fn get(&self, step: &str) -> Option<u64> {
        let idx = self.columns.iter().position(|c| c == step)?;
        self.values.get(idx).copied()
    }

    pub fn values(&self) -> &'a [u64] {
        self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, u64)> + 'a {
        let (columns, values) = (self.columns, self.values);
        columns
            .iter()
            .map(String::as_str)
            .zip(values.iter().copied())
    }
}

/// Everything a completed test run produced, in serializable form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub test: String,
    pub config: TestConfig,
    pub stats: BTreeMap<String, Stats>,
    /// `None` when the steps recorded diverging sample counts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_points: Option<DataTable>,
    /// Unix timestamp in milliseconds of the run's completion; `None` if the
    /// test never completed a run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

impl TestResult {
    /// Load a result from a JSON file.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

pub(crate) fn timestamp() -> String {
    // Milliseconds keep file names unique when runs finish close together.
    let now = std::time::SystemTime::now();
    let duration = now
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}", duration.as_millis())
}

fn row_width_message(row: usize, fields: usize, columns: usize) -> String {
    format!("row {row} has {fields} fields, header has {columns}")
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn parse_csv_records(input: &str) -> Result<Vec<Vec<String>>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut pending = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' => {
                in_quotes = true;
                pending = true;
            }
            ',' => {
                record.push(std::mem::take(&mut field));
                pending = true;
            }
            '\r' => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
                pending = false;
            }
            _ => {
                field.push(c);
                pending = true;
            }
        }
    }

    if in_quotes {
        return Err(BenchError::Csv("unterminated quoted field".to_string()));
    }
    if pending {
        record.push(field);
        records.push(record);
    }
    Ok(records)
}

/// NaN has no JSON representation; write it as `null` and read `null` back as NaN.
mod nan_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
        if v.is_nan() {
            None::<f64>.serialize(s)
        } else {
            Some(*v).serialize(s)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(d)?.unwrap_or(f64::NAN))
    }
}

pub(crate) mod opt_duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        d.map(|d| d.as_nanos() as u64).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_nanos))
    }
}
