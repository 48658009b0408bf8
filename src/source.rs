// 📂 Source Reader - CSV file → typed records
// One pass over one file; every declared column is coerced to its type.

use crate::error::{PipelineError, Result};
use crate::schema::{ColumnSpec, ColumnType, TableSpec};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue};
use serde::Serialize;
use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Storage format for timestamp columns. Fractional seconds are kept and
/// printed only when non-zero, so whole-second values stay `HH:MM:SS`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

const TIMESTAMP_INPUT_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

// ============================================================================
// VALUES & RECORDS
// ============================================================================

/// A typed cell. `Null` only appears for nullable columns with an empty cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Text(String),
    Integer(i64),
    Real(f64),
    Timestamp(NaiveDateTime),
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Text(s) => ToSqlOutput::from(s.as_str()),
            Value::Integer(i) => ToSqlOutput::from(*i),
            Value::Real(f) => ToSqlOutput::from(*f),
            Value::Timestamp(ts) => ToSqlOutput::from(ts.format(TIMESTAMP_FORMAT).to_string()),
        })
    }
}

/// One source row: declared column name → value, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    line: u64,
    fields: Vec<(&'static str, Value)>,
}

impl Record {
    pub fn new(line: u64, fields: Vec<(&'static str, Value)>) -> Self {
        Record { line, fields }
    }

    /// Line in the source file where this row starts (header is line 1)
    pub fn line(&self) -> u64 {
        self.line
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.iter().find(|(name, _)| *name == column).map(|(_, v)| v)
    }

    pub fn fields(&self) -> &[(&'static str, Value)] {
        &self.fields
    }
}

// ============================================================================
// READER
// ============================================================================

/// Single-pass iterator over one source file. Open again to re-read.
pub struct SourceReader {
    path: PathBuf,
    table: &'static TableSpec,
    /// Header index of each declared column
    positions: Vec<usize>,
    rows: csv::StringRecordsIntoIter<File>,
}

impl SourceReader {
    /// Open `path` and check its header against `table`'s declared columns.
    ///
    /// Every declared column must be present exactly once; unknown columns
    /// are rejected rather than ignored.
    pub fn open(path: &Path, table: &'static TableSpec) -> Result<Self> {
        if !path.is_file() {
            return Err(PipelineError::SourceNotFound {
                path: path.to_path_buf(),
            });
        }

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| csv_error(path, e))?;

        let headers = rdr.headers().map_err(|e| csv_error(path, e))?.clone();
        if headers.is_empty() || headers.iter().all(str::is_empty) {
            return Err(PipelineError::malformed(path, "missing header row"));
        }

        let mut seen = HashSet::new();
        for header in headers.iter() {
            if !seen.insert(header) {
                return Err(PipelineError::malformed(
                    path,
                    format!("duplicate column '{}'", header),
                ));
            }
        }

        let unknown: Vec<&str> = headers
            .iter()
            .filter(|h| table.column(h).is_none())
            .collect();
        if !unknown.is_empty() {
            return Err(PipelineError::malformed(
                path,
                format!("unknown columns: {}", unknown.join(", ")),
            ));
        }

        let mut positions = Vec::with_capacity(table.columns.len());
        let mut missing = Vec::new();
        for column in table.columns {
            match headers.iter().position(|h| h == column.name) {
                Some(idx) => positions.push(idx),
                None => missing.push(column.name),
            }
        }
        if !missing.is_empty() {
            return Err(PipelineError::malformed(
                path,
                format!("missing required columns: {}", missing.join(", ")),
            ));
        }

        Ok(SourceReader {
            path: path.to_path_buf(),
            table,
            positions,
            rows: rdr.into_records(),
        })
    }

    fn to_record(&self, row: &csv::StringRecord) -> Result<Record> {
        let line = row.position().map(|p| p.line()).unwrap_or(0);
        let mut fields = Vec::with_capacity(self.positions.len());

        for (column, &idx) in self.table.columns.iter().zip(&self.positions) {
            let raw = row.get(idx).unwrap_or("");
            let value = coerce(raw, column).ok_or_else(|| PipelineError::FieldTypeError {
                path: self.path.clone(),
                line,
                column: column.name.to_string(),
                value: raw.to_string(),
                expected: column.column_type,
            })?;
            fields.push((column.name, value));
        }

        Ok(Record::new(line, fields))
    }
}

impl Iterator for SourceReader {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = match self.rows.next()? {
            Ok(row) => row,
            Err(e) => return Some(Err(csv_error(&self.path, e))),
        };
        Some(self.to_record(&row))
    }
}

/// Read a whole source file into memory, in file order.
pub fn read_source(path: &Path, table: &'static TableSpec) -> Result<Vec<Record>> {
    SourceReader::open(path, table)?.collect()
}

// ============================================================================
// COERCION
// ============================================================================

/// Coerce one trimmed cell; `None` means the cell cannot hold the declared type.
pub fn coerce(raw: &str, column: &ColumnSpec) -> Option<Value> {
    if raw.is_empty() {
        return column.nullable.then_some(Value::Null);
    }

    match column.column_type {
        ColumnType::Text => Some(Value::Text(raw.to_string())),
        ColumnType::Integer => raw.parse::<i64>().ok().map(Value::Integer),
        ColumnType::Real => raw
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(Value::Real),
        ColumnType::Timestamp => parse_timestamp(raw).map(Value::Timestamp),
    }
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }

    for format in TIMESTAMP_INPUT_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(ts);
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn csv_error(path: &Path, err: csv::Error) -> PipelineError {
    match err.into_kind() {
        csv::ErrorKind::Io(e) => PipelineError::Io(e),
        csv::ErrorKind::Utf8 { pos, .. } => PipelineError::malformed(
            path,
            format!(
                "invalid UTF-8 at line {}",
                pos.map(|p| p.line()).unwrap_or(0)
            ),
        ),
        csv::ErrorKind::UnequalLengths {
            pos,
            expected_len,
            len,
        } => PipelineError::malformed(
            path,
            format!(
                "line {}: expected {} fields, found {}",
                pos.map(|p| p.line()).unwrap_or(0),
                expected_len,
                len
            ),
        ),
        other => PipelineError::malformed(path, format!("{:?}", other)),
    }
}
