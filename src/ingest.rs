//! Delimited-text ingestion
//!
//! Parses pasted or uploaded meter exports into time-stamped numeric columns.
//! Inputs are locale-formatted: semicolon- or tab-delimited, `DD.MM.YYYY`
//! timestamps, comma or dot decimal separators.

use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

use crate::domain::DailyPoint;

/// Timestamp formats accepted in the first column, most specific first.
const TIMESTAMP_FORMATS: &[&str] = &[
    "%d.%m.%Y %H:%M:%S%.f",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%d.%m.%Y", "%Y-%m-%d"];

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("input is empty")]
    Empty,

    #[error("could not detect a delimiter in the header line")]
    UnknownDelimiter,

    #[error("header names {expected} columns but row {row} has {got}")]
    ColumnCount {
        row: usize,
        expected: usize,
        got: usize,
    },

    #[error("row {row}: '{value}' is not a recognized timestamp")]
    BadTimestamp { row: usize, value: String },

    #[error("row {row}, column '{column}': '{value}' is not a number")]
    BadNumber {
        row: usize,
        column: String,
        value: String,
    },

    #[error("reading delimited input: {0}")]
    Csv(#[from] csv::Error),
}

/// A named numeric column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<f64>,
}

/// Parsed delimited input: one timestamp per row plus named numeric columns,
/// all the same length. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub timestamp_header: String,
    pub timestamps: Vec<NaiveDateTime>,
    pub columns: Vec<Column>,
}

impl Table {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }
}

/// Detect the delimiter from the header line: semicolon wins over tab.
/// Returns `None` when neither occurs.
pub fn sniff_delimiter(header_line: &str) -> Option<u8> {
    if header_line.contains(';') {
        Some(b';')
    } else if header_line.contains('\t') {
        Some(b'\t')
    } else {
        None
    }
}

/// Parse a locale-formatted number: `12,5` and `12.5` both yield 12.5.
pub fn parse_locale_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.contains(',') {
        trimmed.replace(',', ".").parse().ok()
    } else {
        trimmed.parse().ok()
    }
}

/// Parse a first-column timestamp. Bare dates resolve to midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    for fmt in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(ts);
        }
    }
    parse_date(trimmed).and_then(|d| d.and_hms_opt(0, 0, 0))
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
}

/// Parse delimited text into a [`Table`]. The first column is the timestamp,
/// every other column must be numeric. A malformed cell aborts the whole
/// parse; nothing is retried (recovery is re-entering the input).
pub fn parse_table(text: &str, delimiter: Option<u8>) -> Result<Table, IngestError> {
    let header_line = first_line(text)?;
    let delim = delimiter
        .or_else(|| sniff_delimiter(header_line))
        .ok_or(IngestError::UnknownDelimiter)?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delim)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    if headers.len() < 2 {
        return Err(IngestError::UnknownDelimiter);
    }

    let timestamp_header = headers[0].clone();
    let value_headers = &headers[1..];

    let mut timestamps = Vec::new();
    let mut columns: Vec<Column> = value_headers
        .iter()
        .map(|name| Column {
            name: name.clone(),
            values: Vec::new(),
        })
        .collect();

    for (idx, record) in reader.records().enumerate() {
        let row = idx + 1; // 1-based data rows, header excluded
        let record = record?;

        if record.len() != headers.len() {
            return Err(IngestError::ColumnCount {
                row,
                expected: headers.len(),
                got: record.len(),
            });
        }

        let raw_ts = record.get(0).unwrap_or("");
        let ts = parse_timestamp(raw_ts).ok_or_else(|| IngestError::BadTimestamp {
            row,
            value: raw_ts.to_string(),
        })?;
        timestamps.push(ts);

        for (col_idx, column) in columns.iter_mut().enumerate() {
            let raw = record.get(col_idx + 1).unwrap_or("");
            let value = parse_locale_number(raw).ok_or_else(|| IngestError::BadNumber {
                row,
                column: column.name.clone(),
                value: raw.to_string(),
            })?;
            column.values.push(value);
        }
    }

    if timestamps.is_empty() {
        return Err(IngestError::Empty);
    }

    Ok(Table {
        timestamp_header,
        timestamps,
        columns,
    })
}

/// Parse a two-column `date;value` text into a daily series. A header row is
/// optional: the first row is skipped when its first cell is not a date.
pub fn parse_daily_series(text: &str, delimiter: Option<u8>) -> Result<Vec<DailyPoint>, IngestError> {
    let header_line = first_line(text)?;
    let delim = delimiter
        .or_else(|| sniff_delimiter(header_line))
        .ok_or(IngestError::UnknownDelimiter)?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delim)
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut points = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let row = idx + 1;
        let record = record?;

        let raw_date = record.get(0).unwrap_or("");
        let date = match parse_date(raw_date) {
            Some(d) => d,
            // Tolerate one leading header row.
            None if idx == 0 => continue,
            None => {
                return Err(IngestError::BadTimestamp {
                    row,
                    value: raw_date.to_string(),
                })
            }
        };

        let raw_value = record.get(1).unwrap_or("");
        let value = parse_locale_number(raw_value).ok_or_else(|| IngestError::BadNumber {
            row,
            column: "value".to_string(),
            value: raw_value.to_string(),
        })?;

        points.push(DailyPoint::new(date, value));
    }

    if points.is_empty() {
        return Err(IngestError::Empty);
    }

    Ok(points)
}

fn first_line(text: &str) -> Result<&str, IngestError> {
    text.lines()
        .find(|l| !l.trim().is_empty())
        .ok_or(IngestError::Empty)
}
