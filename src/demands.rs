//! Demand list reader.
//!
//! Demands come as CSV with a header row naming `Source`, `Target` and
//! `Flow` columns (case-insensitive, any order, extra columns ignored).
//! Rows that cannot be read are reported with their line number and
//! skipped; the remaining rows are returned in input order.

use std::fs;
use std::path::Path;

use color_eyre::eyre::{Result, WrapErr};
use csv::{ReaderBuilder, StringRecord, Trim};
use log::{info, warn};
use serde::Serialize;

use crate::traffic::Demand;

/// Errors from reading a demand list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
pub enum DemandParseError {
    #[error("demand list is empty; expected a header row")]
    MissingHeader,

    #[error("header is missing the '{0}' column")]
    MissingColumn(String),

    #[error("line {line}: expected at least {expected} fields, found {found}")]
    TooFewFields {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: invalid flow '{value}'")]
    InvalidFlow { line: usize, value: String },

    #[error("line {line}: empty {column}")]
    EmptyField { line: usize, column: String },

    #[error("line {line}: unreadable record: {message}")]
    Malformed { line: usize, message: String },
}

impl DemandParseError {
    /// Line the error refers to, if it concerns a single row.
    pub fn line(&self) -> Option<usize> {
        match self {
            DemandParseError::TooFewFields { line, .. }
            | DemandParseError::InvalidFlow { line, .. }
            | DemandParseError::EmptyField { line, .. }
            | DemandParseError::Malformed { line, .. } => Some(*line),
            _ => None,
        }
    }
}

/// Demands read from a list, plus the rows that were skipped
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DemandList {
    pub demands: Vec<Demand>,
    pub skipped: Vec<DemandParseError>,
}

struct Columns {
    source: usize,
    target: usize,
    flow: usize,
}

impl Columns {
    fn from_header(header: &StringRecord) -> Result<Self, DemandParseError> {
        let position = |name: &str| {
            header
                .iter()
                .position(|h| h.trim_start_matches('\u{feff}').eq_ignore_ascii_case(name))
                .ok_or_else(|| DemandParseError::MissingColumn(name.to_string()))
        };

        Ok(Self {
            source: position("Source")?,
            target: position("Target")?,
            flow: position("Flow")?,
        })
    }

    fn width(&self) -> usize {
        self.source.max(self.target).max(self.flow) + 1
    }
}

fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(str::is_empty)
}

fn parse_row(record: &StringRecord, columns: &Columns, line: usize) -> Result<Demand, DemandParseError> {
    let field = |index: usize| record.get(index).unwrap_or_default();

    if record.len() < columns.width() {
        return Err(DemandParseError::TooFewFields {
            line,
            expected: columns.width(),
            found: record.len(),
        });
    }

    let source = field(columns.source);
    let target = field(columns.target);
    for (value, column) in [(source, "Source"), (target, "Target")] {
        if value.is_empty() {
            return Err(DemandParseError::EmptyField {
                line,
                column: column.to_string(),
            });
        }
    }

    let raw_flow = field(columns.flow);
    let amount = raw_flow
        .parse::<f64>()
        .map_err(|_| DemandParseError::InvalidFlow {
            line,
            value: raw_flow.to_string(),
        })?;

    // Range checks (zero, negative, NaN) belong to the accumulator
    Ok(Demand::new(source, target, amount))
}

/// Parse a CSV demand list.
///
/// Fails only when the header is absent or lacks a required column; bad rows
/// are collected in [`DemandList::skipped`].
pub fn parse_demands_str(content: &str) -> Result<DemandList, DemandParseError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .flexible(true)
        .from_reader(content.as_bytes());

    let header = reader
        .headers()
        .map_err(|_| DemandParseError::MissingHeader)?
        .clone();
    if is_blank(&header) {
        return Err(DemandParseError::MissingHeader);
    }
    let columns = Columns::from_header(&header)?;

    let mut list = DemandList::default();
    let mut last_line = 1;
    for result in reader.records() {
        let parsed = match result {
            Ok(record) => {
                last_line = record.position().map_or(last_line + 1, |p| p.line() as usize);
                if is_blank(&record) {
                    continue;
                }
                parse_row(&record, &columns, last_line)
            }
            Err(e) => {
                last_line = e.position().map_or(last_line + 1, |p| p.line() as usize);
                Err(DemandParseError::Malformed {
                    line: last_line,
                    message: e.to_string(),
                })
            }
        };

        match parsed {
            Ok(demand) => list.demands.push(demand),
            Err(e) => {
                warn!("Skipping demand row: {}", e);
                list.skipped.push(e);
            }
        }
    }

    Ok(list)
}

/// Read a CSV demand list from disk
pub fn load_demands(path: &Path) -> Result<DemandList> {
    info!("Loading demands from: {:?}", path);

    let content = fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read demand file '{}'", path.display()))?;
    let list = parse_demands_str(&content)
        .wrap_err_with(|| format!("Failed to parse demand file '{}'", path.display()))?;

    info!(
        "Loaded {} demands ({} rows skipped)",
        list.demands.len(),
        list.skipped.len()
    );
    Ok(list)
}
