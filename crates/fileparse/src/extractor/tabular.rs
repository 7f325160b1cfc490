//! Tabular extraction: CSV files and spreadsheet workbooks become a list of
//! row objects keyed by the header row.

use std::collections::HashSet;
use std::fs::File;
use std::path::Path;

use calamine::{Data, Reader};
use serde_json::{Map, Number, Value};

use crate::error::ExtractError;
use crate::extractor::{
    scaled, ContentKind, Extractor, ProgressReporter, TabularFormat, DEFAULT_BATCH_SIZE,
};
use crate::jobs::ParsedContent;

type Row = Map<String, Value>;

pub struct CsvExtractor {
    batch_size: usize,
}

impl CsvExtractor {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }
}

impl Default for CsvExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

impl Extractor for CsvExtractor {
    fn extract(
        &self,
        path: &Path,
        progress: &dyn ProgressReporter,
    ) -> Result<ParsedContent, ExtractError> {
        let _span = tracing::info_span!("extractor.csv").entered();
        progress.checkpoint()?;

        let file = File::open(path).map_err(|e| ExtractError::io(path, e))?;
        let total_bytes = file
            .metadata()
            .map_err(|e| ExtractError::io(path, e))?
            .len();

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);

        let raw_headers = reader.headers().map_err(|e| csv_error(path, e))?.clone();
        if raw_headers.is_empty() {
            return Err(ExtractError::malformed("no columns to parse from file"));
        }
        let headers = unique_headers(raw_headers.iter().map(str::to_string).collect());

        let mut rows = Vec::new();
        let mut in_batch = 0;
        for record in reader.records() {
            let record = record.map_err(|e| csv_error(path, e))?;
            if record.len() > headers.len() {
                return Err(ExtractError::malformed(format!(
                    "expected {} fields in line {}, saw {}",
                    headers.len(),
                    record.position().map_or(0, |p| p.line()),
                    record.len()
                )));
            }
            // Short rows are padded with nulls.
            let row: Row = headers
                .iter()
                .enumerate()
                .map(|(i, header)| {
                    let cell = record.get(i).map_or(Value::Null, infer_cell);
                    (header.clone(), cell)
                })
                .collect();
            rows.push(row);

            in_batch += 1;
            if in_batch == self.batch_size {
                in_batch = 0;
                progress.checkpoint()?;
                progress.report(scaled(record.position().map_or(0, |p| p.byte()), total_bytes));
            }
        }

        progress.report(scaled(total_bytes, total_bytes));
        log::debug!("Parsed {} CSV rows from {}", rows.len(), path.display());
        Ok(ParsedContent::Rows(rows))
    }

    fn supports(&self, kind: ContentKind) -> bool {
        kind == ContentKind::Tabular(TabularFormat::Csv)
    }
}

pub struct SpreadsheetExtractor {
    batch_size: usize,
}

impl SpreadsheetExtractor {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }
}

impl Default for SpreadsheetExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

impl Extractor for SpreadsheetExtractor {
    fn extract(
        &self,
        path: &Path,
        progress: &dyn ProgressReporter,
    ) -> Result<ParsedContent, ExtractError> {
        let _span = tracing::info_span!("extractor.spreadsheet").entered();
        progress.checkpoint()?;

        // calamine folds open failures into format errors; probe first so a
        // missing file still reports as I/O.
        std::fs::metadata(path).map_err(|e| ExtractError::io(path, e))?;
        let mut workbook =
            calamine::open_workbook_auto(path).map_err(|e| calamine_error(path, e))?;
        let range = match workbook.worksheet_range_at(0) {
            Some(range) => range.map_err(|e| calamine_error(path, e))?,
            None => return Err(ExtractError::malformed("workbook has no worksheets")),
        };

        let mut sheet_rows = range.rows();
        let headers = match sheet_rows.next() {
            Some(first) => unique_headers(first.iter().map(header_text).collect()),
            None => {
                progress.report(scaled(1, 1));
                return Ok(ParsedContent::Rows(Vec::new()));
            }
        };

        let total = range.height().saturating_sub(1) as u64;
        let mut rows = Vec::with_capacity(total as usize);
        for cells in sheet_rows {
            let row: Row = headers
                .iter()
                .zip(cells.iter())
                .map(|(header, cell)| (header.clone(), cell_value(cell)))
                .collect();
            rows.push(row);

            if rows.len() % self.batch_size == 0 {
                progress.checkpoint()?;
                progress.report(scaled(rows.len() as u64, total));
            }
        }

        progress.report(scaled(total, total));
        log::debug!(
            "Parsed {} spreadsheet rows from {}",
            rows.len(),
            path.display()
        );
        Ok(ParsedContent::Rows(rows))
    }

    fn supports(&self, kind: ContentKind) -> bool {
        kind == ContentKind::Tabular(TabularFormat::Spreadsheet)
    }
}

fn csv_error(path: &Path, e: csv::Error) -> ExtractError {
    if e.is_io_error() {
        if let csv::ErrorKind::Io(io) = e.into_kind() {
            return ExtractError::io(path, io);
        }
        return ExtractError::malformed("I/O error while reading CSV");
    }
    ExtractError::malformed(e.to_string())
}

fn calamine_error(path: &Path, e: calamine::Error) -> ExtractError {
    match e {
        calamine::Error::Io(io) => ExtractError::io(path, io),
        other => ExtractError::malformed(other.to_string()),
    }
}

/// Fills blank headers and disambiguates repeated ones (`name`, `name.1`, ...).
fn unique_headers(raw: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.into_iter()
        .enumerate()
        .map(|(i, header)| {
            let base = if header.trim().is_empty() {
                format!("Unnamed: {}", i)
            } else {
                header
            };
            let mut candidate = base.clone();
            let mut n = 1;
            while !seen.insert(candidate.clone()) {
                candidate = format!("{}.{}", base, n);
                n += 1;
            }
            candidate
        })
        .collect()
}

/// Infers a JSON value for one CSV cell: integer, float, boolean, null for
/// empty cells, otherwise the raw string.
fn infer_cell(cell: &str) -> Value {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if let Some(n) = Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    match trimmed {
        "true" | "True" | "TRUE" => Value::Bool(true),
        "false" | "False" | "FALSE" => Value::Bool(false),
        _ => Value::String(cell.to_string()),
    }
}

fn header_text(cell: &Data) -> String {
    match cell_value(cell) {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::Int(i) => Value::from(*i),
        // Spreadsheets store every number as a float; whole values read back
        // as integers.
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Value::from(*f as i64),
        Data::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
        Data::String(s) => Value::String(s.clone()),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => Value::String(dt.to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::String(s.clone()),
        Data::Error(e) => Value::String(e.to_string()),
    }
}
