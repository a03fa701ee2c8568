//! # Result Formatter
//!
//! Encodes a [`TabularResult`] as csv, json records, aligned text or an xlsx workbook.
use crate::database::table::TabularResult;
use crate::error::SheetflowError;
use crate::spreadsheet::writer::write_workbook;
use crate::spreadsheet::writer::XLSX_CONTENT_TYPE;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use clap::ValueEnum;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FormatError {
    #[error("nothing to format: the previous step did not produce a table")]
    NothingToFormat,

    #[error("encode {0} failed: {1}")]
    EncodeError(&'static str, SheetflowError),
}

/// Target encodings of the formatter.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Encoding {
    Csv,
    Json,
    Table,
    Xlsx,
}

impl Encoding {
    /// Parses an encoding name, trimmed and case-insensitive. Unknown or empty names mean csv.
    pub fn parse(name: &str) -> Encoding {
        match name.trim().to_ascii_lowercase().as_str() {
            "json" => Encoding::Json,
            "table" => Encoding::Table,
            "xlsx" => Encoding::Xlsx,
            "csv" | "" => Encoding::Csv,
            other => {
                log::warn!("Unknown encoding '{other}', using csv");
                Encoding::Csv
            }
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Encoding::Csv => "csv",
            Encoding::Json => "json",
            Encoding::Table => "table",
            Encoding::Xlsx => "xlsx",
        }
    }
}

/// Wire representation of xlsx output.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum XlsxWire {
    /// Workbook bytes as standard base64 text
    #[default]
    Base64,
    /// Workbook bytes as they are
    Raw,
}

/// An encoded result.
#[derive(Clone, Debug, PartialEq)]
pub enum FormattedValue {
    Text(String),
    Bytes { content_type: &'static str, bytes: Vec<u8> },
}

impl FormattedValue {
    /// The value as it appears in a step trace. Raw bytes are described, not inlined.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FormattedValue::Text(text) => serde_json::Value::String(text.to_owned()),
            FormattedValue::Bytes { content_type, bytes } => json!({
                "content_type": content_type,
                "bytes": bytes.len(),
            }),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            FormattedValue::Text(text) => text.as_bytes(),
            FormattedValue::Bytes { bytes, .. } => bytes,
        }
    }
}

/// Encodes `result` with `encoding`. Pure and in-memory.
pub fn format(result: &TabularResult, encoding: Encoding, wire: XlsxWire) -> Result<FormattedValue, FormatError> {
    let mapper = |error: SheetflowError| FormatError::EncodeError(encoding.as_str(), error);
    let value = match encoding {
        Encoding::Csv => FormattedValue::Text(to_csv(result).map_err(mapper)?),
        Encoding::Json => FormattedValue::Text(to_json(result).map_err(mapper)?),
        Encoding::Table => FormattedValue::Text(to_table(result)),
        Encoding::Xlsx => {
            let bytes = write_workbook("Sheet1", result).map_err(mapper)?;
            match wire {
                XlsxWire::Base64 => FormattedValue::Text(BASE64.encode(bytes)),
                XlsxWire::Raw => FormattedValue::Bytes { content_type: XLSX_CONTENT_TYPE, bytes },
            }
        }
    };
    log::debug!("Formatted {} rows as {} ({} bytes)", result.len(), encoding.as_str(), value.as_bytes().len());
    Ok(value)
}

/// Delimited text with a header row, in column order.
pub fn to_csv(result: &TabularResult) -> Result<String, SheetflowError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(result.columns())?;
    for row in result.rows() {
        writer.write_record(row.iter().map(|datum| datum.to_string()))?;
    }
    let bytes = writer.into_inner().map_err(|error| error.into_error())?;
    Ok(String::from_utf8(bytes).map_err(|error| error.utf8_error())?)
}

/// An array of ordered row objects; extended characters are written as they are.
pub fn to_json(result: &TabularResult) -> Result<String, SheetflowError> {
    Ok(serde_json::to_string(&result.records(result.len()))?)
}

/// Fixed-width text: every column right-aligned to its widest value, no index column.
pub fn to_table(result: &TabularResult) -> String {
    let headers = result.columns();
    let rows: Vec<Vec<String>> = result
        .rows()
        .iter()
        .map(|row| row.iter().map(|datum| single_line(&datum.to_string())).collect())
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(|header| header.chars().count()).collect();
    for row in &rows {
        for (index, cell) in row.iter().enumerate() {
            widths[index] = widths[index].max(cell.chars().count());
        }
    }

    std::iter::once(format_row(headers, &widths))
        .chain(rows.iter().map(|row| format_row(row, &widths)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    values
        .iter()
        .zip(widths)
        .map(|(value, width)| format!("{value:>width$}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn single_line(value: &str) -> String {
    value.replace(['\n', '\r', '\t'], " ")
}
