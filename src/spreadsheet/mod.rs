//! # Spreadsheet Processing Module
//!
//! Reads Office Open XML workbooks (`.xlsx`, `.xlsm`) held in memory into
//! [`sheet::Sheet`] grids, and encodes tabular results back into `.xlsx`.
use crate::error::SheetflowError;
use crate::spreadsheet::sheet::Sheet;
use crate::spreadsheet::xlsx::XlsxWorkbook;
use std::path::Path;
use thiserror::Error;

pub(crate) mod cell;
pub(crate) mod excel;
pub(crate) mod reference;
pub(crate) mod sheet;
pub(crate) mod writer;
pub(crate) mod xlsx;

/// Extensions of workbook members that ingestion recognizes.
pub const SPREADSHEET_EXTENSIONS: [&str; 2] = ["xlsx", "xlsm"];

#[derive(Error, Debug)]
pub enum SpreadsheetError {
    #[error("Missing part '{0}' in workbook")]
    FileError(String),

    #[error("Spreadsheet '{0}' contains no worksheet")]
    SpreadsheetEmptyError(String),

    #[error("Spreadsheet '{0}' is password protected or not an Office Open XML workbook")]
    SpreadsheetPasswordProtectedError(String),

    #[error("Sheet '{1}' of '{0}' contains no data")]
    SheetEmptyError(String, String),

    #[error("Invalid cell value in '{0}' sheet '{1}' at {2}: {3}")]
    CellValueError(String, String, String, String),
}

/// Checks whether a file name carries a recognized spreadsheet extension (case-insensitive).
pub fn is_spreadsheet_name(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| {
            SPREADSHEET_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(extension))
        })
        .unwrap_or(false)
}

/// Reads the first worksheet of an in-memory workbook.
pub(crate) fn read_first_sheet(file_name: &str, bytes: Vec<u8>) -> Result<Sheet, SheetflowError> {
    let mut workbook = XlsxWorkbook::open(file_name, bytes)?;
    let sheet = workbook.read_sheet(0)?;
    if sheet.is_empty() {
        let sheet_name = workbook.sheet_names().into_iter().next().unwrap_or_default();
        Err(SpreadsheetError::SheetEmptyError(file_name.to_owned(), sheet_name))?
    }
    Ok(sheet)
}
