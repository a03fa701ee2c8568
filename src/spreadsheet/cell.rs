use crate::spreadsheet::reference::index_to_reference;
use chrono::Duration;
use chrono::NaiveDate;
use chrono::NaiveDateTime;

/// Types of cell data in SpreadsheetML worksheets.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub(crate) enum CellType {
    #[default]
    Empty,
    /// Boolean values (true/false)
    Boolean,
    /// Numeric values
    Number,
    /// Date/time values stored as numbers from 1900 epoch
    NumberDateTime1900,
    /// Date values stored as numbers from 1900 epoch
    NumberDate1900,
    /// Time values stored as numbers from 1900 epoch
    NumberTime1900,
    /// Date/time values stored as numbers from 1904 epoch
    NumberDateTime1904,
    /// Date values stored as numbers from 1904 epoch
    NumberDate1904,
    /// Time values stored as numbers from 1904 epoch
    NumberTime1904,
    /// ISO 8601 date/time strings
    IsoDateTime,
    /// Inline string values
    InlineString,
    /// Shared string table references
    SharedString,
    /// Error values
    Error,
}

impl CellType {
    /// Parses built-in Excel number format IDs to determine cell type.
    pub(crate) fn parse_builtin_number_format_id(id: &str, is_1904: bool) -> Option<Self> {
        match id {
            "22" => Some(if is_1904 { Self::NumberDateTime1904 } else { Self::NumberDateTime1900 }),
            "14" | "15" | "16" | "17" => Some(if is_1904 { Self::NumberDate1904 } else { Self::NumberDate1900 }),
            "18" | "19" | "20" | "21" | "45" | "46" | "47" => Some(if is_1904 { Self::NumberTime1904 } else { Self::NumberTime1900 }),
            _ => None,
        }
    }

    /// Parses custom number format strings to determine cell type.
    /// Analyzes format codes for date/time patterns outside literals and brackets.
    pub(crate) fn parse_custom_number_format(format: &str, is_1904: bool) -> Self {
        let mut is_escaped = false;
        let mut is_literal = false;
        let mut is_date = false;
        let mut is_time = false;
        let mut is_bracket = false;
        for character in format.chars() {
            match character {
                _ if is_escaped => is_escaped = false,
                '_' | '\\' => is_escaped = true,

                '"' if is_literal => is_literal = false,
                '"' if !is_bracket => is_literal = true,

                ']' if is_bracket => is_bracket = false,
                '[' if !is_literal => is_bracket = true,
                _ if is_literal || is_bracket => (),

                'Y' | 'y' | 'D' | 'd' => is_date = true,
                'H' | 'h' | 'S' | 's' => is_time = true,
                _ => (),
            }
        }

        match (is_date, is_time, is_1904) {
            (true, true, false) => Self::NumberDateTime1900,
            (true, true, true) => Self::NumberDateTime1904,
            (true, false, false) => Self::NumberDate1900,
            (true, false, true) => Self::NumberDate1904,
            (false, true, false) => Self::NumberTime1900,
            (false, true, true) => Self::NumberTime1904,
            (false, false, _) => Self::Number,
        }
    }

    fn is_1904(&self) -> bool {
        matches!(self, Self::NumberDateTime1904 | Self::NumberDate1904 | Self::NumberTime1904)
    }
}

/// Represents a single cell in a worksheet with position, type, and raw value.
#[derive(Clone, Debug)]
pub(crate) struct Cell {
    /// Row index (0-based)
    pub(crate) row: usize,
    /// Column index (0-based)
    pub(crate) col: usize,
    /// Cell data type
    pub(crate) kind: CellType,
    /// Cell value as stored in the worksheet XML
    pub(crate) value: String,
}

impl Cell {
    /// Returns the Excel-style cell reference (e.g., "A1", "B2").
    pub(crate) fn reference(&self) -> String {
        index_to_reference(self.row, self.col)
    }

    pub(crate) fn to_boolean(&self) -> bool {
        self.value == "1" || self.value.eq_ignore_ascii_case("true")
    }

    /// Converts cell value to 64-bit integer, accepting a zero fractional part.
    pub(crate) fn to_bigint(&self) -> Result<i64, String> {
        let value = self.value.trim();
        let integer = match value.split_once('.') {
            Some((integer, fraction)) if fraction.chars().all(|c| c == '0') => integer,
            Some(_) => return Err(format!("parse '{}' to bigint failed", self.value)),
            None => value,
        };
        integer.parse::<i64>().map_err(|_| format!("parse '{}' to bigint failed", self.value))
    }

    pub(crate) fn to_double(&self) -> Result<f64, String> {
        self.value.trim().parse::<f64>().map_err(|_| format!("parse '{}' to double failed", self.value))
    }

    fn to_serial(&self) -> Result<f64, String> {
        self.value.trim().parse::<f64>().map_err(|_| format!("parse '{}' to serial number failed", self.value))
    }

    /// Renders the cell as an ISO date (`YYYY-MM-DD`).
    pub(crate) fn to_date_string(&self) -> Result<String, String> {
        match self.kind {
            CellType::IsoDateTime => Ok(self.value.chars().take(10).collect()),
            _ => Ok(serial_to_datetime(self.to_serial()?, self.kind.is_1904())?.date().to_string()),
        }
    }

    /// Renders the cell as an ISO time (`HH:MM:SS[.mmm]`).
    pub(crate) fn to_time_string(&self) -> Result<String, String> {
        match self.kind {
            CellType::IsoDateTime => Ok(self.value.split_once('T').map(|(_, time)| time).unwrap_or("00:00:00").to_owned()),
            _ => Ok(format_time(self.to_serial()?.fract())),
        }
    }

    /// Renders the cell as an ISO timestamp (`YYYY-MM-DD HH:MM:SS[.mmm]`).
    pub(crate) fn to_datetime_string(&self) -> Result<String, String> {
        match self.kind {
            CellType::IsoDateTime if self.value.contains('T') => Ok(self.value.replace('T', " ")),
            CellType::IsoDateTime => Ok(format!("{} 00:00:00", self.value)),
            _ => {
                let serial = self.to_serial()?;
                let date = serial_to_datetime(serial, self.kind.is_1904())?.date();
                Ok(format!("{} {}", date, format_time(serial.fract())))
            }
        }
    }

    /// Renders the cell the way it reads in a spreadsheet application.
    pub(crate) fn to_text(&self) -> Result<String, String> {
        let text = match self.kind {
            CellType::Boolean => if self.to_boolean() { "true" } else { "false" }.to_owned(),
            CellType::NumberDateTime1900 | CellType::NumberDateTime1904 => self.to_datetime_string()?,
            CellType::NumberDate1900 | CellType::NumberDate1904 => self.to_date_string()?,
            CellType::NumberTime1900 | CellType::NumberTime1904 => self.to_time_string()?,
            CellType::IsoDateTime => self.value.replace('T', " "),
            _ => self.value.to_owned(),
        };
        Ok(text)
    }
}

/// Converts an Excel serial number to a datetime.
/// Handles the Lotus 1-2-3 leap year bug for the 1900 epoch.
fn serial_to_datetime(serial: f64, is_1904: bool) -> Result<NaiveDateTime, String> {
    let days = serial.trunc() as i64;
    let offset = if is_1904 {
        1462
    } else if days < 60 {
        1
    } else {
        0
    };
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30).expect("NaiveDate Literal");
    let date = days
        .checked_add(offset)
        .and_then(Duration::try_days)
        .and_then(|duration| epoch.checked_add_signed(duration))
        .ok_or_else(|| format!("serial date {serial} is out of range"))?;
    Ok(date.and_hms_opt(0, 0, 0).expect("Append 00:00:00"))
}

/// Formats the fractional part of a serial number as a time of day.
fn format_time(fraction: f64) -> String {
    let mut total = (fraction.abs() * 86_400_000f64).round() as i64;
    let milliseconds = total % 1_000; total /= 1_000;
    let seconds = total % 60; total /= 60;
    let minutes = total % 60; total /= 60;
    let hours = total;
    if milliseconds > 0 {
        format!("{hours:02}:{minutes:02}:{seconds:02}.{milliseconds:03}")
    } else {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    }
}
