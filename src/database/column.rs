use crate::error::SheetflowError;
use crate::spreadsheet::cell::Cell;
use crate::spreadsheet::cell::CellType;
use crate::spreadsheet::SpreadsheetError;
use duckdb::types::Value;

/// Supported column data types for ingested sheets.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ColumnType {
    /// Boolean values (true/false)
    Boolean,
    /// 64-bit signed integers
    BigInt,
    /// Double-precision floating point numbers
    Double,
    /// Variable-length strings
    Varchar,
    /// Date and time with microsecond precision
    Timestamp,
    /// Date without time component
    Date,
    /// Time without date component
    Time,
}

/// A column of an ingested table with its name and data type.
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    /// Normalized column name
    pub name: String,
    /// Column data type
    pub kind: ColumnType,
}

impl ColumnType {
    /// Returns the DuckDB type name of the column type.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::BigInt => "BIGINT",
            ColumnType::Double => "DOUBLE",
            ColumnType::Varchar => "VARCHAR",
            ColumnType::Timestamp => "TIMESTAMP",
            ColumnType::Date => "DATE",
            ColumnType::Time => "TIME",
        }
    }

    /// Infers column type from cell type and value.
    /// Handles the Excel date/time formats and numeric representations.
    pub(crate) fn from(cell_type: &CellType, value: &str) -> Option<Self> {
        match cell_type {
            CellType::Boolean => Some(ColumnType::Boolean),
            CellType::Number if Self::is_integer(value) => Some(ColumnType::BigInt),
            CellType::Number => Some(ColumnType::Double),
            CellType::NumberDateTime1900 | CellType::NumberDateTime1904 => Some(ColumnType::Timestamp),
            CellType::NumberDate1900 | CellType::NumberDate1904 => Some(ColumnType::Date),
            CellType::NumberTime1900 | CellType::NumberTime1904 => Some(ColumnType::Time),
            CellType::IsoDateTime if value.contains("T00:00:00") => Some(ColumnType::Date),
            CellType::IsoDateTime if !value.contains('T') => Some(ColumnType::Date),
            CellType::IsoDateTime => Some(ColumnType::Timestamp),
            CellType::InlineString | CellType::SharedString => Some(ColumnType::Varchar),
            CellType::Empty | CellType::Error => None,
        }
    }

    /// Checks if a numeric string represents an integer value that fits 64 bits.
    fn is_integer(value: &str) -> bool {
        let integer = match value.split_once('.') {
            Some((integer, fraction)) if fraction.chars().all(|c| c == '0') => integer,
            Some(_) => return false,
            None => value,
        };
        integer.parse::<i64>().is_ok()
    }

    /// Detects the most specific common type from a collection of candidate types.
    /// Falls back to VARCHAR if types are inconsistent or empty.
    pub(crate) fn detect(types: Vec<Option<ColumnType>>) -> ColumnType {
        let types: Vec<ColumnType> = types.into_iter().flatten().collect();
        if types.is_empty() {
            ColumnType::Varchar
        } else if types.iter().all(|kind| kind.is_boolean()) {
            ColumnType::Boolean
        } else if types.iter().all(|kind| kind.is_int()) {
            ColumnType::BigInt
        } else if types.iter().all(|kind| kind.is_float()) {
            ColumnType::Double
        } else if types.iter().all(|kind| kind.is_date()) {
            ColumnType::Date
        } else if types.iter().all(|kind| kind.is_time()) {
            ColumnType::Time
        } else if types.iter().all(|kind| kind.is_datetime()) {
            ColumnType::Timestamp
        } else {
            ColumnType::Varchar
        }
    }

    #[inline]
    pub(crate) fn is_boolean(&self) -> bool {
        matches!(self, ColumnType::Boolean)
    }

    #[inline]
    pub(crate) fn is_int(&self) -> bool {
        matches!(self, ColumnType::BigInt)
    }

    /// Returns true if this column type represents numeric values (integer or floating point).
    #[inline]
    pub(crate) fn is_float(&self) -> bool {
        matches!(self, ColumnType::BigInt | ColumnType::Double)
    }

    #[inline]
    pub(crate) fn is_date(&self) -> bool {
        matches!(self, ColumnType::Date)
    }

    #[inline]
    pub(crate) fn is_time(&self) -> bool {
        matches!(self, ColumnType::Time)
    }

    /// Returns true if this column type represents date/time related values.
    #[inline]
    pub(crate) fn is_datetime(&self) -> bool {
        matches!(self, ColumnType::Timestamp | ColumnType::Date | ColumnType::Time)
    }
}

impl Column {
    /// Converts a cell into the value appended to this column.
    /// Missing and error cells become NULL; temporal values travel as ISO text and are cast by DuckDB.
    pub(crate) fn to_value(&self, sheet_name: &str, file_name: &str, cell: Option<&Cell>) -> Result<Value, SheetflowError> {
        let cell = match cell {
            Some(cell) if cell.kind != CellType::Error && cell.kind != CellType::Empty => cell,
            _ => return Ok(Value::Null),
        };
        let mapper = |message: String| {
            SpreadsheetError::CellValueError(
                file_name.to_owned(),
                sheet_name.to_owned(),
                cell.reference(),
                message,
            )
        };
        let value = match self.kind {
            ColumnType::Varchar => Value::Text(cell.to_text().map_err(mapper)?),
            ColumnType::Boolean => Value::Boolean(cell.to_boolean()),
            ColumnType::BigInt => Value::BigInt(cell.to_bigint().map_err(mapper)?),
            ColumnType::Double => Value::Double(cell.to_double().map_err(mapper)?),
            ColumnType::Timestamp => Value::Text(cell.to_datetime_string().map_err(mapper)?),
            ColumnType::Date => Value::Text(cell.to_date_string().map_err(mapper)?),
            ColumnType::Time => Value::Text(cell.to_time_string().map_err(mapper)?),
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(kind: CellType, value: &str) -> Cell {
        Cell { row: 1, col: 0, kind, value: value.to_owned() }
    }

    #[test]
    fn detects_common_types() {
        let int = ColumnType::from(&CellType::Number, "3");
        let float = ColumnType::from(&CellType::Number, "3.5");
        let text = ColumnType::from(&CellType::InlineString, "x");
        let date = ColumnType::from(&CellType::NumberDate1900, "45658");
        let datetime = ColumnType::from(&CellType::NumberDateTime1900, "45658.5");

        assert_eq!(ColumnType::detect(vec![int, None, int]), ColumnType::BigInt);
        assert_eq!(ColumnType::detect(vec![int, float]), ColumnType::Double);
        assert_eq!(ColumnType::detect(vec![int, text]), ColumnType::Varchar);
        assert_eq!(ColumnType::detect(vec![date, datetime]), ColumnType::Timestamp);
        assert_eq!(ColumnType::detect(vec![None, None]), ColumnType::Varchar);
        assert_eq!(ColumnType::from(&CellType::Error, "#N/A"), None);
    }

    #[test]
    fn oversized_integers_are_doubles() {
        assert_eq!(ColumnType::from(&CellType::Number, "12345678901234567890"), Some(ColumnType::Double));
    }

    #[test]
    fn converts_cells_to_values() {
        let column = Column { name: "A".into(), kind: ColumnType::BigInt };
        assert_eq!(column.to_value("S", "F", Some(&cell(CellType::Number, "7"))).unwrap(), Value::BigInt(7));
        assert_eq!(column.to_value("S", "F", None).unwrap(), Value::Null);
        assert_eq!(column.to_value("S", "F", Some(&cell(CellType::Error, "#DIV/0!"))).unwrap(), Value::Null);

        let column = Column { name: "D".into(), kind: ColumnType::Date };
        assert_eq!(
            column.to_value("S", "F", Some(&cell(CellType::NumberDate1900, "45658"))).unwrap(),
            Value::Text("2025-01-01".into())
        );

        let column = Column { name: "T".into(), kind: ColumnType::Varchar };
        assert_eq!(
            column.to_value("S", "F", Some(&cell(CellType::Number, "12"))).unwrap(),
            Value::Text("12".into())
        );
    }
}
