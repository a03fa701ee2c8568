use chrono::DateTime;
use chrono::Duration;
use chrono::NaiveDate;
use chrono::NaiveTime;
use duckdb::types::TimeUnit;
use duckdb::types::Value;
use serde::Serialize;
use serde::Serializer;
use serde_json::Map;
use std::collections::HashSet;
use std::fmt;

/// A single value of a [`TabularResult`].
#[derive(Clone, Debug, PartialEq)]
pub enum Datum {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Datum {
    /// Converts the value to its JSON counterpart; non-finite floats become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Datum::Null => serde_json::Value::Null,
            Datum::Bool(value) => serde_json::Value::Bool(*value),
            Datum::Int(value) => serde_json::Value::from(*value),
            Datum::Float(value) => serde_json::Number::from_f64(*value)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Datum::Text(value) => serde_json::Value::String(value.to_owned()),
        }
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Null => Ok(()),
            Datum::Bool(value) => write!(f, "{value}"),
            Datum::Int(value) => write!(f, "{value}"),
            Datum::Float(value) => write!(f, "{value}"),
            Datum::Text(value) => f.write_str(value),
        }
    }
}

impl Serialize for Datum {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Datum::Null => serializer.serialize_none(),
            Datum::Bool(value) => serializer.serialize_bool(*value),
            Datum::Int(value) => serializer.serialize_i64(*value),
            Datum::Float(value) if value.is_finite() => serializer.serialize_f64(*value),
            Datum::Float(_) => serializer.serialize_none(),
            Datum::Text(value) => serializer.serialize_str(value),
        }
    }
}

impl From<Value> for Datum {
    /// Maps a DuckDB value onto the scalar set of a result row.
    /// Temporal values are rendered as ISO text, decimals as floats.
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Datum::Null,
            Value::Boolean(value) => Datum::Bool(value),
            Value::TinyInt(value) => Datum::Int(value.into()),
            Value::SmallInt(value) => Datum::Int(value.into()),
            Value::Int(value) => Datum::Int(value.into()),
            Value::BigInt(value) => Datum::Int(value),
            Value::UTinyInt(value) => Datum::Int(value.into()),
            Value::USmallInt(value) => Datum::Int(value.into()),
            Value::UInt(value) => Datum::Int(value.into()),
            Value::UBigInt(value) => i64::try_from(value)
                .map(Datum::Int)
                .unwrap_or(Datum::Float(value as f64)),
            Value::HugeInt(value) => i64::try_from(value)
                .map(Datum::Int)
                .unwrap_or(Datum::Float(value as f64)),
            Value::Float(value) => Datum::Float(value.into()),
            Value::Double(value) => Datum::Float(value),
            Value::Decimal(value) => {
                let text = value.to_string();
                text.parse::<f64>().map(Datum::Float).unwrap_or(Datum::Text(text))
            }
            Value::Text(value) | Value::Enum(value) => Datum::Text(value),
            Value::Date32(days) => {
                let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).expect("Hardcode 1970-01-01");
                Duration::try_days(days.into())
                    .and_then(|duration| epoch.checked_add_signed(duration))
                    .map(|date| Datum::Text(date.to_string()))
                    .unwrap_or(Datum::Null)
            }
            Value::Timestamp(unit, value) => DateTime::from_timestamp_micros(to_micros(&unit, value))
                .map(|datetime| Datum::Text(datetime.naive_utc().to_string()))
                .unwrap_or(Datum::Null),
            Value::Time64(unit, value) => {
                let micros = to_micros(&unit, value);
                let seconds = micros.div_euclid(1_000_000) as u32;
                let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
                NaiveTime::from_num_seconds_from_midnight_opt(seconds, nanos)
                    .map(|time| Datum::Text(time.to_string()))
                    .unwrap_or(Datum::Null)
            }
            Value::Blob(bytes) => Datum::Text(String::from_utf8_lossy(&bytes).into_owned()),
            other => Datum::Text(format!("{other:?}")),
        }
    }
}

fn to_micros(unit: &TimeUnit, value: i64) -> i64 {
    match unit {
        TimeUnit::Second => value.saturating_mul(1_000_000),
        TimeUnit::Millisecond => value.saturating_mul(1_000),
        TimeUnit::Microsecond => value,
        TimeUnit::Nanosecond => value / 1_000,
    }
}

/// An in-memory row set with uniquely named, ordered columns.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TabularResult {
    columns: Vec<String>,
    rows: Vec<Vec<Datum>>,
}

impl TabularResult {
    /// Builds a result, renaming duplicate column names with `_1`, `_2`, ... suffixes
    /// and padding or truncating rows to the column count.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Datum>>) -> Self {
        let columns = unique_names(columns);
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Datum::Null);
                row
            })
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Datum>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Renders the first `limit` rows as ordered column→value objects.
    pub fn records(&self, limit: usize) -> Vec<Map<String, serde_json::Value>> {
        self.rows
            .iter()
            .take(limit)
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row)
                    .map(|(column, datum)| (column.to_owned(), datum.to_json()))
                    .collect()
            })
            .collect()
    }
}

/// Makes names unique in order of appearance. The first occurrence keeps its name.
pub(crate) fn unique_names(names: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::<String>::new();
    let mut result = Vec::with_capacity(names.len());
    for name in names {
        let mut candidate = name.to_owned();
        let mut suffix = 0usize;
        while seen.contains(&candidate) {
            suffix += 1;
            candidate = format!("{name}_{suffix}");
        }
        seen.insert(candidate.to_owned());
        result.push(candidate);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_columns_get_suffixes() {
        let result = TabularResult::new(
            vec!["A".into(), "B".into(), "A".into(), "A_1".into()],
            vec![vec![Datum::Int(1)]],
        );
        assert_eq!(result.columns(), ["A", "B", "A_1", "A_1_1"]);
        assert_eq!(result.rows()[0], vec![Datum::Int(1), Datum::Null, Datum::Null, Datum::Null]);
    }

    #[test]
    fn records_keep_column_order() {
        let result = TabularResult::new(
            vec!["Z".into(), "A".into()],
            vec![
                vec![Datum::Int(1), Datum::Text("x".into())],
                vec![Datum::Int(2), Datum::Null],
            ],
        );
        let records = result.records(1);
        assert_eq!(records.len(), 1);
        assert_eq!(serde_json::to_string(&records[0]).unwrap(), r#"{"Z":1,"A":"x"}"#);
    }

    #[test]
    fn duckdb_values_map_to_data() {
        assert_eq!(Datum::from(Value::HugeInt(42)), Datum::Int(42));
        assert_eq!(Datum::from(Value::Int(-3)), Datum::Int(-3));
        assert_eq!(Datum::from(Value::Date32(0)), Datum::Text("1970-01-01".into()));
        assert_eq!(Datum::from(Value::Date32(i32::MAX)), Datum::Null);
        assert_eq!(
            Datum::from(Value::Timestamp(TimeUnit::Microsecond, 86_400_000_000 + 3_600_000_000)),
            Datum::Text("1970-01-02 01:00:00".into())
        );
        assert_eq!(
            Datum::from(Value::Time64(TimeUnit::Microsecond, 45_296_000_000)),
            Datum::Text("12:34:56".into())
        );
    }

    #[test]
    fn display_and_serialize() {
        assert_eq!(Datum::Null.to_string(), "");
        assert_eq!(Datum::Float(1.5).to_string(), "1.5");
        assert_eq!(serde_json::to_string(&Datum::Float(f64::NAN)).unwrap(), "null");
        assert_eq!(serde_json::to_string(&Datum::Text("ção".into())).unwrap(), "\"ção\"");
    }
}
