use crate::database::column::Column;
use crate::database::table::Datum;
use crate::database::table::TabularResult;
use crate::error::ResultMessage;
use crate::error::SheetflowError;
use duckdb::appender_params_from_iter;
use duckdb::types::Value;
use duckdb::Connection;
use std::path::Path;
use std::sync::Mutex;
use std::sync::MutexGuard;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store connection lock is poisoned")]
    LockPoisoned,

    #[error("Table '{0}' needs at least one column")]
    NoColumns(String),
}

/// The relational store holding ingested sheets and anything the pipeline creates.
///
/// Backed by one embedded DuckDB connection. Every access takes the connection
/// lock, so writers from concurrent pipelines sharing a store are serialized.
pub struct Store {
    connection: Mutex<Connection>,
}

impl Store {
    /// Opens (or creates) a persistent database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Store, SheetflowError> {
        let path = path.as_ref();
        let connection = Connection::open(path)
            .map_err(SheetflowError::from)
            .with_prefix(&format!("Open database '{}'", path.display()))?;
        Ok(Store::from_connection(connection))
    }

    /// Opens a private in-memory database that disappears when the store is dropped.
    pub fn open_in_memory() -> Result<Store, SheetflowError> {
        Ok(Store::from_connection(Connection::open_in_memory()?))
    }

    fn from_connection(connection: Connection) -> Store {
        Store {
            connection: Mutex::new(connection),
        }
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>, SheetflowError> {
        self.connection.lock().map_err(|_| StoreError::LockPoisoned.into())
    }

    /// Drops and recreates `name` with the given columns, then appends `rows`.
    /// Runs in a single transaction: readers see either the old table or the complete new one.
    pub fn replace_table(&self, name: &str, columns: &[Column], rows: Vec<Vec<Value>>) -> Result<usize, SheetflowError> {
        if columns.is_empty() {
            Err(StoreError::NoColumns(name.to_owned()))?
        }
        let definitions = columns
            .iter()
            .map(|column| format!("{} {}", quote_identifier(&column.name), column.kind.as_str()))
            .collect::<Vec<_>>()
            .join(", ");

        let mut connection = self.lock()?;
        let transaction = connection.transaction()?;
        transaction.execute_batch(&format!("CREATE OR REPLACE TABLE {} ({definitions})", quote_identifier(name)))?;
        let count = rows.len();
        {
            let mut appender = transaction.appender(name)?;
            for row in rows {
                appender.append_row(appender_params_from_iter(row))?;
            }
            appender.flush()?;
        }
        transaction.commit()?;
        Ok(count)
    }

    /// Lists every table of the main schema with its columns in ordinal order, tables sorted by name.
    pub fn catalog(&self) -> Result<Vec<(String, Vec<String>)>, SheetflowError> {
        let connection = self.lock()?;
        let mut statement = connection.prepare(
            "SELECT table_name, column_name FROM information_schema.columns \
             WHERE table_schema = 'main' AND table_catalog = current_database() \
             ORDER BY table_name, ordinal_position",
        )?;
        let mut rows = statement.query([])?;
        let mut catalog = Vec::<(String, Vec<String>)>::new();
        while let Some(row) = rows.next()? {
            let table: String = row.get(0)?;
            let column: String = row.get(1)?;
            match catalog.last_mut() {
                Some((name, columns)) if *name == table => columns.push(column),
                _ => catalog.push((table, vec![column])),
            }
        }
        Ok(catalog)
    }

    pub fn table_names(&self) -> Result<Vec<String>, SheetflowError> {
        Ok(self.catalog()?.into_iter().map(|(name, _)| name).collect())
    }

    /// Runs a row-returning statement and collects the whole result.
    pub fn query(&self, sql: &str) -> Result<TabularResult, SheetflowError> {
        let connection = self.lock()?;
        let mut statement = connection.prepare(sql)?;
        let mut rows = statement.query([])?;
        let columns: Vec<String> = rows
            .as_ref()
            .map(|statement| statement.column_names())
            .unwrap_or_default();
        let mut records = Vec::<Vec<Datum>>::new();
        while let Some(row) = rows.next()? {
            let mut record = Vec::with_capacity(columns.len());
            for index in 0..columns.len() {
                record.push(Datum::from(row.get::<_, Value>(index)?));
            }
            records.push(record);
        }
        Ok(TabularResult::new(columns, records))
    }

    /// Runs a statement for its effect only.
    pub fn execute(&self, sql: &str) -> Result<(), SheetflowError> {
        self.lock()?.execute_batch(sql)?;
        Ok(())
    }
}

/// Quotes an identifier for DuckDB, doubling embedded quotes.
pub(crate) fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::column::ColumnType;

    fn columns() -> Vec<Column> {
        vec![
            Column { name: "MATRICULA".into(), kind: ColumnType::BigInt },
            Column { name: "NAME".into(), kind: ColumnType::Varchar },
            Column { name: "ADMISSION".into(), kind: ColumnType::Date },
        ]
    }

    fn rows() -> Vec<Vec<Value>> {
        vec![
            vec![Value::BigInt(1), Value::Text("Ana".into()), Value::Text("2024-03-01".into())],
            vec![Value::BigInt(2), Value::Null, Value::Null],
        ]
    }

    #[test]
    fn replace_table_is_idempotent() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.replace_table("T", &columns(), rows()).unwrap(), 2);
        assert_eq!(store.replace_table("T", &columns(), rows()).unwrap(), 2);

        let result = store.query("SELECT * FROM T ORDER BY MATRICULA").unwrap();
        assert_eq!(result.columns(), ["MATRICULA", "NAME", "ADMISSION"]);
        assert_eq!(result.len(), 2);
        assert_eq!(
            result.rows()[0],
            vec![Datum::Int(1), Datum::Text("Ana".into()), Datum::Text("2024-03-01".into())]
        );
        assert_eq!(result.rows()[1], vec![Datum::Int(2), Datum::Null, Datum::Null]);
    }

    #[test]
    fn catalog_orders_tables_and_columns() {
        let store = Store::open_in_memory().unwrap();
        store.replace_table("ZETA", &columns(), Vec::new()).unwrap();
        store.execute("CREATE TABLE ALPHA (B INTEGER, A VARCHAR)").unwrap();

        let catalog = store.catalog().unwrap();
        assert_eq!(
            catalog,
            vec![
                ("ALPHA".to_string(), vec!["B".to_string(), "A".to_string()]),
                ("ZETA".to_string(), vec!["MATRICULA".to_string(), "NAME".to_string(), "ADMISSION".to_string()]),
            ]
        );
        assert_eq!(store.table_names().unwrap(), vec!["ALPHA", "ZETA"]);
    }

    #[test]
    fn tables_without_columns_are_rejected() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.replace_table("EMPTY", &[], Vec::new()).is_err());
    }

    #[test]
    fn identifiers_are_quoted() {
        assert_eq!(quote_identifier("A\"B"), "\"A\"\"B\"");
    }
}
