use crate::database::store::Store;
use crate::error::SheetflowError;

/// Describes the current catalog of the store, one line per table:
/// `Table: <NAME> | Columns: <C1>, <C2>, ...`.
///
/// Always read fresh from the store since earlier steps may have altered the schema.
pub fn describe(store: &Store) -> Result<String, SheetflowError> {
    Ok(render_catalog(&store.catalog()?))
}

pub(crate) fn render_catalog(catalog: &[(String, Vec<String>)]) -> String {
    catalog
        .iter()
        .map(|(table, columns)| format!("Table: {table} | Columns: {}", columns.join(", ")))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_one_line_per_table() {
        let catalog = vec![
            ("A".to_string(), vec!["X".to_string(), "Y".to_string()]),
            ("B".to_string(), vec!["Z".to_string()]),
        ];
        assert_eq!(render_catalog(&catalog), "Table: A | Columns: X, Y\nTable: B | Columns: Z");
        assert_eq!(render_catalog(&[]), "");
    }

    #[test]
    fn describe_reflects_schema_changes() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(describe(&store).unwrap(), "");

        store.execute("CREATE TABLE T (MATRICULA BIGINT, NAME VARCHAR)").unwrap();
        assert_eq!(describe(&store).unwrap(), "Table: T | Columns: MATRICULA, NAME");

        store.execute("ALTER TABLE T RENAME COLUMN NAME TO FULL_NAME").unwrap();
        assert_eq!(describe(&store).unwrap(), "Table: T | Columns: MATRICULA, FULL_NAME");
    }
}
