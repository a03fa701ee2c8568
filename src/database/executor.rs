use crate::database::sanitize::returns_rows;
use crate::database::sanitize::sanitize_query;
use crate::database::sanitize::split_statements;
use crate::database::store::Store;
use crate::database::table::TabularResult;
use serde::Serialize;

/// Result of running one statement of a batch.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// The statement produced a row set (possibly empty).
    Rows { statement: String, result: TabularResult },
    /// The statement ran for its effect.
    Executed { statement: String },
    /// The statement raised; later statements still ran.
    Failed { statement: String, message: String },
}

/// Serializable summary of an [`Outcome`], as listed in a step trace.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StatementReport {
    pub statement: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Outcome {
    pub fn statement(&self) -> &str {
        match self {
            Outcome::Rows { statement, .. } | Outcome::Executed { statement } | Outcome::Failed { statement, .. } => statement,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed { .. })
    }

    pub fn report(&self) -> StatementReport {
        let (status, rows, error) = match self {
            Outcome::Rows { result, .. } => ("rows", Some(result.len()), None),
            Outcome::Executed { .. } => ("executed", None, None),
            Outcome::Failed { message, .. } => ("failed", None, Some(message.to_owned())),
        };
        StatementReport {
            statement: self.statement().to_owned(),
            status,
            rows,
            error,
        }
    }
}

/// Ordered outcomes of one executed batch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchResult {
    pub outcomes: Vec<Outcome>,
}

impl BatchResult {
    /// The row set of the last outcome, if the last statement produced one.
    pub fn last_table(&self) -> Option<&TabularResult> {
        match self.outcomes.last() {
            Some(Outcome::Rows { result, .. }) => Some(result),
            _ => None,
        }
    }

    pub fn into_last_table(mut self) -> Option<TabularResult> {
        match self.outcomes.pop() {
            Some(Outcome::Rows { result, .. }) => Some(result),
            _ => None,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &Outcome> {
        self.outcomes.iter().filter(|outcome| outcome.is_failed())
    }

    /// One line per failed statement, `None` when every statement succeeded.
    pub fn error_summary(&self) -> Option<String> {
        let lines: Vec<String> = self
            .outcomes
            .iter()
            .enumerate()
            .filter_map(|(index, outcome)| match outcome {
                Outcome::Failed { statement, message } => {
                    Some(format!("statement {} failed: {message} [{statement}]", index + 1))
                }
                _ => None,
            })
            .collect();
        if lines.is_empty() {
            None
        } else {
            Some(lines.join("\n"))
        }
    }

    pub fn reports(&self) -> Vec<StatementReport> {
        self.outcomes.iter().map(Outcome::report).collect()
    }
}

/// Sanitizes `text`, splits it into statements and runs each one in order.
///
/// Every statement commits on its own. A failing statement is recorded and
/// the remaining statements still run; nothing already applied is rolled back.
pub fn execute(store: &Store, text: &str) -> BatchResult {
    let statements = split_statements(&sanitize_query(text));
    let outcomes = statements
        .into_iter()
        .map(|statement| execute_statement(store, statement))
        .collect();
    BatchResult { outcomes }
}

fn execute_statement(store: &Store, statement: String) -> Outcome {
    log::debug!("Execute statement: {statement}");
    let result = if returns_rows(&statement) {
        store.query(&statement).map(Some)
    } else {
        store.execute(&statement).map(|_| None)
    };
    match result {
        Ok(Some(result)) if !result.columns().is_empty() => Outcome::Rows { statement, result },
        Ok(_) => Outcome::Executed { statement },
        Err(error) => {
            log::error!("Statement failed: {error} [{statement}]");
            Outcome::Failed {
                statement,
                message: error.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::table::Datum;

    #[test]
    fn failing_statement_does_not_stop_the_batch() {
        let store = Store::open_in_memory().unwrap();
        let batch = execute(
            &store,
            "CREATE TABLE T (A INTEGER); INSERT INTO T VALUES (1); SELECT * FROM MISSING; INSERT INTO T VALUES (2); SELECT A FROM T ORDER BY A",
        );

        assert_eq!(batch.outcomes.len(), 5);
        assert!(matches!(batch.outcomes[0], Outcome::Executed { .. }));
        assert!(matches!(batch.outcomes[1], Outcome::Executed { .. }));
        assert!(batch.outcomes[2].is_failed());
        assert_eq!(batch.outcomes[2].statement(), "SELECT * FROM MISSING");
        assert!(matches!(batch.outcomes[3], Outcome::Executed { .. }));
        assert_eq!(batch.failures().count(), 1);

        let table = batch.last_table().unwrap();
        assert_eq!(table.rows(), [vec![Datum::Int(1)], vec![Datum::Int(2)]]);

        let summary = batch.error_summary().unwrap();
        assert!(summary.starts_with("statement 3 failed: "));
        assert!(summary.ends_with("[SELECT * FROM MISSING]"));
    }

    #[test]
    fn last_outcome_decides_the_table() {
        let store = Store::open_in_memory().unwrap();
        let batch = execute(&store, "SELECT 1 AS X; CREATE TABLE U (B VARCHAR)");
        assert!(batch.last_table().is_none());
        assert!(batch.into_last_table().is_none());

        let batch = execute(&store, "```sql\nSELECT * FROM U\n```");
        let table = batch.last_table().unwrap();
        assert_eq!(table.columns(), ["B"]);
        assert!(table.is_empty());
        assert_eq!(batch.error_summary(), None);
    }

    #[test]
    fn reports_describe_each_statement() {
        let store = Store::open_in_memory().unwrap();
        let batch = execute(&store, "SELECT 1 AS X; DROP TABLE NOPE");
        let reports = batch.reports();
        assert_eq!(reports[0].status, "rows");
        assert_eq!(reports[0].rows, Some(1));
        assert_eq!(reports[1].status, "failed");
        assert!(reports[1].error.is_some());
        assert!(execute(&store, "  ").outcomes.is_empty());
    }
}
