//! Step handlers: one per [`StepKind`], all with the same signature.
use crate::database::executor;
use crate::database::executor::StatementReport;
use crate::database::sanitize::is_query_text;
use crate::database::schema;
use crate::database::store::Store;
use crate::format;
use crate::format::Encoding;
use crate::format::FormatError;
use crate::format::XlsxWire;
use crate::generator::QueryGenerator;
use crate::pipeline::step::LastResult;
use crate::pipeline::step::StepKind;
use serde_json::Value;

/// Status recorded when an execute step ends without a row set.
pub const STATUS_OK: &str = "OK";

/// Tunables shared by every step of a pipeline.
#[derive(Copy, Clone, Debug)]
pub struct PipelineOptions {
    pub xlsx_wire: XlsxWire,
    /// Rows shown in the trace output of an execute step
    pub preview_rows: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        PipelineOptions {
            xlsx_wire: XlsxWire::default(),
            preview_rows: 5,
        }
    }
}

/// Everything a handler may touch besides the threaded value.
pub struct StepContext<'a> {
    pub store: &'a Store,
    pub generator: &'a dyn QueryGenerator,
    pub options: PipelineOptions,
}

/// What a handler hands back: the next value plus what the trace records.
#[derive(Debug)]
pub struct StepOutcome {
    pub last: LastResult,
    /// Replaces the caller's instruction in the trace when set
    pub prompt: Option<String>,
    pub result: Result<Value, String>,
    pub statements: Option<Vec<StatementReport>>,
}

impl StepOutcome {
    fn success(last: LastResult, output: Value) -> StepOutcome {
        StepOutcome { last, prompt: None, result: Ok(output), statements: None }
    }

    /// A failed step leaves the threaded value as it was.
    fn failure(last: LastResult, error: impl ToString) -> StepOutcome {
        StepOutcome { last, prompt: None, result: Err(error.to_string()), statements: None }
    }
}

pub trait StepHandler: Sync {
    fn handle(&self, last: LastResult, instruction: &str, context: &StepContext) -> StepOutcome;
}

/// Handler bound to a step kind.
pub fn handler_for(kind: StepKind) -> &'static dyn StepHandler {
    match kind {
        StepKind::Generate => &GenerateHandler,
        StepKind::Execute => &ExecuteHandler,
        StepKind::Format => &FormatHandler,
    }
}

/// Describes the current schema and asks the generator for query text.
pub struct GenerateHandler;

impl StepHandler for GenerateHandler {
    fn handle(&self, last: LastResult, instruction: &str, context: &StepContext) -> StepOutcome {
        let catalog = match schema::describe(context.store) {
            Ok(catalog) => catalog,
            Err(error) => return StepOutcome::failure(last, error),
        };
        match context.generator.generate(instruction, &catalog) {
            Ok(query) => {
                let output = Value::String(query.to_owned());
                StepOutcome::success(LastResult::Query(query), output)
            }
            Err(error) => StepOutcome::failure(last, error),
        }
    }
}

/// Runs the instruction, or the last generated query when the instruction is not query text.
pub struct ExecuteHandler;

impl ExecuteHandler {
    fn resolve(last: &LastResult, instruction: &str) -> Option<String> {
        if is_query_text(instruction) {
            Some(instruction.to_owned())
        } else {
            last.as_query().map(str::to_owned)
        }
    }
}

impl StepHandler for ExecuteHandler {
    fn handle(&self, last: LastResult, instruction: &str, context: &StepContext) -> StepOutcome {
        let Some(query) = ExecuteHandler::resolve(&last, instruction) else {
            return StepOutcome::failure(last, "no query to execute: the instruction is not a query and no query was generated");
        };

        let batch = executor::execute(context.store, &query);
        if batch.outcomes.is_empty() {
            let mut outcome = StepOutcome::failure(last, "no statements to execute");
            outcome.prompt = Some(query);
            return outcome;
        }

        let statements = batch.reports();
        let error = batch.error_summary();
        let (next, output) = match batch.into_last_table() {
            Some(table) => {
                let preview = Value::Array(table.records(context.options.preview_rows).into_iter().map(Value::Object).collect());
                (LastResult::Table(table), preview)
            }
            None => (LastResult::Status(STATUS_OK.to_owned()), Value::String(STATUS_OK.to_owned())),
        };
        StepOutcome {
            last: next,
            prompt: Some(query),
            result: error.map_or(Ok(output), Err),
            statements: Some(statements),
        }
    }
}

/// Encodes the current table with the encoding named by the instruction.
pub struct FormatHandler;

impl StepHandler for FormatHandler {
    fn handle(&self, last: LastResult, instruction: &str, context: &StepContext) -> StepOutcome {
        let table = match last {
            LastResult::Table(table) => table,
            other => return StepOutcome::failure(other, FormatError::NothingToFormat),
        };
        match format::format(&table, Encoding::parse(instruction), context.options.xlsx_wire) {
            Ok(value) => {
                let output = value.to_json();
                StepOutcome::success(LastResult::Formatted(value), output)
            }
            Err(error) => StepOutcome::failure(LastResult::Table(table), error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::table::Datum;
    use crate::database::table::TabularResult;
    use crate::format::FormattedValue;
    use crate::generator::GeneratorError;

    fn context<'a>(store: &'a Store, generator: &'a dyn QueryGenerator) -> StepContext<'a> {
        StepContext { store, generator, options: PipelineOptions::default() }
    }

    fn fixed(_: &str, _: &str) -> Result<String, GeneratorError> {
        Ok("SELECT 42 AS ANSWER".to_owned())
    }

    #[test]
    fn generate_passes_the_catalog() {
        let store = Store::open_in_memory().unwrap();
        store.execute("CREATE TABLE T (A INTEGER)").unwrap();
        let generator = |instruction: &str, schema: &str| -> Result<String, GeneratorError> {
            Ok(format!("{instruction} | {schema}"))
        };
        let outcome = GenerateHandler.handle(LastResult::Empty, "count", &context(&store, &generator));
        assert_eq!(outcome.last, LastResult::Query("count | Table: T | Columns: A".into()));
        assert_eq!(outcome.result.unwrap(), Value::String("count | Table: T | Columns: A".into()));
    }

    #[test]
    fn generate_failure_keeps_the_last_result() {
        let store = Store::open_in_memory().unwrap();
        let generator = |_: &str, _: &str| -> Result<String, GeneratorError> { Err(GeneratorError::EmptyResponse) };
        let last = LastResult::Status(STATUS_OK.into());
        let outcome = GenerateHandler.handle(last.clone(), "x", &context(&store, &generator));
        assert_eq!(outcome.last, last);
        assert_eq!(outcome.result.unwrap_err(), "generator returned no query text");
    }

    #[test]
    fn execute_resolves_prose_to_the_last_query() {
        let store = Store::open_in_memory().unwrap();
        let outcome = ExecuteHandler.handle(
            LastResult::Query("SELECT 1 AS X".into()),
            "run it",
            &context(&store, &fixed),
        );
        assert_eq!(outcome.prompt.as_deref(), Some("SELECT 1 AS X"));
        assert_eq!(
            outcome.last,
            LastResult::Table(TabularResult::new(vec!["X".into()], vec![vec![Datum::Int(1)]]))
        );
        assert_eq!(outcome.result.unwrap(), serde_json::json!([{"X": 1}]));
    }

    #[test]
    fn execute_without_query_fails() {
        let store = Store::open_in_memory().unwrap();
        let outcome = ExecuteHandler.handle(LastResult::Empty, "", &context(&store, &fixed));
        assert_eq!(outcome.last, LastResult::Empty);
        assert!(outcome.result.is_err());
        assert!(outcome.statements.is_none());
    }

    #[test]
    fn execute_mutation_yields_status() {
        let store = Store::open_in_memory().unwrap();
        let outcome = ExecuteHandler.handle(LastResult::Empty, "CREATE TABLE U (A INTEGER)", &context(&store, &fixed));
        assert_eq!(outcome.last, LastResult::Status(STATUS_OK.into()));
        assert_eq!(outcome.result.unwrap(), Value::String(STATUS_OK.into()));
        assert_eq!(outcome.statements.unwrap().len(), 1);
    }

    #[test]
    fn format_requires_a_table() {
        let store = Store::open_in_memory().unwrap();
        let outcome = FormatHandler.handle(LastResult::Status(STATUS_OK.into()), "csv", &context(&store, &fixed));
        assert_eq!(outcome.last, LastResult::Status(STATUS_OK.into()));
        assert!(outcome.result.unwrap_err().starts_with("nothing to format"));

        let table = TabularResult::new(vec!["A".into()], vec![vec![Datum::Int(1)]]);
        let outcome = FormatHandler.handle(LastResult::Table(table), "csv", &context(&store, &fixed));
        assert_eq!(outcome.last, LastResult::Formatted(FormattedValue::Text("A\n1\n".into())));
    }
}
