//! # Pipeline Orchestrator
//!
//! Ingests an archive once, then runs the requested steps strictly in order,
//! threading a single [`LastResult`] through them and recording one
//! [`TraceEntry`] per step. Only ingestion failures escape; every step failure
//! is captured in the trace.
pub mod handler;
pub mod step;

use crate::database::executor::StatementReport;
use crate::database::store::Store;
use crate::generator::QueryGenerator;
use crate::ingest::ingest_archive;
use crate::ingest::IngestError;
use crate::ingest::IngestReport;
use crate::pipeline::handler::handler_for;
use crate::pipeline::handler::PipelineOptions;
use crate::pipeline::handler::StepContext;
use crate::pipeline::step::LastResult;
use crate::pipeline::step::Step;
use serde::Serialize;
use serde_json::Value;

/// Trace record of one step: `{step, agent, prompt, output}` or `{step, agent, prompt, error}`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TraceEntry {
    /// 1-based position of the step
    pub step: usize,
    pub agent: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statements: Option<Vec<StatementReport>>,
}

/// Response returned to the caller.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PipelineResponse {
    pub results: Vec<TraceEntry>,
    /// Tables present in the store after the last step
    pub tables: Vec<String>,
}

/// Everything one invocation produced.
#[derive(Debug)]
pub struct PipelineRun {
    pub response: PipelineResponse,
    pub ingest: IngestReport,
    pub last: LastResult,
}

pub struct Pipeline<'a> {
    store: &'a Store,
    generator: &'a dyn QueryGenerator,
    options: PipelineOptions,
}

impl<'a> Pipeline<'a> {
    pub fn new(store: &'a Store, generator: &'a dyn QueryGenerator) -> Pipeline<'a> {
        Pipeline {
            store,
            generator,
            options: PipelineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Pipeline<'a> {
        self.options = options;
        self
    }

    /// Ingests `archive` into the store, then runs `steps`.
    pub fn run(&self, archive: &[u8], steps: &[Step]) -> Result<PipelineRun, IngestError> {
        let ingest = ingest_archive(self.store, archive)?;
        log::info!("Ingested {} table(s), skipped {} member(s)", ingest.tables.len(), ingest.skipped.len());
        let (results, last) = self.run_steps(steps);
        let tables = self.store.table_names().unwrap_or_else(|error| {
            log::warn!("List tables failed: {error}");
            Vec::new()
        });
        Ok(PipelineRun {
            response: PipelineResponse { results, tables },
            ingest,
            last,
        })
    }

    /// Runs `steps` against the current store contents, one after another.
    pub fn run_steps(&self, steps: &[Step]) -> (Vec<TraceEntry>, LastResult) {
        let context = StepContext {
            store: self.store,
            generator: self.generator,
            options: self.options,
        };
        let mut last = LastResult::Empty;
        let mut results = Vec::with_capacity(steps.len());
        for (index, step) in steps.iter().enumerate() {
            log::info!("Step {}: {} ({})", index + 1, step.agent, last.name());
            let entry = match step.kind() {
                Some(kind) => {
                    let outcome = handler_for(kind).handle(std::mem::take(&mut last), &step.prompt, &context);
                    last = outcome.last;
                    let (output, error) = match outcome.result {
                        Ok(output) => (Some(output), None),
                        Err(error) => (None, Some(error)),
                    };
                    TraceEntry {
                        step: index + 1,
                        agent: step.agent.to_owned(),
                        prompt: outcome.prompt.unwrap_or_else(|| step.prompt.to_owned()),
                        output,
                        error,
                        statements: outcome.statements,
                    }
                }
                None => TraceEntry {
                    step: index + 1,
                    agent: step.agent.to_owned(),
                    prompt: step.prompt.to_owned(),
                    output: None,
                    error: Some(format!("unknown agent '{}'", step.agent)),
                    statements: None,
                },
            };
            if let Some(error) = &entry.error {
                log::warn!("Step {} ({}) failed: {error}", entry.step, entry.agent);
            }
            results.push(entry);
        }
        (results, last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::GeneratorError;

    fn echo(instruction: &str, _: &str) -> Result<String, GeneratorError> {
        Ok(instruction.to_owned())
    }

    #[test]
    fn one_entry_per_step_in_order() {
        let store = Store::open_in_memory().unwrap();
        let pipeline = Pipeline::new(&store, &echo);
        let steps = vec![
            Step::new("formatter", "csv"),
            Step::new("summarizer", "x"),
            Step::new("sql_generator", "SELECT 1 AS A"),
            Step::new("executor", ""),
            Step::new("formatter", "json"),
        ];
        let (results, last) = pipeline.run_steps(&steps);

        assert_eq!(results.len(), steps.len());
        let numbers: Vec<usize> = results.iter().map(|entry| entry.step).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
        assert!(results[0].error.is_some());
        assert_eq!(results[1].error.as_deref(), Some("unknown agent 'summarizer'"));
        assert_eq!(results[3].prompt, "SELECT 1 AS A");
        assert_eq!(results[4].output, Some(Value::String(r#"[{"A":1}]"#.into())));
        assert_eq!(last.name(), "formatted");
    }

    #[test]
    fn trace_entries_serialize_output_or_error() {
        let store = Store::open_in_memory().unwrap();
        let pipeline = Pipeline::new(&store, &echo);
        let (results, _) = pipeline.run_steps(&[Step::new("sql_generator", "SELECT 1"), Step::new("other", "")]);
        assert_eq!(
            serde_json::to_value(&results).unwrap(),
            serde_json::json!([
                {"step": 1, "agent": "sql_generator", "prompt": "SELECT 1", "output": "SELECT 1"},
                {"step": 2, "agent": "other", "prompt": "", "error": "unknown agent 'other'"},
            ])
        );
    }
}
