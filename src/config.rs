use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::format::XlsxWire;
use crate::generator::ChatGeneratorConfig;
use crate::generator::DEFAULT_GENERATOR_MODEL;
use crate::generator::DEFAULT_GENERATOR_URL;
use crate::pipeline::handler::PipelineOptions;

#[derive(Debug, Parser)]
#[command(author, version, about = "Load a spreadsheet archive and run a query pipeline over it", long_about = None)]
pub struct Cli {
    /// ZIP archive holding the .xlsx/.xlsm workbooks to ingest
    #[arg(short, long)]
    pub archive: PathBuf,
    /// JSON file with the steps, e.g. `[{"agent": "executor", "prompt": "SELECT 1"}]`
    #[arg(short, long)]
    pub steps: PathBuf,
    /// Persistent DuckDB file; an isolated in-memory store is used when absent
    #[arg(short, long, env = "SHEETFLOW_DATABASE")]
    pub database: Option<PathBuf>,
    /// Wire representation of xlsx output
    #[arg(long, value_enum, env = "SHEETFLOW_XLSX_ENCODING", default_value_t = XlsxWire::Base64)]
    pub xlsx_encoding: XlsxWire,
    /// Rows shown in the trace of an execute step
    #[arg(long, default_value_t = 5)]
    pub preview_rows: usize,
    /// Base URL of the chat-completions endpoint
    #[arg(long, env = "SHEETFLOW_GENERATOR_URL", default_value = DEFAULT_GENERATOR_URL)]
    pub generator_url: String,
    /// Model asked for query text
    #[arg(long, env = "SHEETFLOW_GENERATOR_MODEL", default_value = DEFAULT_GENERATOR_MODEL)]
    pub generator_model: String,
    /// Sampling temperature of the model
    #[arg(long, default_value_t = 0.0)]
    pub generator_temperature: f32,
    /// Request timeout in seconds
    #[arg(long, default_value_t = 60)]
    pub generator_timeout: u64,
    /// API key of the chat-completions endpoint
    #[arg(long, env = "MISTRAL_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
    /// File receiving the final value (formatted output, or csv of a final table)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Pretty-print the response JSON
    #[arg(long)]
    pub pretty: bool,
}

impl Cli {
    pub fn generator_config(&self) -> ChatGeneratorConfig {
        ChatGeneratorConfig {
            url: self.generator_url.to_owned(),
            model: self.generator_model.to_owned(),
            temperature: self.generator_temperature,
            api_key: self.api_key.to_owned(),
            timeout: Duration::from_secs(self.generator_timeout),
        }
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            xlsx_wire: self.xlsx_encoding,
            preview_rows: self.preview_rows,
        }
    }
}
