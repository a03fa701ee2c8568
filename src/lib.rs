//! # sheetflow
//!
//! Loads an archive of spreadsheets into an embedded DuckDB store and runs a
//! short pipeline of steps over it: generate query text from an instruction,
//! execute queries with per-statement fault isolation, and format the result
//! as csv, json, aligned text or an xlsx workbook.
//!
//! ## Steps
//!
//! - `sql_generator`: describe the current schema and ask the query generator for query text
//! - `executor`: run the instruction, or the last generated query, statement by statement
//! - `formatter`: encode the current table (`csv`, `json`, `table`, `xlsx`)
pub mod config;
pub mod database;
pub mod error;
pub mod format;
pub mod generator;
mod helpers;
pub mod ingest;
pub mod pipeline;
mod spreadsheet;

use std::fs;
use std::io::Write;
use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::LevelFilter;

use crate::config::Cli;
use crate::database::store::Store;
use crate::generator::ChatGenerator;
use crate::pipeline::step::LastResult;
use crate::pipeline::step::Step;
use crate::pipeline::Pipeline;

pub use crate::error::SheetflowError;
pub use crate::spreadsheet::is_spreadsheet_name;
pub use crate::spreadsheet::SpreadsheetError;

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("sheetflow", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let archive = fs::read(&cli.archive).with_context(|| format!("Reading archive {:?}", cli.archive))?;
    let steps = fs::read_to_string(&cli.steps).with_context(|| format!("Reading steps {:?}", cli.steps))?;
    let steps: Vec<Step> = serde_json::from_str(&steps).with_context(|| format!("Parsing steps {:?}", cli.steps))?;

    let store = match &cli.database {
        Some(path) => Store::open(path)?,
        None => Store::open_in_memory()?,
    };
    let generator = ChatGenerator::new(cli.generator_config()).context("Building query generator")?;
    let pipeline = Pipeline::new(&store, &generator).with_options(cli.pipeline_options());
    let run = pipeline.run(&archive, &steps).context("Ingesting archive")?;

    let response = if cli.pretty {
        serde_json::to_string_pretty(&run.response)?
    } else {
        serde_json::to_string(&run.response)?
    };
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{response}")?;

    if let Some(path) = &cli.output {
        match final_bytes(&run.last)? {
            Some(bytes) => {
                fs::write(path, bytes).with_context(|| format!("Writing output {path:?}"))?;
                log::info!("Final {} value written to {path:?}", run.last.name());
            }
            None => log::warn!("Pipeline ended without a value to write to {path:?}"),
        }
    }
    Ok(())
}

/// Bytes written to `--output` for the final value of a pipeline.
fn final_bytes(last: &LastResult) -> Result<Option<Vec<u8>>> {
    let bytes = match last {
        LastResult::Empty => return Ok(None),
        LastResult::Query(text) | LastResult::Status(text) => text.as_bytes().to_vec(),
        LastResult::Table(table) => format::to_csv(table)?.into_bytes(),
        LastResult::Formatted(value) => value.as_bytes().to_vec(),
    };
    Ok(Some(bytes))
}
