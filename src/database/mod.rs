//! # Tabular Store
//!
//! Embedded DuckDB store holding one table per ingested sheet, together with the
//! catalog description handed to query generators and the batch statement executor.
pub mod column;
pub mod executor;
pub mod sanitize;
pub mod schema;
pub mod store;
pub mod table;

pub use executor::BatchResult;
pub use executor::Outcome;
pub use store::Store;
pub use table::Datum;
pub use table::TabularResult;
