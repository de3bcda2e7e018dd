//! # tabload
//!
//! Ingestion library for loading tabular data into ClickHouse.
//!
//! Sources can be tab-delimited text, CSV, or Excel workbooks (xlsx, plus
//! xls via external conversion on Linux), read from a local path or fetched
//! over HTTP. Every format is normalized into one row-stream abstraction;
//! column types are imputed from the data or supplied by the caller; cells
//! that fail to parse are replaced with type-specific sentinel values so no
//! row is ever dropped silently.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tabload::{
//!     ClickHouseWriter, DestinationConfig, LoadConfig, Loader, SourceFormat, SourceSpec,
//! };
//!
//! #[tokio::main]
//! async fn main() -> tabload::Result<()> {
//!     let source = SourceSpec::new("https://example.com/la.series", SourceFormat::Text);
//!     let config = LoadConfig::new(source, DestinationConfig::default(), "laSeries");
//!     let writer = Arc::new(ClickHouseWriter::new(config.destination.clone()));
//!     let report = Loader::new(config, writer).run().await?;
//!     println!("loaded {} rows", report.rows_written);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod loader;
pub mod reader;
pub mod resolver;
pub mod schema;
pub mod target;
pub mod value;

// Re-exports for convenient access
pub use config::{DestinationConfig, LoadConfig, RangeBound, SourceFormat, SourceSpec};
pub use error::{LoadError, Result};
pub use export::{ExportOptions, ExportStats};
pub use loader::{LoadReport, Loader};
pub use schema::{FieldDef, FieldOrigin, FieldType, NamingOptions, TableSchema};
pub use target::{ClickHouseWriter, TableWriter};
pub use value::{CellValue, CoercedRow, DateParser};
