//! Destination writers.
//!
//! [`TableWriter`] is the boundary to the destination store: it materializes
//! a table from a schema and appends coerced rows. Implementations report
//! failures either as connection-fatal errors or, for single-row appends, as
//! [`LoadError::RowRejected`] so the export engine can skip under tolerant
//! mode.
//!
//! [`LoadError::RowRejected`]: crate::error::LoadError::RowRejected

pub mod clickhouse;

pub use clickhouse::ClickHouseWriter;

use async_trait::async_trait;

use crate::error::Result;
use crate::schema::TableSchema;
use crate::value::CoercedRow;

/// Write schema and rows to a destination store.
#[async_trait]
pub trait TableWriter: Send + Sync {
    /// Materialize the destination table from the schema, replacing any
    /// existing table of the same name.
    async fn create_table(&self, table: &str, schema: &TableSchema) -> Result<()>;

    /// Append a batch of rows, all-or-nothing.
    async fn write_batch(
        &self,
        table: &str,
        schema: &TableSchema,
        rows: &[CoercedRow],
    ) -> Result<u64>;

    /// Append one row. A rejection by the destination surfaces as
    /// [`LoadError::RowRejected`]; anything else is connection-fatal.
    ///
    /// [`LoadError::RowRejected`]: crate::error::LoadError::RowRejected
    async fn write_row(&self, table: &str, schema: &TableSchema, row: &CoercedRow) -> Result<()>;
}
