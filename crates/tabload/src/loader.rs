//! Run orchestration: one ingestion run from validation to the final report.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::info;

use crate::config::LoadConfig;
use crate::error::{LoadError, Result};
use crate::export::{self, ExportOptions};
use crate::resolver;
use crate::schema::{SchemaBuilder, TableSchema};
use crate::target::TableWriter;
use crate::value::DateParser;

/// Coordinates one ingestion run.
pub struct Loader {
    config: LoadConfig,
    writer: Arc<dyn TableWriter>,
}

/// Result of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    /// Destination table name.
    pub table: String,

    /// Number of columns in the created table.
    pub columns: usize,

    /// Rows written to the destination.
    pub rows_written: u64,

    /// Rows skipped under tolerant mode.
    pub rows_skipped: u64,

    /// Total duration in seconds.
    pub duration_seconds: f64,
}

impl Loader {
    pub fn new(config: LoadConfig, writer: Arc<dyn TableWriter>) -> Self {
        Self { config, writer }
    }

    /// Run the ingestion: validate, resolve the schema, create the table,
    /// then stream the source into it.
    pub async fn run(&self) -> Result<LoadReport> {
        self.config.validate()?;
        let started = Instant::now();
        let dates = DateParser::new(self.config.date_format.as_deref());

        let (schema, header_from_data) = self.build_schema(&dates).await?;
        info!(
            "resolved schema: {} columns, key column {}",
            schema.width(),
            schema.key()
        );

        self.writer
            .create_table(&self.config.table, &schema)
            .await?;

        // The coercion pass starts from the true beginning of the source;
        // when the header row came from the data it is skipped here.
        let mut spec = self.config.source.clone();
        if header_from_data {
            spec.skip += 1;
        }
        let reader = resolver::resolve(&spec).await?;

        let options = ExportOptions {
            batch_size: self.config.batch_size,
            skip_bad_rows: self.config.skip_bad_rows,
        };
        let stats = export::export(
            reader,
            &schema,
            self.writer.as_ref(),
            &self.config.table,
            &options,
            dates,
        )
        .await?;

        let report = LoadReport {
            table: self.config.table.clone(),
            columns: schema.width(),
            rows_written: stats.rows_written,
            rows_skipped: stats.rows_skipped,
            duration_seconds: started.elapsed().as_secs_f64(),
        };
        info!(
            "loaded {} rows into {} ({} skipped) in {:.2}s",
            report.rows_written, report.table, report.rows_skipped, report.duration_seconds
        );
        Ok(report)
    }

    /// Build the schema, reading a header row and/or sampling the stream as
    /// needed. Returns whether a header row was consumed from the data, so
    /// the export pass can skip past it.
    async fn build_schema(&self, dates: &DateParser) -> Result<(TableSchema, bool)> {
        // With names and types both supplied there is nothing to read.
        if let (Some(names), Some(tokens)) = (&self.config.headers, &self.config.types) {
            let schema = SchemaBuilder::from_supplied(names.clone())
                .with_supplied_types(tokens)?
                .build()?;
            return Ok((schema, false));
        }

        let mut reader = resolver::resolve(&self.config.source).await?;
        let header_from_data = self.config.headers.is_none();

        let builder = match &self.config.headers {
            Some(names) => SchemaBuilder::from_supplied(names.clone()),
            None => SchemaBuilder::from_header(reader.read_header()?, &self.config.naming),
        };

        let schema = match &self.config.types {
            Some(tokens) => builder.with_supplied_types(tokens)?.build()?,
            None => {
                let threshold = self.config.impute_threshold;
                let dates = dates.clone();
                // The inference pass consumes the stream; run it off the
                // async thread.
                let builder = tokio::task::spawn_blocking(move || -> Result<SchemaBuilder> {
                    let mut builder = builder;
                    let mut reader = reader;
                    builder.impute(reader.as_mut(), threshold, &dates)?;
                    Ok(builder)
                })
                .await
                .map_err(|e| {
                    LoadError::SourceAccess(format!("type inference task failed: {}", e))
                })??;
                builder.build()?
            }
        };

        Ok((schema, header_from_data))
    }
}
