//! Batched export: streams coerced rows to the destination writer.
//!
//! One blocking producer reads and coerces rows ahead of one async consumer
//! over a bounded channel, so batch construction overlaps the previous
//! flush. Batches reach the destination in source order; an error on either
//! side drains the other instead of hanging.

use std::mem;

use tokio::sync::mpsc;
use tokio::task;
use tracing::{debug, warn};

use crate::error::{LoadError, Result};
use crate::reader::RowReader;
use crate::schema::TableSchema;
use crate::target::TableWriter;
use crate::value::{CoercedRow, DateParser, RowCoercer};

/// Batches buffered ahead of the writer.
const READ_AHEAD_BATCHES: usize = 4;

/// Export behavior knobs.
#[derive(Debug, Clone, Copy)]
pub struct ExportOptions {
    /// Rows per destination batch; 0 means one single batch.
    pub batch_size: usize,

    /// Skip and count failing rows instead of aborting the run.
    pub skip_bad_rows: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            skip_bad_rows: false,
        }
    }
}

/// Outcome of an export run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportStats {
    pub rows_written: u64,
    pub rows_skipped: u64,
}

/// Stream every remaining row of `reader` into `table`, coercing each cell
/// to its column type on the way.
///
/// Zero-tolerance mode aborts on the first malformed row or write failure.
/// Tolerant mode skips and counts malformed source rows and rows the
/// destination rejects; connection-fatal destination errors still abort.
pub async fn export(
    reader: Box<dyn RowReader + Send>,
    schema: &TableSchema,
    writer: &dyn TableWriter,
    table: &str,
    options: &ExportOptions,
    dates: DateParser,
) -> Result<ExportStats> {
    let width = schema.width();
    let batch_size = options.batch_size;
    let skip_bad = options.skip_bad_rows;
    let coercer = RowCoercer::new(schema.clone(), dates);

    let (tx, mut rx) = mpsc::channel::<Result<Vec<CoercedRow>>>(READ_AHEAD_BATCHES);

    // Producer: read, coerce, and batch on a blocking thread. Returns the
    // count of malformed rows skipped under tolerant mode.
    let producer = task::spawn_blocking(move || {
        let mut reader = reader;
        let mut skipped = 0u64;
        let mut row_count = 0u64;
        let mut batch: Vec<CoercedRow> = Vec::new();
        loop {
            match reader.next_row() {
                Ok(Some(raw)) => {
                    row_count += 1;
                    if raw.len() != width {
                        let err = LoadError::MalformedRow {
                            line: row_count,
                            expected: width,
                            got: raw.len(),
                        };
                        if skip_bad {
                            warn!("skipping row {}: {}", row_count, err);
                            skipped += 1;
                            continue;
                        }
                        let _ = tx.blocking_send(Err(err));
                        return skipped;
                    }
                    batch.push(coercer.coerce_row(&raw));
                    if batch_size > 0 && batch.len() == batch_size {
                        if tx.blocking_send(Ok(mem::take(&mut batch))).is_err() {
                            // Consumer hung up; stop reading.
                            return skipped;
                        }
                    }
                }
                Ok(None) => {
                    if !batch.is_empty() {
                        let _ = tx.blocking_send(Ok(batch));
                    }
                    return skipped;
                }
                Err(err) => {
                    if skip_bad && matches!(err, LoadError::MalformedRow { .. }) {
                        warn!("skipping malformed row: {}", err);
                        skipped += 1;
                        continue;
                    }
                    let _ = tx.blocking_send(Err(err));
                    return skipped;
                }
            }
        }
    });

    let mut stats = ExportStats::default();
    let mut outcome: Result<()> = Ok(());

    'drain: while let Some(message) = rx.recv().await {
        let batch = match message {
            Ok(batch) => batch,
            Err(err) => {
                outcome = Err(err);
                break 'drain;
            }
        };
        debug!("flushing batch of {} rows", batch.len());

        if skip_bad {
            for row in &batch {
                match writer.write_row(table, schema, row).await {
                    Ok(()) => stats.rows_written += 1,
                    Err(LoadError::RowRejected(reason)) => {
                        warn!("destination rejected row: {}", reason);
                        stats.rows_skipped += 1;
                    }
                    Err(err) => {
                        outcome = Err(err);
                        break 'drain;
                    }
                }
            }
        } else {
            match writer.write_batch(table, schema, &batch).await {
                Ok(written) => stats.rows_written += written,
                Err(LoadError::RowRejected(reason)) => {
                    outcome = Err(LoadError::Export(reason));
                    break 'drain;
                }
                Err(err) => {
                    outcome = Err(err);
                    break 'drain;
                }
            }
        }
    }

    // Closing the channel stops the producer at its next send.
    drop(rx);
    let malformed = producer
        .await
        .map_err(|e| LoadError::Export(format!("reader stage panicked: {}", e)))?;
    stats.rows_skipped += malformed;

    outcome?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::RawRow;
    use crate::schema::{NamingOptions, SchemaBuilder};
    use crate::value::CellValue;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    struct RowsReader {
        rows: std::vec::IntoIter<RawRow>,
    }

    impl RowsReader {
        fn new(rows: Vec<Vec<&str>>) -> Box<dyn RowReader + Send> {
            Box::new(Self {
                rows: rows
                    .into_iter()
                    .map(|r| r.into_iter().map(str::to_string).collect())
                    .collect::<Vec<_>>()
                    .into_iter(),
            })
        }
    }

    impl RowReader for RowsReader {
        fn next_row(&mut self) -> Result<Option<RawRow>> {
            Ok(self.rows.next())
        }

        fn read_header(&mut self) -> Result<Vec<String>> {
            self.next_row()?
                .ok_or_else(|| LoadError::SourceAccess("empty".to_string()))
        }

        fn width(&self) -> Option<usize> {
            None
        }
    }

    /// Destination double: records rows, optionally rejecting every k-th.
    struct MockWriter {
        rows: Mutex<Vec<CoercedRow>>,
        batches: AtomicU64,
        seen: AtomicU64,
        reject_every: Option<u64>,
    }

    impl MockWriter {
        fn new(reject_every: Option<u64>) -> Self {
            Self {
                rows: Mutex::new(Vec::new()),
                batches: AtomicU64::new(0),
                seen: AtomicU64::new(0),
                reject_every,
            }
        }

        fn accept(&self, row: &CoercedRow) -> Result<()> {
            let n = self.seen.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(k) = self.reject_every {
                if n % k == 0 {
                    return Err(LoadError::RowRejected(format!("row {} refused", n)));
                }
            }
            self.rows.lock().unwrap().push(row.clone());
            Ok(())
        }

        fn written(&self) -> Vec<CoercedRow> {
            self.rows.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TableWriter for MockWriter {
        async fn create_table(&self, _table: &str, _schema: &TableSchema) -> Result<()> {
            Ok(())
        }

        async fn write_batch(
            &self,
            _table: &str,
            _schema: &TableSchema,
            rows: &[CoercedRow],
        ) -> Result<u64> {
            self.batches.fetch_add(1, Ordering::SeqCst);
            for row in rows {
                self.accept(row)?;
            }
            Ok(rows.len() as u64)
        }

        async fn write_row(
            &self,
            _table: &str,
            _schema: &TableSchema,
            row: &CoercedRow,
        ) -> Result<()> {
            self.accept(row)
        }
    }

    fn one_column_schema() -> TableSchema {
        SchemaBuilder::from_header(vec!["n".to_string()], &NamingOptions::default())
            .with_supplied_types(&["i".to_string()])
            .unwrap()
            .build()
            .unwrap()
    }

    fn numbered_rows(n: usize) -> Vec<Vec<String>> {
        (0..n).map(|i| vec![i.to_string()]).collect()
    }

    async fn run_export(
        rows: Vec<Vec<&str>>,
        writer: &MockWriter,
        options: ExportOptions,
    ) -> Result<ExportStats> {
        let schema = one_column_schema();
        export(
            RowsReader::new(rows),
            &schema,
            writer,
            "t",
            &options,
            DateParser::new(None),
        )
        .await
    }

    #[tokio::test]
    async fn test_round_trip_across_batch_sizes() {
        let n = 5;
        for batch_size in [1usize, n, n + 1] {
            let writer = MockWriter::new(None);
            let source: Vec<Vec<String>> = numbered_rows(n);
            let rows: Vec<Vec<&str>> = source
                .iter()
                .map(|r| r.iter().map(String::as_str).collect())
                .collect();
            let stats = run_export(
                rows,
                &writer,
                ExportOptions {
                    batch_size,
                    skip_bad_rows: false,
                },
            )
            .await
            .unwrap();

            assert_eq!(stats.rows_written, n as u64, "batch size {}", batch_size);
            assert_eq!(stats.rows_skipped, 0);
            // All rows arrive, in original order.
            let written = writer.written();
            assert_eq!(written.len(), n);
            for (i, row) in written.iter().enumerate() {
                assert_eq!(row[0], CellValue::Int64(i as i64));
            }
        }
    }

    #[tokio::test]
    async fn test_batch_size_zero_is_one_batch() {
        let writer = MockWriter::new(None);
        let stats = run_export(
            vec![vec!["1"], vec!["2"], vec!["3"]],
            &writer,
            ExportOptions {
                batch_size: 0,
                skip_bad_rows: false,
            },
        )
        .await
        .unwrap();
        assert_eq!(stats.rows_written, 3);
        assert_eq!(writer.batches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_tolerant_export_counts_rejections() {
        let n = 10u64;
        let writer = MockWriter::new(Some(3));
        let source: Vec<Vec<String>> = numbered_rows(n as usize);
        let rows: Vec<Vec<&str>> = source
            .iter()
            .map(|r| r.iter().map(String::as_str).collect())
            .collect();
        let stats = run_export(
            rows,
            &writer,
            ExportOptions {
                batch_size: 4,
                skip_bad_rows: true,
            },
        )
        .await
        .unwrap();

        // Every 3rd row is refused: 10 - floor(10/3) written.
        assert_eq!(stats.rows_written, n - n / 3);
        assert_eq!(stats.rows_skipped, n / 3);
    }

    #[tokio::test]
    async fn test_intolerant_export_aborts_on_first_rejection() {
        let writer = MockWriter::new(Some(3));
        let err = run_export(
            vec![vec!["0"], vec!["1"], vec!["2"], vec!["3"]],
            &writer,
            ExportOptions {
                batch_size: 1,
                skip_bad_rows: false,
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, LoadError::Export(_)));
        // Only the rows before the rejection were written.
        assert_eq!(writer.written().len(), 2);
    }

    #[tokio::test]
    async fn test_width_mismatch_is_fatal_without_tolerance() {
        let writer = MockWriter::new(None);
        let err = run_export(
            vec![vec!["1"], vec!["2", "extra"]],
            &writer,
            ExportOptions {
                batch_size: 10,
                skip_bad_rows: false,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, LoadError::MalformedRow { .. }));
    }

    #[tokio::test]
    async fn test_width_mismatch_skipped_with_tolerance() {
        let writer = MockWriter::new(None);
        let stats = run_export(
            vec![vec!["1"], vec!["2", "extra"], vec!["3"]],
            &writer,
            ExportOptions {
                batch_size: 10,
                skip_bad_rows: true,
            },
        )
        .await
        .unwrap();
        assert_eq!(stats.rows_written, 2);
        assert_eq!(stats.rows_skipped, 1);
        assert_eq!(
            writer.written(),
            vec![vec![CellValue::Int64(1)], vec![CellValue::Int64(3)]]
        );
    }

    #[tokio::test]
    async fn test_empty_source_writes_nothing() {
        let writer = MockWriter::new(None);
        let stats = run_export(vec![], &writer, ExportOptions::default())
            .await
            .unwrap();
        assert_eq!(stats, ExportStats::default());
        assert_eq!(writer.batches.load(Ordering::SeqCst), 0);
    }
}
