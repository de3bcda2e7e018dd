//! ClickHouse writer over the HTTP interface.
//!
//! DDL and inserts are plain HTTP posts; batches go up as
//! `INSERT INTO … FORMAT TabSeparated` with the rows in the request body.

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, info};

use crate::config::DestinationConfig;
use crate::error::{LoadError, Result};
use crate::schema::TableSchema;
use crate::target::TableWriter;
use crate::value::CoercedRow;

/// How an HTTP statement failed: before reaching the server, or rejected by
/// it. The distinction drives fatal-vs-skippable mapping.
enum HttpFailure {
    Transport(String),
    Status(StatusCode, String),
}

impl HttpFailure {
    fn message(&self) -> String {
        match self {
            HttpFailure::Transport(m) => m.clone(),
            HttpFailure::Status(code, body) => format!("{}: {}", code, body.trim()),
        }
    }
}

/// ClickHouse destination writer.
pub struct ClickHouseWriter {
    client: reqwest::Client,
    config: DestinationConfig,
}

impl ClickHouseWriter {
    pub fn new(config: DestinationConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    async fn execute(
        &self,
        query: &str,
        body: String,
    ) -> std::result::Result<(), HttpFailure> {
        let response = self
            .client
            .post(&self.config.url)
            .query(&[("query", query)])
            .header("X-ClickHouse-User", &self.config.user)
            .header("X-ClickHouse-Key", &self.config.password)
            .body(body)
            .send()
            .await
            .map_err(|e| HttpFailure::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let text = response.text().await.unwrap_or_default();
            Err(HttpFailure::Status(status, text))
        }
    }
}

#[async_trait]
impl TableWriter for ClickHouseWriter {
    async fn create_table(&self, table: &str, schema: &TableSchema) -> Result<()> {
        let drop = drop_table_sql(&self.config.database, table);
        self.execute(&drop, String::new())
            .await
            .map_err(|e| LoadError::TableCreation(e.message()))?;

        let create = create_table_sql(&self.config.database, table, schema);
        debug!("creating table: {}", create);
        self.execute(&create, String::new())
            .await
            .map_err(|e| LoadError::TableCreation(e.message()))?;

        info!(
            "created table {}.{} with {} columns",
            self.config.database,
            table,
            schema.width()
        );
        Ok(())
    }

    async fn write_batch(
        &self,
        table: &str,
        schema: &TableSchema,
        rows: &[CoercedRow],
    ) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let query = insert_query(&self.config.database, table, schema);
        self.execute(&query, encode_rows(rows))
            .await
            .map_err(|e| LoadError::Export(e.message()))?;
        Ok(rows.len() as u64)
    }

    async fn write_row(&self, table: &str, schema: &TableSchema, row: &CoercedRow) -> Result<()> {
        let query = insert_query(&self.config.database, table, schema);
        self.execute(&query, encode_rows(std::slice::from_ref(row)))
            .await
            .map_err(|e| match e {
                HttpFailure::Transport(m) => LoadError::Export(m),
                rejected => LoadError::RowRejected(rejected.message()),
            })
    }
}

fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "\\`"))
}

fn qualified(database: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(database), quote_ident(table))
}

fn drop_table_sql(database: &str, table: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", qualified(database, table))
}

fn create_table_sql(database: &str, table: &str, schema: &TableSchema) -> String {
    let columns = schema
        .fields()
        .iter()
        .map(|f| format!("{} {}", quote_ident(&f.name), f.ftype.store_type()))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "CREATE TABLE {} ({}) ENGINE = MergeTree ORDER BY ({})",
        qualified(database, table),
        columns,
        quote_ident(schema.key())
    )
}

fn insert_query(database: &str, table: &str, schema: &TableSchema) -> String {
    let columns = schema
        .fields()
        .iter()
        .map(|f| quote_ident(&f.name))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({}) FORMAT TabSeparated",
        qualified(database, table),
        columns
    )
}

fn encode_rows(rows: &[CoercedRow]) -> String {
    let mut body = String::new();
    for row in rows {
        let line = row
            .iter()
            .map(|cell| cell.to_tsv())
            .collect::<Vec<_>>()
            .join("\t");
        body.push_str(&line);
        body.push('\n');
    }
    body
}
