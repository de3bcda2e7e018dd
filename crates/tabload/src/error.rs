//! Error types for the ingestion library.

use thiserror::Error;

/// Main error type for ingestion operations.
#[derive(Error, Debug)]
pub enum LoadError {
    /// Invalid or missing caller input, caught before any I/O.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Local source could not be opened.
    #[error("Source access error: {0}")]
    SourceAccess(String),

    /// Remote source could not be fetched.
    #[error("Fetch failed for {url}: {message}")]
    Fetch { url: String, message: String },

    /// Legacy-format conversion unsupported or failed.
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// A row's width disagrees with the established column count.
    #[error("Malformed row at line {line}: expected {expected} fields, got {got}")]
    MalformedRow {
        line: u64,
        expected: usize,
        got: usize,
    },

    /// Supplied type list length does not match the column count.
    #[error("Supplied field types have length {got}, data has {expected} columns")]
    SchemaMismatch { expected: usize, got: usize },

    /// Destination rejected the table definition.
    #[error("Table creation failed: {0}")]
    TableCreation(String),

    /// Destination write failure under zero-tolerance mode, or a
    /// connection-fatal failure under tolerant mode.
    #[error("Export failed: {0}")]
    Export(String),

    /// A single row was rejected by the destination. Non-fatal when row-error
    /// tolerance is enabled; counted and skipped.
    #[error("Row rejected by destination: {0}")]
    RowRejected(String),

    /// IO error (file operations).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Delimited-text parse error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Workbook parse error.
    #[error("Workbook error: {0}")]
    Workbook(#[from] calamine::XlsxError),
}

impl LoadError {
    /// Create a Fetch error with the URL it occurred on.
    pub fn fetch(url: impl Into<String>, message: impl Into<String>) -> Self {
        LoadError::Fetch {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Process exit code for this error. Stable per variant so scripted
    /// callers can distinguish failure classes.
    pub fn exit_code(&self) -> u8 {
        match self {
            LoadError::Config(_) | LoadError::SchemaMismatch { .. } => 2,
            LoadError::SourceAccess(_) | LoadError::Fetch { .. } => 3,
            LoadError::Conversion(_) => 4,
            LoadError::MalformedRow { .. } => 5,
            LoadError::TableCreation(_) => 6,
            LoadError::Export(_) | LoadError::RowRejected(_) => 7,
            LoadError::Io(_) | LoadError::Csv(_) | LoadError::Workbook(_) => 1,
        }
    }

    /// Format error with full details including error chain.
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for ingestion operations.
pub type Result<T> = std::result::Result<T, LoadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_stable() {
        assert_eq!(LoadError::Config("x".into()).exit_code(), 2);
        assert_eq!(
            LoadError::SchemaMismatch {
                expected: 3,
                got: 2
            }
            .exit_code(),
            2
        );
        assert_eq!(LoadError::SourceAccess("x".into()).exit_code(), 3);
        assert_eq!(LoadError::fetch("http://x", "y").exit_code(), 3);
        assert_eq!(LoadError::Conversion("x".into()).exit_code(), 4);
        assert_eq!(
            LoadError::MalformedRow {
                line: 1,
                expected: 2,
                got: 3
            }
            .exit_code(),
            5
        );
        assert_eq!(LoadError::TableCreation("x".into()).exit_code(), 6);
        assert_eq!(LoadError::Export("x".into()).exit_code(), 7);
        assert_eq!(LoadError::RowRejected("x".into()).exit_code(), 7);
    }

    #[test]
    fn test_format_detailed_includes_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = LoadError::Io(io);
        let detail = err.format_detailed();
        assert!(detail.starts_with("Error: IO error"));
        assert!(detail.contains("gone"));
    }
}
