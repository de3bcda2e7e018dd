//! Run configuration: source specification, destination connection, and
//! pipeline options, with validation that runs before any I/O.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{LoadError, Result};
use crate::schema::{FieldType, NamingOptions};

/// Recognized source formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// Tab-delimited text.
    Text,
    /// Comma-separated text.
    Csv,
    /// Modern Excel workbook.
    Xlsx,
    /// Legacy Excel binary; converted to xlsx before reading.
    Xls,
}

impl SourceFormat {
    /// Field separator for the delimited variants.
    pub fn separator(&self) -> u8 {
        match self {
            SourceFormat::Csv => b',',
            _ => b'\t',
        }
    }

    /// Whether this format goes through the spreadsheet reader.
    pub fn is_sheet(&self) -> bool {
        matches!(self, SourceFormat::Xlsx | SourceFormat::Xls)
    }
}

impl FromStr for SourceFormat {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(SourceFormat::Text),
            "csv" => Ok(SourceFormat::Csv),
            "xlsx" => Ok(SourceFormat::Xlsx),
            "xls" => Ok(SourceFormat::Xls),
            other => Err(LoadError::Config(format!(
                "unrecognized source format: {} (expected text, csv, xlsx, or xls)",
                other
            ))),
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            SourceFormat::Text => "text",
            SourceFormat::Csv => "csv",
            SourceFormat::Xlsx => "xlsx",
            SourceFormat::Xls => "xls",
        };
        f.write_str(token)
    }
}

/// A `[start, end]` bound over spreadsheet rows or columns. 0-based;
/// `end == 0` means unbounded, a non-zero end is inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeBound {
    pub start: usize,
    pub end: usize,
}

impl FromStr for RangeBound {
    type Err = LoadError;

    /// Parse the `S:E` form.
    fn from_str(s: &str) -> Result<Self> {
        let (start, end) = s.split_once(':').ok_or_else(|| {
            LoadError::Config(format!("invalid range spec: {} (expected S:E)", s))
        })?;
        let parse = |part: &str| {
            part.trim()
                .parse::<usize>()
                .map_err(|_| LoadError::Config(format!("invalid range spec: {}", s)))
        };
        Ok(RangeBound {
            start: parse(start)?,
            end: parse(end)?,
        })
    }
}

/// Everything needed to construct a row reader over one source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSpec {
    /// Local path or HTTP(S) URL.
    pub location: String,

    /// Declared format.
    pub format: SourceFormat,

    /// Quote byte for the delimited variants.
    pub quote: u8,

    /// Leading rows to skip before the first yielded row. For spreadsheet
    /// sources this applies within the row range.
    pub skip: usize,

    /// Sheet name; the first sheet when unset.
    pub sheet: Option<String>,

    /// Spreadsheet row range.
    pub rows: RangeBound,

    /// Spreadsheet column range.
    pub cols: RangeBound,
}

impl SourceSpec {
    pub fn new(location: impl Into<String>, format: SourceFormat) -> Self {
        Self {
            location: location.into(),
            format,
            quote: b'"',
            skip: 0,
            sheet: None,
            rows: RangeBound::default(),
            cols: RangeBound::default(),
        }
    }

    /// Whether the location is fetched over HTTP rather than opened locally.
    pub fn is_remote(&self) -> bool {
        let lower = self.location.to_lowercase();
        lower.starts_with("http://") || lower.starts_with("https://")
    }
}

/// Destination store connection settings (ClickHouse HTTP interface).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationConfig {
    /// HTTP endpoint.
    pub url: String,

    /// User name.
    pub user: String,

    /// Password.
    pub password: String,

    /// Database holding the destination table.
    pub database: String,
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8123".to_string(),
            user: "default".to_string(),
            password: String::new(),
            database: "default".to_string(),
        }
    }
}

/// Full configuration for one ingestion run.
#[derive(Debug, Clone)]
pub struct LoadConfig {
    pub source: SourceSpec,
    pub destination: DestinationConfig,

    /// Destination table to create and fill.
    pub table: String,

    /// Naming policy for header-derived column names.
    pub naming: NamingOptions,

    /// Caller-supplied column names; read from the data when unset.
    pub headers: Option<Vec<String>>,

    /// Caller-supplied type tokens (`s`/`i`/`f`/`d`); imputed when unset.
    pub types: Option<Vec<String>>,

    /// Date pattern for parsing; a platform-style list when unset.
    pub date_format: Option<String>,

    /// Rows per destination batch; 0 means one single batch.
    pub batch_size: usize,

    /// Skip and count bad rows instead of aborting.
    pub skip_bad_rows: bool,

    /// Imputation acceptance threshold.
    pub impute_threshold: f64,
}

impl LoadConfig {
    pub fn new(source: SourceSpec, destination: DestinationConfig, table: impl Into<String>) -> Self {
        Self {
            source,
            destination,
            table: table.into(),
            naming: NamingOptions::default(),
            headers: None,
            types: None,
            date_format: None,
            batch_size: 1000,
            skip_bad_rows: false,
            impute_threshold: 0.95,
        }
    }

    /// Validate the configuration. Everything here runs before any source or
    /// destination I/O.
    pub fn validate(&self) -> Result<()> {
        if self.source.location.is_empty() {
            return Err(LoadError::Config("source location is required".into()));
        }
        if self.table.is_empty() {
            return Err(LoadError::Config("destination table is required".into()));
        }
        if self.destination.url.is_empty() {
            return Err(LoadError::Config("destination url is required".into()));
        }

        if let Some(headers) = &self.headers {
            if headers.is_empty() {
                return Err(LoadError::Config("header list is empty".into()));
            }
            if headers.iter().any(|h| h.trim().is_empty()) {
                return Err(LoadError::Config("header list contains an empty name".into()));
            }
        }

        if let Some(types) = &self.types {
            if types.is_empty() {
                return Err(LoadError::Config("type list is empty".into()));
            }
            for token in types {
                if FieldType::from_token(token).is_none() {
                    return Err(LoadError::Config(format!(
                        "not a valid field type: {} (expected s, i, f, or d)",
                        token
                    )));
                }
            }
        }

        // When both lists are given they must agree before any row is read.
        if let (Some(headers), Some(types)) = (&self.headers, &self.types) {
            if headers.len() != types.len() {
                return Err(LoadError::SchemaMismatch {
                    expected: headers.len(),
                    got: types.len(),
                });
            }
        }

        for (label, bound) in [("rows", &self.source.rows), ("cols", &self.source.cols)] {
            if bound.end != 0 && bound.end < bound.start {
                return Err(LoadError::Config(format!(
                    "invalid {} range: end {} precedes start {}",
                    label, bound.end, bound.start
                )));
            }
        }

        if !(self.impute_threshold > 0.0 && self.impute_threshold <= 1.0) {
            return Err(LoadError::Config(format!(
                "imputation threshold must be in (0, 1], got {}",
                self.impute_threshold
            )));
        }

        if let Some(fmt) = &self.date_format {
            if fmt.trim().is_empty() {
                return Err(LoadError::Config("date format is empty".into()));
            }
        }

        Ok(())
    }
}
