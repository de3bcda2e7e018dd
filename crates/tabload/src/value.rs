//! Typed cell values and the sentinel-on-failure coercion policy.
//!
//! Coercion is total: every raw cell becomes a [`CellValue`], with illegal or
//! empty input replaced by the column type's fixed sentinel. No row is ever
//! rejected at this layer.

use chrono::NaiveDate;

use crate::schema::{FieldType, TableSchema};

/// Date formats tried, in order, when no caller format is configured.
const PLATFORM_DATE_FORMATS: &[&str] = &["%Y%m%d", "%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Sentinel substituted for an empty or unparseable String cell.
pub const STRING_SENTINEL: &str = "!";

/// A typed value aligned to one column of a [`TableSchema`].
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    String(String),
    Int64(i64),
    Float64(f64),
    Date(NaiveDate),
}

/// One coerced record, aligned 1:1 to schema order.
pub type CoercedRow = Vec<CellValue>;

impl CellValue {
    /// The fixed illegal-value sentinel for a column type.
    pub fn sentinel(ftype: FieldType) -> CellValue {
        match ftype {
            FieldType::String => CellValue::String(STRING_SENTINEL.to_string()),
            FieldType::Int64 => CellValue::Int64(i64::MAX),
            FieldType::Float64 => CellValue::Float64(f64::MAX),
            // The epoch date.
            FieldType::Date => CellValue::Date(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()),
        }
    }

    /// Render for a tab-separated destination insert. Tabs, newlines, and
    /// backslashes in strings are escaped; dates use `%Y-%m-%d`.
    pub fn to_tsv(&self) -> String {
        match self {
            CellValue::String(s) => escape_tsv(s),
            CellValue::Int64(i) => i.to_string(),
            CellValue::Float64(f) => f.to_string(),
            CellValue::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }
}

fn escape_tsv(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

/// Date parsing policy: a single caller-configured pattern, or the
/// platform-style list when unset.
#[derive(Debug, Clone, Default)]
pub struct DateParser {
    custom: Option<String>,
}

impl DateParser {
    pub fn new(custom: Option<&str>) -> Self {
        Self {
            custom: custom.map(str::to_string),
        }
    }

    /// Parse a cell as a date, or `None` if it does not match.
    pub fn parse(&self, cell: &str) -> Option<NaiveDate> {
        match &self.custom {
            Some(fmt) => NaiveDate::parse_from_str(cell, fmt).ok(),
            None => PLATFORM_DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(cell, fmt).ok()),
        }
    }
}

/// Coerce one raw cell into its column's type. Never fails: empty cells and
/// parse failures yield the type's sentinel.
pub fn coerce(cell: &str, ftype: FieldType, dates: &DateParser) -> CellValue {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return CellValue::sentinel(ftype);
    }
    match ftype {
        FieldType::String => CellValue::String(cell.to_string()),
        FieldType::Int64 => trimmed
            .parse::<i64>()
            .map(CellValue::Int64)
            .unwrap_or_else(|_| CellValue::sentinel(ftype)),
        FieldType::Float64 => trimmed
            .parse::<f64>()
            .map(CellValue::Float64)
            .unwrap_or_else(|_| CellValue::sentinel(ftype)),
        FieldType::Date => dates
            .parse(trimmed)
            .map(CellValue::Date)
            .unwrap_or_else(|| CellValue::sentinel(ftype)),
    }
}

/// Per-run coercion context: the schema plus the date policy.
#[derive(Debug, Clone)]
pub struct RowCoercer {
    schema: TableSchema,
    dates: DateParser,
}

impl RowCoercer {
    pub fn new(schema: TableSchema, dates: DateParser) -> Self {
        Self { schema, dates }
    }

    /// Coerce a full raw row. The caller guarantees the row width matches the
    /// schema; cells are paired positionally.
    pub fn coerce_row(&self, raw: &[String]) -> CoercedRow {
        self.schema
            .fields()
            .iter()
            .zip(raw)
            .map(|(field, cell)| coerce(cell, field.ftype, &self.dates))
            .collect()
    }
}
