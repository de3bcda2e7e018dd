//! Schema model: column definitions, naming rules, and the schema builder.
//!
//! A [`TableSchema`] is built exactly once per ingestion run through
//! [`SchemaBuilder`]; all renaming and type resolution happens inside the
//! builder, and the built value is immutable.

mod impute;

use std::collections::HashSet;
use std::fmt;

use crate::error::{LoadError, Result};

/// Column names the destination store will not accept. Compared lower-cased.
pub const RESERVED_NAMES: &[&str] = &["index"];

/// Semantic column types understood by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Int64,
    Float64,
    Date,
}

impl FieldType {
    /// Parse a single-letter type token (`s`, `i`, `f`, `d`).
    pub fn from_token(token: &str) -> Option<FieldType> {
        match token {
            "s" => Some(FieldType::String),
            "i" => Some(FieldType::Int64),
            "f" => Some(FieldType::Float64),
            "d" => Some(FieldType::Date),
            _ => None,
        }
    }

    /// The destination store's name for this type.
    pub fn store_type(&self) -> &'static str {
        match self {
            FieldType::String => "String",
            FieldType::Int64 => "Int64",
            FieldType::Float64 => "Float64",
            FieldType::Date => "Date",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.store_type())
    }
}

/// Where a column's type came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOrigin {
    /// Assigned by the imputation pass.
    Inferred,
    /// Assigned from a caller-supplied type token.
    Supplied,
}

/// A single column definition.
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Column name, unique within the table.
    pub name: String,

    /// Semantic type.
    pub ftype: FieldType,

    /// Whether the type was inferred or supplied.
    pub origin: FieldOrigin,
}

/// Ordered column definitions plus the designated key column.
///
/// Immutable once built; handed by reference to the coercion layer and the
/// export engine.
#[derive(Debug, Clone)]
pub struct TableSchema {
    fields: Vec<FieldDef>,
    key: String,
}

impl TableSchema {
    /// Column definitions in table order.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// The designated key column name.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Number of columns; equals the row width reported by the reader.
    pub fn width(&self) -> usize {
        self.fields.len()
    }

    /// Column names in table order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

/// Naming policy applied to header-derived column names.
#[derive(Debug, Clone, Copy, Default)]
pub struct NamingOptions {
    /// Convert separator-delimited names to camelCase.
    pub camel: bool,

    /// Also store names lower-cased. The reserved-word check always compares
    /// a lower-cased copy; this controls whether the stored name follows.
    pub lowercase: bool,
}

/// Convert a separator-delimited name (`la_series`, `vintage qtr`) to
/// camelCase. The whole name is lower-cased first.
pub fn to_camel(name: &str) -> String {
    let lowered = name.trim().replace(' ', "_").to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut upper_next = false;
    for ch in lowered.chars() {
        if ch == '_' || ch == '.' {
            upper_next = true;
            continue;
        }
        if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

fn normalize_name(raw: &str, opts: &NamingOptions) -> String {
    let mut name = raw.trim().to_string();
    if opts.camel {
        name = to_camel(&name);
    }
    if opts.lowercase {
        name = name.to_lowercase();
    }
    // Reserved check compares a lower-cased copy; the stored name keeps
    // whatever case the policy above produced.
    if RESERVED_NAMES.contains(&name.to_lowercase().as_str()) {
        name.push('1');
    }
    name
}

/// Builder for [`TableSchema`].
///
/// Two entry points depending on where column names come from, then type
/// resolution via [`with_supplied_types`](SchemaBuilder::with_supplied_types)
/// or [`impute`](SchemaBuilder::impute), then [`build`](SchemaBuilder::build).
#[derive(Debug)]
pub struct SchemaBuilder {
    names: Vec<String>,
    types: Vec<Option<FieldType>>,
    origin: FieldOrigin,
}

impl SchemaBuilder {
    /// Build from a header row read out of the data, applying the naming
    /// policy and the reserved-word check. The first resulting name is the
    /// key column.
    pub fn from_header(raw_names: Vec<String>, opts: &NamingOptions) -> Self {
        let names = raw_names
            .iter()
            .map(|n| normalize_name(n, opts))
            .collect::<Vec<_>>();
        let width = names.len();
        Self {
            names,
            types: vec![None; width],
            origin: FieldOrigin::Inferred,
        }
    }

    /// Build from caller-supplied names, verbatim and in the exact order
    /// given. All columns start untyped.
    pub fn from_supplied(names: Vec<String>) -> Self {
        let width = names.len();
        Self {
            names,
            types: vec![None; width],
            origin: FieldOrigin::Inferred,
        }
    }

    /// Number of columns the builder currently holds.
    pub fn width(&self) -> usize {
        self.names.len()
    }

    pub(crate) fn types_mut(&mut self) -> &mut [Option<FieldType>] {
        &mut self.types
    }

    /// Assign every column's type from a token list (`s`/`i`/`f`/`d`).
    ///
    /// The list must have exactly one entry per column.
    pub fn with_supplied_types(mut self, tokens: &[String]) -> Result<Self> {
        if tokens.len() != self.names.len() {
            return Err(LoadError::SchemaMismatch {
                expected: self.names.len(),
                got: tokens.len(),
            });
        }
        for (slot, token) in self.types.iter_mut().zip(tokens) {
            let ftype = FieldType::from_token(token).ok_or_else(|| {
                LoadError::Config(format!("not a valid field type: {}", token))
            })?;
            *slot = Some(ftype);
        }
        self.origin = FieldOrigin::Supplied;
        Ok(self)
    }

    /// Finalize the schema. Fails on empty or duplicate names and on any
    /// column left untyped.
    pub fn build(self) -> Result<TableSchema> {
        if self.names.is_empty() {
            return Err(LoadError::Config("schema has no columns".to_string()));
        }
        let mut seen = HashSet::new();
        for name in &self.names {
            if name.is_empty() {
                return Err(LoadError::Config("empty column name".to_string()));
            }
            if !seen.insert(name.as_str()) {
                return Err(LoadError::Config(format!(
                    "duplicate column name: {}",
                    name
                )));
            }
        }

        let origin = self.origin;
        let fields = self
            .names
            .into_iter()
            .zip(self.types)
            .map(|(name, ftype)| {
                let ftype = ftype.ok_or_else(|| {
                    LoadError::Config(format!("column {} has no resolved type", name))
                })?;
                Ok(FieldDef {
                    name,
                    ftype,
                    origin,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let key = fields[0].name.clone();
        Ok(TableSchema { fields, key })
    }
}
