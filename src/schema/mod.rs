//! Schema snapshot types.
//!
//! The snapshot is supplied by a schema-provider collaborator once per
//! dataset load or configuration change and treated as immutable and
//! authoritative afterwards - the compiler never re-derives schema itself.
//! On reload the whole snapshot is replaced, never patched in place, so a
//! compilation always sees a consistent whitelist.

mod keys;
mod validate;

pub use keys::{composite_value, resolve_merge_keys, MergeKeys};
pub use validate::IdentifierValidator;

use crate::config::Settings;
use crate::error::CompileResult;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Column type as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    Float,
    Text,
    Boolean,
}

impl ColumnType {
    /// True for types a range filter can apply to.
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }
}

/// Schema of one known table: its columns, their types, and observed
/// numeric ranges.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    name: String,
    columns: BTreeSet<String>,
    dtypes: BTreeMap<String, ColumnType>,
    ranges: BTreeMap<String, (f64, f64)>,
}

impl TableSchema {
    /// Create an empty schema for a named table.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            columns: BTreeSet::new(),
            dtypes: BTreeMap::new(),
            ranges: BTreeMap::new(),
        }
    }

    /// Add a column with its type.
    pub fn with_column(mut self, column: &str, dtype: ColumnType) -> Self {
        self.columns.insert(column.to_string());
        self.dtypes.insert(column.to_string(), dtype);
        self
    }

    /// Record the observed (min, max) of a numeric column.
    pub fn with_range(mut self, column: &str, min: f64, max: f64) -> Self {
        self.ranges.insert(column.to_string(), (min, max));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(String::as_str)
    }

    pub fn dtype(&self, column: &str) -> Option<ColumnType> {
        self.dtypes.get(column).copied()
    }

    pub fn range(&self, column: &str) -> Option<(f64, f64)> {
        self.ranges.get(column).copied()
    }
}

/// Immutable snapshot of everything the compiler is allowed to reference.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaSnapshot {
    demographics: TableSchema,
    behavioral: BTreeMap<String, TableSchema>,
    merge_keys: MergeKeys,
    session_values: Vec<String>,
    messages: Vec<String>,
}

impl SchemaSnapshot {
    /// Build a snapshot from provider-supplied table schemas, resolving the
    /// merge keys from the demographics schema and the configured column
    /// names.
    pub fn new(
        demographics: TableSchema,
        behavioral: impl IntoIterator<Item = TableSchema>,
        settings: &Settings,
    ) -> CompileResult<Self> {
        let merge_keys = keys::resolve_merge_keys(&demographics, settings)?;

        let mut messages = Vec::new();
        if let Some(composite) = merge_keys.composite_id() {
            if !demographics.has_column(composite) {
                messages.push(format!(
                    "demographics lacks the '{}' column; run dataset preparation before querying",
                    composite
                ));
            }
        }

        let behavioral = behavioral
            .into_iter()
            .map(|t| (t.name().to_string(), t))
            .collect();

        Ok(Self {
            demographics,
            behavioral,
            merge_keys,
            session_values: Vec::new(),
            messages,
        })
    }

    /// Attach the session labels observed in the dataset.
    pub fn with_session_values(mut self, values: impl IntoIterator<Item = String>) -> Self {
        self.session_values = values.into_iter().collect();
        self
    }

    pub fn demographics(&self) -> &TableSchema {
        &self.demographics
    }

    /// Look up any known table, demographics included.
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        if name == self.demographics.name() {
            Some(&self.demographics)
        } else {
            self.behavioral.get(name)
        }
    }

    /// All known table names, demographics first, behavioral sorted.
    pub fn table_names(&self) -> Vec<&str> {
        let mut names = vec![self.demographics.name()];
        names.extend(self.behavioral.keys().map(String::as_str));
        names
    }

    pub fn behavioral_tables(&self) -> impl Iterator<Item = &TableSchema> {
        self.behavioral.values()
    }

    pub fn merge_keys(&self) -> &MergeKeys {
        &self.merge_keys
    }

    pub fn session_values(&self) -> &[String] {
        &self.session_values
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// True when the dataset carries no behavioral tables at all.
    pub fn is_empty(&self) -> bool {
        self.behavioral.is_empty()
    }
}
