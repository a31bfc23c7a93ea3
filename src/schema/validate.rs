//! Identifier validation - the sole security boundary for SQL text.
//!
//! Any table or column name headed for SQL interpolation must pass through
//! here first. Values never do; they are bound as parameters. Identifiers
//! are checked twice: shape (`[A-Za-z0-9_]+`) and then membership in the
//! schema whitelist. Pure lookups, no side effects, no I/O.

use crate::error::{CompileError, CompileResult};
use crate::schema::SchemaSnapshot;
use regex::Regex;
use std::sync::LazyLock;

static IDENT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").unwrap());

/// Validates identifiers against a schema snapshot.
pub struct IdentifierValidator<'a> {
    snapshot: &'a SchemaSnapshot,
}

impl<'a> IdentifierValidator<'a> {
    pub fn new(snapshot: &'a SchemaSnapshot) -> Self {
        Self { snapshot }
    }

    /// Check a table name. Returns the name unchanged on success so call
    /// sites can thread it straight into token construction.
    pub fn validate_table<'s>(&self, name: &'s str) -> CompileResult<&'s str> {
        if !IDENT_PATTERN.is_match(name) {
            return Err(CompileError::InvalidIdentifier(name.to_string()));
        }
        if self.snapshot.table(name).is_none() {
            return Err(CompileError::UnknownTable(name.to_string()));
        }
        Ok(name)
    }

    /// Check a column name against a (validated or not) table name.
    pub fn validate_column<'s>(&self, table: &str, column: &'s str) -> CompileResult<&'s str> {
        if !IDENT_PATTERN.is_match(column) {
            return Err(CompileError::InvalidIdentifier(column.to_string()));
        }
        let schema = self
            .snapshot
            .table(table)
            .ok_or_else(|| CompileError::UnknownTable(table.to_string()))?;
        if !schema.has_column(column) {
            return Err(CompileError::UnknownColumn {
                table: table.to_string(),
                column: column.to_string(),
            });
        }
        Ok(column)
    }
}
