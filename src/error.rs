//! Error taxonomy for query compilation.
//!
//! Compilation failures are returned as typed results so callers can render
//! field-level messages; nothing here is meant to be thrown across the UI
//! boundary. Execution failures from the storage engine are wrapped in
//! [`QueryError`] with the message sanitized first.

use std::path::Path;

/// Result type for query compilation.
pub type CompileResult<T> = Result<T, CompileError>;

/// Errors produced while compiling a specification into SQL.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    /// A configured column (primary id, session, ...) is missing from the
    /// table that must carry it.
    #[error("configured column '{column}' is missing from table '{table}'")]
    Configuration { table: String, column: String },

    /// Table name not present in the schema whitelist.
    #[error("unknown table: '{0}'")]
    UnknownTable(String),

    /// Column name not present on a whitelisted table.
    #[error("unknown column '{column}' on table '{table}'")]
    UnknownColumn { table: String, column: String },

    /// Identifier fails the shape check even before whitelist lookup.
    #[error("identifier '{0}' contains characters outside [A-Za-z0-9_]")]
    InvalidIdentifier(String),

    /// A data query was requested with nothing selected. Distinct from an
    /// empty filter set, which is valid and means "all rows".
    #[error("no tables or columns selected for export")]
    EmptySelection,
}

/// Execution failure reported by the storage engine, sanitized for display.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("query execution failed: {message}")]
pub struct QueryError {
    message: String,
}

impl QueryError {
    /// Wrap a raw engine error. Only the first line is kept and any
    /// absolute path is reduced to its file name, so internal layout never
    /// reaches the UI boundary.
    pub fn from_engine(raw: &str) -> Self {
        let first_line = raw.lines().next().unwrap_or("").trim();
        let message = sanitize_paths(first_line);
        Self { message }
    }

    /// The sanitized message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Replace absolute path tokens with their final component.
fn sanitize_paths(message: &str) -> String {
    message
        .split_whitespace()
        .map(|word| {
            let trimmed = word.trim_matches(|c| c == '\'' || c == '"' || c == ':');
            if trimmed.starts_with('/') || trimmed.chars().nth(1) == Some(':') {
                Path::new(trimmed)
                    .file_name()
                    .map(|f| f.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "<path>".to_string())
            } else {
                word.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
