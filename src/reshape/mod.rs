//! Longitudinal reshape ("enwiden").
//!
//! Pivots long-format results (one row per subject-session) into wide
//! format (one row per subject, session-suffixed columns). Subjects missing
//! a session get Null cells - never zero, never a dropped column. Baseline
//! consolidation merges a configured set of alias labels into one canonical
//! baseline session before widening; conflicting values resolve
//! first-non-null in configured alias order.

use crate::config::Settings;
use crate::sql::SqlValue;
use std::collections::{BTreeMap, BTreeSet};

/// Result type for reshaping.
pub type ReshapeResult<T> = Result<T, ReshapeError>;

/// Errors while converting executor output into long rows.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReshapeError {
    #[error("result rows lack the '{0}' key column")]
    MissingKeyColumn(String),
}

/// One long-format result row.
#[derive(Debug, Clone, PartialEq)]
pub struct LongRow {
    pub subject: String,
    pub session: String,
    pub values: BTreeMap<String, SqlValue>,
}

impl LongRow {
    pub fn new(subject: &str, session: &str) -> Self {
        Self {
            subject: subject.to_string(),
            session: session.to_string(),
            values: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, column: &str, value: SqlValue) -> Self {
        self.values.insert(column.to_string(), value);
        self
    }

    /// Build a long row from an executor record, pulling the key columns
    /// out by name.
    pub fn from_record(
        record: &BTreeMap<String, SqlValue>,
        primary_column: &str,
        session_column: &str,
    ) -> ReshapeResult<Self> {
        let subject = record
            .get(primary_column)
            .filter(|v| !v.is_null())
            .map(SqlValue::to_string)
            .ok_or_else(|| ReshapeError::MissingKeyColumn(primary_column.to_string()))?;
        let session = record
            .get(session_column)
            .filter(|v| !v.is_null())
            .map(SqlValue::to_string)
            .ok_or_else(|| ReshapeError::MissingKeyColumn(session_column.to_string()))?;

        let values = record
            .iter()
            .filter(|(k, _)| k.as_str() != primary_column && k.as_str() != session_column)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(Self {
            subject,
            session,
            values,
        })
    }
}

/// One wide row per subject.
#[derive(Debug, Clone, PartialEq)]
pub struct WideTable {
    /// Header: subject column first, then `<column>_<session>` names.
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

/// Pivots long rows to wide, with optional baseline consolidation.
pub struct LongitudinalReshaper {
    subject_column: String,
    baseline_label: String,
    baseline_aliases: Vec<String>,
    consolidate: bool,
}

impl LongitudinalReshaper {
    pub fn new(settings: &Settings, consolidate: bool) -> Self {
        Self {
            subject_column: settings.columns.primary_id.clone(),
            baseline_label: settings.baseline.label.clone(),
            baseline_aliases: settings.baseline.aliases.clone(),
            consolidate,
        }
    }

    /// Pivot to one row per subject. Sessions and subjects are emitted in
    /// sorted order; each value column fans out into one column per
    /// session.
    pub fn enwiden(&self, rows: &[LongRow], value_columns: &[String]) -> WideTable {
        let mut sessions: BTreeSet<String> = BTreeSet::new();
        let mut subjects: BTreeSet<String> = BTreeSet::new();
        // (subject, session, column) -> (priority, value); lower priority
        // wins, set only by the first non-null candidate at that priority.
        let mut cells: BTreeMap<(String, String, String), (usize, SqlValue)> = BTreeMap::new();

        for row in rows {
            let session = self.canonical_session(&row.session);
            let priority = self.alias_priority(&row.session);
            sessions.insert(session.clone());
            subjects.insert(row.subject.clone());

            for column in value_columns {
                let value = row.values.get(column).cloned().unwrap_or(SqlValue::Null);
                if value.is_null() {
                    continue;
                }
                let key = (row.subject.clone(), session.clone(), column.clone());
                match cells.get(&key) {
                    Some((held, _)) if *held <= priority => {}
                    _ => {
                        cells.insert(key, (priority, value));
                    }
                }
            }
        }

        let mut columns = vec![self.subject_column.clone()];
        for column in value_columns {
            for session in &sessions {
                columns.push(format!("{}_{}", column, session));
            }
        }

        let rows = subjects
            .into_iter()
            .map(|subject| {
                let mut out = vec![SqlValue::Text(subject.clone())];
                for column in value_columns {
                    for session in &sessions {
                        let key = (subject.clone(), session.clone(), column.clone());
                        out.push(
                            cells
                                .get(&key)
                                .map(|(_, v)| v.clone())
                                .unwrap_or(SqlValue::Null),
                        );
                    }
                }
                out
            })
            .collect();

        WideTable { columns, rows }
    }

    /// The session a row lands in after consolidation.
    fn canonical_session(&self, session: &str) -> String {
        if self.consolidate
            && (self.baseline_aliases.iter().any(|a| a == session)
                || session == self.baseline_label)
        {
            self.baseline_label.clone()
        } else {
            session.to_string()
        }
    }

    /// Conflict priority within the consolidated baseline: configured alias
    /// order, with a literal canonical label sorting after every alias.
    /// Sessions outside the baseline never conflict and share one bucket.
    fn alias_priority(&self, session: &str) -> usize {
        self.baseline_aliases
            .iter()
            .position(|a| a == session)
            .unwrap_or(self.baseline_aliases.len())
    }
}
