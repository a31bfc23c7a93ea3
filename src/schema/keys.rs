//! Merge key resolution.
//!
//! Classifies the dataset as cross-sectional or longitudinal from the
//! demographics schema and the configured column names, and derives the
//! identifiers every join and count keys on. Configuration breaks ties;
//! nothing here guesses over candidate columns.

use crate::config::Settings;
use crate::error::{CompileError, CompileResult};
use crate::schema::TableSchema;

/// The identifiers a dataset is merged and counted on.
///
/// Invariant: `is_longitudinal` implies both `session_id` and
/// `composite_id` are set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeKeys {
    primary_id: String,
    session_id: Option<String>,
    composite_id: Option<String>,
}

impl MergeKeys {
    /// Keys for a cross-sectional dataset: subjects appear once.
    pub fn cross_sectional(primary_id: &str) -> Self {
        Self {
            primary_id: primary_id.to_string(),
            session_id: None,
            composite_id: None,
        }
    }

    /// Keys for a longitudinal dataset: subjects contribute one row per
    /// session, merged on the composite column.
    pub fn longitudinal(primary_id: &str, session_id: &str, composite_id: &str) -> Self {
        Self {
            primary_id: primary_id.to_string(),
            session_id: Some(session_id.to_string()),
            composite_id: Some(composite_id.to_string()),
        }
    }

    pub fn primary_id(&self) -> &str {
        &self.primary_id
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn composite_id(&self) -> Option<&str> {
        self.composite_id.as_deref()
    }

    pub fn is_longitudinal(&self) -> bool {
        self.session_id.is_some()
    }

    /// The column cohort membership is counted on: the composite key when
    /// longitudinal (a subject may contribute one row per session), the
    /// primary key otherwise.
    pub fn count_key(&self) -> &str {
        self.composite_id.as_deref().unwrap_or(&self.primary_id)
    }
}

/// Resolve merge keys from the demographics schema.
///
/// The configured primary-id column must exist. The dataset is longitudinal
/// exactly when the configured session column exists; the composite column
/// name then comes from configuration (it need not be materialized yet -
/// dataset preparation handles that separately).
pub fn resolve_merge_keys(
    demographics: &TableSchema,
    settings: &Settings,
) -> CompileResult<MergeKeys> {
    let columns = &settings.columns;

    if !demographics.has_column(&columns.primary_id) {
        return Err(CompileError::Configuration {
            table: demographics.name().to_string(),
            column: columns.primary_id.clone(),
        });
    }

    if demographics.has_column(&columns.session) {
        Ok(MergeKeys::longitudinal(
            &columns.primary_id,
            &columns.session,
            &columns.composite_id,
        ))
    } else {
        Ok(MergeKeys::cross_sectional(&columns.primary_id))
    }
}

/// Derive a composite key value from a subject and session value.
///
/// This is the single definition of the derivation; dataset preparation
/// materializes exactly this into the demographics file.
pub fn composite_value(primary: &str, session: &str) -> String {
    format!("{}_{}", primary, session)
}
