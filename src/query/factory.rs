//! Query factory and pipeline mode selection.
//!
//! Historically this system carried two pipelines: a validated one and an
//! unchecked one predating the identifier whitelist. The unchecked
//! implementation is gone - every mode now compiles through the validated
//! path, and the historical query text survives only as a frozen regression
//! fixture in the test suite. The mode state machine remains so callers can
//! still express the old contract: `Secure` is the default, `Auto` resolves
//! to `Secure`, and `Legacy` requires an explicit opt-in and is never
//! reachable through default configuration.

use crate::config::Settings;
use crate::error::CompileResult;
use crate::query::assemble::{ExportSelection, QueryAssembler, SqlQuery};
use crate::query::filter::{DemographicFilters, FilterCompiler, PhenotypicFilter};
use crate::schema::SchemaSnapshot;

/// Pipeline selection. Fixed per factory instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryMode {
    /// Validated pipeline.
    #[default]
    Secure,
    /// Deprecated. Retained for regression comparison against historical
    /// behavior; compiles through the validated pipeline.
    Legacy,
    /// Resolves to `Secure` unless legacy is explicitly opted into.
    Auto,
}

/// Builds queries under a fixed, resolved mode.
pub struct QueryFactory<'a> {
    snapshot: &'a SchemaSnapshot,
    settings: &'a Settings,
    mode: QueryMode,
}

impl<'a> QueryFactory<'a> {
    /// Factory in the default (`Secure`) mode.
    pub fn new(snapshot: &'a SchemaSnapshot, settings: &'a Settings) -> Self {
        Self {
            snapshot,
            settings,
            mode: QueryMode::Secure,
        }
    }

    /// Factory with an explicit mode request. `legacy_opt_in` is the only
    /// way to end up in `Legacy`: without it, both `Legacy` and `Auto`
    /// resolve to `Secure`.
    pub fn with_mode(
        snapshot: &'a SchemaSnapshot,
        settings: &'a Settings,
        requested: QueryMode,
        legacy_opt_in: bool,
    ) -> Self {
        let mode = match (requested, legacy_opt_in) {
            (QueryMode::Secure, _) => QueryMode::Secure,
            (QueryMode::Legacy, true) | (QueryMode::Auto, true) => {
                tracing::warn!(
                    "legacy query mode requested; compiling through the validated pipeline"
                );
                QueryMode::Legacy
            }
            (QueryMode::Legacy, false) | (QueryMode::Auto, false) => QueryMode::Secure,
        };

        Self {
            snapshot,
            settings,
            mode,
        }
    }

    /// The resolved mode this instance is locked to.
    pub fn mode(&self) -> QueryMode {
        self.mode
    }

    /// Build the cohort count query.
    pub fn count_query(
        &self,
        demographic: &DemographicFilters,
        phenotypic: &[PhenotypicFilter],
    ) -> CompileResult<SqlQuery> {
        QueryAssembler::new(self.snapshot, self.settings).count_query(demographic, phenotypic)
    }

    /// Build the data export query.
    pub fn data_query(
        &self,
        demographic: &DemographicFilters,
        phenotypic: &[PhenotypicFilter],
        selection: &ExportSelection,
    ) -> CompileResult<SqlQuery> {
        QueryAssembler::new(self.snapshot, self.settings)
            .data_query(demographic, phenotypic, selection)
    }

    /// Check a specification without emitting SQL. Runs the validated rules
    /// regardless of the instance mode.
    pub fn validate_parameters(
        &self,
        demographic: &DemographicFilters,
        phenotypic: &[PhenotypicFilter],
        selection: Option<&ExportSelection>,
    ) -> CompileResult<()> {
        FilterCompiler::new(self.snapshot, self.settings).compile(demographic, phenotypic)?;
        if let Some(selection) = selection {
            // Probe the full data pipeline; the SQL itself is discarded.
            QueryAssembler::new(self.snapshot, self.settings)
                .data_query(demographic, phenotypic, selection)?;
        }
        Ok(())
    }
}
