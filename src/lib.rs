//! # Cohortql
//!
//! A cohort query compiler for CSV-backed study data.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │        Specification (filters + selection) + Settings    │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [schema snapshot / merge keys]
//! ┌─────────────────────────────────────────────────────────┐
//! │     Identifier whitelist + topology classification       │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [filter compiler + join planner]
//! ┌─────────────────────────────────────────────────────────┐
//! │     Parameterized predicates + deterministic joins       │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [query assembler]
//! ┌─────────────────────────────────────────────────────────┐
//! │        (sql_text, parameters) - count or data            │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [external executor → rows]
//! ┌─────────────────────────────────────────────────────────┐
//! │            Longitudinal reshape ("enwiden")              │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Identifiers reach SQL text only through the whitelist validator; values
//! only ever travel as positional parameters. Compilation is pure and
//! synchronous; the one durable write in the crate is the explicit dataset
//! preparation step in [`prepare`].

pub mod config;
pub mod error;
pub mod params;
pub mod prepare;
pub mod query;
pub mod reshape;
pub mod schema;
pub mod sql;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::config::Settings;
    pub use crate::error::{CompileError, CompileResult, QueryError};
    pub use crate::params::{CohortSpec, ImportIssue};
    pub use crate::query::{
        DemographicFilters, ExportSelection, PhenotypicFilter, QueryFactory, QueryMode, SqlQuery,
    };
    pub use crate::reshape::{LongRow, LongitudinalReshaper, WideTable};
    pub use crate::schema::{
        ColumnType, IdentifierValidator, MergeKeys, SchemaSnapshot, TableSchema,
    };
    pub use crate::sql::SqlValue;
}

// Also export at crate root for convenience
pub use config::Settings;
pub use error::{CompileError, CompileResult};
pub use query::{DemographicFilters, ExportSelection, PhenotypicFilter, QueryFactory, SqlQuery};
pub use schema::SchemaSnapshot;
