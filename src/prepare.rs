//! Dataset preparation.
//!
//! One explicit, idempotent migration: materialize the composite-id column
//! into the demographics CSV so longitudinal joins and counts have a real
//! column to key on. Prior completion is detected before anything is
//! written; the rewrite goes to a temp sibling and lands with an atomic
//! rename, so concurrent triggers cannot leave a torn file. Every action is
//! logged.

use crate::config::{Settings, SettingsError};
use crate::schema::composite_value;
use polars::prelude::*;
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

/// Result type for dataset preparation.
pub type PrepareResult<T> = Result<T, PrepareError>;

/// Errors during dataset preparation.
#[derive(Debug, thiserror::Error)]
pub enum PrepareError {
    #[error("demographics file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("demographics lacks the configured '{0}' column")]
    MissingColumn(String),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("failed to read or write demographics: {0}")]
    Frame(#[from] PolarsError),

    #[error("failed to rewrite demographics: {0}")]
    Io(#[from] std::io::Error),
}

/// What preparation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrepareOutcome {
    /// No session column configured into existence: nothing to materialize.
    CrossSectional,
    /// The composite column already exists; nothing was written.
    AlreadyPrepared,
    /// The composite column was written. Carries the row count.
    Materialized { rows: usize },
}

/// Materialize the composite-id column into the demographics file.
pub fn prepare_demographics(settings: &Settings) -> PrepareResult<PrepareOutcome> {
    let path = settings.demographics_path()?;
    if !path.exists() {
        return Err(PrepareError::FileNotFound(path));
    }

    let mut df = LazyCsvReader::new(&path).finish()?.collect()?;
    let columns = &settings.columns;

    if df.column(&columns.primary_id).is_err() {
        return Err(PrepareError::MissingColumn(columns.primary_id.clone()));
    }

    if df.column(&columns.session).is_err() {
        info!(
            file = %path.display(),
            "no session column; dataset is cross-sectional, nothing to materialize"
        );
        return Ok(PrepareOutcome::CrossSectional);
    }

    if df.column(&columns.composite_id).is_ok() {
        info!(
            file = %path.display(),
            column = %columns.composite_id,
            "composite column already materialized; skipping rewrite"
        );
        return Ok(PrepareOutcome::AlreadyPrepared);
    }

    let composite = derive_composite(&df, &columns.primary_id, &columns.session)?;
    let missing = composite.iter().filter(|v| v.is_none()).count();
    if missing > 0 {
        warn!(
            rows = missing,
            "rows with a missing subject or session value get a null composite id"
        );
    }

    df.with_column(Series::new(
        columns.composite_id.as_str().into(),
        composite,
    ))?;

    let rows = df.height();
    let tmp = path.with_extension("csv.tmp");
    {
        let mut file = fs::File::create(&tmp)?;
        CsvWriter::new(&mut file).finish(&mut df)?;
    }
    fs::rename(&tmp, &path)?;

    info!(
        file = %path.display(),
        column = %columns.composite_id,
        rows,
        "materialized composite ids and atomically replaced demographics"
    );

    Ok(PrepareOutcome::Materialized { rows })
}

/// Derive composite values row by row from the subject and session columns.
fn derive_composite(
    df: &DataFrame,
    primary_column: &str,
    session_column: &str,
) -> PrepareResult<Vec<Option<String>>> {
    let primary = df
        .column(primary_column)?
        .as_materialized_series()
        .cast(&DataType::String)?;
    let session = df
        .column(session_column)?
        .as_materialized_series()
        .cast(&DataType::String)?;

    let values = primary
        .str()?
        .into_iter()
        .zip(session.str()?.into_iter())
        .map(|(p, s)| match (p, s) {
            (Some(p), Some(s)) => Some(composite_value(p, s)),
            _ => None,
        })
        .collect();

    Ok(values)
}
