//! Portable parameter files.
//!
//! A cohort specification (filters + selection + options) round-trips
//! through a TOML document so it can be shared between researchers and
//! re-imported against a different dataset load. Import validates every
//! table/column reference against the *current* schema snapshot:
//! individually invalid entries are skipped and reported, while a
//! structurally malformed file (unparseable, or missing the `filters` /
//! `selection` sections) rejects the whole import.

use crate::query::{DemographicFilters, ExportSelection, PhenotypicFilter};
use crate::schema::{IdentifierValidator, SchemaSnapshot};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Version stamp written into every exported file.
pub const FORMAT_VERSION: &str = "1";

/// Result type for the codec.
pub type CodecResult<T> = Result<T, CodecError>;

/// Whole-file failures.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("malformed parameter file: {0}")]
    Malformed(String),

    #[error("unsupported format_version '{0}'")]
    UnsupportedVersion(String),

    #[error("failed to serialize parameter file: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// One skipped entry from a partially successful import.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportIssue {
    /// Where in the file the entry came from, e.g. `filters.phenotypic[2]`.
    pub context: String,
    pub reason: String,
}

impl fmt::Display for ImportIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.context, self.reason)
    }
}

/// The in-memory specification the codec round-trips.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CohortSpec {
    pub demographic: DemographicFilters,
    pub phenotypic: Vec<PhenotypicFilter>,
    pub selection: ExportSelection,
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct ParameterFile {
    #[serde(default)]
    metadata: Metadata,
    filters: FiltersSection,
    selection: SelectionSection,
    #[serde(default)]
    options: OptionsSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct Metadata {
    export_timestamp: String,
    app_version: String,
    format_version: String,
    user_notes: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct FiltersSection {
    demographic: DemographicSection,
    phenotypic: Vec<PhenotypicEntry>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct DemographicSection {
    substudies: Vec<String>,
    sessions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    age_range: Option<AgeRange>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AgeRange {
    min: f64,
    max: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct PhenotypicEntry {
    table: String,
    column: String,
    #[serde(rename = "type")]
    kind: FilterKind,
    value: FilterValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum FilterKind {
    Range,
    Categorical,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum FilterValue {
    Range { min: f64, max: f64 },
    Values(Vec<String>),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SelectionSection {
    #[serde(default)]
    tables: Vec<String>,
    #[serde(default)]
    columns: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct OptionsSection {
    enwiden_longitudinal: bool,
    consolidate_baseline: bool,
}

// ============================================================================
// Export
// ============================================================================

/// Serialize a specification to parameter-file text. Only filters that
/// would participate in compilation are written; disabled ones are
/// transient UI state.
pub fn export(spec: &CohortSpec, user_notes: &str) -> CodecResult<String> {
    let phenotypic = spec
        .phenotypic
        .iter()
        .filter(|f| f.is_active())
        .map(|f| match f {
            PhenotypicFilter::Range {
                table,
                column,
                min,
                max,
                ..
            } => PhenotypicEntry {
                table: table.clone(),
                column: column.clone(),
                kind: FilterKind::Range,
                value: FilterValue::Range {
                    min: *min,
                    max: *max,
                },
            },
            PhenotypicFilter::Categorical {
                table,
                column,
                values,
                ..
            } => PhenotypicEntry {
                table: table.clone(),
                column: column.clone(),
                kind: FilterKind::Categorical,
                value: FilterValue::Values(values.clone()),
            },
        })
        .collect();

    let file = ParameterFile {
        metadata: Metadata {
            export_timestamp: Utc::now().to_rfc3339(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            format_version: FORMAT_VERSION.to_string(),
            user_notes: user_notes.to_string(),
        },
        filters: FiltersSection {
            demographic: DemographicSection {
                substudies: spec.demographic.study_sites.iter().cloned().collect(),
                sessions: spec.demographic.sessions.iter().cloned().collect(),
                age_range: spec.demographic.age_range.map(|(min, max)| AgeRange { min, max }),
            },
            phenotypic,
        },
        selection: SelectionSection {
            tables: spec.selection.tables.clone(),
            columns: spec.selection.columns.clone(),
        },
        options: OptionsSection {
            enwiden_longitudinal: spec.selection.enwiden,
            consolidate_baseline: spec.selection.consolidate_baseline,
        },
    };

    Ok(toml::to_string_pretty(&file)?)
}

// ============================================================================
// Import
// ============================================================================

/// Decode parameter-file text and validate it against the current snapshot.
///
/// Returns the usable specification plus one issue per skipped entry.
pub fn import(text: &str, snapshot: &SchemaSnapshot) -> CodecResult<(CohortSpec, Vec<ImportIssue>)> {
    let file: ParameterFile =
        toml::from_str(text).map_err(|e| CodecError::Malformed(e.to_string()))?;

    if !file.metadata.format_version.is_empty()
        && file.metadata.format_version != FORMAT_VERSION
    {
        return Err(CodecError::UnsupportedVersion(file.metadata.format_version));
    }

    let validator = IdentifierValidator::new(snapshot);
    let mut issues = Vec::new();

    // Demographic section: substudies are plain values; session labels are
    // checked against the labels observed in this dataset when known.
    let mut demographic = DemographicFilters {
        age_range: file.filters.demographic.age_range.map(|r| (r.min, r.max)),
        study_sites: file.filters.demographic.substudies.into_iter().collect(),
        sessions: Default::default(),
    };
    for session in file.filters.demographic.sessions {
        if !snapshot.session_values().is_empty()
            && !snapshot.session_values().contains(&session)
        {
            issues.push(ImportIssue {
                context: "filters.demographic.sessions".to_string(),
                reason: format!("session '{}' not present in this dataset", session),
            });
        } else {
            demographic.sessions.insert(session);
        }
    }

    let mut phenotypic = Vec::new();
    for (index, entry) in file.filters.phenotypic.into_iter().enumerate() {
        let context = format!("filters.phenotypic[{}]", index);
        match decode_filter(entry, &validator) {
            Ok(filter) => phenotypic.push(filter),
            Err(reason) => issues.push(ImportIssue { context, reason }),
        }
    }

    let mut selection = ExportSelection {
        enwiden: file.options.enwiden_longitudinal,
        consolidate_baseline: file.options.consolidate_baseline,
        ..Default::default()
    };
    for table in file.selection.tables {
        if let Err(e) = validator.validate_table(&table) {
            issues.push(ImportIssue {
                context: "selection.tables".to_string(),
                reason: e.to_string(),
            });
            continue;
        }
        let mut kept = Vec::new();
        for column in file.selection.columns.get(&table).into_iter().flatten() {
            match validator.validate_column(&table, column) {
                Ok(_) => kept.push(column.clone()),
                Err(e) => issues.push(ImportIssue {
                    context: format!("selection.columns.{}", table),
                    reason: e.to_string(),
                }),
            }
        }
        selection.columns.insert(table.clone(), kept);
        selection.tables.push(table);
    }

    Ok((
        CohortSpec {
            demographic,
            phenotypic,
            selection,
        },
        issues,
    ))
}

fn decode_filter(
    entry: PhenotypicEntry,
    validator: &IdentifierValidator<'_>,
) -> Result<PhenotypicFilter, String> {
    validator
        .validate_table(&entry.table)
        .and_then(|t| validator.validate_column(t, &entry.column))
        .map_err(|e| e.to_string())?;

    match (entry.kind, entry.value) {
        (FilterKind::Range, FilterValue::Range { min, max }) => {
            Ok(PhenotypicFilter::range(&entry.table, &entry.column, min, max))
        }
        (FilterKind::Categorical, FilterValue::Values(values)) => Ok(
            PhenotypicFilter::categorical(&entry.table, &entry.column, values),
        ),
        (FilterKind::Range, FilterValue::Values(_)) => {
            Err("range filter carries a categorical value".to_string())
        }
        (FilterKind::Categorical, FilterValue::Range { .. }) => {
            Err("categorical filter carries a range value".to_string())
        }
    }
}
