//! Filter compilation.
//!
//! Turns demographic and phenotypic filter specifications into ordered,
//! parameterized predicates. Predicates are pure conjunction; they are
//! emitted in filter-list order only so identical inputs always produce
//! identical SQL text.

use crate::config::Settings;
use crate::error::CompileResult;
use crate::schema::{IdentifierValidator, SchemaSnapshot};
use crate::sql::{SqlValue, Token, TokenStream};
use std::collections::BTreeSet;

/// Demographic side of a cohort specification.
///
/// Absent/empty fields mean "no filter", never "match nothing".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DemographicFilters {
    /// Inclusive age bounds.
    pub age_range: Option<(f64, f64)>,
    /// Study sites to keep. Empty set: all sites.
    pub study_sites: BTreeSet<String>,
    /// Session labels to keep. Empty set: all sessions. Ignored for
    /// cross-sectional datasets.
    pub sessions: BTreeSet<String>,
}

/// A user-defined predicate on a behavioral-table column.
///
/// Each variant carries only the fields valid for it; there is no shared
/// loosely-typed value slot to corrupt.
#[derive(Debug, Clone, PartialEq)]
pub enum PhenotypicFilter {
    /// Inclusive numeric range on a column.
    Range {
        table: String,
        column: String,
        min: f64,
        max: f64,
        enabled: bool,
    },
    /// Membership in a set of values.
    Categorical {
        table: String,
        column: String,
        values: Vec<String>,
        enabled: bool,
    },
}

impl PhenotypicFilter {
    /// An enabled range filter.
    pub fn range(table: &str, column: &str, min: f64, max: f64) -> Self {
        PhenotypicFilter::Range {
            table: table.to_string(),
            column: column.to_string(),
            min,
            max,
            enabled: true,
        }
    }

    /// An enabled categorical filter.
    pub fn categorical(table: &str, column: &str, values: Vec<String>) -> Self {
        PhenotypicFilter::Categorical {
            table: table.to_string(),
            column: column.to_string(),
            values,
            enabled: true,
        }
    }

    pub fn table(&self) -> &str {
        match self {
            PhenotypicFilter::Range { table, .. } => table,
            PhenotypicFilter::Categorical { table, .. } => table,
        }
    }

    pub fn column(&self) -> &str {
        match self {
            PhenotypicFilter::Range { column, .. } => column,
            PhenotypicFilter::Categorical { column, .. } => column,
        }
    }

    /// Whether this filter participates in compilation. A categorical
    /// filter with no values is treated as disabled, never compiled into an
    /// always-false predicate.
    pub fn is_active(&self) -> bool {
        match self {
            PhenotypicFilter::Range { enabled, .. } => *enabled,
            PhenotypicFilter::Categorical {
                enabled, values, ..
            } => *enabled && !values.is_empty(),
        }
    }

    /// Copy of this filter with participation switched off.
    pub fn disabled(mut self) -> Self {
        match &mut self {
            PhenotypicFilter::Range { enabled, .. } => *enabled = false,
            PhenotypicFilter::Categorical { enabled, .. } => *enabled = false,
        }
        self
    }
}

/// One compiled predicate: SQL text with `?` markers plus the values bound
/// to them, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// Output of filter compilation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledFilters {
    /// Predicates in emission order.
    pub predicates: Vec<Predicate>,
    /// Every table the predicates reference.
    pub tables: BTreeSet<String>,
}

impl CompiledFilters {
    /// Conjunction of all predicates, or None when unfiltered.
    pub fn where_clause(&self) -> Option<String> {
        if self.predicates.is_empty() {
            return None;
        }
        Some(
            self.predicates
                .iter()
                .map(|p| p.sql.as_str())
                .collect::<Vec<_>>()
                .join(" AND "),
        )
    }

    /// All bound values, in predicate order.
    pub fn params(&self) -> Vec<SqlValue> {
        self.predicates
            .iter()
            .flat_map(|p| p.params.iter().cloned())
            .collect()
    }
}

/// Compiles filter specifications against one schema snapshot.
pub struct FilterCompiler<'a> {
    snapshot: &'a SchemaSnapshot,
    settings: &'a Settings,
}

impl<'a> FilterCompiler<'a> {
    pub fn new(snapshot: &'a SchemaSnapshot, settings: &'a Settings) -> Self {
        Self { snapshot, settings }
    }

    /// Compile demographic and phenotypic filters into predicates.
    ///
    /// Any unknown table or column rejects the whole compile; nothing is
    /// silently dropped on validation failure.
    pub fn compile(
        &self,
        demographic: &DemographicFilters,
        phenotypic: &[PhenotypicFilter],
    ) -> CompileResult<CompiledFilters> {
        let validator = IdentifierValidator::new(self.snapshot);
        let mut out = CompiledFilters::default();

        self.compile_demographic(demographic, &validator, &mut out)?;
        self.compile_phenotypic(phenotypic, &validator, &mut out)?;

        Ok(out)
    }

    fn compile_demographic(
        &self,
        filters: &DemographicFilters,
        validator: &IdentifierValidator<'_>,
        out: &mut CompiledFilters,
    ) -> CompileResult<()> {
        let demo = self.snapshot.demographics().name().to_string();
        let columns = &self.settings.columns;

        if let Some((min, max)) = filters.age_range {
            // The age column is optional in demographics; no column, no
            // predicate.
            if self.snapshot.demographics().has_column(&columns.age) {
                validator.validate_column(&demo, &columns.age)?;
                out.predicates
                    .push(between_predicate(&demo, &columns.age, min, max));
                out.tables.insert(demo.clone());
            }
        }

        if !filters.study_sites.is_empty() {
            validator.validate_column(&demo, &columns.study_site)?;
            out.predicates.push(in_predicate(
                &demo,
                &columns.study_site,
                filters.study_sites.iter().cloned(),
            ));
            out.tables.insert(demo.clone());
        }

        if !filters.sessions.is_empty() && self.snapshot.merge_keys().is_longitudinal() {
            validator.validate_column(&demo, &columns.session)?;
            out.predicates.push(in_predicate(
                &demo,
                &columns.session,
                filters.sessions.iter().cloned(),
            ));
            out.tables.insert(demo);
        }

        Ok(())
    }

    fn compile_phenotypic(
        &self,
        filters: &[PhenotypicFilter],
        validator: &IdentifierValidator<'_>,
        out: &mut CompiledFilters,
    ) -> CompileResult<()> {
        for filter in filters.iter().filter(|f| f.is_active()) {
            let table = validator.validate_table(filter.table())?;
            let column = validator.validate_column(table, filter.column())?;

            match filter {
                PhenotypicFilter::Range { min, max, .. } => {
                    out.predicates
                        .push(between_predicate(table, column, *min, *max));
                }
                PhenotypicFilter::Categorical { values, .. } => {
                    out.predicates
                        .push(in_predicate(table, column, values.iter().cloned()));
                }
            }
            out.tables.insert(table.to_string());
        }
        Ok(())
    }
}

fn between_predicate(table: &str, column: &str, min: f64, max: f64) -> Predicate {
    let mut ts = TokenStream::new();
    ts.push(Token::QualifiedIdent {
        table: table.to_string(),
        column: column.to_string(),
    })
    .space()
    .push(Token::Between)
    .space()
    .placeholder()
    .space()
    .push(Token::And)
    .space()
    .placeholder();

    Predicate {
        sql: ts.serialize(),
        params: vec![SqlValue::Float(min), SqlValue::Float(max)],
    }
}

fn in_predicate(table: &str, column: &str, values: impl IntoIterator<Item = String>) -> Predicate {
    let params: Vec<SqlValue> = values.into_iter().map(SqlValue::Text).collect();

    let mut ts = TokenStream::new();
    ts.push(Token::QualifiedIdent {
        table: table.to_string(),
        column: column.to_string(),
    })
    .space()
    .push(Token::In)
    .space()
    .lparen()
    .placeholder_list(params.len())
    .rparen();

    Predicate {
        sql: ts.serialize(),
        params,
    }
}
