//! Query assembly.
//!
//! Combines the join plan and compiled predicates into the two query
//! variants the application needs: a cohort count and a column-selected
//! data export. Both share one FROM/JOIN/WHERE base; only the SELECT
//! clause differs, so they can never drift apart semantically.

use crate::config::Settings;
use crate::error::{CompileError, CompileResult};
use crate::query::filter::{DemographicFilters, FilterCompiler, PhenotypicFilter};
use crate::query::join::JoinPlanner;
use crate::schema::{IdentifierValidator, SchemaSnapshot};
use crate::sql::{SqlValue, Token, TokenStream};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Which tables and columns a data export should carry, plus the reshape
/// options applied downstream of execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportSelection {
    /// Tables to export, in output order.
    pub tables: Vec<String>,
    /// Columns per table, in output order.
    pub columns: BTreeMap<String, Vec<String>>,
    /// Pivot longitudinal output to one row per subject.
    pub enwiden: bool,
    /// Merge configured baseline aliases before widening.
    pub consolidate_baseline: bool,
}

impl ExportSelection {
    /// True when nothing is selected. An empty selection is an error for
    /// data queries, distinct from an empty filter set (which is valid and
    /// means "all rows").
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() || self.columns.values().all(|cols| cols.is_empty())
    }
}

/// The shared skeleton of a compiled request. Produced fresh per request,
/// never cached across filter states.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryBase {
    pub from_join: String,
    pub where_clause: Option<String>,
    pub params: Vec<SqlValue>,
    pub tables_referenced: BTreeSet<String>,
}

/// Final output handed to the execution layer: SQL text plus positionally
/// bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// Assembles count and data queries against one schema snapshot.
pub struct QueryAssembler<'a> {
    snapshot: &'a SchemaSnapshot,
    settings: &'a Settings,
}

impl<'a> QueryAssembler<'a> {
    pub fn new(snapshot: &'a SchemaSnapshot, settings: &'a Settings) -> Self {
        Self { snapshot, settings }
    }

    /// Compile filters and plan joins over `extra_tables` plus whatever the
    /// filters reference.
    fn base(
        &self,
        demographic: &DemographicFilters,
        phenotypic: &[PhenotypicFilter],
        extra_tables: &BTreeSet<String>,
    ) -> CompileResult<QueryBase> {
        let compiled = FilterCompiler::new(self.snapshot, self.settings)
            .compile(demographic, phenotypic)?;

        let mut referenced: BTreeSet<String> = compiled.tables.clone();
        referenced.extend(extra_tables.iter().cloned());
        referenced.insert(self.snapshot.demographics().name().to_string());

        let plan = JoinPlanner::new(self.snapshot).plan(&referenced)?;

        Ok(QueryBase {
            from_join: plan.from_clause,
            where_clause: compiled.where_clause(),
            params: compiled.params(),
            tables_referenced: referenced,
        })
    }

    /// `SELECT COUNT(DISTINCT <key>) ...` - the key is the composite id for
    /// longitudinal datasets (a subject contributes one row per session;
    /// counting the primary id would undercount cohort membership) and the
    /// primary id otherwise, where DISTINCT also absorbs duplicate primary
    /// ids fanned out by behavioral joins.
    pub fn count_query(
        &self,
        demographic: &DemographicFilters,
        phenotypic: &[PhenotypicFilter],
    ) -> CompileResult<SqlQuery> {
        let base = self.base(demographic, phenotypic, &BTreeSet::new())?;
        let demo = self.snapshot.demographics().name().to_string();
        // An unprepared longitudinal dataset has no composite column yet;
        // surface that at compile time rather than from the executor.
        let key = IdentifierValidator::new(self.snapshot)
            .validate_column(&demo, self.snapshot.merge_keys().count_key())?
            .to_string();

        let mut ts = TokenStream::new();
        ts.push(Token::Select)
            .space()
            .push(Token::FunctionName("count".into()))
            .lparen()
            .push(Token::Distinct)
            .space()
            .push(Token::QualifiedIdent {
                table: demo,
                column: key,
            })
            .rparen();

        Ok(finish(ts, base))
    }

    /// Data export variant: an explicit SELECT list built from the
    /// selection plus the merge key column(s). Never `SELECT *`, so output
    /// stays deterministic and unselected identifier columns never leak.
    pub fn data_query(
        &self,
        demographic: &DemographicFilters,
        phenotypic: &[PhenotypicFilter],
        selection: &ExportSelection,
    ) -> CompileResult<SqlQuery> {
        if selection.is_empty() {
            return Err(CompileError::EmptySelection);
        }

        let validator = IdentifierValidator::new(self.snapshot);
        let demo = self.snapshot.demographics().name().to_string();
        let keys = self.snapshot.merge_keys();

        // Key columns lead the SELECT list; selected columns follow in
        // selection order.
        validator.validate_column(&demo, keys.primary_id())?;
        let mut select_list: Vec<(String, String)> =
            vec![(demo.clone(), keys.primary_id().to_string())];
        if let Some(session) = keys.session_id() {
            validator.validate_column(&demo, session)?;
            select_list.push((demo.clone(), session.to_string()));
        }

        let mut selected_tables = BTreeSet::new();
        for table in &selection.tables {
            let table = validator.validate_table(table)?;
            selected_tables.insert(table.to_string());
            for column in selection.columns.get(table).into_iter().flatten() {
                let column = validator.validate_column(table, column)?;
                let entry = (table.to_string(), column.to_string());
                if !select_list.contains(&entry) {
                    select_list.push(entry);
                }
            }
        }

        let base = self.base(demographic, phenotypic, &selected_tables)?;

        let mut ts = TokenStream::new();
        ts.push(Token::Select).space();
        for (i, (table, column)) in select_list.iter().enumerate() {
            if i > 0 {
                ts.comma().space();
            }
            ts.push(Token::QualifiedIdent {
                table: table.clone(),
                column: column.clone(),
            });
        }

        Ok(finish(ts, base))
    }
}

/// Append the shared base onto a SELECT clause.
fn finish(mut select: TokenStream, base: QueryBase) -> SqlQuery {
    let mut sql = select.space().serialize();
    sql.push_str(&base.from_join);
    if let Some(where_clause) = &base.where_clause {
        sql.push_str(" WHERE ");
        sql.push_str(where_clause);
    }
    SqlQuery {
        sql,
        params: base.params,
    }
}
