//! Join planning.
//!
//! Demographics is always the anchor table; every other referenced table is
//! LEFT JOINed exactly once, so subjects with missing behavioral rows stay
//! in the cohort. Emission order is lexicographic over table names,
//! independent of the order filters were added - identical filter sets
//! always compile to identical SQL text.

use crate::error::{CompileError, CompileResult};
use crate::schema::{IdentifierValidator, SchemaSnapshot, TableSchema};
use crate::sql::{Token, TokenStream};
use std::collections::BTreeSet;

/// A planned FROM/JOIN clause.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinPlan {
    /// `FROM "demographics" LEFT JOIN ...` text.
    pub from_clause: String,
    /// Tables in emission order, anchor first.
    pub tables: Vec<String>,
}

/// Plans joins against one schema snapshot.
pub struct JoinPlanner<'a> {
    snapshot: &'a SchemaSnapshot,
}

impl<'a> JoinPlanner<'a> {
    pub fn new(snapshot: &'a SchemaSnapshot) -> Self {
        Self { snapshot }
    }

    /// Build the FROM/JOIN clause for the union of tables referenced by
    /// filters and requested output columns.
    pub fn plan(&self, referenced: &BTreeSet<String>) -> CompileResult<JoinPlan> {
        let validator = IdentifierValidator::new(self.snapshot);
        let anchor = self.snapshot.demographics().name().to_string();

        let mut ts = TokenStream::new();
        ts.push(Token::From)
            .space()
            .push(Token::Ident(anchor.clone()));

        let mut tables = vec![anchor.clone()];

        // BTreeSet iteration gives the lexicographic order; the anchor never
        // joins to itself.
        for table in referenced.iter().filter(|t| **t != anchor) {
            let table = validator.validate_table(table)?;
            let schema = self
                .snapshot
                .table(table)
                .ok_or_else(|| CompileError::UnknownTable(table.to_string()))?;
            let join_column = self.join_column(schema)?;

            ts.space()
                .push(Token::Left)
                .space()
                .push(Token::Join)
                .space()
                .push(Token::Ident(table.to_string()))
                .space()
                .push(Token::On)
                .space()
                .push(Token::QualifiedIdent {
                    table: anchor.clone(),
                    column: join_column.clone(),
                })
                .space()
                .push(Token::Eq)
                .space()
                .push(Token::QualifiedIdent {
                    table: table.to_string(),
                    column: join_column,
                });

            tables.push(table.to_string());
        }

        Ok(JoinPlan {
            from_clause: ts.serialize(),
            tables,
        })
    }

    /// The merge column for one behavioral table: the composite key when the
    /// dataset is longitudinal and the table is session-level (carries the
    /// composite column), the primary key otherwise.
    fn join_column(&self, table: &TableSchema) -> CompileResult<String> {
        let keys = self.snapshot.merge_keys();

        if let Some(composite) = keys.composite_id() {
            if table.has_column(composite) {
                // The anchor side must carry the column too; a demographics
                // file that was never prepared cannot satisfy this join.
                if !self.snapshot.demographics().has_column(composite) {
                    return Err(CompileError::Configuration {
                        table: self.snapshot.demographics().name().to_string(),
                        column: composite.to_string(),
                    });
                }
                return Ok(composite.to_string());
            }
        }

        if !table.has_column(keys.primary_id()) {
            return Err(CompileError::Configuration {
                table: table.name().to_string(),
                column: keys.primary_id().to_string(),
            });
        }
        Ok(keys.primary_id().to_string())
    }
}
