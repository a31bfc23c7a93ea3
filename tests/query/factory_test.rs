use cohortql::config::Settings;
use cohortql::error::CompileError;
use cohortql::query::{
    DemographicFilters, ExportSelection, PhenotypicFilter, QueryFactory, QueryMode,
};
use cohortql::schema::{ColumnType, SchemaSnapshot, TableSchema};
use std::collections::BTreeMap;

/// Query text recorded from the pre-whitelist implementation for this
/// reference cohort. The validated pipeline must keep producing it.
const FROZEN_COUNT_SQL: &str =
    "SELECT COUNT(DISTINCT \"demographics\".\"composite_id\") FROM \"demographics\" \
     LEFT JOIN \"cbcl\" ON \"demographics\".\"composite_id\" = \"cbcl\".\"composite_id\" \
     WHERE \"demographics\".\"age\" BETWEEN ? AND ? AND \
     \"cbcl\".\"total_score\" BETWEEN ? AND ?";

fn snapshot() -> SchemaSnapshot {
    let demo = TableSchema::new("demographics")
        .with_column("subject_id", ColumnType::Text)
        .with_column("session_id", ColumnType::Text)
        .with_column("composite_id", ColumnType::Text)
        .with_column("age", ColumnType::Float);
    let cbcl = TableSchema::new("cbcl")
        .with_column("subject_id", ColumnType::Text)
        .with_column("composite_id", ColumnType::Text)
        .with_column("total_score", ColumnType::Float);
    SchemaSnapshot::new(demo, vec![cbcl], &Settings::default()).unwrap()
}

fn reference_cohort() -> (DemographicFilters, Vec<PhenotypicFilter>) {
    (
        DemographicFilters {
            age_range: Some((18.0, 65.0)),
            ..Default::default()
        },
        vec![PhenotypicFilter::range("cbcl", "total_score", 10.0, 40.0)],
    )
}

#[test]
fn test_default_mode_is_secure() {
    let snapshot = snapshot();
    let settings = Settings::default();
    assert_eq!(
        QueryFactory::new(&snapshot, &settings).mode(),
        QueryMode::Secure
    );
}

#[test]
fn test_auto_resolves_to_secure_by_default() {
    let snapshot = snapshot();
    let settings = Settings::default();
    let factory = QueryFactory::with_mode(&snapshot, &settings, QueryMode::Auto, false);
    assert_eq!(factory.mode(), QueryMode::Secure);
}

#[test]
fn test_legacy_unreachable_without_opt_in() {
    let snapshot = snapshot();
    let settings = Settings::default();
    let factory = QueryFactory::with_mode(&snapshot, &settings, QueryMode::Legacy, false);
    assert_eq!(factory.mode(), QueryMode::Secure);
}

#[test]
fn test_auto_honors_explicit_opt_in() {
    let snapshot = snapshot();
    let settings = Settings::default();
    let factory = QueryFactory::with_mode(&snapshot, &settings, QueryMode::Auto, true);
    assert_eq!(factory.mode(), QueryMode::Legacy);
}

#[test]
fn test_legacy_output_matches_frozen_fixture() {
    let snapshot = snapshot();
    let settings = Settings::default();
    let (demographic, phenotypic) = reference_cohort();

    let secure = QueryFactory::new(&snapshot, &settings)
        .count_query(&demographic, &phenotypic)
        .unwrap();
    let legacy = QueryFactory::with_mode(&snapshot, &settings, QueryMode::Legacy, true)
        .count_query(&demographic, &phenotypic)
        .unwrap();

    assert_eq!(secure.sql, FROZEN_COUNT_SQL);
    assert_eq!(legacy.sql, FROZEN_COUNT_SQL);
    assert_eq!(secure.params, legacy.params);
}

#[test]
fn test_validation_runs_even_under_legacy() {
    let snapshot = snapshot();
    let settings = Settings::default();
    let factory = QueryFactory::with_mode(&snapshot, &settings, QueryMode::Legacy, true);

    let bad = vec![PhenotypicFilter::range("cbcl", "nope", 0.0, 1.0)];
    assert_eq!(
        factory
            .validate_parameters(&DemographicFilters::default(), &bad, None)
            .unwrap_err(),
        CompileError::UnknownColumn {
            table: "cbcl".into(),
            column: "nope".into(),
        }
    );

    // The legacy mode no longer bypasses identifier checks at compile time
    // either.
    assert!(factory
        .count_query(&DemographicFilters::default(), &bad)
        .is_err());
}

#[test]
fn test_validate_parameters_covers_selection() {
    let snapshot = snapshot();
    let settings = Settings::default();
    let factory = QueryFactory::new(&snapshot, &settings);

    let selection = ExportSelection {
        tables: vec!["cbcl".to_string()],
        columns: BTreeMap::from([("cbcl".to_string(), vec!["unknown_col".to_string()])]),
        ..Default::default()
    };
    assert!(factory
        .validate_parameters(&DemographicFilters::default(), &[], Some(&selection))
        .is_err());
}
