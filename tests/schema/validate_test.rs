use cohortql::config::Settings;
use cohortql::error::CompileError;
use cohortql::schema::{ColumnType, IdentifierValidator, SchemaSnapshot, TableSchema};

fn snapshot() -> SchemaSnapshot {
    let demo = TableSchema::new("demographics")
        .with_column("subject_id", ColumnType::Text)
        .with_column("age", ColumnType::Float)
        .with_column("study_site", ColumnType::Text);
    let cbcl = TableSchema::new("cbcl")
        .with_column("subject_id", ColumnType::Text)
        .with_column("total_score", ColumnType::Float);
    SchemaSnapshot::new(demo, vec![cbcl], &Settings::default()).unwrap()
}

#[test]
fn test_whitelisted_identifiers_pass_through_unchanged() {
    let snapshot = snapshot();
    let validator = IdentifierValidator::new(&snapshot);

    assert_eq!(validator.validate_table("demographics").unwrap(), "demographics");
    assert_eq!(validator.validate_table("cbcl").unwrap(), "cbcl");
    assert_eq!(
        validator.validate_column("demographics", "age").unwrap(),
        "age"
    );
}

#[test]
fn test_unknown_table() {
    let snapshot = snapshot();
    let validator = IdentifierValidator::new(&snapshot);

    assert_eq!(
        validator.validate_table("wisc").unwrap_err(),
        CompileError::UnknownTable("wisc".into())
    );
}

#[test]
fn test_unknown_column_names_both_parts() {
    let snapshot = snapshot();
    let validator = IdentifierValidator::new(&snapshot);

    assert_eq!(
        validator.validate_column("cbcl", "aggression").unwrap_err(),
        CompileError::UnknownColumn {
            table: "cbcl".into(),
            column: "aggression".into(),
        }
    );
}

#[test]
fn test_column_on_unknown_table_reports_the_table() {
    let snapshot = snapshot();
    let validator = IdentifierValidator::new(&snapshot);

    assert_eq!(
        validator.validate_column("wisc", "fsiq").unwrap_err(),
        CompileError::UnknownTable("wisc".into())
    );
}

#[test]
fn test_hostile_shapes_rejected_before_lookup() {
    let snapshot = snapshot();
    let validator = IdentifierValidator::new(&snapshot);

    for bad in [
        "cbcl; DROP TABLE demographics",
        "cbcl\"",
        "total score",
        "a.b",
        "",
        "col--comment",
    ] {
        assert_eq!(
            validator.validate_table(bad).unwrap_err(),
            CompileError::InvalidIdentifier(bad.into()),
            "expected shape rejection for {:?}",
            bad
        );
    }
}
