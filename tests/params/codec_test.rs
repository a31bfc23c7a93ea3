use cohortql::config::Settings;
use cohortql::params::{self, CohortSpec};
use cohortql::query::{
    DemographicFilters, ExportSelection, FilterCompiler, PhenotypicFilter,
};
use cohortql::schema::{ColumnType, SchemaSnapshot, TableSchema};
use std::collections::BTreeMap;

fn snapshot() -> SchemaSnapshot {
    let demo = TableSchema::new("demographics")
        .with_column("subject_id", ColumnType::Text)
        .with_column("session_id", ColumnType::Text)
        .with_column("composite_id", ColumnType::Text)
        .with_column("age", ColumnType::Float)
        .with_column("study_site", ColumnType::Text);
    let cbcl = TableSchema::new("cbcl")
        .with_column("subject_id", ColumnType::Text)
        .with_column("composite_id", ColumnType::Text)
        .with_column("total_score", ColumnType::Float)
        .with_column("dx_group", ColumnType::Text);
    SchemaSnapshot::new(demo, vec![cbcl], &Settings::default())
        .unwrap()
        .with_session_values(vec!["BAS1".to_string(), "FU1".to_string()])
}

fn reference_spec() -> CohortSpec {
    CohortSpec {
        demographic: DemographicFilters {
            age_range: Some((18.0, 65.0)),
            ..Default::default()
        },
        phenotypic: vec![PhenotypicFilter::categorical(
            "cbcl",
            "dx_group",
            vec!["adhd".into(), "asd".into(), "control".into()],
        )],
        selection: ExportSelection {
            tables: vec!["cbcl".to_string()],
            columns: BTreeMap::from([("cbcl".to_string(), vec!["total_score".to_string()])]),
            enwiden: true,
            consolidate_baseline: false,
        },
    }
}

#[test]
fn test_round_trip_reproduces_compiled_predicates() {
    let snapshot = snapshot();
    let settings = Settings::default();
    let spec = reference_spec();

    let text = params::export(&spec, "my cohort").unwrap();
    let (imported, issues) = params::import(&text, &snapshot).unwrap();
    assert!(issues.is_empty(), "unexpected issues: {:?}", issues);

    let compiler = FilterCompiler::new(&snapshot, &settings);
    let original = compiler.compile(&spec.demographic, &spec.phenotypic).unwrap();
    let round_tripped = compiler
        .compile(&imported.demographic, &imported.phenotypic)
        .unwrap();

    assert_eq!(original.predicates.len(), round_tripped.predicates.len());
    let mut original_params: Vec<String> =
        original.params().iter().map(|p| p.to_string()).collect();
    let mut round_params: Vec<String> =
        round_tripped.params().iter().map(|p| p.to_string()).collect();
    original_params.sort();
    round_params.sort();
    assert_eq!(original_params, round_params);
}

#[test]
fn test_export_import_is_semantically_stable() {
    let snapshot = snapshot();
    let spec = reference_spec();

    let once = params::export(&spec, "notes survive").unwrap();
    let (imported, _) = params::import(&once, &snapshot).unwrap();
    let twice = params::export(&imported, "notes survive").unwrap();
    let (reimported, _) = params::import(&twice, &snapshot).unwrap();

    assert_eq!(imported, reimported);
    assert_eq!(imported.selection, spec.selection);
    assert_eq!(imported.demographic, spec.demographic);
}

#[test]
fn test_metadata_is_stamped() {
    let spec = reference_spec();
    let text = params::export(&spec, "pilot cohort").unwrap();

    assert!(text.contains("export_timestamp"));
    assert!(text.contains("format_version"));
    assert!(text.contains("pilot cohort"));
}

#[test]
fn test_invalid_entries_are_skipped_individually() {
    let snapshot = snapshot();
    let text = r#"
[filters]

[filters.demographic]
substudies = ["ucla"]
sessions = ["BAS1", "GHOST"]

[[filters.phenotypic]]
table = "cbcl"
column = "total_score"
type = "range"
value = { min = 10.0, max = 40.0 }

[[filters.phenotypic]]
table = "not_a_table"
column = "whatever"
type = "range"
value = { min = 0.0, max = 1.0 }

[selection]
tables = ["cbcl", "also_missing"]

[selection.columns]
cbcl = ["total_score", "bogus_col"]

[options]
enwiden_longitudinal = true
"#;

    let (spec, issues) = params::import(text, &snapshot).unwrap();

    // The valid parts all arrive.
    assert_eq!(spec.phenotypic.len(), 1);
    assert_eq!(spec.phenotypic[0].table(), "cbcl");
    assert_eq!(spec.selection.tables, vec!["cbcl"]);
    assert_eq!(
        spec.selection.columns["cbcl"],
        vec!["total_score".to_string()]
    );
    assert!(spec.demographic.sessions.contains("BAS1"));
    assert!(!spec.demographic.sessions.contains("GHOST"));
    assert!(spec.selection.enwiden);

    // Each invalid entry is reported once.
    assert_eq!(issues.len(), 4);
    let reasons: Vec<&str> = issues.iter().map(|i| i.reason.as_str()).collect();
    assert!(reasons.iter().any(|r| r.contains("GHOST")));
    assert!(reasons.iter().any(|r| r.contains("not_a_table")));
    assert!(reasons.iter().any(|r| r.contains("also_missing")));
    assert!(reasons.iter().any(|r| r.contains("bogus_col")));
}

#[test]
fn test_structurally_malformed_file_rejects_whole_import() {
    let snapshot = snapshot();

    // Unparseable TOML.
    assert!(params::import("not [ toml", &snapshot).is_err());

    // Parseable but missing the required sections.
    assert!(params::import("[metadata]\nuser_notes = \"x\"\n", &snapshot).is_err());
}

#[test]
fn test_imported_filters_compile_like_handwritten_ones() {
    let snapshot = snapshot();
    let settings = Settings::default();
    let text = r#"
[filters]

[filters.demographic]
age_range = { min = 18.0, max = 65.0 }

[[filters.phenotypic]]
table = "cbcl"
column = "dx_group"
type = "categorical"
value = ["adhd", "asd", "control"]

[selection]
tables = ["cbcl"]

[selection.columns]
cbcl = ["total_score"]
"#;

    let (spec, issues) = params::import(text, &snapshot).unwrap();
    assert!(issues.is_empty());

    let compiled = FilterCompiler::new(&snapshot, &settings)
        .compile(&spec.demographic, &spec.phenotypic)
        .unwrap();

    assert_eq!(compiled.predicates.len(), 2);
    assert_eq!(
        compiled.predicates[0].sql,
        "\"demographics\".\"age\" BETWEEN ? AND ?"
    );
    assert_eq!(
        compiled.predicates[1].sql,
        "\"cbcl\".\"dx_group\" IN (?, ?, ?)"
    );
}
