use cohortql::config::Settings;
use cohortql::reshape::{LongRow, LongitudinalReshaper};
use cohortql::sql::SqlValue;

fn reshaper(consolidate: bool) -> LongitudinalReshaper {
    LongitudinalReshaper::new(&Settings::default(), consolidate)
}

fn score_columns() -> Vec<String> {
    vec!["score".to_string()]
}

#[test]
fn test_one_row_per_subject_with_session_suffixed_columns() {
    let rows = vec![
        LongRow::new("s1", "BAS1").with_value("score", SqlValue::Int(5)),
        LongRow::new("s1", "FU1").with_value("score", SqlValue::Int(7)),
        LongRow::new("s2", "BAS1").with_value("score", SqlValue::Int(3)),
    ];

    let wide = reshaper(false).enwiden(&rows, &score_columns());

    assert_eq!(wide.columns, vec!["subject_id", "score_BAS1", "score_FU1"]);
    assert_eq!(wide.rows.len(), 2);
    assert_eq!(
        wide.rows[0],
        vec![
            SqlValue::Text("s1".into()),
            SqlValue::Int(5),
            SqlValue::Int(7)
        ]
    );
}

#[test]
fn test_missing_sessions_are_null_not_zero() {
    let rows = vec![
        LongRow::new("s1", "BAS1").with_value("score", SqlValue::Int(5)),
        LongRow::new("s1", "FU1").with_value("score", SqlValue::Int(7)),
        LongRow::new("s2", "BAS1").with_value("score", SqlValue::Int(3)),
    ];

    let wide = reshaper(false).enwiden(&rows, &score_columns());

    // s2 never attended FU1: the cell exists and is Null.
    assert_eq!(
        wide.rows[1],
        vec![
            SqlValue::Text("s2".into()),
            SqlValue::Int(3),
            SqlValue::Null
        ]
    );
}

#[test]
fn test_baseline_aliases_merge_into_one_column() {
    let rows = vec![
        LongRow::new("s1", "BAS1").with_value("score", SqlValue::Int(5)),
        LongRow::new("s2", "BAS2").with_value("score", SqlValue::Int(9)),
        LongRow::new("s3", "FU1").with_value("score", SqlValue::Int(2)),
    ];

    let wide = reshaper(true).enwiden(&rows, &score_columns());

    assert_eq!(wide.columns, vec!["subject_id", "score_BAS", "score_FU1"]);
    assert_eq!(
        wide.rows[0],
        vec![SqlValue::Text("s1".into()), SqlValue::Int(5), SqlValue::Null]
    );
    assert_eq!(
        wide.rows[1],
        vec![SqlValue::Text("s2".into()), SqlValue::Int(9), SqlValue::Null]
    );
}

#[test]
fn test_baseline_conflict_resolves_first_non_null_in_alias_order() {
    // BAS2 arrives first in row order, but BAS1 has alias priority; its
    // non-null value wins.
    let rows = vec![
        LongRow::new("s1", "BAS2").with_value("score", SqlValue::Int(9)),
        LongRow::new("s1", "BAS1").with_value("score", SqlValue::Int(5)),
    ];
    let wide = reshaper(true).enwiden(&rows, &score_columns());
    assert_eq!(
        wide.rows[0],
        vec![SqlValue::Text("s1".into()), SqlValue::Int(5)]
    );

    // When the higher-priority alias holds a null, the lower one fills in:
    // first non-null wins, not first alias unconditionally.
    let rows = vec![
        LongRow::new("s1", "BAS1").with_value("score", SqlValue::Null),
        LongRow::new("s1", "BAS2").with_value("score", SqlValue::Int(9)),
    ];
    let wide = reshaper(true).enwiden(&rows, &score_columns());
    assert_eq!(
        wide.rows[0],
        vec![SqlValue::Text("s1".into()), SqlValue::Int(9)]
    );
}

#[test]
fn test_without_consolidation_aliases_stay_separate() {
    let rows = vec![
        LongRow::new("s1", "BAS1").with_value("score", SqlValue::Int(5)),
        LongRow::new("s1", "BAS2").with_value("score", SqlValue::Int(9)),
    ];

    let wide = reshaper(false).enwiden(&rows, &score_columns());

    assert_eq!(wide.columns, vec!["subject_id", "score_BAS1", "score_BAS2"]);
}

#[test]
fn test_multiple_value_columns_fan_out_per_session() {
    let rows = vec![
        LongRow::new("s1", "BAS1")
            .with_value("score", SqlValue::Int(5))
            .with_value("rt", SqlValue::Float(0.42)),
        LongRow::new("s1", "FU1").with_value("score", SqlValue::Int(7)),
    ];

    let wide = reshaper(false).enwiden(
        &rows,
        &["rt".to_string(), "score".to_string()],
    );

    assert_eq!(
        wide.columns,
        vec!["subject_id", "rt_BAS1", "rt_FU1", "score_BAS1", "score_FU1"]
    );
    assert_eq!(
        wide.rows[0],
        vec![
            SqlValue::Text("s1".into()),
            SqlValue::Float(0.42),
            SqlValue::Null,
            SqlValue::Int(5),
            SqlValue::Int(7),
        ]
    );
}

#[test]
fn test_output_order_is_deterministic() {
    let rows = vec![
        LongRow::new("zed", "FU1").with_value("score", SqlValue::Int(1)),
        LongRow::new("ann", "BAS1").with_value("score", SqlValue::Int(2)),
    ];

    let wide = reshaper(false).enwiden(&rows, &score_columns());

    // Subjects and sessions come out sorted regardless of input order.
    assert_eq!(wide.rows[0][0], SqlValue::Text("ann".into()));
    assert_eq!(wide.rows[1][0], SqlValue::Text("zed".into()));
    assert_eq!(wide.columns, vec!["subject_id", "score_BAS1", "score_FU1"]);
}
