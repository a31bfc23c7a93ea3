//! Cohortql CLI - compile cohort parameter files to SQL
//!
//! Usage:
//!   cohortql compile <params.toml> [--kind count|data]
//!   cohortql validate <params.toml>
//!   cohortql prepare
//!   cohortql tables
//!
//! Examples:
//!   cohortql compile cohort.toml --kind count
//!   cohortql compile cohort.toml --kind data --output json
//!   cohortql prepare --config ./cohortql.toml

use clap::{Parser, Subcommand, ValueEnum};
use cohortql::config::Settings;
use cohortql::params;
use cohortql::prepare::{prepare_demographics, PrepareOutcome};
use cohortql::query::QueryFactory;
use cohortql::schema::{ColumnType, SchemaSnapshot, TableSchema};
use cohortql::SqlQuery;
use polars::prelude::*;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "cohortql")]
#[command(about = "Cohortql - a cohort query compiler for CSV-backed study data")]
#[command(version)]
struct Cli {
    /// Path to a settings file (defaults to the standard search order)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a parameter file to SQL with bound parameters
    Compile {
        /// Path to the parameter .toml file
        file: PathBuf,

        /// Which query variant to emit
        #[arg(short, long, default_value = "count")]
        kind: QueryKind,

        /// Output format
        #[arg(short, long, default_value = "sql")]
        output: OutputFormat,
    },

    /// Import a parameter file and report per-entry issues
    Validate {
        /// Path to the parameter .toml file
        file: PathBuf,
    },

    /// Materialize composite ids into the demographics file
    Prepare,

    /// List the tables and columns the compiler will accept
    Tables,
}

#[derive(Clone, Copy, ValueEnum)]
enum QueryKind {
    /// Cohort count query
    Count,
    /// Column-selected data query
    Data,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// SQL text, parameters on stderr-friendly comment lines
    Sql,
    /// JSON object with sql and params fields
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = match load_settings(&cli.config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading settings: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Compile { file, kind, output } => cmd_compile(&settings, file, kind, output),
        Commands::Validate { file } => cmd_validate(&settings, file),
        Commands::Prepare => cmd_prepare(&settings),
        Commands::Tables => cmd_tables(&settings),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init();
}

fn load_settings(config: &Option<PathBuf>) -> Result<Settings, cohortql::config::SettingsError> {
    match config {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    }
}

fn cmd_compile(
    settings: &Settings,
    file: PathBuf,
    kind: QueryKind,
    output: OutputFormat,
) -> ExitCode {
    let text = match fs::read_to_string(&file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading file '{}': {}", file.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let snapshot = match load_snapshot(settings) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading schema: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let (spec, issues) = match params::import(&text, &snapshot) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Import error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    for issue in &issues {
        eprintln!("warning: skipped {}", issue);
    }

    let factory = QueryFactory::new(&snapshot, settings);
    let result = match kind {
        QueryKind::Count => factory.count_query(&spec.demographic, &spec.phenotypic),
        QueryKind::Data => factory.data_query(&spec.demographic, &spec.phenotypic, &spec.selection),
    };

    match result {
        Ok(query) => {
            print_query(&query, output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Compilation error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_query(query: &SqlQuery, output: OutputFormat) {
    match output {
        OutputFormat::Sql => {
            println!("{}", query.sql);
            for (i, param) in query.params.iter().enumerate() {
                println!("-- ?{} = {}", i + 1, param);
            }
        }
        OutputFormat::Json => {
            let value = serde_json::json!({
                "sql": query.sql,
                "params": query.params,
            });
            println!("{}", value);
        }
    }
}

fn cmd_validate(settings: &Settings, file: PathBuf) -> ExitCode {
    let text = match fs::read_to_string(&file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading file '{}': {}", file.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let snapshot = match load_snapshot(settings) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading schema: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match params::import(&text, &snapshot) {
        Ok((spec, issues)) => {
            println!(
                "{} phenotypic filter(s), {} table(s) selected",
                spec.phenotypic.len(),
                spec.selection.tables.len()
            );
            if issues.is_empty() {
                println!("No issues.");
            } else {
                for issue in &issues {
                    println!("skipped {}", issue);
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Import rejected: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_prepare(settings: &Settings) -> ExitCode {
    match prepare_demographics(settings) {
        Ok(PrepareOutcome::CrossSectional) => {
            println!("Dataset is cross-sectional; nothing to do.");
            ExitCode::SUCCESS
        }
        Ok(PrepareOutcome::AlreadyPrepared) => {
            println!("Composite ids already materialized.");
            ExitCode::SUCCESS
        }
        Ok(PrepareOutcome::Materialized { rows }) => {
            println!("Materialized composite ids for {} row(s).", rows);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Preparation failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_tables(settings: &Settings) -> ExitCode {
    let snapshot = match load_snapshot(settings) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading schema: {}", e);
            return ExitCode::FAILURE;
        }
    };

    for message in snapshot.messages() {
        eprintln!("note: {}", message);
    }

    let keys = snapshot.merge_keys();
    println!(
        "dataset: {}",
        if keys.is_longitudinal() {
            "longitudinal"
        } else {
            "cross-sectional"
        }
    );
    for name in snapshot.table_names() {
        let table = snapshot.table(name).expect("listed table");
        let columns: Vec<&str> = table.columns().collect();
        println!("{}: {}", name, columns.join(", "));
    }
    ExitCode::SUCCESS
}

// ============================================================================
// Schema provider
// ============================================================================
//
// The compiler treats the snapshot as authoritative and never derives schema
// itself; this CLI-side provider builds one by scanning CSV headers in the
// data directory.

fn load_snapshot(settings: &Settings) -> Result<SchemaSnapshot, Box<dyn std::error::Error>> {
    let data_dir = settings.data_dir()?;
    let demographics_path = settings.demographics_path()?;
    if !demographics_path.exists() {
        return Err(format!(
            "demographics file not found: {}",
            demographics_path.display()
        )
        .into());
    }

    let demographics_df = read_csv(&demographics_path)?;
    let demographics = table_schema(&settings.demographics_table(), &demographics_df);

    let mut behavioral = Vec::new();
    let mut entries: Vec<PathBuf> = fs::read_dir(&data_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "csv"))
        .filter(|p| p != &demographics_path)
        .collect();
    entries.sort();

    for path in entries {
        let name = match path.file_stem() {
            Some(stem) => stem.to_string_lossy().into_owned(),
            None => continue,
        };
        let df = read_csv(&path)?;
        behavioral.push(table_schema(&name, &df));
    }

    let session_values = session_values(&demographics_df, &settings.columns.session)?;
    let snapshot = SchemaSnapshot::new(demographics, behavioral, settings)?
        .with_session_values(session_values);
    Ok(snapshot)
}

fn read_csv(path: &PathBuf) -> PolarsResult<DataFrame> {
    LazyCsvReader::new(path).finish()?.collect()
}

fn table_schema(name: &str, df: &DataFrame) -> TableSchema {
    df.get_columns().iter().fold(TableSchema::new(name), |t, column| {
        t.with_column(column.name().as_str(), column_type(column.dtype()))
    })
}

fn column_type(dtype: &DataType) -> ColumnType {
    match dtype {
        DataType::Boolean => ColumnType::Boolean,
        DataType::Float32 | DataType::Float64 => ColumnType::Float,
        dt if dt.is_integer() => ColumnType::Integer,
        _ => ColumnType::Text,
    }
}

fn session_values(df: &DataFrame, session_column: &str) -> PolarsResult<Vec<String>> {
    let Ok(column) = df.column(session_column) else {
        return Ok(Vec::new());
    };
    let unique = column
        .as_materialized_series()
        .cast(&DataType::String)?
        .unique()?;
    let mut values: Vec<String> = unique
        .str()?
        .into_iter()
        .flatten()
        .map(str::to_string)
        .collect();
    values.sort();
    Ok(values)
}
