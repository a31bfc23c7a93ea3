//! TOML-based configuration.
//!
//! Supports a config file (cohortql.toml) with environment variable
//! expansion. Settings are passed explicitly into every compilation call;
//! there is no process-wide "current config".
//!
//! Example configuration:
//! ```toml
//! [data]
//! dir = "${STUDY_DATA_DIR}"
//! demographics_file = "demographics.csv"
//!
//! [columns]
//! primary_id = "subject_id"
//! session = "session_id"
//! composite_id = "composite_id"
//! age = "age"
//! study_site = "study_site"
//!
//! [baseline]
//! label = "BAS"
//! aliases = ["BAS1", "BAS2"]
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Dataset location.
    pub data: DataSettings,

    /// Column names the compiler keys on.
    pub columns: ColumnSettings,

    /// Baseline session consolidation for the longitudinal reshape.
    pub baseline: BaselineSettings,
}

/// Dataset location.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DataSettings {
    /// Directory holding the CSV tables (supports ${ENV_VAR} expansion).
    pub dir: String,

    /// Demographics file name within the data directory.
    pub demographics_file: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            dir: "./data".to_string(),
            demographics_file: "demographics.csv".to_string(),
        }
    }
}

/// Column names the compiler keys on. Classification of the dataset is
/// driven by which of these exist in the demographics schema; ties are
/// never broken by guessing over candidate columns.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ColumnSettings {
    /// Subject identifier column. Must exist in demographics.
    pub primary_id: String,

    /// Session/visit column. Present in demographics means longitudinal.
    pub session: String,

    /// Materialized (subject, session) key column.
    pub composite_id: String,

    /// Age column for the demographic age filter.
    pub age: String,

    /// Study site column for the demographic site filter.
    pub study_site: String,
}

impl Default for ColumnSettings {
    fn default() -> Self {
        Self {
            primary_id: "subject_id".to_string(),
            session: "session_id".to_string(),
            composite_id: "composite_id".to_string(),
            age: "age".to_string(),
            study_site: "study_site".to_string(),
        }
    }
}

/// Baseline session consolidation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BaselineSettings {
    /// Canonical label the aliases merge into.
    pub label: String,

    /// Session labels treated as the same logical baseline visit, in
    /// priority order for conflict resolution.
    pub aliases: Vec<String>,
}

impl Default for BaselineSettings {
    fn default() -> Self {
        Self {
            label: "BAS".to_string(),
            aliases: vec!["BAS1".to_string(), "BAS2".to_string()],
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `COHORTQL_CONFIG`
    /// 2. `./cohortql.toml`
    /// 3. `~/.config/cohortql/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("COHORTQL_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("cohortql.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("cohortql").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    /// The data directory with environment variables expanded.
    pub fn data_dir(&self) -> Result<PathBuf, SettingsError> {
        Ok(PathBuf::from(expand_env_vars(&self.data.dir)?))
    }

    /// Full path to the demographics file.
    pub fn demographics_path(&self) -> Result<PathBuf, SettingsError> {
        Ok(self.data_dir()?.join(&self.data.demographics_file))
    }

    /// Demographics table name: the file name without its extension.
    pub fn demographics_table(&self) -> String {
        Path::new(&self.data.demographics_file)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.data.demographics_file.clone())
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' {
            if chars.peek() == Some(&'{') {
                chars.next(); // consume '{'
                let mut var_name = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch == '}' {
                        chars.next(); // consume '}'
                        break;
                    }
                    var_name.push(ch);
                    chars.next();
                }
                let value = env::var(&var_name)
                    .map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
                result.push_str(&value);
            } else {
                // $VAR (ends at non-alphanumeric/underscore)
                let mut var_name = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_alphanumeric() || ch == '_' {
                        var_name.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if var_name.is_empty() {
                    // Just a lone $, keep it
                    result.push('$');
                } else {
                    let value = env::var(&var_name)
                        .map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
                    result.push_str(&value);
                }
            }
        } else {
            result.push(c);
        }
    }

    Ok(result)
}
