//! Configuration module.
//!
//! Handles the cohortql.toml settings file and environment variable
//! expansion.

mod settings;

pub use settings::{
    expand_env_vars, BaselineSettings, ColumnSettings, DataSettings, Settings, SettingsError,
};
