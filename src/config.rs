use crate::model::{AnalysisError, AnalysisParams};
use chrono::NaiveDate;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

/// Where the pipe-delimited price export comes from.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceConfig {
    File { path: PathBuf },
    Http {
        url: String,
        #[serde(default = "default_timeout_seconds")]
        timeout_seconds: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_min_drop_threshold")]
    pub min_drop_threshold: f64,
    #[serde(default = "default_max_gap_days")]
    pub max_gap_days: u32,
    #[serde(default)]
    pub date_from: Option<NaiveDate>,
    #[serde(default)]
    pub date_to: Option<NaiveDate>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_drop_threshold: default_min_drop_threshold(),
            max_gap_days: default_max_gap_days(),
            date_from: None,
            date_to: None,
        }
    }
}

impl AnalysisConfig {
    pub fn params(&self) -> Result<AnalysisParams, AnalysisError> {
        AnalysisParams::new(self.min_drop_threshold, self.max_gap_days)?
            .with_date_range(self.date_from, self.date_to)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AppConfig {
    pub source: SourceConfig,
    /// Optional SQLite cache for the loaded price histories.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    /// Securities to analyze; empty means every security in the data.
    #[serde(default)]
    pub securities: Vec<String>,
    /// Print each analysis as a JSON line on stdout.
    #[serde(default)]
    pub print_json: bool,
}

fn default_min_drop_threshold() -> f64 {
    0.02
}

fn default_max_gap_days() -> u32 {
    10
}

fn default_timeout_seconds() -> u64 {
    30
}

/// Reads the config file and validates its analysis section into run parameters.
pub fn load_config(path: impl AsRef<Path>) -> Result<(AppConfig, AnalysisParams), ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&content)?;
    let params = config.analysis.params()?;
    Ok((config, params))
}
