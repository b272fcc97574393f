use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DashboardError, DashboardResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where verbatim copies of uploaded files are kept.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    /// Read ambiguous numeric dates as day/month instead of month/day.
    #[serde(default)]
    pub day_first: bool,
    #[serde(default)]
    pub columns: ColumnNames,
}

/// Header text (after trimming) of the columns the ingestor looks up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnNames {
    #[serde(default = "default_tech")]
    pub tech: String,
    #[serde(default = "default_submission_date")]
    pub submission_date: String,
    #[serde(default = "default_date")]
    pub date: String,
    #[serde(default = "default_drop_length")]
    pub drop_length: String,
    #[serde(default = "default_prep_hours")]
    pub prep_hours: String,
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploaded_files")
}
fn default_tech() -> String {
    "Tech".to_string()
}
fn default_submission_date() -> String {
    "Submission Date".to_string()
}
fn default_date() -> String {
    "Date".to_string()
}
fn default_drop_length() -> String {
    "Drop Length".to_string()
}
fn default_prep_hours() -> String {
    "Prep Hours".to_string()
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            tech: default_tech(),
            submission_date: default_submission_date(),
            date: default_date(),
            drop_length: default_drop_length(),
            prep_hours: default_prep_hours(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            day_first: false,
            columns: ColumnNames::default(),
        }
    }
}

impl Config {
    /// Load a TOML config file, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> DashboardResult<Self> {
        let Some(path) = path else {
            return Ok(Config::default());
        };

        let content = fs::read_to_string(path).map_err(|e| {
            DashboardError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| DashboardError::Config(format!("{}: {e}", path.display())))?;

        debug!(path = %path.display(), ?config, "loaded configuration");
        Ok(config)
    }
}
