//! Engine settings: worker count, input locations and dataset bindings.
//!
//! Defaults reproduce the reference deployment; a YAML file may override any
//! subset of fields, and the CLI overrides the file.

use super::provider::read_to_string;
use super::ConfigError;
use crate::store::DatasetBindings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_WORKERS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Size of the per-key worker pool.
    pub workers: usize,
    pub data_dir: PathBuf,
    pub config_dir: PathBuf,
    pub config_id: String,
    pub bindings: DatasetBindings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            data_dir: PathBuf::from("data"),
            config_dir: PathBuf::from("."),
            config_id: "score_1.yaml".to_string(),
            bindings: DatasetBindings::default(),
        }
    }
}

impl EngineSettings {
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let yaml = read_to_string(path)?;
        let settings: Self = serde_yaml::from_str(&yaml).map_err(|source| ConfigError::Parse {
            origin: path.display().to_string(),
            source,
        })?;
        if settings.workers == 0 {
            return Err(ConfigError::InvalidSetting("workers must be at least 1".to_string()));
        }
        Ok(settings)
    }
}
