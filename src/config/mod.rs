//! Score configuration and engine settings.
pub mod provider;
pub mod score;
pub mod settings;

pub use provider::{ScoreConfigProvider, YamlConfigProvider};
pub use score::{MetricDef, Operation, Parameter, ScoreConfig, SELF_PREFIX};
pub use settings::{EngineSettings, DEFAULT_WORKERS};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io { path: PathBuf, source: std::io::Error },
    #[error("failed to parse {origin}: {source}")]
    Parse { origin: String, source: serde_yaml::Error },
    #[error("metric #{index} has an empty name")]
    EmptyMetricName { index: usize },
    #[error("metric '{0}' is defined more than once")]
    DuplicateMetric(String),
    #[error("invalid setting: {0}")]
    InvalidSetting(String),
}
