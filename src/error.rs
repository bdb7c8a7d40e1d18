use crate::compute::ScheduleError;
use crate::config::ConfigError;
use crate::graph::CycleDetected;
use crate::store::{DataError, MissingDataset};
use thiserror::Error;

/// Terminal failures of a scoring request. Metric-level problems never surface
/// here; they become nulls in the affected rows.
#[derive(Error, Debug)]
pub enum ScoringError {
    #[error("failed to load score configuration '{config_id}': {source}")]
    ConfigLoadFailed { config_id: String, source: ConfigError },
    #[error(transparent)]
    CycleDetected(#[from] CycleDetected),
    #[error("failed to load datasets: {0}")]
    DatasetLoadFailed(#[from] DataError),
    #[error(transparent)]
    MissingDataset(#[from] MissingDataset),
    #[error("operation cancelled")]
    Cancelled,
    #[error(transparent)]
    Scheduler(ScheduleError),
}

impl From<ScheduleError> for ScoringError {
    fn from(err: ScheduleError) -> Self {
        match err {
            ScheduleError::Cancelled => ScoringError::Cancelled,
            other => ScoringError::Scheduler(other),
        }
    }
}
