//! Request-level entry points: load, plan, schedule.
//!
//! Everything that can fail terminally (configuration, cycle, datasets, bindings)
//! is checked before a single key is scheduled.

use crate::compute::{CancelToken, Engine, OperatorRegistry, ScoreStream, ScoredRow, Scheduler};
use crate::config::{ScoreConfig, ScoreConfigProvider, DEFAULT_WORKERS};
use crate::error::ScoringError;
use crate::graph::EvaluationPlan;
use crate::logger::{log_to, SharedLogger};
use crate::store::{DatasetBindings, DatasetProvider, Datasets, Key};
use std::path::Path;
use std::sync::Arc;

/// A configuration, its compiled plan and the bound datasets, ready to schedule.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub config: ScoreConfig,
    pub plan: EvaluationPlan,
    pub datasets: Datasets,
}

impl Prepared {
    /// Every key present in any bound dataset, sorted.
    pub fn keys(&self) -> Vec<Key> {
        self.datasets.all_keys()
    }
}

/// The collaborators a scoring request runs against.
pub struct Pipeline<'a> {
    logger: SharedLogger,
    configs: &'a dyn ScoreConfigProvider,
    data: &'a dyn DatasetProvider,
    bindings: DatasetBindings,
    operators: OperatorRegistry,
    workers: usize,
}

impl<'a> Pipeline<'a> {
    pub fn new(logger: SharedLogger, configs: &'a dyn ScoreConfigProvider, data: &'a dyn DatasetProvider) -> Self {
        Self {
            logger,
            configs,
            data,
            bindings: DatasetBindings::default(),
            operators: OperatorRegistry::default(),
            workers: DEFAULT_WORKERS,
        }
    }

    pub fn with_bindings(mut self, bindings: DatasetBindings) -> Self {
        self.bindings = bindings;
        self
    }

    pub fn with_operators(mut self, operators: OperatorRegistry) -> Self {
        self.operators = operators;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Loads and checks everything a run needs.
    pub fn prepare(&self, config_id: &str, data_dir: &Path) -> Result<Prepared, ScoringError> {
        let logger = &*self.logger;

        let config = self.configs.load(config_id).map_err(|source| {
            log_to!(logger, Error, "failed to load score configuration {config_id}: {source}");
            ScoringError::ConfigLoadFailed { config_id: config_id.to_string(), source }
        })?;
        log_to!(logger, Info, "loaded configuration {config_id} with {} metrics", config.metrics.len());

        let plan = EvaluationPlan::compile(&config, logger)?;

        let loaded = self.data.load_all(data_dir).inspect_err(|err| {
            log_to!(logger, Error, "{err}");
        })?;
        let datasets = self.bindings.bind(&loaded).inspect_err(|err| {
            log_to!(logger, Error, "{err}");
        })?;
        log_to!(logger, Info, "bound {} datasets from {}", datasets.len(), data_dir.display());

        Ok(Prepared { config, plan, datasets })
    }

    /// Computes every key and returns the rows sorted by (entity, year), along
    /// with the configuration that produced them.
    pub fn compute_batch(
        &self,
        cancel: &CancelToken,
        config_id: &str,
        data_dir: &Path,
    ) -> Result<(ScoreConfig, Vec<ScoredRow>), ScoringError> {
        let Prepared { config, plan, datasets } = self.prepare(config_id, data_dir)?;
        if cancel.is_cancelled() {
            return Err(ScoringError::Cancelled);
        }

        let keys = datasets.all_keys();
        let rows = Scheduler::new(self.engine(plan, datasets), self.workers).run_batch(keys, cancel)?;
        Ok((config, rows))
    }

    /// Like `compute_stream`, using this pipeline's operators and worker count.
    pub fn stream(&self, cancel: CancelToken, prepared: Prepared) -> Result<ScoreStream, ScoringError> {
        let keys = prepared.keys();
        let engine = self.engine(prepared.plan, prepared.datasets);
        Ok(Scheduler::new(engine, self.workers).run_stream(keys, cancel)?)
    }

    pub fn engine(&self, plan: EvaluationPlan, datasets: Datasets) -> Engine {
        Engine::new(Arc::new(plan), Arc::new(datasets), self.logger.clone()).with_operators(self.operators.clone())
    }
}

/// Opens a cancellable stream of rows for `keys`, in completion order.
pub fn compute_stream(
    cancel: CancelToken,
    logger: SharedLogger,
    keys: Vec<Key>,
    plan: EvaluationPlan,
    datasets: Datasets,
    workers: usize,
) -> Result<ScoreStream, ScoringError> {
    if cancel.is_cancelled() {
        return Err(ScoringError::Cancelled);
    }
    let engine = Engine::new(Arc::new(plan), Arc::new(datasets), logger);
    Ok(Scheduler::new(engine, workers).run_stream(keys, cancel)?)
}
