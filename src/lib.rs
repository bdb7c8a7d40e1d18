//! Configuration-driven metric scoring over (entity, year) keyed datasets.
//!
//! A score configuration declares named metrics, each an operator applied to
//! raw dataset fields (`<dataset>.<field>`) or to other metrics (`self.<name>`).
//! The metrics are ordered by their dependencies once per request and then
//! evaluated independently for every key on a fixed worker pool.

pub mod compute;
pub mod config;
pub mod display;
pub mod error;
pub mod graph;
pub mod logger;
pub mod pipeline;
pub mod store;

pub use compute::{CancelToken, Engine, Operator, OperatorRegistry, ScoreStream, ScoredRow};
pub use config::{EngineSettings, MetricDef, ScoreConfig, ScoreConfigProvider, YamlConfigProvider};
pub use error::ScoringError;
pub use graph::{CycleDetected, EvaluationPlan};
pub use logger::SharedLogger;
pub use pipeline::{compute_stream, Pipeline, Prepared};
pub use store::{Dataset, DatasetProvider, Datasets, DirectoryProvider, Key, LoaderRegistry};
