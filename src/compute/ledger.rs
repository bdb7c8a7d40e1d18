use crate::compute::kernel::OperatorError;
use crate::store::Key;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Why a single metric produced no value. Absorbed as null by the engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricError {
    #[error("unknown operator '{0}'")]
    UnknownOperator(String),
    #[error(transparent)]
    Operator(#[from] OperatorError),
}

/// A failure that invalidates a whole row. Rows carrying one are dropped.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowError {
    #[error("{key}: metric '{metric}' is in the evaluation order but has no definition")]
    MissingDefinition { key: Key, metric: String },
    #[error("{key}: evaluation panicked: {message}")]
    Panicked { key: Key, message: String },
}

/// Per-key accumulator of computed metric values. Only non-null results are stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    values: BTreeMap<String, f64>,
}

impl Ledger {
    pub fn new() -> Self { Self::default() }

    pub fn get(&self, metric: &str) -> Option<f64> {
        self.values.get(metric).copied()
    }

    pub fn insert(&mut self, metric: impl Into<String>, value: f64) {
        self.values.insert(metric.into(), value);
    }

    pub fn len(&self) -> usize { self.values.len() }

    pub fn is_empty(&self) -> bool { self.values.is_empty() }

    pub fn into_values(self) -> BTreeMap<String, f64> {
        self.values
    }
}

/// One output row: a key and its non-null metric values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredRow {
    pub key: Key,
    pub metrics: BTreeMap<String, f64>,
}

impl ScoredRow {
    pub fn new(key: Key, ledger: Ledger) -> Self {
        Self { key, metrics: ledger.into_values() }
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }
}
