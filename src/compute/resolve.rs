//! Value resolution for parameter sources.
//!
//! `self.<metric>` reads the key's ledger; `<dataset>.<field>` reads a raw field.
//! Every failure is a reason for "no value", never a hard error.

use crate::compute::ledger::Ledger;
use crate::config::SELF_PREFIX;
use crate::store::{Datasets, Key};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Unresolved {
    #[error("metric '{0}' has no value")]
    MetricNotComputed(String),
    #[error("source '{0}' is not of the form <dataset>.<field>")]
    MalformedSource(String),
    #[error("dataset '{0}' is not loaded")]
    UnknownDataset(String),
    #[error("dataset '{dataset}' has no row for {key}")]
    NoRow { dataset: String, key: Key },
    #[error("dataset '{dataset}' has no field '{field}'")]
    NoField { dataset: String, field: String },
}

pub fn resolve(source: &str, key: &Key, ledger: &Ledger, datasets: &Datasets) -> Result<f64, Unresolved> {
    if let Some(metric) = source.strip_prefix(SELF_PREFIX) {
        return ledger
            .get(metric)
            .ok_or_else(|| Unresolved::MetricNotComputed(metric.to_string()));
    }

    let mut parts = source.split('.');
    let (dataset, field) = match (parts.next(), parts.next(), parts.next()) {
        (Some(dataset), Some(field), None) => (dataset, field),
        _ => return Err(Unresolved::MalformedSource(source.to_string())),
    };

    let data = datasets
        .get(dataset)
        .ok_or_else(|| Unresolved::UnknownDataset(dataset.to_string()))?;
    let row = data.row(key).ok_or_else(|| Unresolved::NoRow {
        dataset: dataset.to_string(),
        key: key.clone(),
    })?;
    row.get(field).copied().ok_or_else(|| Unresolved::NoField {
        dataset: dataset.to_string(),
        field: field.to_string(),
    })
}
