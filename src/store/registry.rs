//! Loader registry, directory provider and logical dataset bindings.

use super::csv_file::CsvLoader;
use super::json_file::JsonLoader;
use super::types::{Dataset, Datasets};
use super::DataError;
use crate::logger::{log_to, SharedLogger};
use log::Log;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Reads one file into a `Dataset`.
pub trait DataLoader: Send + Sync {
    fn load(&self, path: &Path, logger: &dyn Log) -> Result<Dataset, DataError>;
}

/// Produces every dataset found under a directory, keyed by source name.
pub trait DatasetProvider {
    fn load_all(&self, dir: &Path) -> Result<Datasets, DataError>;
}

/// Maps a file extension (without the dot) to the loader that reads it.
pub struct LoaderRegistry {
    loaders: HashMap<String, Box<dyn DataLoader>>,
}

impl LoaderRegistry {
    pub fn empty() -> Self {
        Self { loaders: HashMap::new() }
    }

    pub fn get(&self, extension: &str) -> Option<&dyn DataLoader> {
        self.loaders.get(extension).map(Box::as_ref)
    }

    /// Adds or replaces the loader for `extension`.
    pub fn register(&mut self, extension: impl Into<String>, loader: Box<dyn DataLoader>) {
        self.loaders.insert(extension.into(), loader);
    }
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("csv", Box::new(CsvLoader));
        registry.register("json", Box::new(JsonLoader));
        registry
    }
}

impl fmt::Debug for LoaderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut extensions: Vec<&str> = self.loaders.keys().map(String::as_str).collect();
        extensions.sort_unstable();
        f.debug_struct("LoaderRegistry").field("extensions", &extensions).finish()
    }
}

/// Loads every supported file in a directory. The dataset name is the file
/// stem, so `waste_data.csv` becomes `waste_data`.
#[derive(Debug)]
pub struct DirectoryProvider {
    registry: LoaderRegistry,
    logger: SharedLogger,
}

impl DirectoryProvider {
    pub fn new(registry: LoaderRegistry, logger: SharedLogger) -> Self {
        Self { registry, logger }
    }
}

impl DatasetProvider for DirectoryProvider {
    fn load_all(&self, dir: &Path) -> Result<Datasets, DataError> {
        let read_dir_err = |source| DataError::ReadDir { path: dir.to_path_buf(), source };
        let logger = &*self.logger;

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(read_dir_err)? {
            let path = entry.map_err(read_dir_err)?.path();
            if path.is_file() {
                paths.push(path);
            }
        }
        // Directory order is platform dependent; sort so name clashes resolve the same way.
        paths.sort();

        let mut datasets = Datasets::new();
        for path in paths {
            let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
            let Some(loader) = self.registry.get(extension) else {
                log_to!(logger, Warn, "Skipping file with unsupported extension {extension:?}: {}", path.display());
                continue;
            };
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let dataset = loader.load(&path, logger)?;
            log_to!(logger, Debug, "Loaded dataset {name} ({} rows) from {}", dataset.len(), path.display());
            if datasets.get(name).is_some() {
                log_to!(logger, Warn, "Dataset {name} defined by more than one file; {} wins", path.display());
            }
            datasets.insert(name, dataset);
        }

        Ok(datasets)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("missing dataset for key={source_name:?} (logical name {logical:?})")]
pub struct MissingDataset {
    pub logical: String,
    pub source_name: String,
}

/// Logical dataset name (as used in metric sources) to loaded source name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetBindings(BTreeMap<String, String>);

impl DatasetBindings {
    pub fn new(bindings: BTreeMap<String, String>) -> Self {
        Self(bindings)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(l, s)| (l.as_str(), s.as_str()))
    }

    /// Renames loaded sources to their logical names. Every binding must be
    /// satisfied; unbound sources are not carried over.
    pub fn bind(&self, loaded: &Datasets) -> Result<Datasets, MissingDataset> {
        let mut bound = Datasets::new();
        for (logical, source_name) in self.iter() {
            let dataset = loaded.get(source_name).ok_or_else(|| MissingDataset {
                logical: logical.to_string(),
                source_name: source_name.to_string(),
            })?;
            bound.insert(logical, dataset.clone());
        }
        Ok(bound)
    }
}

impl Default for DatasetBindings {
    fn default() -> Self {
        Self(
            [
                ("disclosure", "disclosure_data"),
                ("waste", "waste_data"),
                ("emissions", "emissions_data"),
            ]
            .into_iter()
            .map(|(l, s)| (l.to_string(), s.to_string()))
            .collect(),
        )
    }
}
