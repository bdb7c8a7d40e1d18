//! Datasets: keys, rows, and the file loaders that produce them.
pub mod csv_file;
pub mod dated;
pub mod json_file;
pub mod registry;
pub mod types;

pub use csv_file::CsvLoader;
pub use json_file::JsonLoader;
pub use registry::{DataLoader, DatasetBindings, DatasetProvider, DirectoryProvider, LoaderRegistry, MissingDataset};
pub use types::{Dataset, Datasets, Fields, Key, KeyError};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("failed to read data directory {}: {source}", .path.display())]
    ReadDir { path: PathBuf, source: std::io::Error },
    #[error("failed to open {}: {source}", .path.display())]
    Io { path: PathBuf, source: std::io::Error },
    #[error("failed to read CSV {}: {source}", .path.display())]
    Csv { path: PathBuf, source: csv::Error },
    #[error("failed to unmarshal JSON from {}: {source}", .path.display())]
    Json { path: PathBuf, source: serde_json::Error },
    #[error("{}: missing required columns (company_id, date)", .path.display())]
    MissingColumns { path: PathBuf },
}
