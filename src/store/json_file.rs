//! JSON datasets: an array of objects carrying `company_id`, `date` and any
//! number of numeric fields. `null` and non-numeric values are absent fields.

use super::csv_file::{DATE_COLUMN, ENTITY_COLUMN};
use super::dated::{parse_date_or_year, LatestRows};
use super::registry::DataLoader;
use super::types::{Dataset, Fields, Key};
use super::DataError;
use crate::logger::log_to;
use chrono::Datelike;
use log::Log;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLoader;

/// Identifiers and dates may be written as strings or as bare numbers.
fn as_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl DataLoader for JsonLoader {
    fn load(&self, path: &Path, logger: &dyn Log) -> Result<Dataset, DataError> {
        let file = File::open(path).map_err(|source| DataError::Io { path: path.to_path_buf(), source })?;
        let objects: Vec<Map<String, Value>> = serde_json::from_reader(BufReader::new(file))
            .map_err(|source| DataError::Json { path: path.to_path_buf(), source })?;

        let mut rows = LatestRows::default();
        for object in objects {
            let entity = as_text(object.get(ENTITY_COLUMN)).unwrap_or_default();
            let raw_date = as_text(object.get(DATE_COLUMN)).unwrap_or_default();

            let date = match parse_date_or_year(&raw_date) {
                Ok(date) => date,
                Err(e) => {
                    log_to!(logger, Warn, "Skipping row for company={entity} due to invalid date {raw_date:?}: {e}");
                    continue;
                }
            };
            let key = match Key::new(entity.as_str(), date.year()) {
                Ok(key) => key,
                Err(e) => {
                    log_to!(logger, Warn, "Skipping invalid row: company_id={entity:?}, year={} ({e})", date.year());
                    continue;
                }
            };

            let fields: Fields = object
                .iter()
                .filter(|(name, _)| name.as_str() != ENTITY_COLUMN && name.as_str() != DATE_COLUMN)
                .filter_map(|(name, value)| Some((name.clone(), value.as_f64()?)))
                .collect();

            rows.offer(key, date, fields);
        }

        Ok(rows.into_dataset())
    }
}
