//! CSV datasets: a `company_id` column, a `date` column, and numeric fields.

use super::dated::{parse_date_or_year, LatestRows};
use super::registry::DataLoader;
use super::types::{Dataset, Fields, Key};
use super::DataError;
use crate::logger::log_to;
use chrono::Datelike;
use log::Log;
use std::path::Path;

pub const ENTITY_COLUMN: &str = "company_id";
pub const DATE_COLUMN: &str = "date";

#[derive(Debug, Clone, Copy, Default)]
pub struct CsvLoader;

impl DataLoader for CsvLoader {
    fn load(&self, path: &Path, logger: &dyn Log) -> Result<Dataset, DataError> {
        let csv_err = |source| DataError::Csv { path: path.to_path_buf(), source };

        let mut reader = csv::Reader::from_path(path).map_err(csv_err)?;
        let headers = reader.headers().map_err(csv_err)?.clone();

        let entity_idx = headers.iter().position(|h| h == ENTITY_COLUMN);
        let date_idx = headers.iter().position(|h| h == DATE_COLUMN);
        let (Some(entity_idx), Some(date_idx)) = (entity_idx, date_idx) else {
            return Err(DataError::MissingColumns { path: path.to_path_buf() });
        };

        let mut rows = LatestRows::default();
        for record in reader.records() {
            let record = record.map_err(csv_err)?;
            let entity = record.get(entity_idx).unwrap_or_default();

            let date = match parse_date_or_year(record.get(date_idx).unwrap_or_default()) {
                Ok(date) => date,
                Err(e) => {
                    log_to!(logger, Warn, "Skipping row for {entity} due to date parse error: {e}");
                    continue;
                }
            };
            let key = match Key::new(entity, date.year()) {
                Ok(key) => key,
                Err(e) => {
                    log_to!(logger, Warn, "Skipping invalid row: company_id={entity:?}, year={} ({e})", date.year());
                    continue;
                }
            };

            // Empty or non-numeric cells are absent fields, not zeros.
            let fields: Fields = headers
                .iter()
                .zip(record.iter())
                .enumerate()
                .filter(|(i, _)| *i != entity_idx && *i != date_idx)
                .filter_map(|(_, (name, cell))| {
                    let value = cell.trim().parse::<f64>().ok()?;
                    Some((name.to_string(), value))
                })
                .collect();

            rows.offer(key, date, fields);
        }

        Ok(rows.into_dataset())
    }
}
