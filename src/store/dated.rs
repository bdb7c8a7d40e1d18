//! Date handling shared by the file loaders.
//!
//! Source files carry either a full date (`2023-06-30`) or a bare year
//! (`2023`). Several rows may land on the same (entity, year) key; the one with
//! the latest date is kept.

use super::types::{Dataset, Fields, Key};
use chrono::NaiveDate;
use std::collections::hash_map::{Entry, HashMap};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DateError {
    #[error("invalid date format {0:?}")]
    InvalidDate(String),
    #[error("invalid year {0:?}")]
    InvalidYear(String),
}

/// Parses `YYYY-MM-DD`, or a bare year which is taken as January 1st.
pub fn parse_date_or_year(raw: &str) -> Result<NaiveDate, DateError> {
    let raw = raw.trim();
    if raw.contains('-') {
        return NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| DateError::InvalidDate(raw.to_string()));
    }
    raw.parse::<i32>()
        .ok()
        .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1))
        .ok_or_else(|| DateError::InvalidYear(raw.to_string()))
}

/// Keeps the most recent row per key while a file is being read.
#[derive(Debug, Default)]
pub(crate) struct LatestRows {
    rows: HashMap<Key, (NaiveDate, Fields)>,
}

impl LatestRows {
    /// Ties keep the row seen first.
    pub(crate) fn offer(&mut self, key: Key, date: NaiveDate, fields: Fields) {
        match self.rows.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert((date, fields));
            }
            Entry::Occupied(mut slot) => {
                if date > slot.get().0 {
                    slot.insert((date, fields));
                }
            }
        }
    }

    pub(crate) fn into_dataset(self) -> Dataset {
        self.rows.into_iter().map(|(key, (_, fields))| (key, fields)).collect()
    }
}
