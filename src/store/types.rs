//! types.rs
//! Keys, rows and named datasets. Everything here is read-only once loaded.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use thiserror::Error;

pub const MIN_YEAR: i32 = 1900;
pub const MAX_YEAR: i32 = 2100;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("missing entity identifier")]
    EmptyEntity,
    #[error("invalid year: {0}")]
    YearOutOfRange(i32),
}

/// One unit of output: an entity observed in a given year.
///
/// Ordering is (entity, year), which is the order batch results are returned in.
/// `Key::new` is the only way to build one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Key {
    entity: String,
    year: i32,
}

impl Key {
    /// Builds a key, rejecting empty identifiers and years outside [1900, 2100].
    pub fn new(entity: impl Into<String>, year: i32) -> Result<Self, KeyError> {
        let entity = entity.into();
        if entity.is_empty() {
            return Err(KeyError::EmptyEntity);
        }
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(KeyError::YearOutOfRange(year));
        }
        Ok(Self { entity, year })
    }

    pub fn entity(&self) -> &str { &self.entity }

    pub fn year(&self) -> i32 { self.year }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.entity, self.year)
    }
}

/// Numeric fields of one row. An absent field is a missing value, never zero.
pub type Fields = HashMap<String, f64>;

/// A single table of rows keyed by `Key`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    rows: HashMap<Key, Fields>,
}

impl Dataset {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&mut self, key: Key, fields: Fields) {
        self.rows.insert(key, fields);
    }

    pub fn row(&self, key: &Key) -> Option<&Fields> {
        self.rows.get(key)
    }

    pub fn field(&self, key: &Key, field: &str) -> Option<f64> {
        self.rows.get(key)?.get(field).copied()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.rows.keys()
    }

    pub fn len(&self) -> usize { self.rows.len() }
    pub fn is_empty(&self) -> bool { self.rows.is_empty() }
}

impl FromIterator<(Key, Fields)> for Dataset {
    fn from_iter<I: IntoIterator<Item = (Key, Fields)>>(iter: I) -> Self {
        Self { rows: iter.into_iter().collect() }
    }
}

/// Named datasets available to one evaluation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Datasets {
    by_name: BTreeMap<String, Dataset>,
}

impl Datasets {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&mut self, name: impl Into<String>, dataset: Dataset) {
        self.by_name.insert(name.into(), dataset);
    }

    pub fn get(&self, name: &str) -> Option<&Dataset> {
        self.by_name.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Dataset> {
        self.by_name.remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize { self.by_name.len() }
    pub fn is_empty(&self) -> bool { self.by_name.is_empty() }

    /// Every key present in at least one dataset, sorted.
    pub fn all_keys(&self) -> Vec<Key> {
        let unique: BTreeSet<&Key> = self.by_name.values().flat_map(Dataset::keys).collect();
        unique.into_iter().cloned().collect()
    }
}

impl FromIterator<(String, Dataset)> for Datasets {
    fn from_iter<I: IntoIterator<Item = (String, Dataset)>>(iter: I) -> Self {
        Self { by_name: iter.into_iter().collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("acme", 1900, true)]
    #[case("acme", 2100, true)]
    #[case("acme", 1899, false)]
    #[case("acme", 2101, false)]
    #[case("", 2020, false)]
    fn test_key_validation(#[case] entity: &str, #[case] year: i32, #[case] valid: bool) {
        assert_eq!(Key::new(entity, year).is_ok(), valid);
    }

    #[test]
    fn test_key_accessors_and_serialized_shape() {
        let key = Key::new("acme", 2020).unwrap();
        assert_eq!((key.entity(), key.year()), ("acme", 2020));
        assert_eq!(serde_json::to_string(&key).unwrap(), r#"{"entity":"acme","year":2020}"#);
    }

    #[test]
    fn test_key_ordering_is_entity_then_year() {
        let mut keys = vec![
            Key::new("B", 2019).unwrap(),
            Key::new("A", 2021).unwrap(),
            Key::new("A", 2020).unwrap(),
        ];
        keys.sort();
        let flat: Vec<_> = keys.iter().map(|k| (k.entity(), k.year())).collect();
        assert_eq!(flat, vec![("A", 2020), ("A", 2021), ("B", 2019)]);
    }

    #[test]
    fn test_all_keys_is_sorted_union() {
        let a = Key::new("A", 2020).unwrap();
        let b = Key::new("B", 2020).unwrap();
        let mut left = Dataset::new();
        left.insert(b.clone(), Fields::new());
        let mut right = Dataset::new();
        right.insert(a.clone(), Fields::new());
        right.insert(b.clone(), Fields::new());

        let datasets: Datasets = [("left".to_string(), left), ("right".to_string(), right)]
            .into_iter()
            .collect();
        assert_eq!(datasets.all_keys(), vec![a, b]);
    }
}
