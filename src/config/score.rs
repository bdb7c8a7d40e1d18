//! The score configuration: an ordered list of named metric formulas.
//!
//! ```yaml
//! name: score_1
//! metrics:
//!   - name: total_emissions
//!     operation:
//!       type: sum
//!       parameters:
//!         - source: emissions.emi_1
//!         - source: emissions.emi_2
//!   - name: intensity
//!     operation:
//!       type: divide
//!       parameters:
//!         - source: self.total_emissions
//!         - source: waste.was_1
//! ```

use super::ConfigError;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashSet;

/// Prefix marking a reference to another metric of the same key.
pub const SELF_PREFIX: &str = "self.";

/// A reference to a value: `self.<metric>` or `<dataset>.<field>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub source: String,
}

impl Parameter {
    pub fn new(source: impl Into<String>) -> Self {
        Self { source: source.into() }
    }

    /// The referenced metric name, if this is a `self.` reference.
    pub fn self_reference(&self) -> Option<&str> {
        self.source.strip_prefix(SELF_PREFIX)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Operator name, looked up in the operator registry at evaluation time.
    #[serde(rename = "type")]
    pub kind: String,
    // Order matters for asymmetric operators (divide: numerator, denominator).
    #[serde(default)]
    pub parameters: SmallVec<[Parameter; 2]>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricDef {
    pub name: String,
    pub operation: Operation,
}

impl MetricDef {
    pub fn new<'a>(name: impl Into<String>, kind: impl Into<String>, sources: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            name: name.into(),
            operation: Operation {
                kind: kind.into(),
                parameters: sources.into_iter().map(Parameter::new).collect(),
            },
        }
    }

    /// Names of the metrics this one reads through `self.` parameters.
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.operation.parameters.iter().filter_map(Parameter::self_reference)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub metrics: Vec<MetricDef>,
}

impl ScoreConfig {
    pub fn new(metrics: Vec<MetricDef>) -> Self {
        Self { name: None, metrics }
    }

    /// Parses and validates a YAML document. `origin` names the document in errors.
    pub fn from_yaml_str(origin: &str, yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml).map_err(|source| ConfigError::Parse {
            origin: origin.to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Metric names must be non-empty and unique. Formulas are not inspected.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::with_capacity(self.metrics.len());
        for (index, metric) in self.metrics.iter().enumerate() {
            if metric.name.is_empty() {
                return Err(ConfigError::EmptyMetricName { index });
            }
            if !seen.insert(metric.name.as_str()) {
                return Err(ConfigError::DuplicateMetric(metric.name.clone()));
            }
        }
        Ok(())
    }

    pub fn metric_names(&self) -> impl Iterator<Item = &str> {
        self.metrics.iter().map(|m| m.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
name: score_1
metrics:
  - name: total
    operation:
      type: sum
      parameters:
        - source: emissions.emi_1
        - source: emissions.emi_2
  - name: ratio
    operation:
      type: divide
      parameters:
        - source: self.total
        - source: waste.was_1
"#;

    #[test]
    fn test_parse_yaml_config() {
        let config = ScoreConfig::from_yaml_str("sample", SAMPLE).unwrap();
        assert_eq!(config.name.as_deref(), Some("score_1"));
        assert_eq!(config.metric_names().collect::<Vec<_>>(), vec!["total", "ratio"]);

        let ratio = &config.metrics[1];
        assert_eq!(ratio.operation.kind, "divide");
        assert_eq!(ratio.dependencies().collect::<Vec<_>>(), vec!["total"]);
        assert_eq!(ratio.operation.parameters[1].source, "waste.was_1");
    }

    #[test]
    fn test_duplicate_metric_rejected() {
        let config = ScoreConfig::new(vec![
            MetricDef::new("a", "sum", ["x.y"]),
            MetricDef::new("a", "sum", ["x.z"]),
        ]);
        assert!(matches!(config.validate(), Err(ConfigError::DuplicateMetric(name)) if name == "a"));
    }

    #[test]
    fn test_malformed_yaml_is_parse_error() {
        let err = ScoreConfig::from_yaml_str("bad", "metrics: [name: 1, ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
