//! Where score configurations come from.

use super::score::ScoreConfig;
use super::ConfigError;
use std::path::{Path, PathBuf};

/// Resolves a configuration identifier to a score configuration.
pub trait ScoreConfigProvider {
    fn load(&self, config_id: &str) -> Result<ScoreConfig, ConfigError>;
}

/// Reads `<root>/<config_id>` as YAML. An identifier without an extension gets `.yaml`.
#[derive(Debug, Clone)]
pub struct YamlConfigProvider {
    root: PathBuf,
}

impl YamlConfigProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, config_id: &str) -> PathBuf {
        let path = self.root.join(config_id);
        if path.extension().is_some() {
            path
        } else {
            path.with_extension("yaml")
        }
    }
}

impl ScoreConfigProvider for YamlConfigProvider {
    fn load(&self, config_id: &str) -> Result<ScoreConfig, ConfigError> {
        let path = self.path_for(config_id);
        let yaml = read_to_string(&path)?;
        ScoreConfig::from_yaml_str(&path.display().to_string(), &yaml)
    }
}

/// An in-memory configuration serves every identifier.
impl ScoreConfigProvider for ScoreConfig {
    fn load(&self, _config_id: &str) -> Result<ScoreConfig, ConfigError> {
        self.validate()?;
        Ok(self.clone())
    }
}

pub(crate) fn read_to_string(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_yaml_provider_appends_extension() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("score_1.yaml"),
            "metrics:\n  - name: a\n    operation:\n      type: sum\n      parameters:\n        - source: x.y\n",
        )
        .unwrap();

        let provider = YamlConfigProvider::new(dir.path());
        let by_stem = provider.load("score_1").unwrap();
        let by_file = provider.load("score_1.yaml").unwrap();
        assert_eq!(by_stem, by_file);
        assert_eq!(by_stem.metrics.len(), 1);
    }

    #[test]
    fn test_yaml_provider_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = YamlConfigProvider::new(dir.path()).load("nope").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
