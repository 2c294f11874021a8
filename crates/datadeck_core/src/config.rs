use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::CatalogError;

pub const APP_DIR: &str = "datadeck";

/// Catalog settings, read from `config.json`. Every field has a default so
/// a partial file is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Storage key the catalog snapshot is persisted under.
    pub storage_key: String,

    /// Quiet period before a burst of mutations is written out.
    pub persist_debounce_ms: u64,

    /// Attach database files read-only unless the draft says otherwise.
    pub attach_read_only: bool,

    /// Suffix badges shown next to a node before lower priorities are dropped.
    pub max_suffix_badges: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            storage_key: "datadeck.sources".to_string(),
            persist_debounce_ms: 500,
            attach_read_only: true,
            max_suffix_badges: 2,
        }
    }
}

impl CatalogConfig {
    pub fn persist_debounce(&self) -> Duration {
        Duration::from_millis(self.persist_debounce_ms)
    }
}

pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new() -> Result<Self, CatalogError> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| CatalogError::IoError("Could not find config directory".into()))?;

        Ok(Self::from_path(config_dir.join(APP_DIR).join("config.json")))
    }

    pub fn from_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing file → defaults. A file that exists but does not parse is an
    /// error, so a typo is not silently ignored.
    pub fn load(&self) -> Result<CatalogConfig, CatalogError> {
        if !self.path.exists() {
            return Ok(CatalogConfig::default());
        }

        let content = fs::read_to_string(&self.path)?;
        let config: CatalogConfig = serde_json::from_str(&content)?;

        Ok(config)
    }

    pub fn save(&self, config: &CatalogConfig) -> Result<(), CatalogError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(config)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::from_path(dir.path().join("config.json"));
        assert_eq!(store.load().unwrap(), CatalogConfig::default());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"persist_debounce_ms": 50}"#).unwrap();

        let config = ConfigStore::from_path(path).load().unwrap();
        assert_eq!(config.persist_debounce(), Duration::from_millis(50));
        assert_eq!(config.storage_key, "datadeck.sources");
        assert!(config.attach_read_only);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ nope").unwrap();

        let err = ConfigStore::from_path(path).load().unwrap_err();
        assert!(matches!(err, CatalogError::Serialization(_)));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::from_path(dir.path().join("nested").join("config.json"));
        let config = CatalogConfig {
            max_suffix_badges: 1,
            ..CatalogConfig::default()
        };
        store.save(&config).unwrap();
        assert_eq!(store.load().unwrap(), config);
    }
}
