use crate::error::ConfigError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Local feed document, used unless `url` is set
    pub file: PathBuf,
    pub url: Option<String>,
    pub records_field: String,
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("sample_data.json"),
            url: None,
            records_field: crate::source::DEFAULT_RECORDS_FIELD.to_string(),
            timeout_secs: 60,
        }
    }
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Destination address: endpoint, database name, collection name
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub uri: String,
    pub database: String,
    pub collection: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: "data".to_string(),
            database: "etl_database".to_string(),
            collection: "urlhaus_raw".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Where to write the Prometheus snapshot after a run, if anywhere
    pub textfile: Option<PathBuf>,
}

/// Variables read for each store setting, first match wins. The `MONGO_*`
/// names keep existing connector `.env` files working.
const STORE_URI_KEYS: &[&str] = &["STORE_URI", "MONGO_URI"];
const STORE_DATABASE_KEYS: &[&str] = &["STORE_DATABASE", "MONGO_DB_NAME", "MONGO_DATABASE"];
const STORE_COLLECTION_KEYS: &[&str] = &["STORE_COLLECTION", "MONGO_COLLECTION"];

impl Config {
    /// Defaults, then the optional TOML file, then environment variables
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Apply overrides from a key lookup; empty values count as unset
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let first = |keys: &[&str]| keys.iter().find_map(|key| get(*key));

        if let Some(file) = get("SOURCE_FILE") {
            self.source.file = PathBuf::from(file);
        }
        if let Some(url) = get("SOURCE_URL") {
            self.source.url = Some(url);
        }
        if let Some(field) = get("SOURCE_RECORDS_FIELD") {
            self.source.records_field = field;
        }
        if let Some(timeout) = get("SOURCE_TIMEOUT_SECS") {
            let parsed = timeout.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "SOURCE_TIMEOUT_SECS".to_string(),
                value: timeout.clone(),
            })?;
            self.source.timeout_secs = parsed;
        }
        if let Some(uri) = first(STORE_URI_KEYS) {
            self.store.uri = uri;
        }
        if let Some(database) = first(STORE_DATABASE_KEYS) {
            self.store.database = database;
        }
        if let Some(collection) = first(STORE_COLLECTION_KEYS) {
            self.store.collection = collection;
        }
        if let Some(dir) = get("LOG_DIR") {
            self.logging.dir = PathBuf::from(dir);
        }
        if let Some(textfile) = get("METRICS_TEXTFILE") {
            self.metrics.textfile = Some(PathBuf::from(textfile));
        }
        Ok(())
    }
}
