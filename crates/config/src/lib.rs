//! Resolved configuration schema (spec.md §3), with the file-plus-env-var
//! merge behavior of `common/config.py::Config`. Parsing mechanics are
//! intentionally unadorned — this crate only resolves one structured
//! document out of a YAML file and the process environment; it does not
//! attempt multi-location discovery or config-file search paths.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("config is missing required field: {0}")]
    MissingField(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamKind {
    DatabaseLog,
    AuditLog,
    ProjectEvents,
    OrgEvents,
    Alerts,
    ProcessMetrics,
    DiskMetrics,
    DatabaseMetrics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Process,
    Disk,
    Database,
}

/// Determines the per-invocation deadline budget, per spec.md §4.11.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Environment {
    OnHost,
    ServerlessA,
    ServerlessB,
    ServerlessC,
}

impl Environment {
    pub fn budget(self) -> Duration {
        match self {
            Environment::OnHost => Duration::MAX,
            Environment::ServerlessA => Duration::from_secs(15 * 60),
            Environment::ServerlessB | Environment::ServerlessC => Duration::from_secs(5 * 60),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoDbAtlas {
    pub public_key: String,
    pub private_key: String,
    pub project_id: String,
    #[serde(default)]
    pub org_id: Option<String>,
    pub base_url: String,
    #[serde(default)]
    pub cluster_names: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Collection {
    pub enabled_streams: Vec<StreamKind>,
    #[serde(default)]
    pub metric_names: HashMap<MetricKind, Vec<String>>,
    pub page_size: u32,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    pub max_retry: u32,
    pub backoff_factor: f32,
    pub num_workers: usize,
    pub backfill_days: i64,
    pub end_time_safety_offset_seconds: i64,
    pub min_request_window_length: i64,
    pub max_request_window_length: i64,
    pub data_refresh_ttl_ms: i64,
    pub max_payload_bytesize: usize,
    pub compressed: bool,
    pub single_instance_lock_expiry_minutes: i64,
    pub environment: Environment,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Logging {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SumoLogic {
    pub logs_endpoint: String,
    pub metrics_endpoint: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(rename = "MongoDBAtlas")]
    pub mongodb_atlas: MongoDbAtlas,
    #[serde(rename = "Collection")]
    pub collection: Collection,
    #[serde(rename = "Logging", default = "default_logging")]
    pub logging: Logging,
    #[serde(rename = "SumoLogic")]
    pub sumo_logic: SumoLogic,
}

fn default_logging() -> Logging {
    Logging {
        level: default_log_level(),
    }
}

impl Config {
    /// Reads `path`, overlays matching environment variables (a variable
    /// named exactly like a leaf config key wins over the file), and
    /// validates the result.
    pub fn load(path: &Path) -> Result<Config> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let mut doc: serde_yaml::Value =
            serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;

        overlay_env(&mut doc);

        let config: Config =
            serde_yaml::from_value(doc).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;

        validate(&config)?;
        Ok(config)
    }
}

/// Mirrors `Config.get_config_from_env`: any environment variable whose
/// name matches a leaf config key overrides the value from the file.
fn overlay_env(doc: &mut serde_yaml::Value) {
    if let serde_yaml::Value::Mapping(sections) = doc {
        for (_section, section_cfg) in sections.iter_mut() {
            if let serde_yaml::Value::Mapping(fields) = section_cfg {
                for (key, value) in fields.iter_mut() {
                    if let Some(key_str) = key.as_str() {
                        if let Ok(env_value) = std::env::var(key_str) {
                            *value = serde_yaml::Value::String(env_value);
                        }
                    }
                }
            }
        }
    }
}

fn validate(config: &Config) -> Result<()> {
    if config.mongodb_atlas.public_key.is_empty() {
        return Err(ConfigError::MissingField("MongoDBAtlas.public_key".into()));
    }
    if config.mongodb_atlas.private_key.is_empty() {
        return Err(ConfigError::MissingField("MongoDBAtlas.private_key".into()));
    }
    if config.mongodb_atlas.project_id.is_empty() {
        return Err(ConfigError::MissingField("MongoDBAtlas.project_id".into()));
    }
    if config.collection.enabled_streams.is_empty() {
        return Err(ConfigError::MissingField("Collection.enabled_streams".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_yaml() -> &'static str {
        r#"
MongoDBAtlas:
  public_key: pub
  private_key: priv
  project_id: P
  base_url: https://cloud.mongodb.com/api/atlas/v1.0
Collection:
  enabled_streams: [PROJECT_EVENTS, ALERTS]
  page_size: 100
  timeout: 30s
  max_retry: 3
  backoff_factor: 0.3
  num_workers: 4
  backfill_days: 1
  end_time_safety_offset_seconds: 60
  min_request_window_length: 300
  max_request_window_length: 3600
  data_refresh_ttl_ms: 86400000
  max_payload_bytesize: 1000000
  compressed: true
  single_instance_lock_expiry_minutes: 10
  environment: on-host
SumoLogic:
  logs_endpoint: https://example.invalid/logs
  metrics_endpoint: https://example.invalid/metrics
"#
    }

    #[test]
    fn loads_a_well_formed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(sample_yaml().as_bytes()).unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.mongodb_atlas.project_id, "P");
        assert_eq!(config.collection.enabled_streams.len(), 2);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.collection.environment.budget(), Duration::MAX);
    }

    #[test]
    fn env_var_overrides_matching_key() {
        std::env::set_var("project_id", "FROM_ENV");
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(sample_yaml().as_bytes()).unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.mongodb_atlas.project_id, "FROM_ENV");
        std::env::remove_var("project_id");
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"MongoDBAtlas:\n  public_key: ''\n  private_key: ''\n  project_id: ''\n  base_url: x\nCollection:\n  enabled_streams: []\n  page_size: 1\n  timeout: 1s\n  max_retry: 1\n  backoff_factor: 0.1\n  num_workers: 1\n  backfill_days: 1\n  end_time_safety_offset_seconds: 1\n  min_request_window_length: 1\n  max_request_window_length: 1\n  data_refresh_ttl_ms: 1\n  max_payload_bytesize: 1\n  compressed: false\n  single_instance_lock_expiry_minutes: 1\n  environment: on-host\nSumoLogic:\n  logs_endpoint: x\n  metrics_endpoint: x\n").unwrap();

        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(_)));
    }
}
