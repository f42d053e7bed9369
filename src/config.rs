use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use validator::{Validate, ValidationError};

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
pub const CONFIG_PATH_ENV: &str = "HARNESS_CONFIG";
pub const ENV_PREFIX: &str = "HARNESS__";

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Config {
    #[validate(length(min = 1))]
    pub base_url: String,
    #[validate(length(min = 1), custom(function = "check_endpoints"))]
    pub endpoints: Vec<EndpointSpec>,
    /// Checked by the task generator, an empty pool is fatal there
    pub entity_ids: Vec<u64>,
    #[validate(length(min = 1))]
    pub load_sizes: Vec<u32>,
    #[validate(range(min = 1))]
    pub repetitions: u32,
    #[validate(range(min = 1))]
    pub workers: usize,
    #[validate(range(min = 1))]
    pub timeout_seconds: u64,
    #[validate(length(min = 1))]
    pub metric_field: String,
    #[validate(range(min = 1))]
    pub progress_every: usize,
    pub seed: Option<u64>,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSpec {
    pub key: String,
    pub path: String,
}

impl EndpointSpec {
    pub fn new(key: impl Into<String>, path: impl Into<String>) -> Self {
        Self { key: key.into(), path: path.into() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Where to write the aggregate + chart series for an external renderer
    pub json_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3001/api/postgres".to_string(),
            endpoints: vec![
                EndpointSpec::new("redis", "random-redis-items"),
                EndpointSpec::new("postgres", "random-items"),
                EndpointSpec::new("postgres redis cache", "random-items-cached"),
            ],
            entity_ids: vec![1, 2, 3, 4, 5, 6, 7, 8, 10, 99, 100],
            load_sizes: vec![1, 5, 10, 25, 50, 100, 200, 500, 1000],
            repetitions: 1000,
            workers: 20,
            timeout_seconds: 20,
            metric_field: "took".to_string(),
            progress_every: 50,
            seed: None,
            report: ReportConfig::default(),
        }
    }
}

/// Keys and paths must be non-empty, keys unique.
fn check_endpoints(endpoints: &[EndpointSpec]) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for endpoint in endpoints {
        if endpoint.key.is_empty() || endpoint.path.trim_matches('/').is_empty() {
            return Err(ValidationError::new("empty_endpoint"));
        }
        if !seen.insert(endpoint.key.as_str()) {
            let mut err = ValidationError::new("duplicate_endpoint_key");
            err.add_param("key".into(), &endpoint.key);
            return Err(err);
        }
    }
    Ok(())
}

impl Config {
    /// Defaults, then the TOML file (`HARNESS_CONFIG` or `config/default.toml`),
    /// then `HARNESS__*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        Self::from_figment(Self::figment(path))
    }

    pub fn figment(path: impl AsRef<Path>) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let cfg: Config = figment.extract()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn endpoint_keys(&self) -> Vec<&str> {
        self.endpoints.iter().map(|e| e.key.as_str()).collect()
    }

    pub fn expected_task_count(&self) -> usize {
        self.load_sizes.len() * self.repetitions as usize * self.endpoints.len()
    }
}
