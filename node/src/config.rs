//! Node configuration: optional TOML file, `PEERFS_*` environment variables,
//! then command-line overrides.

use anyhow::{Context, Result};
use config::{Config, File as ConfigFile};
use peerfs_content::Replication;
use peerfs_storage::RetryPolicy;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "peerfs.toml";
const DEFAULT_CLUSTER_API_URL: &str = "http://127.0.0.1:9094/";
const DEFAULT_GATEWAY_URL: &str = "http://127.0.0.1:8080/";

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub config_path: Option<PathBuf>,

    // Identity
    /// Local peer identity; `None` asks the cluster.
    pub peer_id: Option<String>,

    // Cluster
    pub cluster_api_url: String,
    pub gateway_url: String,
    pub replication_min: Option<i32>,
    pub replication_max: Option<i32>,

    // Ledger
    pub ledger_path: PathBuf,
    pub ledger_timeout_ms: u64,
    pub ledger_retry_attempts: u32,
    pub ledger_backoff_ms: u64,
    pub ledger_max_backoff_ms: u64,
    pub ledger_cas_attempts: u32,

    // Logging
    pub log_level: String,
    pub log_format: String,
}

impl AppConfig {
    pub fn load(config_path_override: Option<&Path>) -> Result<Self> {
        let resolved_path = match config_path_override {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!(
                        "Configuration file {} not found (specified via --config)",
                        path.display()
                    );
                }
                Some(path.to_path_buf())
            }
            None => default_config_paths().into_iter().find(|path| path.exists()),
        };

        let mut builder = Config::builder();
        if let Some(path) = &resolved_path {
            builder = builder.add_source(ConfigFile::from(path.as_path()));
        }
        builder = builder.add_source(config::Environment::with_prefix("PEERFS"));
        let config = builder.build()?;

        let defaults = RetryPolicy::default();
        Ok(Self {
            config_path: resolved_path,
            peer_id: get_string_value(&config, &["peer_id", "node.peer_id"]),
            cluster_api_url: get_string_value(&config, &["cluster_api_url", "cluster.api_url"])
                .unwrap_or_else(|| DEFAULT_CLUSTER_API_URL.to_string()),
            gateway_url: get_string_value(&config, &["gateway_url", "cluster.gateway_url"])
                .unwrap_or_else(|| DEFAULT_GATEWAY_URL.to_string()),
            replication_min: parse_value(&config, &["replication_min", "cluster.replication_min"])?,
            replication_max: parse_value(&config, &["replication_max", "cluster.replication_max"])?,
            ledger_path: get_string_value(&config, &["ledger_path", "ledger.path"])
                .map(PathBuf::from)
                .unwrap_or_else(default_ledger_path),
            ledger_timeout_ms: parse_value(&config, &["ledger_timeout_ms", "ledger.timeout_ms"])?
                .unwrap_or(defaults.round_trip_timeout.as_millis() as u64),
            ledger_retry_attempts: parse_value(
                &config,
                &["ledger_retry_attempts", "ledger.retry_attempts"],
            )?
            .unwrap_or(defaults.attempts),
            ledger_backoff_ms: parse_value(&config, &["ledger_backoff_ms", "ledger.backoff_ms"])?
                .unwrap_or(defaults.initial_backoff.as_millis() as u64),
            ledger_max_backoff_ms: parse_value(
                &config,
                &["ledger_max_backoff_ms", "ledger.max_backoff_ms"],
            )?
            .unwrap_or(defaults.max_backoff.as_millis() as u64),
            ledger_cas_attempts: parse_value(
                &config,
                &["ledger_cas_attempts", "ledger.cas_attempts"],
            )?
            .unwrap_or(defaults.cas_attempts),
            log_level: get_string_value(&config, &["log_level", "logging.level"])
                .unwrap_or_else(|| "info".to_string()),
            log_format: get_string_value(&config, &["log_format", "logging.format"])
                .unwrap_or_else(|| "pretty".to_string()),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(peer_id) = &self.peer_id {
            peerfs_types::PeerId::new(peer_id.as_str())
                .validate()
                .context("invalid peer_id")?;
        }
        if self.ledger_path.as_os_str().is_empty() {
            anyhow::bail!("ledger_path must not be empty");
        }
        if self.ledger_timeout_ms == 0 {
            anyhow::bail!("ledger_timeout_ms must be greater than zero");
        }
        if self.ledger_retry_attempts == 0 {
            anyhow::bail!("ledger_retry_attempts must be at least 1");
        }
        if self.ledger_max_backoff_ms < self.ledger_backoff_ms {
            anyhow::bail!("ledger_max_backoff_ms must not be below ledger_backoff_ms");
        }
        if let (Some(min), Some(max)) = (self.replication_min, self.replication_max) {
            if max != -1 && min > max {
                anyhow::bail!("replication_min ({min}) exceeds replication_max ({max})");
            }
        }
        if !matches!(self.log_format.as_str(), "json" | "pretty") {
            anyhow::bail!("log_format must be \"json\" or \"pretty\", got {:?}", self.log_format);
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.ledger_retry_attempts,
            round_trip_timeout: Duration::from_millis(self.ledger_timeout_ms),
            initial_backoff: Duration::from_millis(self.ledger_backoff_ms),
            max_backoff: Duration::from_millis(self.ledger_max_backoff_ms),
            cas_attempts: self.ledger_cas_attempts,
        }
    }

    /// Pin range for uploads, if either bound is configured.
    pub fn replication(&self) -> Option<Replication> {
        if self.replication_min.is_none() && self.replication_max.is_none() {
            return None;
        }
        let defaults = Replication::default();
        Some(Replication {
            min: self.replication_min.unwrap_or(defaults.min),
            max: self.replication_max.unwrap_or(defaults.max),
        })
    }
}

fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(DEFAULT_CONFIG_FILE)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("peerfs").join(DEFAULT_CONFIG_FILE));
    }
    paths
}

fn default_ledger_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("peerfs").join("ledger"))
        .unwrap_or_else(|| PathBuf::from("./data/ledger"))
}

fn get_string_value(config: &Config, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        config
            .get_string(key)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

fn parse_value<T>(config: &Config, keys: &[&str]) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    for key in keys {
        if let Some(raw) = get_string_value(config, &[*key]) {
            let value = raw
                .parse()
                .with_context(|| format!("invalid value {raw:?} for {key}"))?;
            return Ok(Some(value));
        }
    }
    Ok(None)
}
