use serde::{Deserialize, Serialize};
use std::fs;
use thiserror::Error;

use crate::logging;
use crate::xdr;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config yaml {path}: {source}")]
    Yaml {
        path: String,
        source: serde_yaml::Error,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    /// Level for the periodic jobs; `log_level` when absent
    #[serde(default)]
    pub job_log_level: Option<String>,
    /// PostgreSQL connection URL; in-memory stores when absent
    #[serde(default)]
    pub postgres_url: Option<String>,
    pub stellar: StellarConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StellarConfig {
    pub horizon_url: String,
    /// Carried for signers; never used to sign here
    #[serde(default)]
    pub network_passphrase: String,
    pub deposit_base_address: String,
    #[serde(default = "default_transaction_expiration_secs")]
    pub transaction_expiration_secs: u64,
    /// Stroops per operation
    #[serde(default = "default_operation_fee")]
    pub operation_fee: u32,
    #[serde(default = "default_native_asset_id")]
    pub native_asset_id: String,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

fn default_transaction_expiration_secs() -> u64 {
    1800
}

fn default_operation_fee() -> u32 {
    100
}

fn default_native_asset_id() -> String {
    "XLM".to_string()
}

fn default_http_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JobsConfig {
    pub reconcile_interval_secs: u64,
    pub reconcile_batch_size: usize,
    pub scan_interval_secs: u64,
    pub scan_page_size: usize,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            reconcile_interval_secs: 60,
            reconcile_batch_size: 100,
            scan_interval_secs: 60,
            scan_page_size: 100,
        }
    }
}

impl AppConfig {
    pub fn load(env: &str) -> Result<Self, ConfigError> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path).map_err(|source| ConfigError::Io {
            path: config_path.clone(),
            source,
        })?;
        Self::parse(&content).map_err(|e| match e {
            ConfigError::Yaml { source, .. } => ConfigError::Yaml {
                path: config_path,
                source,
            },
            other => other,
        })
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig =
            serde_yaml::from_str(content).map_err(|source| ConfigError::Yaml {
                path: "<inline>".to_string(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !xdr::is_valid_account_id(&self.stellar.deposit_base_address) {
            return Err(ConfigError::Invalid(format!(
                "stellar.deposit_base_address is not an account id: {}",
                self.stellar.deposit_base_address
            )));
        }
        if !logging::ROTATIONS.contains(&self.rotation.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "rotation must be one of {:?}: {}",
                logging::ROTATIONS,
                self.rotation
            )));
        }
        if self.stellar.horizon_url.trim().is_empty() {
            return Err(ConfigError::Invalid("stellar.horizon_url is empty".into()));
        }
        if self.jobs.reconcile_batch_size == 0 || self.jobs.scan_page_size == 0 {
            return Err(ConfigError::Invalid(
                "jobs batch and page sizes must be positive".into(),
            ));
        }
        Ok(())
    }
}
