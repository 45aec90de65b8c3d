use std::env;
use std::fs;
use std::path::PathBuf;

use thiserror::Error;

use crate::consensus::{Network, NetworkParams};

/// Startup-time configuration failures. None of these are recoverable.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid network parameters: {0}")]
    InvalidParams(&'static str),
    #[error("unknown network `{0}` (expected main, test, regtest or unittest)")]
    UnknownNetwork(String),
    #[error("invalid value for {key}: `{value}`")]
    InvalidValue { key: &'static str, value: String },
    #[error("failed to read params file {path}: {source}")]
    ParamsFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse params file: {0}")]
    ParamsJson(#[from] serde_json::Error),
}

/// Process configuration, read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub network: Network,
    /// When set, headers persist under this directory; otherwise in memory.
    pub data_dir: Option<PathBuf>,
    /// Optional JSON file replacing the network preset.
    pub params_file: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = match env::var("PORT") {
            Ok(v) => v.parse().map_err(|_| ConfigError::InvalidValue {
                key: "PORT",
                value: v,
            })?,
            Err(_) => 8080,
        };
        let network = match env::var("CHAIN_NETWORK") {
            Ok(v) => v.parse()?,
            Err(_) => Network::Regtest,
        };

        Ok(Self {
            host,
            port,
            network,
            data_dir: env::var_os("CHAIN_DATA_DIR").map(PathBuf::from),
            params_file: env::var_os("CHAIN_PARAMS_FILE").map(PathBuf::from),
        })
    }

    /// The validated consensus parameters this process runs with.
    pub fn network_params(&self) -> Result<NetworkParams, ConfigError> {
        let params = match &self.params_file {
            Some(path) => {
                let raw = fs::read_to_string(path).map_err(|source| ConfigError::ParamsFile {
                    path: path.clone(),
                    source,
                })?;
                serde_json::from_str(&raw)?
            }
            None => NetworkParams::for_network(self.network),
        };
        params.validate()?;
        Ok(params)
    }
}
