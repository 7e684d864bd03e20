//! Configuration file
//!
//! ```json
//! {
//!   "data_dir": "/var/lib/aerodb",
//!   "storage_engine": "esent",
//!   "heartbeat_interval_ms": 1000,
//!   "http": { "host": "0.0.0.0", "port": 54321, "cors_origins": [] }
//! }
//! ```
//!
//! Only `data_dir` is required.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::errors::{CliError, CliResult};
use crate::http_server::HttpServerConfig;
use crate::storage::StorageEngineKind;

/// Configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory (required)
    pub data_dir: String,

    /// "esent" or "memory" (default "esent")
    #[serde(default = "default_storage_engine")]
    pub storage_engine: String,

    /// Idle time before a report heartbeat, in ms (default 1000)
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    #[serde(default)]
    pub http: HttpServerConfig,
}

fn default_storage_engine() -> String {
    StorageEngineKind::Esent.as_str().to_string()
}

fn default_heartbeat_interval_ms() -> u64 {
    1000
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config: {}", e)))?;

        Self::from_json(&content)
    }

    /// Parse and validate configuration text
    pub fn from_json(content: &str) -> CliResult<Self> {
        let config: Config = serde_json::from_str(content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> CliResult<()> {
        if self.data_dir.trim().is_empty() {
            return Err(CliError::config_error("data_dir must not be empty"));
        }

        self.engine()?;

        if self.heartbeat_interval_ms == 0 {
            return Err(CliError::config_error("heartbeat_interval_ms must be > 0"));
        }

        if self.http.stream_buffer_chunks == 0 {
            return Err(CliError::config_error("http.stream_buffer_chunks must be > 0"));
        }

        Ok(())
    }

    /// Get data directory as Path
    pub fn data_path(&self) -> &Path {
        Path::new(&self.data_dir)
    }

    pub fn engine(&self) -> CliResult<StorageEngineKind> {
        self.storage_engine
            .parse()
            .map_err(|e: String| CliError::config_error(e))
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
}
