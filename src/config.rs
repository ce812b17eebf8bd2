use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use tracing::trace;

use crate::util;

/// Storage backend configuration
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// SQLite database file
    Sqlite {
        /// Path to the SQLite database file
        #[serde(default = "default_sqlite_path")]
        path: PathBuf,

        /// Upper bound of pooled connections
        #[serde(default = "default_max_connections")]
        max_connections: u32,

        /// How long a writer waits for the database lock
        #[serde(default = "default_busy_timeout_secs")]
        busy_timeout_secs: u64,
    },
    // Future: PostgreSQL, MySQL
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sqlite {
            path: default_sqlite_path(),
            max_connections: default_max_connections(),
            busy_timeout_secs: default_busy_timeout_secs(),
        }
    }
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./monit.db")
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen: ListenConfig,
    pub storage: StorageConfig,
    pub ingest: IngestConfig,
    pub api: ApiSection,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ListenConfig {
    #[serde(default = "util::get_default_addr")]
    pub address: IpAddr,
    #[serde(default = "util::get_default_port")]
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            address: util::get_default_addr(),
            port: util::get_default_port(),
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct IngestConfig {
    /// Upper bound for one report, decode to commit
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
}

impl IngestConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_payload_bytes: default_max_payload_bytes(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_payload_bytes() -> usize {
    10 * 1024 * 1024
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ApiSection {
    /// Bearer token required on `/api/v1/*`
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default = "default_enable_cors")]
    pub enable_cors: bool,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            auth_token: None,
            enable_cors: default_enable_cors(),
        }
    }
}

fn default_enable_cors() -> bool {
    true
}

impl Config {
    /// Apply `COLLECTOR_*` environment overrides on top of the file values
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(address) = util::get_addr() {
            self.listen.address = address;
        }
        if let Some(port) = util::get_port() {
            self.listen.port = port;
        }
        if let Some(db) = util::get_db_path() {
            let StorageConfig::Sqlite { path, .. } = &mut self.storage;
            *path = db;
        }
        self
    }
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str(&file_content)
        .map_err(|e| anyhow::anyhow!("Invalid configuration file provided: {e}"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}
