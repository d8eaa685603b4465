//! CLI configuration file.
//!
//! ```json
//! {
//!   "node": { "base_url": "http://localhost:23110/", "request_timeout_ms": 30000 },
//!   "db": "./ledger.db",
//!   "sync": { "chain": "tfchain", "poll_interval_ms": 10000 },
//!   "log": { "level": "info", "json": false }
//! }
//! ```
//!
//! Every section is optional. Command-line flags override the file.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use ledgerindex_core::indexer::SyncConfig;
use ledgerindex_rivine::HttpClientConfig;

use crate::logging::LogConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub base_url: String,
    pub user_agent: String,
    pub request_timeout_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let http = HttpClientConfig::default();
        Self {
            base_url: http.base_url,
            user_agent: http.user_agent,
            request_timeout_ms: http.request_timeout.as_millis() as u64,
        }
    }
}

impl NodeConfig {
    pub fn http(&self) -> HttpClientConfig {
        HttpClientConfig {
            base_url: self.base_url.clone(),
            user_agent: self.user_agent.clone(),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub node: NodeConfig,
    /// SQLite file; in-memory store when absent.
    pub db: Option<String>,
    pub sync: SyncConfig,
    pub log: LogConfig,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }
}
