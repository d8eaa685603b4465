//! Rivine explorer HTTP client.
//!
//! All calls are single GET request/response exchanges. Failures are typed:
//! - transport errors, non-2xx statuses and bodies that are not JSON →
//!   [`IndexerError::Unavailable`]
//! - requests exceeding `request_timeout` → [`IndexerError::Timeout`]
//! - JSON that does not match the expected payload →
//!   [`IndexerError::MalformedPayload`]

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use ledgerindex_core::error::IndexerError;

use crate::payload::{
    items, BlockResponse, ExplorerInfo, GatewayInfo, HashResponse, HeadInfo, Peer,
};

/// The node API consumed by the sync engine.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Current head height plus the full head block.
    async fn head(&self) -> Result<HeadInfo, IndexerError>;

    /// The block at `height`. Callers must not ask beyond the head.
    async fn block_at(&self, height: u64) -> Result<BlockResponse, IndexerError>;

    /// A transaction with its inputs' spent outputs resolved.
    async fn transaction(&self, id: &str) -> Result<HashResponse, IndexerError>;

    /// Connected peers.
    async fn peers(&self) -> Result<Vec<Peer>, IndexerError>;
}

/// Configuration for [`HttpChainClient`].
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Node base URL, e.g. `http://localhost:23110/`.
    pub base_url: String,
    pub user_agent: String,
    pub request_timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:23110/".into(),
            user_agent: "Rivine-Agent".into(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// reqwest-backed [`ChainClient`].
pub struct HttpChainClient {
    base_url: String,
    http: reqwest::Client,
    request_timeout: Duration,
}

impl HttpChainClient {
    pub fn new(config: HttpClientConfig) -> Result<Self, IndexerError> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| IndexerError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
            request_timeout: config.request_timeout,
        })
    }

    /// Create with default configuration for the given node URL.
    pub fn default_for(base_url: impl Into<String>) -> Result<Self, IndexerError> {
        Self::new(HttpClientConfig {
            base_url: base_url.into(),
            ..Default::default()
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, IndexerError> {
        let url = format!("{}/{}", self.base_url, path);
        let resp = self.http.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                IndexerError::Timeout {
                    ms: self.request_timeout.as_millis() as u64,
                }
            } else {
                IndexerError::Unavailable(format!("GET {url}: {e}"))
            }
        })?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| IndexerError::Unavailable(format!("GET {url}: {e}")))?;
        if !status.is_success() {
            return Err(IndexerError::Unavailable(format!(
                "GET {url}: HTTP {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }

        decode_body(path, &body)
    }
}

/// Decode a node response body, separating "not JSON" from "wrong shape".
pub fn decode_body<T: DeserializeOwned>(path: &str, body: &str) -> Result<T, IndexerError> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| IndexerError::Unavailable(format!("{path}: response is not JSON: {e}")))?;
    serde_json::from_value(value).map_err(|e| IndexerError::malformed(path, e.to_string()))
}

#[async_trait]
impl ChainClient for HttpChainClient {
    async fn head(&self) -> Result<HeadInfo, IndexerError> {
        let info: ExplorerInfo = self.get("explorer").await?;
        let block = self.block_at(info.height).await?.block;
        Ok(HeadInfo {
            height: info.height,
            block,
        })
    }

    async fn block_at(&self, height: u64) -> Result<BlockResponse, IndexerError> {
        self.get(&format!("explorer/blocks/{height}")).await
    }

    async fn transaction(&self, id: &str) -> Result<HashResponse, IndexerError> {
        self.get(&format!("explorer/hashes/{id}")).await
    }

    async fn peers(&self) -> Result<Vec<Peer>, IndexerError> {
        let gateway: GatewayInfo = self.get("gateway").await?;
        Ok(items(&gateway.peers).to_vec())
    }
}
