//! JSON-RPC over HTTP provider.
//!
//! Forwards every `request` as a JSON-RPC 2.0 POST. Useful against a wallet
//! daemon, a signing proxy, or a dev node with unlocked accounts. It has no
//! push channel, so event subscription is unsupported.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::trace;
use url::Url;

use super::{Eip1193Provider, ProviderError};

/// Default request timeout. Wallet prompts can take a while.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

impl From<RpcError> for ProviderError {
    fn from(err: RpcError) -> Self {
        let base = Self::new(err.code, err.message);
        match err.data {
            Some(data) => base.with_data(data),
            None => base,
        }
    }
}

/// An [`Eip1193Provider`] backed by an HTTP JSON-RPC endpoint.
#[derive(Debug)]
pub struct HttpProvider {
    client: reqwest::Client,
    endpoint: Url,
    next_id: AtomicU64,
}

impl HttpProvider {
    /// Create a provider for `endpoint` with the default timeout.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] when the URL is invalid or the HTTP client
    /// cannot be built.
    pub fn new(endpoint: &str) -> Result<Self, ProviderError> {
        Self::with_timeout(endpoint, DEFAULT_TIMEOUT)
    }

    /// Create a provider with an explicit request timeout.
    ///
    /// # Errors
    ///
    /// See [`new`](Self::new).
    pub fn with_timeout(endpoint: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| ProviderError::transport(format!("invalid wallet URL '{endpoint}': {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ProviderError::from)?;
        Ok(Self {
            client,
            endpoint,
            next_id: AtomicU64::new(1),
        })
    }

    /// The endpoint requests are posted to.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl Eip1193Provider for HttpProvider {
    fn name(&self) -> &str {
        "http"
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        trace!(id, method, "wallet request");

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&payload)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        let parsed: RpcResponse = serde_json::from_str(&body).map_err(|e| {
            if status.is_success() {
                ProviderError::invalid_response(method, e)
            } else {
                ProviderError::transport(format!("wallet endpoint returned HTTP {status}: {body}"))
            }
        })?;

        if let Some(err) = parsed.error {
            return Err(err.into());
        }
        Ok(parsed.result.unwrap_or(Value::Null))
    }
}
