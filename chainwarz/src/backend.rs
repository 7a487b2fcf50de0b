//! Client for the game's leaderboard and profile service.
//!
//! The service is a black box: this module only relies on a per-chain strike
//! count and optional display fields. Unknown fields are ignored.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use alloy::primitives::Address;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

/// Errors returned by the backend service.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum BackendError {
    /// The base URL or a derived URL is invalid.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The service answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// HTTP status.
        status: StatusCode,
        /// Response body, possibly truncated.
        body: String,
    },

    /// Network or decoding failure.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type for backend operations.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// A player's profile as known to the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerProfile {
    /// Wallet address.
    pub address: String,
    /// Display name from the host's social graph.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Avatar image URL.
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// External profile link.
    #[serde(default)]
    pub profile_url: Option<String>,
    /// Strike count per chain key.
    #[serde(default)]
    pub strikes: BTreeMap<String, u64>,
}

impl PlayerProfile {
    /// Strike count on one chain.
    #[must_use]
    pub fn strikes_on(&self, chain: &str) -> u64 {
        self.strikes.get(chain).copied().unwrap_or_default()
    }

    /// Strikes across all chains.
    #[must_use]
    pub fn total_strikes(&self) -> u64 {
        self.strikes.values().sum()
    }
}

/// A leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    /// 1-based rank.
    pub rank: u32,
    /// Wallet address.
    pub address: String,
    /// Strikes on the leaderboard's chain.
    pub strikes: u64,
    /// Display name.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Avatar image URL.
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Read access to the profile and leaderboard service.
#[async_trait]
pub trait BackendService: Send + Sync {
    /// Profile for a wallet address.
    async fn profile_by_address(&self, address: Address) -> BackendResult<PlayerProfile>;

    /// Profile for a host identity (a Farcaster fid).
    async fn profile_by_fid(&self, fid: u64) -> BackendResult<PlayerProfile>;

    /// Leaderboard for one chain.
    async fn leaderboard(&self, chain: &str) -> BackendResult<Vec<LeaderboardEntry>>;
}

/// HTTP implementation of [`BackendService`].
#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: Url,
}

impl fmt::Debug for HttpBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpBackend")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl HttpBackend {
    /// Create a client for `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::InvalidUrl`] for an unparsable URL and
    /// [`BackendError::Http`] when the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> BackendResult<Self> {
        let mut base_url =
            Url::parse(base_url).map_err(|e| BackendError::InvalidUrl(format!("{base_url}: {e}")))?;
        // Url::join replaces the last segment unless the path ends with '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    /// The service base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> BackendResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| BackendError::InvalidUrl(format!("{path}: {e}")))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> BackendResult<T> {
        let url = self.endpoint(path)?;
        debug!(%url, "backend request");
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(512)
                .collect();
            return Err(BackendError::Status { status, body });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl BackendService for HttpBackend {
    async fn profile_by_address(&self, address: Address) -> BackendResult<PlayerProfile> {
        self.get_json(&format!("api/profile/{address}")).await
    }

    async fn profile_by_fid(&self, fid: u64) -> BackendResult<PlayerProfile> {
        self.get_json(&format!("api/profile/fid/{fid}")).await
    }

    async fn leaderboard(&self, chain: &str) -> BackendResult<Vec<LeaderboardEntry>> {
        self.get_json(&format!("api/leaderboard/{chain}")).await
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// In-memory backend that counts calls.
    #[derive(Debug, Default)]
    pub(crate) struct MockBackend {
        pub(crate) profile: Mutex<Option<PlayerProfile>>,
        pub(crate) profile_calls: AtomicUsize,
        pub(crate) leaderboard_calls: AtomicUsize,
    }

    impl MockBackend {
        pub(crate) fn with_profile(profile: PlayerProfile) -> Self {
            Self {
                profile: Mutex::new(Some(profile)),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl BackendService for MockBackend {
        async fn profile_by_address(&self, address: Address) -> BackendResult<PlayerProfile> {
            self.profile_calls.fetch_add(1, Ordering::SeqCst);
            let profile = self.profile.lock().unwrap().clone();
            Ok(profile.unwrap_or_else(|| PlayerProfile {
                address: address.to_string(),
                ..PlayerProfile::default()
            }))
        }

        async fn profile_by_fid(&self, _fid: u64) -> BackendResult<PlayerProfile> {
            self.profile_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.profile.lock().unwrap().clone().unwrap_or_default())
        }

        async fn leaderboard(&self, _chain: &str) -> BackendResult<Vec<LeaderboardEntry>> {
            self.leaderboard_calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn backend(server: &MockServer) -> HttpBackend {
        HttpBackend::new(&server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_profile_by_address_path() {
        let server = MockServer::start().await;
        let address = Address::repeat_byte(0xab);
        Mock::given(method("GET"))
            .and(path(format!("/api/profile/{address}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "address": address.to_string(),
                "displayName": "striker",
                "strikes": { "base": 4, "optimism": 1 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let profile = backend(&server).profile_by_address(address).await.unwrap();
        assert_eq!(profile.display_name.as_deref(), Some("striker"));
        assert_eq!(profile.total_strikes(), 5);
    }

    #[tokio::test]
    async fn test_missing_profile_is_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/profile/fid/42"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such player"))
            .mount(&server)
            .await;

        let err = backend(&server).profile_by_fid(42).await.unwrap_err();
        match err {
            BackendError::Status { status, body } => {
                assert_eq!(status, StatusCode::NOT_FOUND);
                assert_eq!(body, "no such player");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_leaderboard_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/leaderboard/base"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "rank": 1, "address": "0xabc", "strikes": 42 },
                { "rank": 2, "address": "0xdef", "strikes": 7 }
            ])))
            .mount(&server)
            .await;

        let rows = backend(&server).leaderboard("base").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].strikes, 42);
    }

    #[test]
    fn test_profile_deserializes_sparse_payload() {
        let profile: PlayerProfile = serde_json::from_str(
            r#"{"address":"0xabc","displayName":"vitalik","strikes":{"base":3,"optimism":2},"extra":true}"#,
        )
        .unwrap();
        assert_eq!(profile.display_name.as_deref(), Some("vitalik"));
        assert_eq!(profile.strikes_on("base"), 3);
        assert_eq!(profile.strikes_on("zora"), 0);
        assert_eq!(profile.total_strikes(), 5);
        assert!(profile.avatar_url.is_none());
    }

    #[test]
    fn test_leaderboard_entry_deserializes() {
        let rows: Vec<LeaderboardEntry> = serde_json::from_str(
            r#"[{"rank":1,"address":"0xabc","strikes":42,"avatarUrl":"https://img"}]"#,
        )
        .unwrap();
        assert_eq!(rows[0].strikes, 42);
        assert_eq!(rows[0].avatar_url.as_deref(), Some("https://img"));
    }

    #[test]
    fn test_endpoints_keep_base_path() {
        let backend = HttpBackend::new("https://api.chainwarz.xyz/v1", Duration::from_secs(5)).unwrap();
        assert_eq!(
            backend.endpoint("api/leaderboard/base").unwrap().as_str(),
            "https://api.chainwarz.xyz/v1/api/leaderboard/base"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            HttpBackend::new("::nope", Duration::from_secs(5)),
            Err(BackendError::InvalidUrl(_))
        ));
    }
}
