//! Choosing between a host-supplied and a browser-injected provider.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{BoxedProvider, ProviderError};
use crate::error::{Error, Result};

/// Capability a Mini App host advertises when it can hand out an Ethereum
/// provider.
pub const ETHEREUM_PROVIDER_CAPABILITY: &str = "wallet.getEthereumProvider";

/// Where the active provider came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionSource {
    /// No provider selected.
    #[default]
    None,
    /// Supplied by the embedding host (e.g. a Farcaster Mini App container).
    HostProvided,
    /// Injected by a browser extension or an external wallet endpoint.
    BrowserInjected,
}

impl ConnectionSource {
    /// Tag used in logs and status output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::HostProvided => "host-provided",
            Self::BrowserInjected => "browser-injected",
        }
    }
}

impl fmt::Display for ConnectionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The capability surface of an embedding host.
#[async_trait]
pub trait HostEnvironment: Send + Sync {
    /// Capability strings the host supports.
    async fn capabilities(&self) -> std::result::Result<Vec<String>, ProviderError>;

    /// The host's Ethereum provider, if it hands one out.
    async fn ethereum_provider(&self) -> std::result::Result<Option<BoxedProvider>, ProviderError>;
}

/// A provider together with its origin.
#[derive(Clone)]
pub struct SelectedProvider {
    /// The provider handle.
    pub provider: BoxedProvider,
    /// Where it came from.
    pub source: ConnectionSource,
}

impl fmt::Debug for SelectedProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedProvider")
            .field("provider", &self.provider.name())
            .field("source", &self.source)
            .finish()
    }
}

impl SelectedProvider {
    /// Wrap a provider injected outside any host.
    #[must_use]
    pub fn injected(provider: BoxedProvider) -> Self {
        Self {
            provider,
            source: ConnectionSource::BrowserInjected,
        }
    }

    /// Wrap a provider supplied by a host.
    #[must_use]
    pub fn host(provider: BoxedProvider) -> Self {
        Self {
            provider,
            source: ConnectionSource::HostProvided,
        }
    }
}

/// Whether the host's provider should be preferred.
#[must_use]
pub fn prefers_host_provider(in_host: bool, capabilities: &[String]) -> bool {
    in_host
        && capabilities
            .iter()
            .any(|c| c == ETHEREUM_PROVIDER_CAPABILITY)
}

/// Select the provider for the session.
///
/// Inside a host that advertises [`ETHEREUM_PROVIDER_CAPABILITY`] the host's
/// provider wins; otherwise the injected provider is used. A failing
/// capability lookup or provider factory falls through to the injected
/// provider.
///
/// # Errors
///
/// Returns [`Error::NoProviderAvailable`] when neither source yields a
/// provider.
pub async fn select_provider(
    in_host: bool,
    host: Option<&dyn HostEnvironment>,
    injected: Option<BoxedProvider>,
) -> Result<SelectedProvider> {
    if let Some(host) = host.filter(|_| in_host) {
        let capabilities = host.capabilities().await.unwrap_or_else(|e| {
            warn!(error = %e, "host capability discovery failed");
            Vec::new()
        });
        debug!(?capabilities, "host capabilities");

        if prefers_host_provider(in_host, &capabilities) {
            match host.ethereum_provider().await {
                Ok(Some(provider)) => {
                    info!(provider = provider.name(), "using host-provided wallet");
                    return Ok(SelectedProvider::host(provider));
                }
                Ok(None) => warn!("host advertised a wallet but returned none"),
                Err(e) => warn!(error = %e, "host wallet factory failed"),
            }
        }
    }

    match injected {
        Some(provider) => {
            info!(provider = provider.name(), "using browser-injected wallet");
            Ok(SelectedProvider::injected(provider))
        }
        None => Err(Error::NoProviderAvailable),
    }
}
