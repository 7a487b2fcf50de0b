//! Configuration for the wallet core.
//!
//! Loaded from JSON. Chain strike amounts are written as decimal strings and
//! converted to exact integers once, when the registry is built.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::chain::{ChainDescriptor, ChainId, ChainRegistry, NativeCurrency};
use crate::negotiation::NegotiationConfig;

/// Error type for configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("parse: {0}")]
    Parse(#[from] serde_json::Error),

    /// Invalid value.
    #[error("invalid: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Create an invalid value error.
    #[inline]
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// One configured chain, as written in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainConfig {
    /// Registry key, e.g. `"base"`.
    pub key: String,
    /// Hex chain id, e.g. `"0x2105"`.
    pub chain_id: String,
    /// Display name.
    pub name: String,
    /// RPC URL advertised when adding the chain.
    pub rpc_url: String,
    /// Block explorer base URL.
    pub explorer_url: String,
    /// Strike contract address.
    pub contract: String,
    /// Strike value as a decimal string in the native currency.
    pub strike_amount: String,
    /// Native currency metadata.
    #[serde(default = "NativeCurrency::ether")]
    pub native_currency: NativeCurrency,
}

impl ChainConfig {
    /// Base mainnet with the given strike contract.
    #[must_use]
    pub fn base(contract: impl Into<String>) -> Self {
        Self {
            key: "base".into(),
            chain_id: ChainId::BASE.to_hex(),
            name: "Base".into(),
            rpc_url: "https://mainnet.base.org".into(),
            explorer_url: "https://basescan.org".into(),
            contract: contract.into(),
            strike_amount: "0.000001337".into(),
            native_currency: NativeCurrency::ether(),
        }
    }

    /// OP Mainnet with the given strike contract.
    #[must_use]
    pub fn optimism(contract: impl Into<String>) -> Self {
        Self {
            key: "optimism".into(),
            chain_id: ChainId::OPTIMISM.to_hex(),
            name: "OP Mainnet".into(),
            rpc_url: "https://mainnet.optimism.io".into(),
            explorer_url: "https://optimistic.etherscan.io".into(),
            contract: contract.into(),
            strike_amount: "0.0001337".into(),
            native_currency: NativeCurrency::ether(),
        }
    }

    /// Convert into a validated [`ChainDescriptor`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a malformed chain id, contract
    /// address or strike amount.
    pub fn into_descriptor(self) -> ConfigResult<ChainDescriptor> {
        let chain_id = ChainId::from_hex(&self.chain_id)
            .map_err(|e| ConfigError::invalid(format!("chain '{}': {e}", self.key)))?;
        let contract: Address = self.contract.parse().map_err(|e| {
            ConfigError::invalid(format!(
                "chain '{}': contract '{}': {e}",
                self.key, self.contract
            ))
        })?;
        ChainDescriptor::new(
            self.key.clone(),
            chain_id,
            self.name,
            self.rpc_url,
            self.explorer_url,
            contract,
            &self.strike_amount,
            self.native_currency,
        )
        .map_err(|e| ConfigError::invalid(format!("chain '{}': {e}", self.key)))
    }
}

/// Chain negotiation settings as written in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NegotiationSettings {
    /// Maximum `eth_chainId` polls after a switch.
    pub verify_attempts: u32,
    /// Delay between polls in milliseconds.
    pub verify_interval_ms: u64,
}

impl Default for NegotiationSettings {
    fn default() -> Self {
        let defaults = NegotiationConfig::default();
        Self {
            verify_attempts: defaults.verify_attempts,
            verify_interval_ms: u64::try_from(defaults.verify_interval.as_millis())
                .unwrap_or(u64::MAX),
        }
    }
}

impl From<NegotiationSettings> for NegotiationConfig {
    fn from(settings: NegotiationSettings) -> Self {
        Self {
            verify_attempts: settings.verify_attempts,
            verify_interval: Duration::from_millis(settings.verify_interval_ms),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    /// Base URL of the leaderboard/profile service.
    pub backend_url: Option<String>,
    /// Backend request timeout in seconds.
    pub backend_timeout_secs: Option<u64>,
    /// Chain negotiation settings.
    pub negotiation: NegotiationSettings,
    /// Chains a strike can target.
    pub chains: Vec<ChainConfig>,
}

/// Severity of a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueLevel {
    /// The configuration cannot be used.
    Error,
    /// Usable but probably not intended.
    Warning,
}

/// A problem found by [`AppConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    /// Severity.
    pub level: IssueLevel,
    /// Description.
    pub message: String,
}

impl ConfigIssue {
    fn error(message: impl Into<String>) -> Self {
        Self {
            level: IssueLevel::Error,
            message: message.into(),
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            level: IssueLevel::Warning,
            message: message.into(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Default backend timeout.
    #[must_use]
    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_secs.unwrap_or(15))
    }

    /// Collect configuration issues without failing.
    #[must_use]
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        let mut keys = HashSet::new();

        if self.chains.is_empty() {
            issues.push(ConfigIssue::error("no chains configured"));
        }
        for chain in &self.chains {
            if !keys.insert(chain.key.as_str()) {
                issues.push(ConfigIssue::error(format!("duplicate chain key '{}'", chain.key)));
            }
            match chain.clone().into_descriptor() {
                Ok(descriptor) if descriptor.strike_amount().is_zero() => issues.push(
                    ConfigIssue::warning(format!("chain '{}' has a zero strike amount", chain.key)),
                ),
                Ok(_) => {}
                Err(e) => issues.push(ConfigIssue::error(e.to_string())),
            }
        }
        if self.negotiation.verify_attempts == 0 {
            issues.push(ConfigIssue::error("negotiation.verifyAttempts must be at least 1"));
        }
        if self.backend_url.is_none() {
            issues.push(ConfigIssue::warning(
                "backendUrl not set; profiles and leaderboards are disabled",
            ));
        }
        issues
    }

    /// Build the chain registry.
    ///
    /// # Errors
    ///
    /// Returns the first [`IssueLevel::Error`] issue from
    /// [`validate`](Self::validate) as [`ConfigError::Invalid`].
    pub fn registry(&self) -> ConfigResult<ChainRegistry> {
        if let Some(issue) = self
            .validate()
            .into_iter()
            .find(|i| i.level == IssueLevel::Error)
        {
            return Err(ConfigError::Invalid(issue.message));
        }
        let chains = self
            .chains
            .iter()
            .cloned()
            .map(ChainConfig::into_descriptor)
            .collect::<ConfigResult<Vec<_>>>()?;
        Ok(ChainRegistry::new(chains))
    }
}
