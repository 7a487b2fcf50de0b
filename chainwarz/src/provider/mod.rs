//! EIP-1193 wallet providers.
//!
//! A wallet is consumed through the [`Eip1193Provider`] trait: one
//! asynchronous `request(method, params)` call plus an optional event
//! subscription for `accountsChanged` and `chainChanged`. [`ProviderExt`]
//! layers typed helpers for the handful of methods this crate issues.
//!
//! # Architecture
//!
//! ```text
//! HostEnvironment ──┐
//!                   ├─ select_provider() → SelectedProvider { provider, source }
//! injected provider ┘
//!
//! Eip1193Provider
//!   ├── request()          → raw JSON-RPC call
//!   ├── on() / remove_listener()
//!   └── ProviderExt        → request_accounts, chain_id, switch_chain, ...
//! ```

mod error;
mod http;
mod select;

#[cfg(test)]
pub(crate) mod mock;

use std::sync::Arc;

use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, json};

pub use error::{ProviderError, codes};
pub use http::HttpProvider;
pub use select::{
    ConnectionSource, ETHEREUM_PROVIDER_CAPABILITY, HostEnvironment, SelectedProvider,
    prefers_host_provider, select_provider,
};

use crate::chain::{ChainDescriptor, ChainId, NativeCurrency};

/// JSON-RPC method names used by the session.
pub mod methods {
    /// Prompt the user for account access.
    pub const REQUEST_ACCOUNTS: &str = "eth_requestAccounts";
    /// Read already-authorized accounts without prompting.
    pub const ACCOUNTS: &str = "eth_accounts";
    /// Read the active chain id.
    pub const CHAIN_ID: &str = "eth_chainId";
    /// Ask the wallet to switch chains (EIP-3326).
    pub const SWITCH_CHAIN: &str = "wallet_switchEthereumChain";
    /// Ask the wallet to add a chain definition (EIP-3085).
    pub const ADD_CHAIN: &str = "wallet_addEthereumChain";
    /// Submit a transaction for the wallet to sign and broadcast.
    pub const SEND_TRANSACTION: &str = "eth_sendTransaction";
}

/// Events a provider may emit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// The authorized accounts changed; empty means disconnected.
    AccountsChanged(Vec<String>),
    /// The active chain changed; carries the hex chain id.
    ChainChanged(String),
}

impl ProviderEvent {
    /// The event's kind.
    #[must_use]
    pub const fn kind(&self) -> ProviderEventKind {
        match self {
            Self::AccountsChanged(_) => ProviderEventKind::AccountsChanged,
            Self::ChainChanged(_) => ProviderEventKind::ChainChanged,
        }
    }
}

/// Event names a listener can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderEventKind {
    /// `accountsChanged`
    AccountsChanged,
    /// `chainChanged`
    ChainChanged,
}

impl ProviderEventKind {
    /// The EIP-1193 event name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AccountsChanged => "accountsChanged",
            Self::ChainChanged => "chainChanged",
        }
    }
}

/// Handle returned by [`Eip1193Provider::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Callback invoked for provider events.
pub type EventHandler = Arc<dyn Fn(&ProviderEvent) + Send + Sync>;

/// Shared, type-erased provider handle.
pub type BoxedProvider = Arc<dyn Eip1193Provider>;

/// An EIP-1193 compatible wallet provider.
#[async_trait]
pub trait Eip1193Provider: Send + Sync {
    /// Short name for logs, e.g. "farcaster" or "http".
    fn name(&self) -> &str;

    /// Issue a JSON-RPC request.
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;

    /// Subscribe to an event. Providers without event support return `None`.
    fn on(&self, kind: ProviderEventKind, handler: EventHandler) -> Option<SubscriptionId> {
        let _ = (kind, handler);
        None
    }

    /// Remove a listener registered with [`on`](Self::on).
    fn remove_listener(&self, id: SubscriptionId) {
        let _ = id;
    }
}

/// `wallet_addEthereumChain` parameter (EIP-3085).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddChainParams {
    /// Hex chain id.
    pub chain_id: ChainId,
    /// Display name.
    pub chain_name: String,
    /// RPC endpoints.
    pub rpc_urls: Vec<String>,
    /// Explorer base URLs.
    pub block_explorer_urls: Vec<String>,
    /// Native currency metadata.
    pub native_currency: NativeCurrency,
}

impl From<&ChainDescriptor> for AddChainParams {
    fn from(chain: &ChainDescriptor) -> Self {
        Self {
            chain_id: chain.chain_id(),
            chain_name: chain.name().to_owned(),
            rpc_urls: vec![chain.rpc_url().to_owned()],
            block_explorer_urls: vec![chain.explorer_url().to_owned()],
            native_currency: chain.native_currency().clone(),
        }
    }
}

/// `eth_sendTransaction` parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionParams {
    /// Sender.
    pub from: String,
    /// Recipient.
    pub to: String,
    /// Hex wei value.
    pub value: String,
    /// Hex calldata.
    pub data: String,
}

impl TransactionParams {
    /// A plain value transfer with empty calldata.
    #[must_use]
    pub fn transfer(from: Address, to: Address, value: String) -> Self {
        Self {
            from: from.to_checksum(None),
            to: to.to_checksum(None),
            value,
            data: "0x".to_owned(),
        }
    }
}

/// Typed helpers over [`Eip1193Provider::request`].
#[async_trait]
pub trait ProviderExt: Eip1193Provider {
    /// `eth_requestAccounts`: prompts the user.
    async fn request_accounts(&self) -> Result<Vec<String>, ProviderError> {
        let result = self.request(methods::REQUEST_ACCOUNTS, json!([])).await?;
        parse_accounts(methods::REQUEST_ACCOUNTS, result)
    }

    /// `eth_accounts`: no prompt.
    async fn accounts(&self) -> Result<Vec<String>, ProviderError> {
        let result = self.request(methods::ACCOUNTS, json!([])).await?;
        parse_accounts(methods::ACCOUNTS, result)
    }

    /// `eth_chainId`.
    async fn chain_id(&self) -> Result<ChainId, ProviderError> {
        let result = self.request(methods::CHAIN_ID, json!([])).await?;
        let raw = result
            .as_str()
            .ok_or_else(|| ProviderError::invalid_response(methods::CHAIN_ID, &result))?;
        ChainId::from_hex(raw).map_err(|e| ProviderError::invalid_response(methods::CHAIN_ID, e))
    }

    /// `wallet_switchEthereumChain`.
    async fn switch_chain(&self, chain_id: ChainId) -> Result<(), ProviderError> {
        self.request(methods::SWITCH_CHAIN, json!([{ "chainId": chain_id }]))
            .await
            .map(drop)
    }

    /// `wallet_addEthereumChain`.
    async fn add_chain(&self, params: &AddChainParams) -> Result<(), ProviderError> {
        self.request(methods::ADD_CHAIN, json!([params]))
            .await
            .map(drop)
    }

    /// `eth_sendTransaction`; returns the transaction hash.
    async fn send_transaction(&self, tx: &TransactionParams) -> Result<B256, ProviderError> {
        let result = self.request(methods::SEND_TRANSACTION, json!([tx])).await?;
        result
            .as_str()
            .ok_or_else(|| ProviderError::invalid_response(methods::SEND_TRANSACTION, &result))?
            .parse::<B256>()
            .map_err(|e| ProviderError::invalid_response(methods::SEND_TRANSACTION, e))
    }
}

impl<P: Eip1193Provider + ?Sized> ProviderExt for P {}

fn parse_accounts(method: &str, result: Value) -> Result<Vec<String>, ProviderError> {
    serde_json::from_value(result).map_err(|e| ProviderError::invalid_response(method, e))
}
