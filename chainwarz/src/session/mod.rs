//! Wallet session.
//!
//! A [`WalletSession`] owns the selected provider, the chain registry and the
//! observable state the game UI renders: connected account, active chain,
//! profile, leaderboards and a status line. Provider events update the state
//! through listeners registered when the provider is attached and removed
//! when it is replaced or the session is dropped.
//!
//! ```text
//! connect() ──► eth_requestAccounts ──► eth_chainId ──► (profile refresh)
//!
//! send_strike(key)
//!   ├── precondition checks (no network)
//!   ├── ChainNegotiator::negotiate()
//!   ├── eth_chainId == target?
//!   └── eth_sendTransaction ──► StrikeResult ──► (leaderboard + profile refresh)
//! ```

mod state;
mod strike;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use alloy::primitives::Address;
use tracing::{debug, info, warn};

pub use state::SessionSnapshot;
pub use strike::StrikeResult;

use self::state::{EventContext, SharedState, spawn_profile_refresh};
use crate::backend::{BackendService, LeaderboardEntry, PlayerProfile};
use crate::chain::{ChainDescriptor, ChainId, ChainRegistry};
use crate::config::ConfigError;
use crate::error::{Error, Result};
use crate::negotiation::{ChainNegotiator, NegotiationConfig, NegotiationOutcome};
use crate::provider::{
    ConnectionSource, ProviderEvent, ProviderEventKind, ProviderExt, SelectedProvider,
    SubscriptionId,
};

/// Builder for [`WalletSession`].
#[derive(Default)]
pub struct WalletSessionBuilder {
    registry: ChainRegistry,
    negotiation: NegotiationConfig,
    backend: Option<Arc<dyn BackendService>>,
    provider: Option<SelectedProvider>,
}

impl fmt::Debug for WalletSessionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletSessionBuilder")
            .field("chains", &self.registry.len())
            .field("negotiation", &self.negotiation)
            .field("has_backend", &self.backend.is_some())
            .field("provider", &self.provider)
            .finish()
    }
}

impl WalletSessionBuilder {
    /// Start from a chain registry.
    #[must_use]
    pub fn new(registry: ChainRegistry) -> Self {
        Self {
            registry,
            ..Self::default()
        }
    }

    /// Set chain negotiation tuning.
    #[must_use]
    pub const fn negotiation(mut self, config: NegotiationConfig) -> Self {
        self.negotiation = config;
        self
    }

    /// Set the profile and leaderboard service.
    #[must_use]
    pub fn backend(mut self, backend: Arc<dyn BackendService>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set the wallet provider.
    #[must_use]
    pub fn provider(mut self, provider: SelectedProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Build the session, attaching event listeners to the provider.
    #[must_use]
    pub fn build(self) -> WalletSession {
        let mut session = WalletSession {
            provider: None,
            subscriptions: Mutex::new(Vec::new()),
            registry: Arc::new(self.registry),
            negotiator: ChainNegotiator::new(self.negotiation),
            backend: self.backend,
            state: SharedState::default(),
            in_flight: AtomicBool::new(false),
        };
        if let Some(provider) = self.provider {
            session.set_provider(provider);
        }
        session
    }
}

/// A player's wallet session.
pub struct WalletSession {
    provider: Option<SelectedProvider>,
    subscriptions: Mutex<Vec<SubscriptionId>>,
    registry: Arc<ChainRegistry>,
    negotiator: ChainNegotiator,
    backend: Option<Arc<dyn BackendService>>,
    state: SharedState,
    in_flight: AtomicBool,
}

impl fmt::Debug for WalletSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletSession")
            .field("provider", &self.provider)
            .field("chains", &self.registry.len())
            .field("negotiator", &self.negotiator)
            .field("has_backend", &self.backend.is_some())
            .field("in_flight", &self.in_flight.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl WalletSession {
    /// Create a builder.
    #[must_use]
    pub fn builder(registry: ChainRegistry) -> WalletSessionBuilder {
        WalletSessionBuilder::new(registry)
    }

    /// Replace the provider.
    ///
    /// Listeners on the previous provider are removed and the account,
    /// chain and connection source are cleared, since they belonged to the
    /// previous wallet.
    pub fn set_provider(&mut self, provider: SelectedProvider) {
        self.detach_listeners();
        {
            let mut state = self.state.lock();
            state.account = None;
            state.chain_id = None;
            state.source = ConnectionSource::None;
            state.profile = None;
        }
        info!(
            provider = provider.provider.name(),
            source = %provider.source,
            "wallet provider attached"
        );
        self.provider = Some(provider);
        self.attach_listeners();
    }

    fn attach_listeners(&self) {
        let Some(selected) = &self.provider else {
            return;
        };
        let ctx = EventContext {
            state: self.state.clone(),
            source: selected.source,
            backend: self.backend.clone(),
        };
        let mut subscriptions = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for kind in [ProviderEventKind::AccountsChanged, ProviderEventKind::ChainChanged] {
            let ctx = ctx.clone();
            match selected
                .provider
                .on(kind, Arc::new(move |event: &ProviderEvent| ctx.handle(event)))
            {
                Some(id) => subscriptions.push(id),
                None => debug!(event = kind.as_str(), "provider does not emit events"),
            }
        }
    }

    fn detach_listeners(&self) {
        let ids: Vec<SubscriptionId> = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        if let Some(selected) = &self.provider {
            for id in ids {
                selected.provider.remove_listener(id);
            }
        }
    }

    /// The chain registry.
    #[must_use]
    pub fn registry(&self) -> &ChainRegistry {
        &self.registry
    }

    /// How the current account was connected; [`ConnectionSource::None`]
    /// until [`connect`](Self::connect) or [`restore`](Self::restore)
    /// succeeds and again after a disconnect.
    #[must_use]
    pub fn source(&self) -> ConnectionSource {
        self.state.lock().source
    }

    /// Connected account.
    #[must_use]
    pub fn account(&self) -> Option<Address> {
        self.state.lock().account
    }

    /// Last observed chain id.
    #[must_use]
    pub fn chain_id(&self) -> Option<ChainId> {
        self.state.lock().chain_id
    }

    /// Profile of the connected account, if loaded.
    #[must_use]
    pub fn profile(&self) -> Option<PlayerProfile> {
        self.state.lock().profile.clone()
    }

    /// Status line from the last operation.
    #[must_use]
    pub fn last_status(&self) -> Option<String> {
        self.state.lock().last_status.clone()
    }

    /// Strikes sent during this session, oldest first.
    #[must_use]
    pub fn strikes(&self) -> Vec<StrikeResult> {
        self.state.lock().strikes.clone()
    }

    /// Whether a strike is being submitted.
    #[must_use]
    pub fn is_strike_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Copy of the whole observable state.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.snapshot()
    }

    /// Apply a provider event directly, for providers that cannot register
    /// listeners themselves.
    pub fn handle_event(&self, event: &ProviderEvent) {
        self.event_context().handle(event);
    }

    fn event_context(&self) -> EventContext {
        EventContext {
            state: self.state.clone(),
            source: self
                .provider
                .as_ref()
                .map_or(ConnectionSource::None, |p| p.source),
            backend: self.backend.clone(),
        }
    }

    fn selected(&self) -> Result<&SelectedProvider> {
        self.provider.as_ref().ok_or(Error::NoProviderAvailable)
    }

    fn chain(&self, key: &str) -> Result<&ChainDescriptor> {
        self.registry
            .get(key)
            .ok_or_else(|| Error::UnknownChain(key.to_owned()))
    }

    /// Store the outcome's status line and pass the result through.
    fn record<T>(&self, result: Result<T>, describe: impl FnOnce(&T) -> String) -> Result<T> {
        let status = match &result {
            Ok(value) => describe(value),
            Err(e) => e.status_message(),
        };
        self.state.set_status(status);
        result
    }

    /// Request account access and read the active chain.
    ///
    /// # Errors
    ///
    /// - [`Error::NoProviderAvailable`] without a provider.
    /// - [`Error::ConnectionRejected`] when the user declines or the wallet
    ///   returns no accounts.
    /// - [`Error::ConnectionFailed`] for any other wallet failure.
    pub async fn connect(&self) -> Result<Address> {
        let result = self.connect_inner().await;
        self.record(result, |address| format!("Connected {address}"))
    }

    async fn connect_inner(&self) -> Result<Address> {
        let selected = self.selected()?;
        let accounts = selected.provider.request_accounts().await.map_err(|e| {
            if e.is_user_rejection() {
                Error::ConnectionRejected
            } else {
                Error::connection_failed(e)
            }
        })?;
        let Some(raw) = accounts.first() else {
            return Err(Error::ConnectionRejected);
        };
        let address: Address = raw
            .parse()
            .map_err(|e| Error::connection_failed(format!("invalid account '{raw}': {e}")))?;
        self.adopt_account(address, selected.source).await;
        info!(%address, source = %selected.source, "wallet connected");
        Ok(address)
    }

    /// Pick up an already-authorized account without prompting.
    ///
    /// Returns `None` when the wallet has not authorized this site.
    ///
    /// # Errors
    ///
    /// [`Error::NoProviderAvailable`] without a provider, the wallet's
    /// error as [`Error::Provider`], or [`Error::ConnectionFailed`] for an
    /// invalid account.
    pub async fn restore(&self) -> Result<Option<Address>> {
        let result = self.restore_inner().await;
        self.record(result, |restored| match restored {
            Some(address) => format!("Connected {address}"),
            None => "Not connected".to_owned(),
        })
    }

    async fn restore_inner(&self) -> Result<Option<Address>> {
        let selected = self.selected()?;
        let accounts = selected.provider.accounts().await?;
        let Some(raw) = accounts.first() else {
            debug!("no authorized account to restore");
            return Ok(None);
        };
        let address: Address = raw
            .parse()
            .map_err(|e| Error::connection_failed(format!("invalid account '{raw}': {e}")))?;
        self.adopt_account(address, selected.source).await;
        info!(%address, "wallet session restored");
        Ok(Some(address))
    }

    async fn adopt_account(&self, address: Address, source: ConnectionSource) {
        self.state.set_account(Some(address), source);
        if let Err(e) = self.read_chain_id().await {
            warn!(error = %e, "could not read chain after connecting");
        }
        spawn_profile_refresh(self.state.clone(), self.backend.clone(), address);
    }

    /// Forget the connected account. The wallet itself keeps its
    /// authorization; there is no EIP-1193 call to revoke it.
    pub fn disconnect(&self) {
        let mut state = self.state.lock();
        state.account = None;
        state.source = ConnectionSource::None;
        state.profile = None;
        state.last_status = Some("Disconnected".to_owned());
        info!("wallet session disconnected");
    }

    /// Read the active chain from the wallet and store it.
    ///
    /// # Errors
    ///
    /// [`Error::NoProviderAvailable`] without a provider, or the wallet's
    /// error as [`Error::Provider`].
    pub async fn refresh_chain_id(&self) -> Result<ChainId> {
        let result = self.read_chain_id().await;
        self.record(result, |chain_id| format!("Wallet is on chain {chain_id}"))
    }

    async fn read_chain_id(&self) -> Result<ChainId> {
        let selected = self.selected()?;
        let chain_id = selected.provider.chain_id().await?;
        self.state.set_chain_id(chain_id);
        Ok(chain_id)
    }

    /// Move the wallet to a configured chain without sending anything.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownChain`], [`Error::NoProviderAvailable`], or the
    /// negotiation failure.
    pub async fn switch_to(&self, chain_key: &str) -> Result<NegotiationOutcome> {
        let result = self.switch_inner(chain_key).await;
        self.record(result, |outcome| format!("Switched to chain {}", outcome.chain_id))
    }

    async fn switch_inner(&self, chain_key: &str) -> Result<NegotiationOutcome> {
        let chain = self.chain(chain_key)?;
        let selected = self.selected()?;
        let outcome = self
            .negotiator
            .negotiate(selected.provider.as_ref(), chain, selected.source)
            .await?;
        self.state.set_chain_id(outcome.chain_id);
        Ok(outcome)
    }

    /// Fetch and store the connected account's profile.
    ///
    /// Returns `None` when no backend is configured.
    ///
    /// # Errors
    ///
    /// [`Error::NotConnected`] without an account, or [`Error::Backend`].
    pub async fn refresh_profile(&self) -> Result<Option<PlayerProfile>> {
        let result = self.refresh_profile_inner().await;
        self.record(result, |profile| match profile {
            Some(_) => "Profile loaded".to_owned(),
            None => "Profiles are unavailable".to_owned(),
        })
    }

    async fn refresh_profile_inner(&self) -> Result<Option<PlayerProfile>> {
        let address = self.account().ok_or(Error::NotConnected)?;
        let Some(backend) = &self.backend else {
            return Ok(None);
        };
        let profile = backend.profile_by_address(address).await?;
        self.state.store_profile(address, profile.clone());
        Ok(Some(profile))
    }

    /// Fetch and store the leaderboard for a configured chain.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownChain`], [`Error::Config`] when no backend is
    /// configured, or [`Error::Backend`].
    pub async fn leaderboard(&self, chain_key: &str) -> Result<Vec<LeaderboardEntry>> {
        let result = self.leaderboard_inner(chain_key).await;
        self.record(result, |entries| {
            format!("Leaderboard for {chain_key}: {} players", entries.len())
        })
    }

    async fn leaderboard_inner(&self, chain_key: &str) -> Result<Vec<LeaderboardEntry>> {
        let chain = self.chain(chain_key)?;
        let backend = self
            .backend
            .as_ref()
            .ok_or_else(|| ConfigError::invalid("backendUrl is not configured"))?;
        let entries = backend.leaderboard(chain.key()).await?;
        self.state.store_leaderboard(chain.key(), entries.clone());
        Ok(entries)
    }
}

impl Drop for WalletSession {
    fn drop(&mut self) {
        self.detach_listeners();
    }
}

/// Marks a strike as in flight until dropped.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
