//! Observable session state and provider event handling.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use alloy::primitives::Address;
use tracing::{debug, info, warn};

use super::StrikeResult;
use crate::backend::{BackendService, LeaderboardEntry, PlayerProfile};
use crate::chain::ChainId;
use crate::provider::{ConnectionSource, ProviderEvent};

#[derive(Debug, Default)]
pub(crate) struct SessionState {
    pub(crate) account: Option<Address>,
    pub(crate) chain_id: Option<ChainId>,
    pub(crate) source: ConnectionSource,
    pub(crate) profile: Option<PlayerProfile>,
    pub(crate) leaderboards: BTreeMap<String, Vec<LeaderboardEntry>>,
    pub(crate) last_status: Option<String>,
    pub(crate) strikes: Vec<StrikeResult>,
}

/// Read-only copy of a session's state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    /// Connected account.
    pub account: Option<Address>,
    /// Last observed chain id.
    pub chain_id: Option<ChainId>,
    /// How the account was connected; none while disconnected.
    pub source: ConnectionSource,
    /// Profile of the connected account, once loaded.
    pub profile: Option<PlayerProfile>,
    /// Most recently fetched leaderboard per chain key.
    pub leaderboards: BTreeMap<String, Vec<LeaderboardEntry>>,
    /// Status line from the last operation.
    pub last_status: Option<String>,
    /// Strikes sent during this session, oldest first.
    pub strikes: Vec<StrikeResult>,
}

/// State shared between the session and its event listeners.
///
/// The lock is never held across an `.await`.
#[derive(Debug, Clone, Default)]
pub(crate) struct SharedState(Arc<Mutex<SessionState>>);

impl SharedState {
    pub(crate) fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the account and the source it was obtained through; the profile
    /// is dropped when the account changes. Without an account the source is
    /// [`ConnectionSource::None`]. Returns whether the account changed.
    pub(crate) fn set_account(&self, account: Option<Address>, source: ConnectionSource) -> bool {
        let mut state = self.lock();
        state.source = if account.is_some() {
            source
        } else {
            ConnectionSource::None
        };
        if state.account == account {
            return false;
        }
        state.account = account;
        state.profile = None;
        true
    }

    pub(crate) fn set_chain_id(&self, chain_id: ChainId) {
        self.lock().chain_id = Some(chain_id);
    }

    /// Store a fetched profile unless the account has changed meanwhile.
    pub(crate) fn store_profile(&self, address: Address, profile: PlayerProfile) -> bool {
        let mut state = self.lock();
        if state.account != Some(address) {
            debug!(%address, "discarding profile for stale account");
            return false;
        }
        state.profile = Some(profile);
        true
    }

    pub(crate) fn store_leaderboard(&self, chain: &str, entries: Vec<LeaderboardEntry>) {
        self.lock().leaderboards.insert(chain.to_owned(), entries);
    }

    pub(crate) fn set_status(&self, status: String) {
        self.lock().last_status = Some(status);
    }

    pub(crate) fn snapshot(&self) -> SessionSnapshot {
        let state = self.lock();
        SessionSnapshot {
            account: state.account,
            chain_id: state.chain_id,
            source: state.source,
            profile: state.profile.clone(),
            leaderboards: state.leaderboards.clone(),
            last_status: state.last_status.clone(),
            strikes: state.strikes.clone(),
        }
    }
}

/// What a provider event listener needs: the state it updates, the origin
/// of the provider it listens on and the backend it reloads profiles from.
#[derive(Clone)]
pub(crate) struct EventContext {
    pub(crate) state: SharedState,
    pub(crate) source: ConnectionSource,
    pub(crate) backend: Option<Arc<dyn BackendService>>,
}

impl EventContext {
    /// Apply a provider event. Repeated identical events are no-ops.
    pub(crate) fn handle(&self, event: &ProviderEvent) {
        match event {
            ProviderEvent::AccountsChanged(accounts) => match accounts.first() {
                None => {
                    if self.state.set_account(None, ConnectionSource::None) {
                        info!("wallet disconnected");
                    }
                }
                Some(raw) => match raw.parse::<Address>() {
                    Ok(address) => {
                        if self.state.set_account(Some(address), self.source) {
                            info!(%address, "wallet account changed");
                            spawn_profile_refresh(self.state.clone(), self.backend.clone(), address);
                        }
                    }
                    Err(e) => warn!(account = %raw, error = %e, "ignoring invalid account"),
                },
            },
            ProviderEvent::ChainChanged(raw) => match ChainId::from_hex(raw) {
                Ok(chain_id) => {
                    debug!(chain = %chain_id, "wallet chain changed");
                    self.state.set_chain_id(chain_id);
                }
                Err(e) => warn!(error = %e, "ignoring invalid chainChanged payload"),
            },
        }
    }
}

/// Load the profile for `address` in the background.
///
/// Best effort: failures are logged, and without a tokio runtime nothing is
/// spawned.
pub(crate) fn spawn_profile_refresh(
    state: SharedState,
    backend: Option<Arc<dyn BackendService>>,
    address: Address,
) {
    let Some(backend) = backend else {
        return;
    };
    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        debug!(%address, "no async runtime; skipping profile refresh");
        return;
    };
    handle.spawn(async move {
        match backend.profile_by_address(address).await {
            Ok(profile) => {
                state.store_profile(address, profile);
            }
            Err(e) => warn!(%address, error = %e, "profile refresh failed"),
        }
    });
}

/// Reload the profile and the chain's leaderboard in the background after a
/// strike.
pub(crate) fn spawn_strike_refresh(
    state: SharedState,
    backend: Option<Arc<dyn BackendService>>,
    address: Address,
    chain: String,
) {
    let Some(backend) = backend else {
        return;
    };
    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        debug!(%chain, "no async runtime; skipping post-strike refresh");
        return;
    };
    handle.spawn(async move {
        match backend.leaderboard(&chain).await {
            Ok(entries) => state.store_leaderboard(&chain, entries),
            Err(e) => warn!(%chain, error = %e, "leaderboard refresh failed"),
        }
        match backend.profile_by_address(address).await {
            Ok(profile) => {
                state.store_profile(address, profile);
            }
            Err(e) => warn!(%address, error = %e, "profile refresh failed"),
        }
    });
}
