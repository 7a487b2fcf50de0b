//! Switching the wallet to a strike's chain.
//!
//! ```text
//! RequestSwitch ──ok──────────────────────────────► Verify ──match──► Confirmed
//!      │                                              ▲  │
//!      └─4902─► RequestAdd ──ok──► RequestSwitch ─────┘  └─budget spent─► Aborted(timeout)
//!      │              ├─host refuses─► Aborted(not supported by host)
//!      │              └─ok, retry rejected by user─► Aborted(error unchanged)
//!      └─other error─► Aborted(error unchanged)
//! ```
//!
//! Wallets resolve switch/add calls before the switch has taken effect, so
//! the active chain is polled until it matches, within a fixed budget.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::chain::{ChainDescriptor, ChainId};
use crate::provider::{AddChainParams, ConnectionSource, Eip1193Provider, ProviderError, ProviderExt};

/// Negotiation tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiationConfig {
    /// Maximum `eth_chainId` polls.
    pub verify_attempts: u32,
    /// Delay between polls.
    pub verify_interval: Duration,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            verify_attempts: 10,
            verify_interval: Duration::from_millis(250),
        }
    }
}

/// Non-terminal negotiation steps; `Confirmed` and `Aborted` are the
/// function's `Ok` and `Err`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    RequestSwitch,
    RequestAdd,
    Verify,
}

/// Why negotiation aborted.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum NegotiationError {
    /// The host refused to add the chain.
    #[error("host refused to add chain {chain_id}: {source}")]
    NotSupportedByHost {
        /// Target chain.
        chain_id: ChainId,
        /// The host's error.
        source: ProviderError,
    },

    /// The wallet never reported the target chain.
    #[error("chain {chain_id} not confirmed after {attempts} checks")]
    Timeout {
        /// Target chain.
        chain_id: ChainId,
        /// Polls made.
        attempts: u32,
    },

    /// The switch or add call failed; the provider's error, unchanged.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Result of a confirmed negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiationOutcome {
    /// The confirmed chain.
    pub chain_id: ChainId,
    /// Whether the chain had to be added to the wallet.
    pub added: bool,
    /// Polls until the wallet reported the chain.
    pub polls: u32,
}

/// Drives the switch/add/verify protocol against a provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChainNegotiator {
    config: NegotiationConfig,
}

impl ChainNegotiator {
    /// Create a negotiator.
    #[must_use]
    pub const fn new(config: NegotiationConfig) -> Self {
        Self { config }
    }

    /// The negotiator's settings.
    #[must_use]
    pub const fn config(&self) -> &NegotiationConfig {
        &self.config
    }

    /// Make the provider's active chain equal `chain`.
    ///
    /// # Errors
    ///
    /// - [`NegotiationError::NotSupportedByHost`] when a host-provided wallet
    ///   (or any wallet answering 4200) refuses `wallet_addEthereumChain`.
    /// - [`NegotiationError::Timeout`] when polling never observes the chain.
    /// - [`NegotiationError::Provider`] for any other switch/add failure.
    pub async fn negotiate<P>(
        &self,
        provider: &P,
        chain: &ChainDescriptor,
        source: ConnectionSource,
    ) -> Result<NegotiationOutcome, NegotiationError>
    where
        P: Eip1193Provider + ?Sized,
    {
        let target = chain.chain_id();
        let mut step = Step::RequestSwitch;
        let mut added = false;

        loop {
            debug!(chain = %target, ?step, "chain negotiation");
            step = match step {
                Step::RequestSwitch => match provider.switch_chain(target).await {
                    Ok(()) => Step::Verify,
                    Err(e) if e.is_unrecognized_chain() => Step::RequestAdd,
                    Err(e) => {
                        warn!(chain = %target, error = %e, "chain switch rejected");
                        return Err(e.into());
                    }
                },
                Step::RequestAdd => {
                    self.add_chain(provider, chain, source).await?;
                    added = true;
                    // Many wallets switch as part of the add; a failing retry
                    // is left for verification to judge unless the user
                    // declined it.
                    match provider.switch_chain(target).await {
                        Ok(()) => {}
                        Err(e) if e.is_user_rejection() => {
                            warn!(chain = %target, error = %e, "switch after add rejected");
                            return Err(e.into());
                        }
                        Err(e) => debug!(chain = %target, error = %e, "switch after add failed"),
                    }
                    Step::Verify
                }
                Step::Verify => {
                    let polls = self.verify(provider, target).await?;
                    info!(chain = %target, added, polls, "chain confirmed");
                    return Ok(NegotiationOutcome {
                        chain_id: target,
                        added,
                        polls,
                    });
                }
            };
        }
    }

    async fn add_chain<P>(
        &self,
        provider: &P,
        chain: &ChainDescriptor,
        source: ConnectionSource,
    ) -> Result<(), NegotiationError>
    where
        P: Eip1193Provider + ?Sized,
    {
        let target = chain.chain_id();
        info!(chain = %target, name = chain.name(), "adding chain to wallet");
        match provider.add_chain(&AddChainParams::from(chain)).await {
            Ok(()) => Ok(()),
            Err(e) if source == ConnectionSource::HostProvided || e.is_unsupported_method() => {
                warn!(chain = %target, error = %e, "host refused to add chain");
                Err(NegotiationError::NotSupportedByHost {
                    chain_id: target,
                    source: e,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Poll `eth_chainId` until it equals `target`; returns the poll count.
    async fn verify<P>(&self, provider: &P, target: ChainId) -> Result<u32, NegotiationError>
    where
        P: Eip1193Provider + ?Sized,
    {
        let attempts = self.config.verify_attempts;
        for attempt in 1..=attempts {
            match provider.chain_id().await {
                Ok(observed) if observed == target => return Ok(attempt),
                Ok(observed) => {
                    debug!(attempt, %observed, expected = %target, "chain not switched yet");
                }
                Err(e) => debug!(attempt, error = %e, "chain id poll failed"),
            }
            if attempt < attempts {
                tokio::time::sleep(self.config.verify_interval).await;
            }
        }
        warn!(chain = %target, attempts, "chain switch not confirmed");
        Err(NegotiationError::Timeout {
            chain_id: target,
            attempts,
        })
    }
}
