//! Strike submission.

use std::time::SystemTime;

use alloy::primitives::B256;
use tracing::{info, warn};

use super::state::spawn_strike_refresh;
use super::{InFlightGuard, WalletSession};
use crate::amount::to_hex_quantity;
use crate::error::{Error, Result};
use crate::negotiation::NegotiationError;
use crate::provider::{ProviderExt, TransactionParams};

/// A submitted strike.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrikeResult {
    /// Chain key the strike was sent on.
    pub chain: String,
    /// Transaction hash returned by the wallet.
    pub tx_hash: B256,
    /// Explorer link for the transaction.
    pub explorer_url: String,
    /// When the wallet accepted the transaction.
    pub submitted_at: SystemTime,
}

impl WalletSession {
    /// Send one strike on a configured chain.
    ///
    /// The wallet is first moved to the strike's chain, then the active chain
    /// is read once more; only if it still matches is `eth_sendTransaction`
    /// issued, transferring the chain's strike amount to its contract.
    ///
    /// # Errors
    ///
    /// Checked before any wallet call, in order: [`Error::UnknownChain`],
    /// [`Error::NoProviderAvailable`], [`Error::NotConnected`],
    /// [`Error::StrikeInFlight`]. Then [`Error::ChainNotSupportedByHost`],
    /// [`Error::ChainSwitchTimeout`] or [`Error::ChainMismatch`] from chain
    /// negotiation, and [`Error::TransactionFailed`] for any wallet error.
    pub async fn send_strike(&self, chain_key: &str) -> Result<StrikeResult> {
        let result = self.strike_inner(chain_key).await;
        self.record(result, |strike| {
            format!("Strike sent on {}: {}", strike.chain, strike.tx_hash)
        })
    }

    async fn strike_inner(&self, chain_key: &str) -> Result<StrikeResult> {
        let chain = self.chain(chain_key)?;
        let selected = self.selected()?;
        let from = self.account().ok_or(Error::NotConnected)?;
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            return Err(Error::StrikeInFlight);
        };
        let provider = selected.provider.as_ref();
        let target = chain.chain_id();

        self.negotiator
            .negotiate(provider, chain, selected.source)
            .await
            .map_err(|e| match e {
                NegotiationError::Provider(e) => Error::transaction_failed(e),
                other => other.into(),
            })?;

        let actual = provider.chain_id().await.map_err(Error::transaction_failed)?;
        self.state.set_chain_id(actual);
        if actual != target {
            warn!(expected = %target, %actual, "wallet changed chain before submission");
            return Err(Error::ChainMismatch {
                expected: target,
                actual,
            });
        }

        let tx = TransactionParams::transfer(
            from,
            chain.contract(),
            to_hex_quantity(chain.strike_amount()),
        );
        let tx_hash = provider.send_transaction(&tx).await.map_err(|e| {
            warn!(chain = chain.key(), error = %e, "strike transaction failed");
            Error::transaction_failed(e)
        })?;

        let strike = StrikeResult {
            chain: chain.key().to_owned(),
            tx_hash,
            explorer_url: chain.tx_url(&tx_hash.to_string()),
            submitted_at: SystemTime::now(),
        };
        info!(chain = chain.key(), %tx_hash, value = %tx.value, "strike sent");
        self.state.lock().strikes.push(strike.clone());
        spawn_strike_refresh(
            self.state.clone(),
            self.backend.clone(),
            from,
            chain.key().to_owned(),
        );
        Ok(strike)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    use alloy::primitives::Address;
    use async_trait::async_trait;
    use serde_json::Value;
    use tokio::sync::Notify;

    use super::super::tests::{CONTRACT, fast, registry, session_with};
    use super::*;
    use crate::backend::mock::MockBackend;
    use crate::chain::ChainId;
    use crate::provider::mock::{ACCOUNT, MockProvider, SwitchBehavior, TX_HASH};
    use crate::provider::{Eip1193Provider, ProviderError, SelectedProvider, methods};

    async fn connected(provider: &Arc<MockProvider>) -> WalletSession {
        let session = session_with(provider.clone());
        session.connect().await.unwrap();
        session
    }

    #[tokio::test]
    async fn test_strike_on_base() {
        let provider = Arc::new(MockProvider::new("0x1"));
        let session = connected(&provider).await;

        let strike = session.send_strike("base").await.unwrap();
        assert_eq!(strike.chain, "base");
        assert_eq!(strike.tx_hash, TX_HASH.parse::<B256>().unwrap());
        assert_eq!(strike.explorer_url, format!("https://basescan.org/tx/{TX_HASH}"));

        assert_eq!(provider.calls_to(methods::SEND_TRANSACTION), 1);
        let params = provider.last_params(methods::SEND_TRANSACTION).unwrap();
        let tx = &params[0];
        assert_eq!(tx["value"], "0x1374b68fa00");
        assert_eq!(tx["data"], "0x");
        assert_eq!(
            tx["to"].as_str().unwrap().parse::<Address>().unwrap(),
            CONTRACT.parse::<Address>().unwrap()
        );
        assert_eq!(
            tx["from"].as_str().unwrap().parse::<Address>().unwrap(),
            ACCOUNT.parse::<Address>().unwrap()
        );

        assert_eq!(session.strikes(), vec![strike]);
        assert_eq!(session.chain_id(), Some(ChainId::BASE));
        assert!(!session.is_strike_in_flight());
        assert!(session.last_status().unwrap().starts_with("Strike sent on base"));
    }

    #[tokio::test]
    async fn test_strike_when_already_on_chain() {
        let provider = Arc::new(MockProvider::new("0x2105"));
        let session = connected(&provider).await;

        let strike = session.send_strike("base").await.unwrap();
        assert_eq!(strike.chain, "base");
        assert_eq!(provider.calls_to(methods::ADD_CHAIN), 0);
        assert_eq!(provider.calls_to(methods::SEND_TRANSACTION), 1);
        let params = provider.last_params(methods::SEND_TRANSACTION).unwrap();
        assert_eq!(params[0]["value"], "0x1374b68fa00");
        assert_eq!(session.chain_id(), Some(ChainId::BASE));
        assert_eq!(session.strikes().len(), 1);
    }

    #[tokio::test]
    async fn test_strike_amount_per_chain() {
        let provider = Arc::new(MockProvider::new("0x1"));
        let session = connected(&provider).await;
        session.send_strike("optimism").await.unwrap();
        let params = provider.last_params(methods::SEND_TRANSACTION).unwrap();
        assert_eq!(params[0]["value"], "0x79997501a800");
    }

    #[tokio::test]
    async fn test_strike_requires_connection() {
        let provider = Arc::new(MockProvider::new("0x2105"));
        let session = session_with(provider.clone());

        assert!(matches!(
            session.send_strike("base").await,
            Err(Error::NotConnected)
        ));
        assert!(provider.calls().is_empty());
        assert_eq!(
            session.last_status().as_deref(),
            Some("Connect your wallet first.")
        );
    }

    #[tokio::test]
    async fn test_unknown_chain_checked_first() {
        let provider = Arc::new(MockProvider::new("0x2105"));
        let session = session_with(provider.clone());
        assert!(matches!(
            session.send_strike("zora").await,
            Err(Error::UnknownChain(key)) if key == "zora"
        ));
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn test_strike_without_provider() {
        let session = WalletSession::builder(registry()).build();
        assert!(matches!(
            session.send_strike("base").await,
            Err(Error::NoProviderAvailable)
        ));
    }

    #[tokio::test]
    async fn test_chain_mismatch_blocks_send() {
        let provider = Arc::new(MockProvider::new("0x2105"));
        let session = connected(&provider).await;
        // Verification sees Base, the final read sees mainnet.
        provider.script_chain_ids(["0x2105", "0x1"]);

        let err = session.send_strike("base").await.unwrap_err();
        assert!(matches!(
            err,
            Error::ChainMismatch {
                expected: ChainId::BASE,
                actual: ChainId(1)
            }
        ));
        assert_eq!(provider.calls_to(methods::SEND_TRANSACTION), 0);
        assert!(session.strikes().is_empty());
    }

    #[tokio::test]
    async fn test_switch_timeout_blocks_send() {
        let provider = Arc::new(MockProvider::new("0x1").with_switch(SwitchBehavior::Ignore));
        let session = connected(&provider).await;

        assert!(matches!(
            session.send_strike("base").await,
            Err(Error::ChainSwitchTimeout { attempts: 10, .. })
        ));
        assert_eq!(provider.calls_to(methods::SEND_TRANSACTION), 0);
        assert!(!session.is_strike_in_flight());
    }

    #[tokio::test]
    async fn test_switch_rejection_is_transaction_failure() {
        let provider = Arc::new(
            MockProvider::new("0x1")
                .with_switch(SwitchBehavior::Fail(ProviderError::user_rejected())),
        );
        let session = connected(&provider).await;
        assert!(matches!(
            session.send_strike("base").await,
            Err(Error::TransactionFailed(_))
        ));
        assert_eq!(provider.calls_to(methods::SEND_TRANSACTION), 0);
    }

    #[tokio::test]
    async fn test_rejected_send_is_not_recorded() {
        let provider =
            Arc::new(MockProvider::new("0x2105").with_send(Err(ProviderError::user_rejected())));
        let session = connected(&provider).await;

        let err = session.send_strike("base").await.unwrap_err();
        assert!(matches!(err, Error::TransactionFailed(ref msg) if msg.contains("4001")));
        assert!(session.strikes().is_empty());
        assert!(session.last_status().unwrap().starts_with("Strike failed:"));
        assert!(!session.is_strike_in_flight());
    }

    #[tokio::test]
    async fn test_strike_refreshes_backend() {
        let backend = Arc::new(MockBackend::default());
        let provider = Arc::new(MockProvider::new("0x2105"));
        let session = WalletSession::builder(registry())
            .negotiation(fast())
            .backend(backend.clone())
            .provider(SelectedProvider::injected(provider))
            .build();
        session.connect().await.unwrap();
        session.send_strike("base").await.unwrap();

        for _ in 0..10 {
            if backend.leaderboard_calls.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(backend.leaderboard_calls.load(Ordering::SeqCst), 1);
    }

    /// Holds `eth_sendTransaction` until released.
    struct GatedProvider {
        inner: MockProvider,
        gate: Notify,
    }

    #[async_trait]
    impl Eip1193Provider for GatedProvider {
        fn name(&self) -> &str {
            "gated"
        }

        async fn request(&self, method: &str, params: Value) -> std::result::Result<Value, ProviderError> {
            if method == methods::SEND_TRANSACTION {
                self.gate.notified().await;
            }
            self.inner.request(method, params).await
        }
    }

    #[tokio::test]
    async fn test_concurrent_strike_rejected() {
        let provider = Arc::new(GatedProvider {
            inner: MockProvider::new("0x2105"),
            gate: Notify::new(),
        });
        let session = WalletSession::builder(registry())
            .negotiation(fast())
            .provider(SelectedProvider::injected(provider.clone()))
            .build();
        session.connect().await.unwrap();

        let (first, second) = tokio::join!(session.send_strike("base"), async {
            let second = session.send_strike("base").await;
            provider.gate.notify_one();
            second
        });

        assert!(first.is_ok());
        assert!(matches!(second, Err(Error::StrikeInFlight)));
        assert_eq!(provider.inner.calls_to(methods::SEND_TRANSACTION), 1);
        assert_eq!(session.strikes().len(), 1);
    }
}
