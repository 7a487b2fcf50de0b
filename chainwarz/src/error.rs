//! Unified error types for the wallet core.
//!
//! Every public session operation returns [`Result`]. The application shell
//! renders failures with [`Error::status_message`]; the session also stores
//! that message as its last status.

use crate::amount::AmountError;
use crate::backend::BackendError;
use crate::chain::ChainId;
use crate::config::ConfigError;
use crate::negotiation::NegotiationError;
use crate::provider::ProviderError;

/// Result type alias for wallet core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A decimal amount could not be converted.
    #[error("invalid amount: {0}")]
    InvalidAmount(#[from] AmountError),

    /// Neither a host nor an injected wallet is available.
    #[error("no wallet provider available")]
    NoProviderAvailable,

    /// An operation needs a connected account.
    #[error("wallet not connected")]
    NotConnected,

    /// The user declined account access or the wallet returned no accounts.
    #[error("wallet connection rejected")]
    ConnectionRejected,

    /// The wallet failed while connecting.
    #[error("wallet connection failed: {0}")]
    ConnectionFailed(String),

    /// The host refused to add the chain.
    #[error("chain {chain_id} is not supported by the host wallet: {reason}")]
    ChainNotSupportedByHost {
        /// The chain that was requested.
        chain_id: ChainId,
        /// The host's reason.
        reason: String,
    },

    /// The wallet did not report the target chain within the poll budget.
    #[error("wallet did not switch to chain {chain_id} after {attempts} checks")]
    ChainSwitchTimeout {
        /// The chain that was requested.
        chain_id: ChainId,
        /// Number of polls made.
        attempts: u32,
    },

    /// The wallet reports a different chain right before submission.
    #[error("wallet is on chain {actual}, expected {expected}")]
    ChainMismatch {
        /// The chain the strike targets.
        expected: ChainId,
        /// The chain the wallet reported.
        actual: ChainId,
    },

    /// The strike transaction was rejected or failed.
    #[error("transaction failed: {0}")]
    TransactionFailed(String),

    /// The chain key is not configured.
    #[error("unknown chain '{0}'")]
    UnknownChain(String),

    /// A strike is already being submitted.
    #[error("a strike is already in flight")]
    StrikeInFlight,

    /// Raw provider error outside of connection and strike flows.
    #[error("wallet error: {0}")]
    Provider(#[from] ProviderError),

    /// Backend service error.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

impl Error {
    /// Create a transaction failure carrying the underlying message.
    #[must_use]
    pub fn transaction_failed(msg: impl std::fmt::Display) -> Self {
        Self::TransactionFailed(msg.to_string())
    }

    /// Create a connection failure carrying the underlying message.
    #[must_use]
    pub fn connection_failed(msg: impl std::fmt::Display) -> Self {
        Self::ConnectionFailed(msg.to_string())
    }

    /// Whether the user can reasonably try the same action again.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionRejected
                | Self::ConnectionFailed(_)
                | Self::ChainSwitchTimeout { .. }
                | Self::ChainMismatch { .. }
                | Self::TransactionFailed(_)
                | Self::StrikeInFlight
                | Self::Provider(_)
                | Self::Backend(_)
        )
    }

    /// One-line message suitable for showing to the player.
    #[must_use]
    pub fn status_message(&self) -> String {
        match self {
            Self::NoProviderAvailable => {
                "No wallet found. Open the game in a wallet-enabled browser or Mini App host.".into()
            }
            Self::NotConnected => "Connect your wallet first.".into(),
            Self::ConnectionRejected => "Wallet connection was rejected.".into(),
            Self::ConnectionFailed(msg) => format!("Wallet connection failed: {msg}"),
            Self::ChainNotSupportedByHost { chain_id, .. } => {
                format!("This wallet cannot switch to chain {chain_id}.")
            }
            Self::ChainSwitchTimeout { chain_id, .. } => {
                format!("Wallet did not switch to chain {chain_id}. Try again.")
            }
            Self::ChainMismatch { expected, actual } => format!(
                "Wallet is on chain {actual} but the strike needs {expected}. Try again."
            ),
            Self::TransactionFailed(msg) => format!("Strike failed: {msg}"),
            Self::StrikeInFlight => "A strike is already being sent.".into(),
            other => other.to_string(),
        }
    }
}

impl From<NegotiationError> for Error {
    fn from(err: NegotiationError) -> Self {
        match err {
            NegotiationError::NotSupportedByHost { chain_id, source } => {
                Self::ChainNotSupportedByHost {
                    chain_id,
                    reason: source.message,
                }
            }
            NegotiationError::Timeout { chain_id, attempts } => {
                Self::ChainSwitchTimeout { chain_id, attempts }
            }
            NegotiationError::Provider(e) => Self::Provider(e),
        }
    }
}
