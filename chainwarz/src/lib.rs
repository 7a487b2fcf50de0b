//! ChainWarz wallet core.
//!
//! Everything the game needs between "the player taps Strike" and "a
//! transaction hash is on screen": picking a wallet provider, connecting,
//! moving the wallet onto the right chain and submitting the strike.
//!
//! # Architecture
//!
//! - **Amounts** ([`amount`]) - exact decimal to wei conversion and hex quantities
//! - **Chains** ([`chain`]) - chain ids, descriptors and the registry
//! - **Providers** ([`provider`]) - the EIP-1193 trait, provider selection, HTTP provider
//! - **Negotiation** ([`negotiation`]) - switch, add on 4902, verify by polling
//! - **Session** ([`session`]) - connection state, events and strike submission
//! - **Backend** ([`backend`]) - profiles and leaderboards
//! - **Config** ([`config`]) - JSON configuration
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use chainwarz::prelude::*;
//!
//! let registry = AppConfig::load("chainwarz.json")?.registry()?;
//! let selected = select_provider(false, None, Some(injected)).await?;
//! let session = WalletSession::builder(registry).provider(selected).build();
//! session.connect().await?;
//! let strike = session.send_strike("base").await?;
//! println!("{}", strike.explorer_url);
//! ```

pub mod amount;
pub mod backend;
pub mod chain;
pub mod config;
pub mod error;
pub mod negotiation;
pub mod provider;
pub mod session;

pub use error::{Error, Result};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{Error, Result};

    // Amounts and chains
    pub use crate::amount::{ETHER_DECIMALS, format_units, parse_units, to_hex_quantity, to_wei};
    pub use crate::chain::{ChainDescriptor, ChainId, ChainRegistry, NativeCurrency};

    // Providers
    pub use crate::provider::{
        BoxedProvider, ConnectionSource, Eip1193Provider, HostEnvironment, HttpProvider,
        ProviderError, ProviderEvent, ProviderExt, SelectedProvider, select_provider,
    };

    // Session
    pub use crate::negotiation::{ChainNegotiator, NegotiationConfig, NegotiationOutcome};
    pub use crate::session::{SessionSnapshot, StrikeResult, WalletSession};

    // Backend and config
    pub use crate::backend::{BackendService, HttpBackend, LeaderboardEntry, PlayerProfile};
    pub use crate::config::{AppConfig, ChainConfig};
}
