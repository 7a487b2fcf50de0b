//! Chain descriptors and the registry of chains a strike can target.

use std::fmt;
use std::str::FromStr;

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::amount::{self, AmountError};

/// An EVM chain id.
///
/// Wallets speak chain ids as hex strings (`"0x2105"`); comparing the parsed
/// number avoids false mismatches on case or leading zeros.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChainId(pub u64);

/// Error returned when a chain id string is not a valid hex quantity.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid chain id '{0}'")]
pub struct InvalidChainId(pub String);

impl ChainId {
    /// Base mainnet.
    pub const BASE: Self = Self(8453);
    /// OP Mainnet.
    pub const OPTIMISM: Self = Self(10);

    /// Parse a `0x`-prefixed hex chain id.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidChainId`] when the prefix is missing or the digits are
    /// not hex or overflow `u64`.
    pub fn from_hex(s: &str) -> Result<Self, InvalidChainId> {
        s.strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_hexdigit()))
            .and_then(|digits| u64::from_str_radix(digits, 16).ok())
            .map(Self)
            .ok_or_else(|| InvalidChainId(s.to_owned()))
    }

    /// Hex form used on the wire, e.g. `0x2105`.
    #[must_use]
    pub fn to_hex(self) -> String {
        format!("{:#x}", self.0)
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl FromStr for ChainId {
    type Err = InvalidChainId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for ChainId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ChainId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Native currency metadata, in the shape `wallet_addEthereumChain` expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    /// Currency name, e.g. "Ether".
    pub name: String,
    /// Ticker symbol, e.g. "ETH".
    pub symbol: String,
    /// Number of decimals of the smallest unit.
    pub decimals: u8,
}

impl NativeCurrency {
    /// Ether with 18 decimals.
    #[must_use]
    pub fn ether() -> Self {
        Self {
            name: "Ether".into(),
            symbol: "ETH".into(),
            decimals: amount::ETHER_DECIMALS,
        }
    }
}

/// Immutable description of a chain a strike can be sent to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainDescriptor {
    key: String,
    chain_id: ChainId,
    name: String,
    rpc_url: String,
    explorer_url: String,
    contract: Address,
    strike_amount: U256,
    native_currency: NativeCurrency,
}

impl ChainDescriptor {
    /// Create a descriptor, converting the decimal `strike_amount` to an exact
    /// smallest-unit integer using the currency's decimals.
    ///
    /// # Errors
    ///
    /// Returns [`AmountError`] when `strike_amount` is not a valid decimal.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        key: impl Into<String>,
        chain_id: ChainId,
        name: impl Into<String>,
        rpc_url: impl Into<String>,
        explorer_url: impl Into<String>,
        contract: Address,
        strike_amount: &str,
        native_currency: NativeCurrency,
    ) -> Result<Self, AmountError> {
        let strike_amount = amount::parse_units(strike_amount, native_currency.decimals)?;
        Ok(Self {
            key: key.into(),
            chain_id,
            name: name.into(),
            rpc_url: rpc_url.into(),
            explorer_url: explorer_url.into(),
            contract,
            strike_amount,
            native_currency,
        })
    }

    /// Registry key, e.g. `"base"`.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The chain id.
    #[must_use]
    pub const fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    /// Human-readable name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Public RPC endpoint advertised when adding the chain to a wallet.
    #[must_use]
    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// Block explorer base URL.
    #[must_use]
    pub fn explorer_url(&self) -> &str {
        &self.explorer_url
    }

    /// The strike contract.
    #[must_use]
    pub const fn contract(&self) -> Address {
        self.contract
    }

    /// Strike value in the smallest unit.
    #[must_use]
    pub const fn strike_amount(&self) -> U256 {
        self.strike_amount
    }

    /// Native currency metadata.
    #[must_use]
    pub const fn native_currency(&self) -> &NativeCurrency {
        &self.native_currency
    }

    /// Explorer link for a transaction hash.
    #[must_use]
    pub fn tx_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{tx_hash}", self.explorer_url.trim_end_matches('/'))
    }
}

/// Ordered set of chain descriptors addressed by key.
#[derive(Debug, Clone, Default)]
pub struct ChainRegistry {
    chains: Vec<ChainDescriptor>,
}

impl ChainRegistry {
    /// Create a registry from descriptors. Later duplicates of a key are
    /// ignored.
    #[must_use]
    pub fn new(chains: impl IntoIterator<Item = ChainDescriptor>) -> Self {
        let mut registry = Self::default();
        for chain in chains {
            if registry.get(chain.key()).is_none() {
                registry.chains.push(chain);
            }
        }
        registry
    }

    /// Look up a chain by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ChainDescriptor> {
        self.chains.iter().find(|c| c.key == key)
    }

    /// Look up a chain by id.
    #[must_use]
    pub fn by_chain_id(&self, chain_id: ChainId) -> Option<&ChainDescriptor> {
        self.chains.iter().find(|c| c.chain_id == chain_id)
    }

    /// Iterate over chains in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &ChainDescriptor> {
        self.chains.iter()
    }

    /// Number of chains.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chains.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> ChainDescriptor {
        ChainDescriptor::new(
            "base",
            ChainId::BASE,
            "Base",
            "https://mainnet.base.org",
            "https://basescan.org/",
            Address::repeat_byte(0xb2),
            "0.000001337",
            NativeCurrency::ether(),
        )
        .unwrap()
    }

    #[test]
    fn test_chain_id_hex() {
        assert_eq!(ChainId::from_hex("0x2105").unwrap(), ChainId::BASE);
        assert_eq!(ChainId::from_hex("0X02105").unwrap(), ChainId::BASE);
        assert_eq!(ChainId::BASE.to_hex(), "0x2105");
        assert_eq!(ChainId::OPTIMISM.to_string(), "0xa");
        assert!(ChainId::from_hex("8453").is_err());
        assert!(ChainId::from_hex("0x").is_err());
        assert!(ChainId::from_hex("0xnope").is_err());
        // from_str_radix alone would accept a leading sign
        assert!(ChainId::from_hex("0x+a").is_err());
        assert!(ChainId::from_hex("0x-1").is_err());
        assert!(ChainId::from_hex("0x 1").is_err());
    }

    #[test]
    fn test_chain_id_serde() {
        let json = serde_json::to_string(&ChainId::BASE).unwrap();
        assert_eq!(json, "\"0x2105\"");
        let back: ChainId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ChainId::BASE);
    }

    #[test]
    fn test_descriptor_converts_amount_once() {
        let chain = base();
        assert_eq!(chain.strike_amount(), U256::from(1_337_000_000_000_u64));
        assert_eq!(
            chain.tx_url("0xabc"),
            "https://basescan.org/tx/0xabc"
        );
    }

    #[test]
    fn test_descriptor_rejects_bad_amount() {
        let err = ChainDescriptor::new(
            "base",
            ChainId::BASE,
            "Base",
            "",
            "",
            Address::ZERO,
            "0.1.2",
            NativeCurrency::ether(),
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_registry_lookup() {
        let registry = ChainRegistry::new([base(), base()]);
        assert_eq!(registry.len(), 1);
        assert!(registry.get("base").is_some());
        assert!(registry.get("optimism").is_none());
        assert_eq!(registry.by_chain_id(ChainId::BASE).unwrap().key(), "base");
    }
}
