//! Exact conversion between decimal token amounts and smallest-unit integers.
//!
//! Amounts are never routed through floating point. A value such as
//! `0.000001337` ETH is `1337000000000` wei, and any `f64` detour loses digits
//! at that magnitude. Parsing works on the decimal digits directly and
//! accumulates into a [`U256`].
//!
//! Fractional digits beyond the token's `decimals` are **truncated**, not
//! rounded.

use alloy::primitives::U256;

/// Decimals used by every native currency the game currently targets.
pub const ETHER_DECIMALS: u8 = 18;

/// Largest `decimals` for which `10^decimals` fits in a [`U256`].
const MAX_DECIMALS: u8 = 77;

/// Errors produced while parsing or formatting amounts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum AmountError {
    /// The input was empty or consisted only of a decimal point.
    #[error("amount is empty")]
    Empty,

    /// More than one `.` was present.
    #[error("amount '{0}' contains more than one decimal point")]
    MultipleDecimalPoints(String),

    /// A character other than an ASCII digit or `.` was present.
    #[error("amount '{input}' contains invalid character '{found}'")]
    InvalidCharacter {
        /// The rejected input.
        input: String,
        /// The first offending character.
        found: char,
    },

    /// The value does not fit in 256 bits.
    #[error("amount '{0}' overflows 256 bits")]
    Overflow(String),

    /// The decimals count is too large to scale by.
    #[error("decimals {0} exceeds the supported maximum of 77")]
    DecimalsTooLarge(u8),

    /// A hex quantity could not be parsed.
    #[error("invalid hex quantity '{0}'")]
    InvalidHex(String),
}

/// Parse a decimal string into an integer number of smallest units.
///
/// `"0.000001337"` with 18 decimals yields `1337000000000`. A missing integer
/// part (`".5"`) is read as zero and a trailing point (`"1."`) as an empty
/// fraction.
///
/// # Errors
///
/// Returns [`AmountError`] for empty input, more than one `.`, any non-digit
/// character (signs and whitespace included) or a result wider than 256 bits.
pub fn parse_units(amount: &str, decimals: u8) -> Result<U256, AmountError> {
    if decimals > MAX_DECIMALS {
        return Err(AmountError::DecimalsTooLarge(decimals));
    }

    if let Some(found) = amount.chars().find(|c| !c.is_ascii_digit() && *c != '.') {
        return Err(AmountError::InvalidCharacter {
            input: amount.to_owned(),
            found,
        });
    }

    let mut parts = amount.split('.');
    let integer = parts.next().unwrap_or_default();
    let fraction = parts.next().unwrap_or_default();
    if parts.next().is_some() {
        return Err(AmountError::MultipleDecimalPoints(amount.to_owned()));
    }
    if integer.is_empty() && fraction.is_empty() {
        return Err(AmountError::Empty);
    }

    let width = usize::from(decimals);
    let fraction = &fraction[..fraction.len().min(width)];

    let overflow = || AmountError::Overflow(amount.to_owned());
    let mut value = U256::ZERO;
    let digits = integer
        .bytes()
        .chain(fraction.bytes())
        .chain(std::iter::repeat_n(b'0', width - fraction.len()));
    for digit in digits {
        value = value
            .checked_mul(U256::from(10u8))
            .and_then(|v| v.checked_add(U256::from(digit - b'0')))
            .ok_or_else(overflow)?;
    }
    Ok(value)
}

/// Parse an ether-denominated decimal string into wei.
///
/// # Errors
///
/// See [`parse_units`].
pub fn to_wei(amount: &str) -> Result<U256, AmountError> {
    parse_units(amount, ETHER_DECIMALS)
}

/// Serialize an integer as an Ethereum JSON-RPC quantity.
///
/// Lowercase, `0x`-prefixed, no leading zeros; zero is `0x0`.
#[must_use]
pub fn to_hex_quantity(value: U256) -> String {
    if value.is_zero() {
        return "0x0".to_owned();
    }
    format!("0x{value:x}")
}

/// Parse a JSON-RPC quantity such as `0x1374b68fa00`.
///
/// # Errors
///
/// Returns [`AmountError::InvalidHex`] when the prefix is missing, no digits
/// follow it, or a digit is not hexadecimal.
pub fn parse_hex_quantity(quantity: &str) -> Result<U256, AmountError> {
    let invalid = || AmountError::InvalidHex(quantity.to_owned());
    let digits = quantity
        .strip_prefix("0x")
        .or_else(|| quantity.strip_prefix("0X"))
        .ok_or_else(invalid)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    U256::from_str_radix(digits, 16).map_err(|_| invalid())
}

/// Render a smallest-unit integer as a decimal string with trailing zeros
/// trimmed, e.g. `1337000000000` wei with 18 decimals is `"0.000001337"`.
#[must_use]
pub fn format_units(value: U256, decimals: u8) -> String {
    let decimals = decimals.min(MAX_DECIMALS);
    let base = U256::from(10u8).pow(U256::from(decimals));
    let integer = value / base;
    let fraction = value % base;
    if fraction.is_zero() {
        return integer.to_string();
    }
    let fraction = format!("{:0>width$}", fraction.to_string(), width = usize::from(decimals));
    format!("{integer}.{}", fraction.trim_end_matches('0'))
}
