//! EIP-1193 provider errors.

use std::fmt;

use serde_json::Value;

/// Standard EIP-1193 and EIP-3085 error codes.
pub mod codes {
    /// The user rejected the request.
    pub const USER_REJECTED: i64 = 4001;
    /// The requested method or account has not been authorized.
    pub const UNAUTHORIZED: i64 = 4100;
    /// The provider does not support the requested method.
    pub const UNSUPPORTED_METHOD: i64 = 4200;
    /// The provider is disconnected from all chains.
    pub const DISCONNECTED: i64 = 4900;
    /// The provider is not connected to the requested chain.
    pub const CHAIN_DISCONNECTED: i64 = 4901;
    /// The chain has not been added to the wallet.
    pub const UNRECOGNIZED_CHAIN: i64 = 4902;
}

/// An error returned by a wallet provider's `request`.
///
/// Mirrors the EIP-1193 `ProviderRpcError` shape: a numeric code when the
/// provider supplied one, a message, and optional structured data.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct ProviderError {
    /// The error code, when the provider supplied one.
    pub code: Option<i64>,
    /// Provider message.
    pub message: String,
    /// Optional structured data attached by the provider.
    pub data: Option<Value>,
}

impl ProviderError {
    /// Create an error with a code.
    #[must_use]
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
            data: None,
        }
    }

    /// Create a transport-level error without a code.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            data: None,
        }
    }

    /// Create an error for a response that does not have the expected shape.
    #[must_use]
    pub fn invalid_response(method: &str, detail: impl fmt::Display) -> Self {
        Self::transport(format!("unexpected {method} response: {detail}"))
    }

    /// Create a user-rejected error.
    #[must_use]
    pub fn user_rejected() -> Self {
        Self::new(codes::USER_REJECTED, "User rejected the request.")
    }

    /// Create an unrecognized-chain error.
    #[must_use]
    pub fn unrecognized_chain(chain_id: impl fmt::Display) -> Self {
        Self::new(
            codes::UNRECOGNIZED_CHAIN,
            format!("Unrecognized chain ID \"{chain_id}\"."),
        )
    }

    /// Attach structured data.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Whether the user declined the request.
    #[must_use]
    pub fn is_user_rejection(&self) -> bool {
        self.has_code(codes::USER_REJECTED)
    }

    /// Whether the wallet does not know the chain yet.
    ///
    /// Some mobile wallets wrap the code in `data.originalError.code`.
    #[must_use]
    pub fn is_unrecognized_chain(&self) -> bool {
        self.has_code(codes::UNRECOGNIZED_CHAIN)
    }

    /// Whether the provider does not implement the method.
    #[must_use]
    pub fn is_unsupported_method(&self) -> bool {
        self.has_code(codes::UNSUPPORTED_METHOD)
    }

    fn has_code(&self, code: i64) -> bool {
        self.code == Some(code)
            || self
                .data
                .as_ref()
                .and_then(|d| d.pointer("/originalError/code"))
                .and_then(Value::as_i64)
                == Some(code)
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(code) = self.code {
            write!(f, " (code: {code})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ProviderError {}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::transport("wallet request timed out")
        } else if err.is_connect() {
            Self::transport(format!("wallet connection failed: {err}"))
        } else {
            Self::transport(err.to_string())
        }
    }
}
