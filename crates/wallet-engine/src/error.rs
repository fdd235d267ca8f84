use chain_btc::BtcError;
use chain_eth::{EthError, U256};
use crypto_utils::CryptoError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable, caller-facing error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidAddress,
    InvalidKeyFormat,
    KeyAddressMismatch,
    InvalidAmount,
    InsufficientBalance,
    NetworkUnavailable,
    SigningFailed,
    BroadcastRejected,
    UnsupportedChain,
    Config,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidAddress => "INVALID_ADDRESS",
            ErrorCode::InvalidKeyFormat => "INVALID_KEY_FORMAT",
            ErrorCode::KeyAddressMismatch => "KEY_ADDRESS_MISMATCH",
            ErrorCode::InvalidAmount => "INVALID_AMOUNT",
            ErrorCode::InsufficientBalance => "INSUFFICIENT_BALANCE",
            ErrorCode::NetworkUnavailable => "NETWORK_UNAVAILABLE",
            ErrorCode::SigningFailed => "SIGNING_FAILED",
            ErrorCode::BroadcastRejected => "BROADCAST_REJECTED",
            ErrorCode::UnsupportedChain => "UNSUPPORTED_CHAIN",
            ErrorCode::Config => "CONFIG",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Engine-level errors. Messages never include key material.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid key format: {0}")]
    InvalidKeyFormat(String),

    #[error("private key does not control address {address}")]
    KeyAddressMismatch { address: String },

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Amounts are in the asset's base units (satoshi, wei, token units).
    #[error("insufficient {asset} balance: available {available}, required {required}")]
    InsufficientBalance {
        asset: String,
        available: U256,
        required: U256,
    },

    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error("broadcast rejected: {0}")]
    BroadcastRejected(String),

    #[error("unsupported chain: {0}")]
    UnsupportedChain(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl EngineError {
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::InvalidAddress(_) => ErrorCode::InvalidAddress,
            EngineError::InvalidKeyFormat(_) => ErrorCode::InvalidKeyFormat,
            EngineError::KeyAddressMismatch { .. } => ErrorCode::KeyAddressMismatch,
            EngineError::InvalidAmount(_) => ErrorCode::InvalidAmount,
            EngineError::InsufficientBalance { .. } => ErrorCode::InsufficientBalance,
            EngineError::NetworkUnavailable(_) => ErrorCode::NetworkUnavailable,
            EngineError::SigningFailed(_) => ErrorCode::SigningFailed,
            EngineError::BroadcastRejected(_) => ErrorCode::BroadcastRejected,
            EngineError::UnsupportedChain(_) => ErrorCode::UnsupportedChain,
            EngineError::Config(_) => ErrorCode::Config,
        }
    }
}

impl From<BtcError> for EngineError {
    fn from(err: BtcError) -> Self {
        match err {
            BtcError::InvalidPrivateKey(msg) => EngineError::InvalidKeyFormat(msg),
            BtcError::InvalidAddress(msg) => EngineError::InvalidAddress(msg),
            BtcError::InvalidAmount(msg) => EngineError::InvalidAmount(msg),
            BtcError::InsufficientFunds {
                available,
                required,
            } => EngineError::InsufficientBalance {
                asset: "BTC".into(),
                available: U256::from(available),
                required: U256::from(required),
            },
            BtcError::TransactionBuildError(msg) | BtcError::SigningError(msg) => {
                EngineError::SigningFailed(msg)
            }
            BtcError::Network(msg) => EngineError::NetworkUnavailable(msg),
            BtcError::BroadcastRejected(msg) => EngineError::BroadcastRejected(msg),
        }
    }
}

impl From<EthError> for EngineError {
    fn from(err: EthError) -> Self {
        match err {
            EthError::InvalidPrivateKey(msg) => EngineError::InvalidKeyFormat(msg),
            EthError::InvalidAddress(msg) => EngineError::InvalidAddress(msg),
            EthError::TransactionBuildError(msg) | EthError::SigningError(msg) => {
                EngineError::SigningFailed(msg)
            }
            EthError::InsufficientFunds {
                asset,
                available,
                required,
            } => EngineError::InsufficientBalance {
                asset,
                available,
                required,
            },
            EthError::BroadcastRejected(msg) => EngineError::BroadcastRejected(msg),
            // Malformed node responses and transport failures both mean the
            // provider cannot be trusted for this operation.
            e @ (EthError::EncodingError(_)
            | EthError::Transport(_)
            | EthError::Rpc { .. }
            | EthError::NoLiveProvider { .. }) => EngineError::NetworkUnavailable(e.to_string()),
        }
    }
}

impl From<CryptoError> for EngineError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::DecryptionFailed(msg) | CryptoError::MalformedCiphertext(msg) => {
                EngineError::InvalidKeyFormat(format!("sealed key cannot be opened: {msg}"))
            }
            CryptoError::EncryptionFailed(msg) | CryptoError::KdfFailed(msg) => {
                EngineError::Config(format!("key cipher: {msg}"))
            }
        }
    }
}
