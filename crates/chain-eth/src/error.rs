use alloy_primitives::U256;
use thiserror::Error;

/// Ethereum chain operation errors.
#[derive(Debug, Error)]
pub enum EthError {
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("transaction build error: {0}")]
    TransactionBuildError(String),

    #[error("signing error: {0}")]
    SigningError(String),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("insufficient {asset}: available {available}, required {required}")]
    InsufficientFunds {
        asset: String,
        available: U256,
        required: U256,
    },

    #[error("rpc transport error: {0}")]
    Transport(String),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("no live rpc endpoint (tried {tried})")]
    NoLiveProvider { tried: usize },

    #[error("broadcast rejected: {0}")]
    BroadcastRejected(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_invalid_private_key() {
        let err = EthError::InvalidPrivateKey("key too short".into());
        assert_eq!(err.to_string(), "invalid private key: key too short");
    }

    #[test]
    fn display_invalid_address() {
        let err = EthError::InvalidAddress("bad checksum".into());
        assert_eq!(err.to_string(), "invalid address: bad checksum");
    }

    #[test]
    fn display_transaction_build_error() {
        let err = EthError::TransactionBuildError("missing nonce".into());
        assert_eq!(err.to_string(), "transaction build error: missing nonce");
    }

    #[test]
    fn display_signing_error() {
        let err = EthError::SigningError("invalid signature".into());
        assert_eq!(err.to_string(), "signing error: invalid signature");
    }

    #[test]
    fn display_encoding_error() {
        let err = EthError::EncodingError("rlp overflow".into());
        assert_eq!(err.to_string(), "encoding error: rlp overflow");
    }

    #[test]
    fn display_insufficient_funds() {
        let err = EthError::InsufficientFunds {
            asset: "USDT".into(),
            available: U256::from(100_000_000u64),
            required: U256::from(150_000_000u64),
        };
        assert_eq!(
            err.to_string(),
            "insufficient USDT: available 100000000, required 150000000"
        );
    }

    #[test]
    fn display_rpc() {
        let err = EthError::Rpc {
            code: -32000,
            message: "nonce too low".into(),
        };
        assert_eq!(err.to_string(), "rpc error -32000: nonce too low");
    }

    #[test]
    fn display_no_live_provider() {
        let err = EthError::NoLiveProvider { tried: 3 };
        assert_eq!(err.to_string(), "no live rpc endpoint (tried 3)");
    }

    #[test]
    fn error_trait_is_implemented() {
        let err: Box<dyn std::error::Error> =
            Box::new(EthError::InvalidPrivateKey("test".into()));
        assert!(err.to_string().contains("test"));
    }
}
