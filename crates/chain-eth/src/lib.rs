//! Ethereum and ERC-20 support for the wallet engine.
//!
//! This crate provides:
//! - Address derivation from secp256k1 keys (with EIP-55 checksums)
//! - A JSON-RPC transport and an ordered provider pool with liveness probing
//! - Gas pricing with a static fallback
//! - Legacy (EIP-155) and EIP-1559 transaction building and signing
//! - ERC-20 `transfer`, `balanceOf` and `decimals` encoding

pub mod abi;
pub mod address;
pub mod erc20;
pub mod error;
pub mod fee;
pub mod networks;
pub mod provider;
pub mod rpc;
pub mod transaction;

pub use alloy_primitives::U256;
pub use error::EthError;
pub use fee::{FeeSource, GasPricing, GasQuote};
pub use networks::EthNetwork;
pub use provider::{LiveProvider, ProviderPool, Receipt};
pub use rpc::{HttpTransport, JsonRpcTransport};
pub use transaction::{EthTransaction, SignedEthTransaction};
