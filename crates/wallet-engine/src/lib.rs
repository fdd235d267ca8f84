//! # wallet-engine
//!
//! Custodial wallet engine for Bitcoin, Ether and USDT (ERC-20) on mainnet
//! and testnet.
//!
//! The engine generates and restores keys, reads balances and history,
//! and runs every transfer through the same pipeline: validate, build,
//! sign, broadcast. Chain specifics live behind [`ChainAdapter`]; the
//! engine owns ordering, per-address serialization and error reporting.
//!
//! ```no_run
//! # async fn demo() -> Result<(), wallet_engine::EngineError> {
//! use wallet_engine::{ChainKind, EngineConfig, Network, WalletEngine};
//!
//! let config = EngineConfig::load("wallet.toml")?;
//! wallet_engine::logging::init_logging(&config.logging)?;
//! let engine = WalletEngine::from_config(&config)?;
//!
//! let info = engine
//!     .get_wallet_info(ChainKind::Bitcoin, "tb1q...", Network::Testnet)
//!     .await?;
//! println!("{}", info.balance.human_total);
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod amount;
pub mod balance;
pub mod config;
pub mod engine;
pub mod error;
pub mod hd_derivation;
pub mod keys;
pub mod locks;
pub mod logging;
pub mod mnemonic;
pub mod state;
pub mod types;

pub use adapter::{
    BitcoinAdapter, BitcoinSettings, ChainAdapter, EthereumAdapter, PreparedTransfer, TokenAdapter,
    TransferIntent,
};
pub use chain_eth::U256;
pub use config::{EngineConfig, TokenConfig};
pub use crypto_utils::{KeyCipher, PassphraseCipher};
pub use engine::{WalletEngine, WalletEngineBuilder};
pub use error::{EngineError, ErrorCode};
pub use state::SendStage;
pub use types::{
    AssetBalance, BalanceStatus, Balances, ChainFamily, ChainKind, Confirmation,
    ConfirmationStatus, FeeHint, FeeInfo, FeeSource, GeneratedWallet, KeyMaterial, Network,
    SealedKey, SendRequest, SignedTransaction, TokenBalance, TxRecord, TxResult, WalletInfo,
    WalletPublicInfo,
};
