//! Bitcoin chain support for the wallet engine.
//!
//! Key parsing and P2PKH/P2WPKH addresses, an Esplora indexer client,
//! the linear fee model, in-order UTXO selection, and transaction
//! building and signing for both legacy and native SegWit inputs.

pub mod address;
pub mod error;
pub mod esplora;
pub mod fee;
pub mod keys;
pub mod network;
pub mod transaction;
pub mod utxo;

pub use error::BtcError;
pub use esplora::{EsploraClient, TxStatus, TxSummary, UtxoIndexer};
pub use fee::{FeeQuote, FeeRate, FeeSource};
pub use keys::BtcKey;
pub use network::BtcNetwork;
pub use utxo::{CoinSelection, Utxo};
