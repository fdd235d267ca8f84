use std::str::FromStr;

use chain_btc::BtcNetwork;
use chain_eth::{EthNetwork, U256};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::amount::serde_u256;
use crate::error::{EngineError, ErrorCode};
use crate::state::SendStage;

/// Assets the engine can move. Strings are parsed into this only at the edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainKind {
    Bitcoin,
    Ethereum,
    Usdt,
}

/// Key and nonce space shared by a set of [`ChainKind`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainFamily {
    Bitcoin,
    Ethereum,
}

impl ChainKind {
    pub const ALL: [ChainKind; 3] = [ChainKind::Bitcoin, ChainKind::Ethereum, ChainKind::Usdt];

    pub fn family(self) -> ChainFamily {
        match self {
            ChainKind::Bitcoin => ChainFamily::Bitcoin,
            ChainKind::Ethereum | ChainKind::Usdt => ChainFamily::Ethereum,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            ChainKind::Bitcoin => "BTC",
            ChainKind::Ethereum => "ETH",
            ChainKind::Usdt => "USDT",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChainKind::Bitcoin => "bitcoin",
            ChainKind::Ethereum => "ethereum",
            ChainKind::Usdt => "usdt",
        }
    }
}

impl std::fmt::Display for ChainKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChainKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "btc" | "bitcoin" => Ok(ChainKind::Bitcoin),
            "eth" | "ethereum" => Ok(ChainKind::Ethereum),
            "usdt" | "erc20-usdt" => Ok(ChainKind::Usdt),
            other => Err(EngineError::UnsupportedChain(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    pub const ALL: [Network; 2] = [Network::Mainnet, Network::Testnet];

    pub fn btc(self) -> BtcNetwork {
        match self {
            Network::Mainnet => BtcNetwork::Mainnet,
            Network::Testnet => BtcNetwork::Testnet,
        }
    }

    pub fn eth(self) -> EthNetwork {
        match self {
            Network::Mainnet => EthNetwork::Mainnet,
            Network::Testnet => EthNetwork::Testnet,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" | "main" => Ok(Network::Mainnet),
            "testnet" | "test" | "sepolia" => Ok(Network::Testnet),
            other => Err(EngineError::UnsupportedChain(format!("unknown network {other}"))),
        }
    }
}

/// A keypair bound to one chain and network.
///
/// `address` is always derivable from `private_key` and `network`. The
/// secret fields are redacted in `Debug` and zeroized on drop.
#[derive(Debug)]
pub struct KeyMaterial {
    pub chain: ChainKind,
    pub network: Network,
    pub mnemonic: Option<SecretString>,
    /// BIP-44 path, when the key came from a mnemonic.
    pub derivation_path: Option<String>,
    /// WIF on Bitcoin, 0x-prefixed hex on Ethereum.
    pub private_key: SecretString,
    pub public_key: String,
    pub address: String,
}

/// Public view of a freshly generated wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletPublicInfo {
    pub chain: ChainKind,
    pub network: Network,
    pub address: String,
    pub public_key: String,
    pub derivation_path: String,
}

/// Result of [`generate_wallet`](crate::WalletEngine::generate_wallet).
///
/// The secret half can be taken out exactly once.
#[derive(Debug)]
pub struct GeneratedWallet {
    pub public: WalletPublicInfo,
    secret: KeyMaterial,
}

impl GeneratedWallet {
    pub(crate) fn new(secret: KeyMaterial) -> Self {
        let public = WalletPublicInfo {
            chain: secret.chain,
            network: secret.network,
            address: secret.address.clone(),
            public_key: secret.public_key.clone(),
            derivation_path: secret.derivation_path.clone().unwrap_or_default(),
        };
        Self { public, secret }
    }

    /// Hand the key material to the caller, consuming the wallet.
    pub fn into_key_material(self) -> KeyMaterial {
        self.secret
    }
}

/// A private key sealed by a [`KeyCipher`](crypto_utils::KeyCipher).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedKey {
    pub chain: ChainKind,
    pub network: Network,
    pub address: String,
    pub ciphertext: String,
}

/// Caller override for the fee market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeHint {
    SatPerVbyte(u64),
    GasPriceGwei(u64),
}

/// A request to move value out of a custodial address.
#[derive(Debug)]
pub struct SendRequest {
    pub chain: ChainKind,
    pub network: Network,
    pub sender_private_key: SecretString,
    /// Claimed sender. When absent the address derived from the key is used.
    pub sender_address: Option<String>,
    pub to_address: String,
    /// Decimal amount in whole units of the asset (e.g. "0.0006" BTC).
    pub amount: String,
    pub fee_hint: Option<FeeHint>,
}

/// Where a fee quote came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeSource {
    Live,
    Fallback,
    Caller,
}

impl From<chain_btc::FeeSource> for FeeSource {
    fn from(source: chain_btc::FeeSource) -> Self {
        match source {
            chain_btc::FeeSource::Live => FeeSource::Live,
            chain_btc::FeeSource::Fallback => FeeSource::Fallback,
            chain_btc::FeeSource::Caller => FeeSource::Caller,
        }
    }
}

impl From<chain_eth::FeeSource> for FeeSource {
    fn from(source: chain_eth::FeeSource) -> Self {
        match source {
            chain_eth::FeeSource::Live => FeeSource::Live,
            chain_eth::FeeSource::Fallback => FeeSource::Fallback,
            chain_eth::FeeSource::Caller => FeeSource::Caller,
        }
    }
}

/// A fee in the base unit of the chain's native asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeeInfo {
    #[serde(with = "serde_u256")]
    pub amount: U256,
    /// `"sat"` or `"wei"`.
    pub unit: &'static str,
    pub source: FeeSource,
}

/// A signed, not yet broadcast transaction.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub chain: ChainKind,
    pub network: Network,
    /// Raw bytes as hex; `0x`-prefixed on Ethereum.
    pub raw_hex: String,
    pub txid: String,
    pub fee: FeeInfo,
}

/// Terminal outcome of a send. The caller persists it.
#[derive(Debug, Clone, Serialize)]
pub struct TxResult {
    pub success: bool,
    pub chain: ChainKind,
    pub network: Network,
    pub txid: Option<String>,
    pub error: Option<ErrorCode>,
    pub details: String,
    /// Stage the send ended in.
    pub stage: SendStage,
    /// Last stage reached before a failure.
    pub failed_at: Option<SendStage>,
    pub fee: Option<FeeInfo>,
}

/// Balance of the asset a wallet is queried for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetBalance {
    pub symbol: String,
    pub decimals: u8,
    #[serde(with = "serde_u256")]
    pub confirmed: U256,
    #[serde(with = "serde_u256")]
    pub unconfirmed: U256,
    /// `confirmed + unconfirmed`, formatted with `decimals`.
    pub human_total: String,
}

/// Outcome of one token lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum BalanceStatus {
    Ok,
    Error { code: ErrorCode, details: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenBalance {
    pub token: String,
    pub contract: String,
    /// Integer base units; the source of truth.
    #[serde(with = "serde_u256")]
    pub raw_balance: U256,
    pub decimals: u8,
    /// `raw_balance / 10^decimals`.
    pub human_balance: String,
    pub status: BalanceStatus,
}

/// Native balance plus tracked token balances for one address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Balances {
    pub native: AssetBalance,
    pub tokens: Vec<TokenBalance>,
}

/// One entry of an address's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxRecord {
    pub txid: String,
    pub confirmed: bool,
    pub block_height: Option<u64>,
    pub timestamp: Option<u64>,
    pub fee: Option<u64>,
    /// Net effect on the address in base units; negative for outgoing.
    pub net_amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletInfo {
    pub chain: ChainKind,
    pub network: Network,
    pub address: String,
    pub balance: AssetBalance,
    pub recent_transactions: Vec<TxRecord>,
    pub token_balances: Vec<TokenBalance>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationStatus {
    /// Not known to the chain source.
    Unknown,
    /// Known but not yet mined.
    Pending,
    Confirmed,
    /// Mined, but execution reverted.
    Reverted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Confirmation {
    pub chain: ChainKind,
    pub network: Network,
    pub txid: String,
    pub status: ConfirmationStatus,
    pub block_height: Option<u64>,
}

impl Confirmation {
    /// Terminal send stage implied by this status, if any.
    pub fn stage(&self) -> Option<SendStage> {
        match self.status {
            ConfirmationStatus::Confirmed => Some(SendStage::Confirmed),
            ConfirmationStatus::Reverted => Some(SendStage::Failed),
            ConfirmationStatus::Unknown | ConfirmationStatus::Pending => None,
        }
    }
}
