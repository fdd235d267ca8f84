//! Engine configuration.
//!
//! Loaded from TOML with [`EngineConfig::load`]; every field has a default,
//! so an empty file is a valid configuration. Endpoint lists can be
//! overridden from the environment:
//!
//! - `WALLET_BTC_MAINNET_ESPLORA_URL`, `WALLET_BTC_TESTNET_ESPLORA_URL`
//! - `WALLET_ETH_MAINNET_RPC_URLS`, `WALLET_ETH_TESTNET_RPC_URLS` (comma-separated)

use std::path::Path;
use std::time::Duration;

use chain_btc::fee::{DEFAULT_CONFIRMATION_TARGET, DUST_THRESHOLD_SAT};
use chain_eth::networks::USDT_FALLBACK_DECIMALS;
use chain_eth::EthNetwork;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::types::Network;

const DEFAULT_FALLBACK_GAS_PRICE_GWEI: u64 = 50;
const DEFAULT_RECENT_TX_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub timeouts: TimeoutConfig,
    pub bitcoin: BitcoinConfig,
    pub ethereum: EthereumConfig,
    pub dust_threshold_sat: u64,
    /// Allow unconfirmed UTXOs as inputs.
    pub spend_unconfirmed: bool,
    pub recent_tx_limit: usize,
    pub logging: LoggingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeouts: TimeoutConfig::default(),
            bitcoin: BitcoinConfig::default(),
            ethereum: EthereumConfig::default(),
            dust_threshold_sat: DUST_THRESHOLD_SAT,
            spend_unconfirmed: false,
            recent_tx_limit: DEFAULT_RECENT_TX_LIMIT,
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub query_secs: u64,
    pub broadcast_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            query_secs: 5,
            broadcast_secs: 10,
        }
    }
}

impl TimeoutConfig {
    pub fn query(&self) -> Duration {
        Duration::from_secs(self.query_secs)
    }

    pub fn broadcast(&self) -> Duration {
        Duration::from_secs(self.broadcast_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BitcoinConfig {
    pub mainnet: BtcNetworkConfig,
    pub testnet: BtcNetworkConfig,
}

/// Per-network Bitcoin settings. Unset values resolve to the network's
/// built-in defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BtcNetworkConfig {
    pub esplora_url: Option<String>,
    pub fallback_sat_per_vb: Option<u64>,
    /// Confirmation target (blocks) used to pick a live fee estimate.
    pub confirmation_target: u16,
}

impl Default for BtcNetworkConfig {
    fn default() -> Self {
        Self {
            esplora_url: None,
            fallback_sat_per_vb: None,
            confirmation_target: DEFAULT_CONFIRMATION_TARGET,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EthereumConfig {
    pub mainnet: EthNetworkConfig,
    pub testnet: EthNetworkConfig,
}

/// Per-network Ethereum settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EthNetworkConfig {
    /// Must match the network when set.
    pub chain_id: Option<u64>,
    /// Probed in order; empty means the built-in list.
    pub rpc_urls: Vec<String>,
    pub fallback_gas_price_gwei: u64,
    /// Tokens reported by balance queries; `None` means USDT only.
    pub tokens: Option<Vec<TokenConfig>>,
}

impl Default for EthNetworkConfig {
    fn default() -> Self {
        Self {
            chain_id: None,
            rpc_urls: Vec::new(),
            fallback_gas_price_gwei: DEFAULT_FALLBACK_GAS_PRICE_GWEI,
            tokens: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenConfig {
    pub symbol: String,
    pub contract: String,
    /// Used when `decimals()` cannot be read from the contract.
    pub fallback_decimals: u8,
}

impl TokenConfig {
    pub fn usdt(network: EthNetwork) -> Self {
        Self {
            symbol: "USDT".into(),
            contract: network.usdt_contract().into(),
            fallback_decimals: USDT_FALLBACK_DECIMALS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `"info"` or `"wallet_engine=debug,info"`.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Text,
        }
    }
}

impl EngineConfig {
    /// Read a TOML file, apply environment overrides and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("cannot read {}: {e}", path.display())))?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Result<Self, EngineError> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, EngineError> {
        toml::from_str(content).map_err(|e| EngineError::Config(format!("invalid TOML: {e}")))
    }

    /// Apply endpoint overrides using `lookup` to read variables.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("WALLET_BTC_MAINNET_ESPLORA_URL") {
            self.bitcoin.mainnet.esplora_url = Some(url.trim().to_string());
        }
        if let Some(url) = non_empty("WALLET_BTC_TESTNET_ESPLORA_URL") {
            self.bitcoin.testnet.esplora_url = Some(url.trim().to_string());
        }
        if let Some(urls) = non_empty("WALLET_ETH_MAINNET_RPC_URLS") {
            self.ethereum.mainnet.rpc_urls = split_urls(&urls);
        }
        if let Some(urls) = non_empty("WALLET_ETH_TESTNET_RPC_URLS") {
            self.ethereum.testnet.rpc_urls = split_urls(&urls);
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.timeouts.query_secs == 0 || self.timeouts.broadcast_secs == 0 {
            return Err(EngineError::Config("timeouts must be at least 1 second".into()));
        }

        for network in Network::ALL {
            let btc = self.btc(network);
            if btc.confirmation_target == 0 {
                return Err(EngineError::Config(format!(
                    "bitcoin.{network}.confirmation_target must be positive"
                )));
            }
            if btc.fallback_sat_per_vb == Some(0) {
                return Err(EngineError::Config(format!(
                    "bitcoin.{network}.fallback_sat_per_vb must be positive"
                )));
            }

            let eth = self.eth(network);
            let expected = network.eth().chain_id();
            if let Some(chain_id) = eth.chain_id.filter(|id| *id != expected) {
                return Err(EngineError::Config(format!(
                    "ethereum.{network}.chain_id is {chain_id}, expected {expected}"
                )));
            }
            if eth.fallback_gas_price_gwei == 0 {
                return Err(EngineError::Config(format!(
                    "ethereum.{network}.fallback_gas_price_gwei must be positive"
                )));
            }
            for token in self.tracked_tokens(network) {
                chain_eth::address::parse_address(&token.contract).map_err(|e| {
                    EngineError::Config(format!("token {} contract: {e}", token.symbol))
                })?;
            }
        }
        Ok(())
    }

    pub fn btc(&self, network: Network) -> &BtcNetworkConfig {
        match network {
            Network::Mainnet => &self.bitcoin.mainnet,
            Network::Testnet => &self.bitcoin.testnet,
        }
    }

    pub fn eth(&self, network: Network) -> &EthNetworkConfig {
        match network {
            Network::Mainnet => &self.ethereum.mainnet,
            Network::Testnet => &self.ethereum.testnet,
        }
    }

    pub fn esplora_url(&self, network: Network) -> String {
        self.btc(network)
            .esplora_url
            .clone()
            .unwrap_or_else(|| network.btc().default_esplora_url().to_string())
    }

    pub fn fallback_sat_per_vb(&self, network: Network) -> u64 {
        self.btc(network)
            .fallback_sat_per_vb
            .unwrap_or_else(|| network.btc().fallback_sat_per_vb())
    }

    pub fn rpc_urls(&self, network: Network) -> Vec<String> {
        let configured = &self.eth(network).rpc_urls;
        if configured.is_empty() {
            network
                .eth()
                .default_rpc_urls()
                .iter()
                .map(|u| u.to_string())
                .collect()
        } else {
            configured.clone()
        }
    }

    pub fn fallback_gas_price_wei(&self, network: Network) -> u128 {
        u128::from(self.eth(network).fallback_gas_price_gwei) * chain_eth::fee::GWEI
    }

    pub fn tracked_tokens(&self, network: Network) -> Vec<TokenConfig> {
        self.eth(network)
            .tokens
            .clone()
            .unwrap_or_else(|| vec![TokenConfig::usdt(network.eth())])
    }

    /// The token moved by `ChainKind::Usdt` sends.
    pub fn usdt_token(&self, network: Network) -> TokenConfig {
        self.tracked_tokens(network)
            .into_iter()
            .find(|t| t.symbol.eq_ignore_ascii_case("USDT"))
            .unwrap_or_else(|| TokenConfig::usdt(network.eth()))
    }
}

fn split_urls(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults_match_chain_constants() {
        let config = EngineConfig::default();
        assert_eq!(config.dust_threshold_sat, 546);
        assert!(!config.spend_unconfirmed);
        assert_eq!(config.timeouts.query(), Duration::from_secs(5));
        assert_eq!(config.timeouts.broadcast(), Duration::from_secs(10));
        assert_eq!(config.fallback_sat_per_vb(Network::Mainnet), 5);
        assert_eq!(config.fallback_sat_per_vb(Network::Testnet), 1);
        assert_eq!(config.fallback_gas_price_wei(Network::Mainnet), 50_000_000_000);
        assert_eq!(config.rpc_urls(Network::Testnet).len(), 3);
        assert_eq!(
            config.usdt_token(Network::Mainnet).contract,
            "0xdAC17F958D2ee523a2206206994597C13D831ec7"
        );
        config.validate().unwrap();
    }

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(EngineConfig::from_toml_str("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            spend_unconfirmed = true

            [bitcoin.testnet]
            esplora_url = "http://localhost:3002"

            [ethereum.mainnet]
            rpc_urls = ["http://a", "http://b"]

            [logging]
            format = "json"
            "#,
        )
        .unwrap();

        assert!(config.spend_unconfirmed);
        assert_eq!(config.esplora_url(Network::Testnet), "http://localhost:3002");
        assert_eq!(config.esplora_url(Network::Mainnet), "https://blockstream.info/api");
        assert_eq!(config.rpc_urls(Network::Mainnet), vec!["http://a", "http://b"]);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.btc(Network::Testnet).confirmation_target, 6);
    }

    #[test]
    fn env_overrides_endpoints() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("WALLET_BTC_MAINNET_ESPLORA_URL", "https://mempool.example/api"),
            ("WALLET_ETH_TESTNET_RPC_URLS", " https://x , ,https://y "),
            ("WALLET_ETH_MAINNET_RPC_URLS", "  "),
        ]);
        let mut config = EngineConfig::default();
        config.apply_overrides(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.esplora_url(Network::Mainnet), "https://mempool.example/api");
        assert_eq!(config.rpc_urls(Network::Testnet), vec!["https://x", "https://y"]);
        // blank value leaves the default list in place
        assert_eq!(config.rpc_urls(Network::Mainnet).len(), 3);
    }

    #[test]
    fn wrong_chain_id_is_rejected() {
        let config = EngineConfig::from_toml_str(
            r#"
            [ethereum.testnet]
            chain_id = 5
            "#,
        )
        .unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("expected 11155111"));
    }

    #[test]
    fn bad_token_contract_is_rejected() {
        let config = EngineConfig::from_toml_str(
            r#"
            [[ethereum.mainnet.tokens]]
            symbol = "USDT"
            contract = "0x1234"
            fallback_decimals = 6
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let err = EngineConfig::from_toml_str("dust_threshold_sat = \"lots\"").unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::Config);
    }
}
