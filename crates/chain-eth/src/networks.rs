/// Tether USD on Ethereum mainnet.
pub const MAINNET_USDT: &str = "0xdAC17F958D2ee523a2206206994597C13D831ec7";

/// Test USDT deployment on Sepolia.
pub const SEPOLIA_USDT: &str = "0xaA8E23Fb1079EA71e0a56F48a2aA51851D8433D0";

/// Decimals assumed for USDT when `decimals()` cannot be read.
pub const USDT_FALLBACK_DECIMALS: u8 = 6;

/// Supported Ethereum networks. Testnet is Sepolia.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EthNetwork {
    Mainnet,
    Testnet,
}

impl EthNetwork {
    pub fn chain_id(self) -> u64 {
        match self {
            EthNetwork::Mainnet => 1,
            EthNetwork::Testnet => 11_155_111,
        }
    }

    /// Default RPC endpoints, in the order they are probed.
    pub fn default_rpc_urls(self) -> &'static [&'static str] {
        match self {
            EthNetwork::Mainnet => &[
                "https://eth.llamarpc.com",
                "https://ethereum-rpc.publicnode.com",
                "https://rpc.ankr.com/eth",
            ],
            EthNetwork::Testnet => &[
                "https://ethereum-sepolia-rpc.publicnode.com",
                "https://rpc.sepolia.org",
                "https://rpc.ankr.com/eth_sepolia",
            ],
        }
    }

    pub fn usdt_contract(self) -> &'static str {
        match self {
            EthNetwork::Mainnet => MAINNET_USDT,
            EthNetwork::Testnet => SEPOLIA_USDT,
        }
    }
}

impl std::fmt::Display for EthNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EthNetwork::Mainnet => write!(f, "mainnet"),
            EthNetwork::Testnet => write!(f, "sepolia"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_ids() {
        assert_eq!(EthNetwork::Mainnet.chain_id(), 1);
        assert_eq!(EthNetwork::Testnet.chain_id(), 11_155_111);
    }

    #[test]
    fn every_network_has_endpoints() {
        for net in [EthNetwork::Mainnet, EthNetwork::Testnet] {
            assert!(!net.default_rpc_urls().is_empty());
            assert!(net.default_rpc_urls().iter().all(|u| u.starts_with("https://")));
        }
    }

    #[test]
    fn usdt_contracts_are_valid_addresses() {
        for net in [EthNetwork::Mainnet, EthNetwork::Testnet] {
            assert!(crate::address::parse_address(net.usdt_contract()).is_ok());
        }
    }

    #[test]
    fn display_names() {
        assert_eq!(EthNetwork::Mainnet.to_string(), "mainnet");
        assert_eq!(EthNetwork::Testnet.to_string(), "sepolia");
    }
}
