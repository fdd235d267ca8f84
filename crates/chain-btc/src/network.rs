use bitcoin::Network;

/// Default Esplora endpoint for Bitcoin mainnet.
pub const MAINNET_ESPLORA: &str = "https://blockstream.info/api";

/// Default Esplora endpoint for Bitcoin testnet.
pub const TESTNET_ESPLORA: &str = "https://blockstream.info/testnet/api";

/// Fee rate used on mainnet when the live estimate is unavailable (sat/vB).
pub const MAINNET_FALLBACK_SAT_PER_VB: u64 = 5;

/// Fee rate used on testnet when the live estimate is unavailable (sat/vB).
pub const TESTNET_FALLBACK_SAT_PER_VB: u64 = 1;

/// Supported Bitcoin networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BtcNetwork {
    Mainnet,
    Testnet,
}

impl BtcNetwork {
    /// Convert to the `bitcoin` crate's `Network` type.
    pub fn to_bitcoin_network(self) -> Network {
        match self {
            BtcNetwork::Mainnet => Network::Bitcoin,
            BtcNetwork::Testnet => Network::Testnet,
        }
    }

    /// Return the default Esplora base URL for this network.
    pub fn default_esplora_url(self) -> &'static str {
        match self {
            BtcNetwork::Mainnet => MAINNET_ESPLORA,
            BtcNetwork::Testnet => TESTNET_ESPLORA,
        }
    }

    /// Static fee rate applied when the indexer cannot provide one.
    pub fn fallback_sat_per_vb(self) -> u64 {
        match self {
            BtcNetwork::Mainnet => MAINNET_FALLBACK_SAT_PER_VB,
            BtcNetwork::Testnet => TESTNET_FALLBACK_SAT_PER_VB,
        }
    }

    /// BIP-44 coin type: 0 on mainnet, 1 for every test network.
    pub fn bip44_coin_type(self) -> u32 {
        match self {
            BtcNetwork::Mainnet => 0,
            BtcNetwork::Testnet => 1,
        }
    }
}

impl std::fmt::Display for BtcNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BtcNetwork::Mainnet => write!(f, "mainnet"),
            BtcNetwork::Testnet => write!(f, "testnet"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_to_bitcoin_network() {
        assert_eq!(BtcNetwork::Mainnet.to_bitcoin_network(), Network::Bitcoin);
        assert_eq!(BtcNetwork::Testnet.to_bitcoin_network(), Network::Testnet);
    }

    #[test]
    fn esplora_urls_differ_per_network() {
        assert_ne!(
            BtcNetwork::Mainnet.default_esplora_url(),
            BtcNetwork::Testnet.default_esplora_url()
        );
    }

    #[test]
    fn fallback_rates() {
        assert_eq!(BtcNetwork::Mainnet.fallback_sat_per_vb(), 5);
        assert_eq!(BtcNetwork::Testnet.fallback_sat_per_vb(), 1);
    }

    #[test]
    fn coin_types() {
        assert_eq!(BtcNetwork::Mainnet.bip44_coin_type(), 0);
        assert_eq!(BtcNetwork::Testnet.bip44_coin_type(), 1);
    }

    #[test]
    fn display_names() {
        assert_eq!(BtcNetwork::Mainnet.to_string(), "mainnet");
        assert_eq!(BtcNetwork::Testnet.to_string(), "testnet");
    }
}
