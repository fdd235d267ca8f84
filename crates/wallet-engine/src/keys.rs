//! Key generation, restoration and address checks for every [`ChainKind`].

use chain_btc::BtcKey;
use k256::ecdsa::SigningKey;
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroizing;

use crate::error::EngineError;
use crate::hd_derivation::{derivation_path, derive_secp256k1_key};
use crate::mnemonic::{generate_mnemonic, mnemonic_to_seed};
use crate::types::{ChainFamily, ChainKind, KeyMaterial, Network};

/// Fresh mnemonic and the key at index 0 of the chain's BIP-44 path.
pub fn generate(chain: ChainKind, network: Network) -> Result<KeyMaterial, EngineError> {
    let mnemonic = generate_mnemonic()?;
    let key = restore(chain, network, mnemonic.expose_secret(), 0)?;
    tracing::info!(%chain, %network, address = %key.address, "generated wallet");
    Ok(key)
}

/// Re-derive key material from an existing mnemonic.
pub fn restore(
    chain: ChainKind,
    network: Network,
    mnemonic: &str,
    index: u32,
) -> Result<KeyMaterial, EngineError> {
    let seed = mnemonic_to_seed(mnemonic)?;
    let path = derivation_path(chain, network, index);
    let derived = derive_secp256k1_key(seed.as_slice(), &path)?;

    let mut key = from_secret_bytes(chain, network, &derived.private_key)?;
    key.mnemonic = Some(SecretString::from(mnemonic.to_string()));
    key.derivation_path = Some(derived.derivation_path.clone());
    Ok(key)
}

/// Key material for an imported private key (no mnemonic).
///
/// Bitcoin accepts WIF for the same network or 32-byte hex; Ethereum
/// accepts 32-byte hex with or without `0x`.
pub fn from_private_key(
    chain: ChainKind,
    network: Network,
    private_key: &str,
) -> Result<KeyMaterial, EngineError> {
    match chain.family() {
        ChainFamily::Bitcoin => {
            let key = BtcKey::parse(private_key, network.btc())?;
            Ok(btc_material(chain, network, &key))
        }
        ChainFamily::Ethereum => {
            let secret = chain_eth::address::parse_private_key(private_key)?;
            from_secret_bytes(chain, network, &secret)
        }
    }
}

fn from_secret_bytes(
    chain: ChainKind,
    network: Network,
    secret: &[u8; 32],
) -> Result<KeyMaterial, EngineError> {
    match chain.family() {
        ChainFamily::Bitcoin => {
            let key = BtcKey::from_secret_bytes(secret, network.btc())?;
            Ok(btc_material(chain, network, &key))
        }
        ChainFamily::Ethereum => {
            let signing_key = SigningKey::from_slice(secret)
                .map_err(|_| EngineError::InvalidKeyFormat("scalar out of range".into()))?;
            let (public_key, address) = chain_eth::address::public_key_and_address(&signing_key)?;
            let hex_key = Zeroizing::new(hex::encode(secret));
            Ok(KeyMaterial {
                chain,
                network,
                mnemonic: None,
                derivation_path: None,
                private_key: SecretString::from(format!("0x{}", hex_key.as_str())),
                public_key,
                address,
            })
        }
    }
}

fn btc_material(chain: ChainKind, network: Network, key: &BtcKey) -> KeyMaterial {
    KeyMaterial {
        chain,
        network,
        mnemonic: None,
        derivation_path: None,
        private_key: SecretString::from(key.to_wif()),
        public_key: key.public_key_hex(),
        address: key.p2pkh_address().to_string(),
    }
}

/// Default address for `private_key` on `network`. Pure and deterministic.
pub fn derive_address(
    chain: ChainKind,
    network: Network,
    private_key: &str,
) -> Result<String, EngineError> {
    match chain.family() {
        ChainFamily::Bitcoin => {
            Ok(chain_btc::keys::derive_address(private_key, network.btc())?)
        }
        ChainFamily::Ethereum => Ok(chain_eth::address::derive_address(private_key)?),
    }
}

/// Whether `private_key` controls `address`. Bitcoin accepts either the
/// P2PKH or the P2WPKH address of the key.
pub fn key_controls_address(
    chain: ChainKind,
    network: Network,
    private_key: &str,
    address: &str,
) -> Result<bool, EngineError> {
    match chain.family() {
        ChainFamily::Bitcoin => Ok(chain_btc::keys::key_controls_address(
            private_key,
            address,
            network.btc(),
        )?),
        ChainFamily::Ethereum => {
            Ok(chain_eth::address::key_controls_address(private_key, address)?)
        }
    }
}

/// The one spelling of `address` that every other spelling maps to:
/// lowercase bech32 or untouched base58 on Bitcoin, EIP-55 on Ethereum.
pub fn canonical_address(
    chain: ChainKind,
    network: Network,
    address: &str,
) -> Result<String, EngineError> {
    match chain.family() {
        ChainFamily::Bitcoin => {
            Ok(chain_btc::address::parse_address(address, network.btc())?.to_string())
        }
        ChainFamily::Ethereum => {
            chain_eth::address::parse_address(address)?;
            Ok(chain_eth::address::checksum_address(address)?)
        }
    }
}

/// Reject addresses that are malformed or belong to another network.
pub fn validate_address(chain: ChainKind, network: Network, address: &str) -> Result<(), EngineError> {
    match chain.family() {
        ChainFamily::Bitcoin => {
            chain_btc::address::parse_address(address, network.btc())?;
        }
        ChainFamily::Ethereum => {
            chain_eth::address::parse_address(address)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    const ABANDON: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
    const KEY_ONE_HEX: &str = "0000000000000000000000000000000000000000000000000000000000000001";

    #[test]
    fn restore_eth_test_vector() {
        let key = restore(ChainKind::Ethereum, Network::Mainnet, ABANDON, 0).unwrap();
        assert_eq!(key.address, "0x9858EfFD232B4033E47d90003D41EC34EcaEda94");
        assert_eq!(key.derivation_path.as_deref(), Some("m/44'/60'/0'/0/0"));
        assert!(key.public_key.starts_with("0x04"));
        assert_eq!(
            key.private_key.expose_secret(),
            "0x1ab42cc412b618bdea3a599e3c9bae199ebf030895b039e9db1e30dafb12b727"
        );
    }

    #[test]
    fn restore_btc_test_vector() {
        let key = restore(ChainKind::Bitcoin, Network::Mainnet, ABANDON, 0).unwrap();
        assert_eq!(key.address, "1LqBGSKuX5yYUonjxT5qGfpUsXKYYWeabA");
        assert_eq!(key.derivation_path.as_deref(), Some("m/44'/0'/0'/0/0"));
    }

    #[test]
    fn usdt_shares_the_eth_key() {
        let eth = restore(ChainKind::Ethereum, Network::Mainnet, ABANDON, 0).unwrap();
        let usdt = restore(ChainKind::Usdt, Network::Mainnet, ABANDON, 0).unwrap();
        assert_eq!(eth.address, usdt.address);
    }

    #[test]
    fn generated_key_round_trips_through_derive_address() {
        for chain in ChainKind::ALL {
            for network in Network::ALL {
                let key = generate(chain, network).unwrap();
                let derived = derive_address(chain, network, key.private_key.expose_secret()).unwrap();
                assert_eq!(derived, key.address, "{chain} {network}");
                assert_eq!(key.mnemonic.as_ref().map(|m| m.expose_secret().split_whitespace().count()), Some(24));
            }
        }
    }

    #[test]
    fn btc_mainnet_and_testnet_addresses_differ() {
        let main = derive_address(ChainKind::Bitcoin, Network::Mainnet, KEY_ONE_HEX).unwrap();
        let test = derive_address(ChainKind::Bitcoin, Network::Testnet, KEY_ONE_HEX).unwrap();
        assert_eq!(main, "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH");
        assert_ne!(main, test);
    }

    #[test]
    fn wif_from_other_network_is_invalid_key_format() {
        let mainnet_wif = from_private_key(ChainKind::Bitcoin, Network::Mainnet, KEY_ONE_HEX)
            .unwrap()
            .private_key;
        let err = from_private_key(ChainKind::Bitcoin, Network::Testnet, mainnet_wif.expose_secret())
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidKeyFormat);
        assert!(!err.to_string().contains(mainnet_wif.expose_secret()));
    }

    #[test]
    fn eth_key_accepts_optional_prefix() {
        let a = derive_address(ChainKind::Ethereum, Network::Mainnet, KEY_ONE_HEX).unwrap();
        let b = derive_address(ChainKind::Ethereum, Network::Mainnet, &format!("0x{KEY_ONE_HEX}")).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf");
    }

    #[test]
    fn controls_segwit_and_legacy() {
        let key = BtcKey::parse(KEY_ONE_HEX, network_btc()).unwrap();
        let segwit = key.p2wpkh_address().unwrap().to_string();
        assert!(key_controls_address(ChainKind::Bitcoin, Network::Mainnet, KEY_ONE_HEX, &segwit).unwrap());
        assert!(key_controls_address(
            ChainKind::Bitcoin,
            Network::Mainnet,
            KEY_ONE_HEX,
            "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH"
        )
        .unwrap());
    }

    #[test]
    fn canonical_address_folds_case_variants() {
        let segwit = "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx";
        let upper = canonical_address(ChainKind::Bitcoin, Network::Testnet, &segwit.to_uppercase()).unwrap();
        assert_eq!(upper, segwit);
        assert_eq!(canonical_address(ChainKind::Bitcoin, Network::Testnet, segwit).unwrap(), segwit);

        let eth = "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf";
        for spelling in [eth.to_lowercase(), format!("0x{}", eth[2..].to_uppercase())] {
            assert_eq!(canonical_address(ChainKind::Usdt, Network::Mainnet, &spelling).unwrap(), eth);
        }
    }

    #[test]
    fn foreign_address_is_not_controlled() {
        assert!(!key_controls_address(
            ChainKind::Ethereum,
            Network::Mainnet,
            KEY_ONE_HEX,
            "0x000000000000000000000000000000000000dEaD"
        )
        .unwrap());
    }

    #[test]
    fn validate_address_rejects_cross_network() {
        assert!(validate_address(ChainKind::Bitcoin, Network::Mainnet, "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH").is_ok());
        let err =
            validate_address(ChainKind::Bitcoin, Network::Testnet, "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidAddress);
        assert!(validate_address(ChainKind::Usdt, Network::Testnet, "0xnothex").is_err());
    }

    fn network_btc() -> chain_btc::BtcNetwork {
        Network::Mainnet.btc()
    }
}
