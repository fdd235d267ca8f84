use bip32::{DerivationPath, XPrv};
use k256::ecdsa::SigningKey;
use zeroize::Zeroizing;

use crate::error::EngineError;
use crate::types::{ChainKind, Network};

/// BIP-44 path: `m/44'/coin_type'/0'/0/index`.
///
/// - BTC mainnet: coin type 0, testnet: 1
/// - ETH and USDT: coin type 60 on every network (the chain id separates them
///   at signing time)
pub fn derivation_path(chain: ChainKind, network: Network, index: u32) -> String {
    let coin_type = match chain {
        ChainKind::Bitcoin => network.btc().bip44_coin_type(),
        ChainKind::Ethereum | ChainKind::Usdt => 60,
    };
    format!("m/44'/{coin_type}'/0'/0/{index}")
}

/// A secp256k1 private key derived from a seed.
pub struct DerivedKey {
    pub private_key: Zeroizing<[u8; 32]>,
    pub derivation_path: String,
}

/// Derive the secp256k1 key at `path` from a BIP-39 seed.
pub fn derive_secp256k1_key(seed: &[u8], path: &str) -> Result<DerivedKey, EngineError> {
    let parsed: DerivationPath = path
        .parse()
        .map_err(|e: bip32::Error| EngineError::InvalidKeyFormat(format!("bad path {path}: {e}")))?;

    let xprv = XPrv::derive_from_path(seed, &parsed)
        .map_err(|e| EngineError::InvalidKeyFormat(format!("derivation failed: {e}")))?;

    let private_key = Zeroizing::new(<[u8; 32]>::from(xprv.to_bytes()));
    SigningKey::from_slice(private_key.as_slice())
        .map_err(|_| EngineError::InvalidKeyFormat("derived scalar out of range".into()))?;

    Ok(DerivedKey {
        private_key,
        derivation_path: path.to_string(),
    })
}
