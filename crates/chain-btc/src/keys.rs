use bitcoin::key::{CompressedPublicKey, PrivateKey, PublicKey};
use bitcoin::secp256k1::{Secp256k1, SecretKey};
use bitcoin::{Address, NetworkKind, ScriptBuf};

use crate::address::parse_address;
use crate::error::BtcError;
use crate::network::BtcNetwork;

/// A Bitcoin signing key bound to one network.
///
/// Built from WIF (whose network byte must match) or from 32 raw bytes /
/// 64 hex characters (always treated as a compressed key).
pub struct BtcKey {
    private_key: PrivateKey,
    public_key: PublicKey,
    network: BtcNetwork,
}

impl BtcKey {
    /// Parse a WIF or hex private key for `network`.
    ///
    /// A WIF key encoded for the other network is rejected rather than
    /// re-interpreted.
    pub fn parse(input: &str, network: BtcNetwork) -> Result<Self, BtcError> {
        let trimmed = input.trim();
        let hex_body = trimmed.strip_prefix("0x").unwrap_or(trimmed);

        if hex_body.len() == 64 && hex_body.bytes().all(|b| b.is_ascii_hexdigit()) {
            let bytes: [u8; 32] = hex::decode(hex_body)
                .map_err(|_| BtcError::InvalidPrivateKey("malformed hex key".into()))?
                .try_into()
                .map_err(|_| BtcError::InvalidPrivateKey("key must be 32 bytes".into()))?;
            return Self::from_secret_bytes(&bytes, network);
        }

        let private_key = PrivateKey::from_wif(trimmed).map_err(|_| {
            BtcError::InvalidPrivateKey("expected a WIF key or 32-byte hex".into())
        })?;

        if private_key.network != NetworkKind::from(network.to_bitcoin_network()) {
            return Err(BtcError::InvalidPrivateKey(format!(
                "WIF key is not encoded for {network}"
            )));
        }

        Ok(Self::from_private_key(private_key, network))
    }

    /// Build a compressed key from a raw 32-byte secp256k1 scalar.
    pub fn from_secret_bytes(bytes: &[u8; 32], network: BtcNetwork) -> Result<Self, BtcError> {
        let secret = SecretKey::from_slice(bytes)
            .map_err(|_| BtcError::InvalidPrivateKey("scalar out of range".into()))?;
        let private_key = PrivateKey::new(secret, network.to_bitcoin_network());
        Ok(Self::from_private_key(private_key, network))
    }

    fn from_private_key(private_key: PrivateKey, network: BtcNetwork) -> Self {
        let secp = Secp256k1::signing_only();
        let public_key = private_key.public_key(&secp);
        Self {
            private_key,
            public_key,
            network,
        }
    }

    pub fn network(&self) -> BtcNetwork {
        self.network
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub(crate) fn secret_key(&self) -> &SecretKey {
        &self.private_key.inner
    }

    /// Hex-encoded public key (33 bytes when compressed).
    pub fn public_key_hex(&self) -> String {
        self.public_key.to_string()
    }

    /// WIF export of the private key. Callers must wrap it in a secret type.
    pub fn to_wif(&self) -> String {
        self.private_key.to_wif()
    }

    /// Default (P2PKH) address.
    pub fn p2pkh_address(&self) -> Address {
        Address::p2pkh(self.public_key.pubkey_hash(), self.network.to_bitcoin_network())
    }

    /// Native SegWit (P2WPKH) address. Fails for uncompressed keys.
    pub fn p2wpkh_address(&self) -> Result<Address, BtcError> {
        Ok(Address::p2wpkh(
            &self.compressed_public_key()?,
            self.network.to_bitcoin_network(),
        ))
    }

    pub(crate) fn compressed_public_key(&self) -> Result<CompressedPublicKey, BtcError> {
        if !self.public_key.compressed {
            return Err(BtcError::InvalidPrivateKey(
                "uncompressed keys have no P2WPKH address".into(),
            ));
        }
        Ok(CompressedPublicKey(self.public_key.inner))
    }

    pub(crate) fn p2pkh_script(&self) -> ScriptBuf {
        self.p2pkh_address().script_pubkey()
    }

    pub(crate) fn p2wpkh_script(&self) -> Option<ScriptBuf> {
        self.p2wpkh_address().ok().map(|a| a.script_pubkey())
    }

    /// Whether `address` is either the P2PKH or the P2WPKH address of this key.
    pub fn controls(&self, address: &str) -> bool {
        let Ok(parsed) = parse_address(address, self.network) else {
            return false;
        };
        let script = parsed.script_pubkey();
        script == self.p2pkh_script() || self.p2wpkh_script().is_some_and(|s| s == script)
    }
}

impl std::fmt::Debug for BtcKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BtcKey")
            .field("public_key", &self.public_key_hex())
            .field("network", &self.network)
            .finish_non_exhaustive()
    }
}

/// Derive the default (P2PKH) address for a private key on `network`.
pub fn derive_address(private_key: &str, network: BtcNetwork) -> Result<String, BtcError> {
    Ok(BtcKey::parse(private_key, network)?.p2pkh_address().to_string())
}

/// Check that `private_key` controls `address` on `network`.
pub fn key_controls_address(
    private_key: &str,
    address: &str,
    network: BtcNetwork,
) -> Result<bool, BtcError> {
    parse_address(address, network)?;
    Ok(BtcKey::parse(private_key, network)?.controls(address))
}
