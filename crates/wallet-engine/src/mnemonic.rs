use bip39::{Language, Mnemonic};
use rand::RngCore;
use secrecy::SecretString;
use zeroize::{Zeroize, Zeroizing};

use crate::error::EngineError;

/// Words in every mnemonic the engine issues.
pub const MNEMONIC_WORDS: usize = 24;

/// Generate a new 24-word BIP-39 mnemonic (256 bits of entropy).
pub fn generate_mnemonic() -> Result<SecretString, EngineError> {
    let mut entropy = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut entropy);
    let mnemonic = Mnemonic::from_entropy_in(Language::English, &entropy);
    entropy.zeroize();

    let mnemonic = mnemonic
        .map_err(|e| EngineError::Config(format!("mnemonic generation failed: {e}")))?;
    Ok(SecretString::from(mnemonic.to_string()))
}

pub fn validate_mnemonic(phrase: &str) -> bool {
    Mnemonic::parse_in_normalized(Language::English, phrase).is_ok()
}

/// Derive the 64-byte BIP-39 seed (empty passphrase).
pub fn mnemonic_to_seed(phrase: &str) -> Result<Zeroizing<[u8; 64]>, EngineError> {
    let mnemonic = Mnemonic::parse_in_normalized(Language::English, phrase)
        .map_err(|_| EngineError::InvalidKeyFormat("mnemonic is not a valid BIP-39 phrase".into()))?;
    Ok(Zeroizing::new(mnemonic.to_seed("")))
}
