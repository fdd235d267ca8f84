use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroize;

use crate::encryption;
use crate::error::CryptoError;
use crate::kdf::{self, KdfParams, SALT_SIZE};

/// Encrypts private keys before they leave the engine.
///
/// Implementations must be usable from multiple tasks at once.
pub trait KeyCipher: Send + Sync {
    /// Seals a private key string, returning an opaque text envelope.
    fn seal(&self, private_key: &str) -> Result<String, CryptoError>;

    /// Recovers the private key string from an envelope produced by [`seal`](KeyCipher::seal).
    fn open(&self, sealed: &str) -> Result<SecretString, CryptoError>;
}

/// Passphrase-based [`KeyCipher`]: Argon2id key derivation + AES-256-GCM.
///
/// Envelope format is lowercase hex of `salt (16) | nonce (12) | ciphertext | tag (16)`.
pub struct PassphraseCipher {
    passphrase: SecretString,
    params: KdfParams,
}

impl PassphraseCipher {
    pub fn new(passphrase: SecretString) -> Self {
        Self::with_params(passphrase, KdfParams::default())
    }

    pub fn with_params(passphrase: SecretString, params: KdfParams) -> Self {
        Self { passphrase, params }
    }
}

impl std::fmt::Debug for PassphraseCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassphraseCipher")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl KeyCipher for PassphraseCipher {
    fn seal(&self, private_key: &str) -> Result<String, CryptoError> {
        let salt = kdf::generate_salt();
        let mut key = kdf::derive_key(
            self.passphrase.expose_secret().as_bytes(),
            &salt,
            self.params,
        )?;
        let sealed = encryption::seal(private_key.as_bytes(), &key);
        key.zeroize();

        let mut envelope = Vec::with_capacity(SALT_SIZE + sealed.as_ref().map_or(0, Vec::len));
        envelope.extend_from_slice(&salt);
        envelope.extend_from_slice(&sealed?);
        Ok(hex::encode(envelope))
    }

    fn open(&self, sealed: &str) -> Result<SecretString, CryptoError> {
        let bytes = hex::decode(sealed.trim())
            .map_err(|e| CryptoError::MalformedCiphertext(e.to_string()))?;
        if bytes.len() < SALT_SIZE {
            return Err(CryptoError::MalformedCiphertext(format!(
                "envelope shorter than salt ({} bytes)",
                bytes.len()
            )));
        }

        let (salt_bytes, body) = bytes.split_at(SALT_SIZE);
        let mut salt = [0u8; SALT_SIZE];
        salt.copy_from_slice(salt_bytes);

        let mut key = kdf::derive_key(
            self.passphrase.expose_secret().as_bytes(),
            &salt,
            self.params,
        )?;
        let plaintext = encryption::open(body, &key);
        key.zeroize();

        let plaintext = plaintext?;
        let text = std::str::from_utf8(&plaintext)
            .map_err(|_| CryptoError::DecryptionFailed("plaintext is not utf-8".into()))?;
        Ok(SecretString::from(text.to_owned()))
    }
}
