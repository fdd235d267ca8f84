use thiserror::Error;

/// Errors from sealing or opening key material.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("key derivation failed: {0}")]
    KdfFailed(String),

    #[error("malformed sealed key: {0}")]
    MalformedCiphertext(String),
}
