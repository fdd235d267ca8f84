use aes_gcm::aead::{Aead, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, KeyInit, Nonce};
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// AES-256-GCM nonce size in bytes.
pub const NONCE_SIZE: usize = 12;

/// AES-256-GCM authentication tag size in bytes.
pub const TAG_SIZE: usize = 16;

/// Seals `plaintext` under a 32-byte key.
///
/// Output layout: `[nonce (12 bytes) | ciphertext | tag (16 bytes)]`. A fresh
/// random nonce is drawn for every call.
pub fn seal(plaintext: &[u8], key: &[u8; 32]) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Opens data produced by [`seal`]. The plaintext is wiped when dropped.
pub fn open(sealed: &[u8], key: &[u8; 32]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if sealed.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::MalformedCiphertext(format!(
            "expected at least {} bytes, got {}",
            NONCE_SIZE + TAG_SIZE,
            sealed.len()
        )));
    }

    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map(Zeroizing::new)
        .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> [u8; 32] {
        let mut key = [0u8; 32];
        for (i, byte) in key.iter_mut().enumerate() {
            *byte = i as u8;
        }
        key
    }

    #[test]
    fn seal_open_roundtrip() {
        let key = test_key();
        let sealed = seal(b"L1aW4aubDFB7yfras2S1mN3bqg9nwySY8nkoLmJebSLD5BWv3ENZ", &key).unwrap();
        let opened = open(&sealed, &key).unwrap();
        assert_eq!(
            opened.as_slice(),
            b"L1aW4aubDFB7yfras2S1mN3bqg9nwySY8nkoLmJebSLD5BWv3ENZ"
        );
    }

    #[test]
    fn sealed_layout_has_nonce_and_tag() {
        let sealed = seal(b"test", &test_key()).unwrap();
        assert_eq!(sealed.len(), NONCE_SIZE + 4 + TAG_SIZE);
    }

    #[test]
    fn fresh_nonce_per_seal() {
        let key = test_key();
        assert_ne!(seal(b"same", &key).unwrap(), seal(b"same", &key).unwrap());
    }

    #[test]
    fn open_with_wrong_key_fails() {
        let sealed = seal(b"secret", &test_key()).unwrap();
        let mut wrong = test_key();
        wrong[0] ^= 0xff;

        match open(&sealed, &wrong) {
            Err(CryptoError::DecryptionFailed(_)) => {}
            other => panic!("expected DecryptionFailed, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn open_tampered_fails() {
        let key = test_key();
        let mut sealed = seal(b"tamper", &key).unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(open(&sealed, &key).is_err());
    }

    #[test]
    fn open_truncated_is_malformed() {
        match open(&[0u8; 20], &test_key()) {
            Err(CryptoError::MalformedCiphertext(_)) => {}
            other => panic!("expected MalformedCiphertext, got {:?}", other.map(|_| ())),
        }
    }
}
