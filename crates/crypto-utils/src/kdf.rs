use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::CryptoError;

/// Salt length used for every sealed key.
pub const SALT_SIZE: usize = 16;

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    /// 64 MiB, 3 passes, 4 lanes.
    fn default() -> Self {
        Self {
            memory_kib: 65536,
            iterations: 3,
            parallelism: 4,
        }
    }
}

/// Derives a 32-byte AES key from `passphrase` and `salt` using Argon2id.
pub fn derive_key(
    passphrase: &[u8],
    salt: &[u8; SALT_SIZE],
    params: KdfParams,
) -> Result<[u8; 32], CryptoError> {
    let params = Params::new(
        params.memory_kib,
        params.iterations,
        params.parallelism,
        Some(32),
    )
    .map_err(|e| CryptoError::KdfFailed(format!("invalid argon2 params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut output = [0u8; 32];
    argon2
        .hash_password_into(passphrase, salt, &mut output)
        .map_err(|e| CryptoError::KdfFailed(format!("argon2 hash failed: {e}")))?;

    Ok(output)
}

/// Draws a random salt from the OS RNG.
pub fn generate_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    salt
}

#[cfg(test)]
pub(crate) fn cheap_params() -> KdfParams {
    KdfParams {
        memory_kib: 64,
        iterations: 1,
        parallelism: 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_key_deterministic() {
        let salt = [0xABu8; SALT_SIZE];
        let k1 = derive_key(b"vault-passphrase", &salt, cheap_params()).unwrap();
        let k2 = derive_key(b"vault-passphrase", &salt, cheap_params()).unwrap();
        assert_eq!(k1, k2);
    }

    #[test]
    fn derive_key_depends_on_salt() {
        let k1 = derive_key(b"pw", &[0x01; SALT_SIZE], cheap_params()).unwrap();
        let k2 = derive_key(b"pw", &[0x02; SALT_SIZE], cheap_params()).unwrap();
        assert_ne!(k1, k2);
    }

    #[test]
    fn invalid_params_rejected() {
        let params = KdfParams {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        };
        assert!(matches!(
            derive_key(b"pw", &[0u8; SALT_SIZE], params),
            Err(CryptoError::KdfFailed(_))
        ));
    }

    #[test]
    fn salts_are_random() {
        assert_ne!(generate_salt(), generate_salt());
    }
}
