//! # crypto-utils
//!
//! Encryption-at-rest for private keys handed out by the wallet engine.
//! The engine only depends on the [`KeyCipher`] trait; [`PassphraseCipher`]
//! is the bundled implementation (Argon2id + AES-256-GCM).

pub mod cipher;
pub mod encryption;
pub mod error;
pub mod kdf;

pub use cipher::{KeyCipher, PassphraseCipher};
pub use error::CryptoError;
