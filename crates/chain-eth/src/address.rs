use k256::ecdsa::SigningKey;
use sha3::{Digest, Keccak256};
use zeroize::Zeroizing;

use crate::error::EthError;

/// Derives an EIP-55 checksummed Ethereum address from an uncompressed secp256k1
/// public key (65 bytes, starting with 0x04).
///
/// The derivation takes the Keccak-256 hash of the 64-byte public key (without
/// the 0x04 prefix) and uses the last 20 bytes as the address.
pub fn pubkey_to_eth_address(uncompressed_pubkey: &[u8; 65]) -> Result<String, EthError> {
    if uncompressed_pubkey[0] != 0x04 {
        return Err(EthError::InvalidAddress(
            "uncompressed key must start with 0x04".into(),
        ));
    }

    let hash = Keccak256::digest(&uncompressed_pubkey[1..]);
    checksum_address(&format!("0x{}", hex::encode(&hash[12..])))
}

/// Parses a private key given as 64 hex characters, with or without `0x`.
///
/// The returned bytes are wiped on drop. Error messages never contain the key.
pub fn parse_private_key(input: &str) -> Result<Zeroizing<[u8; 32]>, EthError> {
    let trimmed = input.trim();
    let hex_part = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if hex_part.len() != 64 {
        return Err(EthError::InvalidPrivateKey(format!(
            "expected 64 hex characters, got {}",
            hex_part.len()
        )));
    }

    let mut key = Zeroizing::new([0u8; 32]);
    hex::decode_to_slice(hex_part, key.as_mut_slice())
        .map_err(|_| EthError::InvalidPrivateKey("key contains non-hex characters".into()))?;

    SigningKey::from_bytes((&*key).into())
        .map_err(|_| EthError::InvalidPrivateKey("scalar out of range".into()))?;

    Ok(key)
}

/// Address controlled by a raw 32-byte private key.
pub fn address_from_private_key(private_key: &[u8; 32]) -> Result<String, EthError> {
    let signing_key = SigningKey::from_bytes(private_key.into())
        .map_err(|_| EthError::InvalidPrivateKey("scalar out of range".into()))?;
    public_key_and_address(&signing_key).map(|(_, address)| address)
}

/// Uncompressed public key (hex, `0x04...`) and address for a signing key.
pub fn public_key_and_address(signing_key: &SigningKey) -> Result<(String, String), EthError> {
    let point = signing_key.verifying_key().to_encoded_point(false);
    let key_65: [u8; 65] = point
        .as_bytes()
        .try_into()
        .map_err(|_| EthError::InvalidPrivateKey("unexpected public key length".into()))?;
    let address = pubkey_to_eth_address(&key_65)?;
    Ok((format!("0x{}", hex::encode(key_65)), address))
}

/// Derives the checksummed address for a hex private key.
///
/// Ethereum addresses do not depend on the network; replay protection comes
/// from the chain id committed to in every signature.
pub fn derive_address(private_key: &str) -> Result<String, EthError> {
    let key = parse_private_key(private_key)?;
    address_from_private_key(&key)
}

/// Checks that `private_key` controls `address` (case-insensitive compare).
pub fn key_controls_address(private_key: &str, address: &str) -> Result<bool, EthError> {
    let claimed = parse_address(address)?;
    let derived = parse_address(&derive_address(private_key)?)?;
    Ok(claimed == derived)
}

/// Parses a 0x-prefixed address into its 20 bytes.
///
/// Mixed-case input must carry a valid EIP-55 checksum.
pub fn parse_address(address: &str) -> Result<[u8; 20], EthError> {
    if !validate_address(address)? {
        return Err(EthError::InvalidAddress(format!(
            "{address} fails its EIP-55 checksum"
        )));
    }

    let mut addr = [0u8; 20];
    hex::decode_to_slice(&address[2..], &mut addr)
        .map_err(|e| EthError::InvalidAddress(format!("invalid hex: {e}")))?;
    Ok(addr)
}

/// Validates an Ethereum address string.
///
/// Checks that the address has the correct format (0x + 40 hex characters).
/// If the address contains mixed case, the EIP-55 checksum is verified.
pub fn validate_address(address: &str) -> Result<bool, EthError> {
    if !address.starts_with("0x") && !address.starts_with("0X") {
        return Err(EthError::InvalidAddress(
            "address must start with 0x".into(),
        ));
    }

    let hex_part = &address[2..];

    if hex_part.len() != 40 {
        return Err(EthError::InvalidAddress(format!(
            "expected 40 hex characters, got {}",
            hex_part.len()
        )));
    }

    if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(EthError::InvalidAddress(
            "address contains non-hex characters".into(),
        ));
    }

    // All-lowercase or all-uppercase carries no checksum.
    let is_all_lower = hex_part.chars().all(|c| !c.is_ascii_uppercase());
    let is_all_upper = hex_part.chars().all(|c| !c.is_ascii_lowercase());

    if is_all_lower || is_all_upper {
        return Ok(true);
    }

    let checksummed = checksum_address(&format!("0x{}", hex_part.to_lowercase()))?;
    Ok(checksummed[2..] == *hex_part)
}

/// Applies EIP-55 mixed-case checksum encoding to an Ethereum address.
pub fn checksum_address(address: &str) -> Result<String, EthError> {
    if !address.starts_with("0x") && !address.starts_with("0X") {
        return Err(EthError::InvalidAddress(
            "address must start with 0x".into(),
        ));
    }

    let hex_part = address[2..].to_lowercase();

    if hex_part.len() != 40 {
        return Err(EthError::InvalidAddress(format!(
            "expected 40 hex characters, got {}",
            hex_part.len()
        )));
    }

    if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(EthError::InvalidAddress(
            "address contains non-hex characters".into(),
        ));
    }

    let hash = Keccak256::digest(hex_part.as_bytes());

    let mut checksummed = String::with_capacity(42);
    checksummed.push_str("0x");

    for (i, c) in hex_part.chars().enumerate() {
        // Nibble i of the hash: high half of byte i/2 for even i.
        let byte = hash[i / 2];
        let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
        if c.is_ascii_alphabetic() && nibble >= 8 {
            checksummed.push(c.to_ascii_uppercase());
        } else {
            checksummed.push(c);
        }
    }

    Ok(checksummed)
}
