//! Minimal ABI encoding for EVM function calls.
//!
//! Just enough to build ERC-20 calldata and read single-word return values
//! without pulling in a full ABI parser.

use alloy_primitives::U256;
use sha3::{Digest, Keccak256};

use crate::error::EthError;

/// A single ABI-encoded parameter.
#[derive(Debug, Clone)]
pub enum AbiParam {
    /// A 20-byte Ethereum address, left-padded to 32 bytes.
    Address([u8; 20]),
    /// A 256-bit unsigned integer.
    Uint256(U256),
}

/// First four bytes of `keccak256(signature)`, e.g. `transfer(address,uint256)`.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = Keccak256::digest(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Encodes a function call with the given 4-byte selector and ABI parameters.
///
/// The output is `selector || encode(params[0]) || encode(params[1]) || ...`
/// where each parameter is encoded as a 32-byte ABI word.
///
/// # Parameters
///
/// - `selector`: The 4-byte function selector (e.g., `0xa9059cbb` for ERC-20
///   `transfer`).
/// - `params`: Slice of [`AbiParam`] values to encode after the selector.
pub fn encode_function_call(selector: [u8; 4], params: &[AbiParam]) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + params.len() * 32);
    data.extend_from_slice(&selector);

    for param in params {
        data.extend_from_slice(&encode_param(param));
    }

    data
}

fn encode_param(param: &AbiParam) -> [u8; 32] {
    match param {
        AbiParam::Address(addr) => {
            let mut word = [0u8; 32];
            word[12..].copy_from_slice(addr);
            word
        }
        AbiParam::Uint256(value) => value.to_be_bytes::<32>(),
    }
}

/// Decodes the first 32-byte word of `data` as a uint256.
///
/// Used for `balanceOf`, `decimals` and similar single-return view calls.
pub fn decode_uint256(data: &[u8]) -> Result<U256, EthError> {
    if data.len() < 32 {
        return Err(EthError::EncodingError(format!(
            "expected at least 32 bytes for uint256, got {}",
            data.len()
        )));
    }

    Ok(U256::from_be_slice(&data[..32]))
}
