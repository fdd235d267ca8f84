use alloy_primitives::U256;

use crate::abi::{decode_uint256, encode_function_call, AbiParam};
use crate::address::parse_address;
use crate::error::EthError;

/// Function selector for `transfer(address,uint256)`: `0xa9059cbb`.
pub const TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];

/// Function selector for `balanceOf(address)`: `0x70a08231`.
pub const BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];

/// Function selector for `decimals()`: `0x313ce567`.
pub const DECIMALS_SELECTOR: [u8; 4] = [0x31, 0x3c, 0xe5, 0x67];

/// Encodes an ERC-20 `transfer(address,uint256)` call.
///
/// # Parameters
///
/// - `to`: The recipient address (0x-prefixed hex string).
/// - `amount`: The transfer amount in token base units.
///
/// # Returns
///
/// The complete calldata (4-byte selector + 64 bytes of ABI-encoded params).
pub fn encode_transfer(to: &str, amount: U256) -> Result<Vec<u8>, EthError> {
    let addr = parse_address(to)?;
    let params = [AbiParam::Address(addr), AbiParam::Uint256(amount)];
    Ok(encode_function_call(TRANSFER_SELECTOR, &params))
}

/// Encodes an ERC-20 `balanceOf(address)` call.
pub fn encode_balance_of(owner: &str) -> Result<Vec<u8>, EthError> {
    let addr = parse_address(owner)?;
    Ok(encode_function_call(BALANCE_OF_SELECTOR, &[AbiParam::Address(addr)]))
}

/// Encodes an ERC-20 `decimals()` call.
pub fn encode_decimals() -> Vec<u8> {
    encode_function_call(DECIMALS_SELECTOR, &[])
}

/// Decodes the return value of `balanceOf`.
pub fn decode_balance(data: &[u8]) -> Result<U256, EthError> {
    decode_uint256(data)
}

/// Decodes the return value of `decimals()`. Values above 77 cannot describe
/// a uint256 amount and are rejected.
pub fn decode_decimals(data: &[u8]) -> Result<u8, EthError> {
    let value = decode_uint256(data)?;
    if value > U256::from(77u8) {
        return Err(EthError::EncodingError(format!(
            "decimals() returned out-of-range value {value}"
        )));
    }
    Ok(value.to::<u8>())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEAD: &str = "0x000000000000000000000000000000000000dEaD";

    #[test]
    fn encode_transfer_layout() {
        let data = encode_transfer(DEAD, U256::from(100u64)).unwrap();

        assert_eq!(data.len(), 68);
        assert_eq!(&data[..4], &TRANSFER_SELECTOR);
        assert_eq!(&data[4..16], &[0u8; 12]);
        assert_eq!(data[34], 0xde);
        assert_eq!(data[35], 0xad);
        assert_eq!(&data[36..67], &[0u8; 31]);
        assert_eq!(data[67], 0x64);
    }

    #[test]
    fn encode_transfer_full_calldata_matches_expected() {
        let to = "0xdead000000000000000000000000000000000000";
        let amount = U256::from(1_000_000_000_000_000_000u128);

        let data = encode_transfer(to, amount).unwrap();

        assert_eq!(hex::encode(&data[..4]), "a9059cbb");
        assert!(hex::encode(&data[4..36]).starts_with("000000000000000000000000dead"));
        assert!(hex::encode(&data[36..68]).ends_with("0de0b6b3a7640000"));
    }

    #[test]
    fn encode_transfer_invalid_address() {
        assert!(encode_transfer("not-an-address", U256::ZERO).is_err());
    }

    #[test]
    fn encode_balance_of_layout() {
        let data = encode_balance_of(DEAD).unwrap();
        assert_eq!(data.len(), 36);
        assert_eq!(&data[..4], &BALANCE_OF_SELECTOR);
    }

    #[test]
    fn encode_decimals_is_bare_selector() {
        assert_eq!(encode_decimals(), DECIMALS_SELECTOR.to_vec());
    }

    #[test]
    fn decode_usdt_style_responses() {
        let mut balance = [0u8; 32];
        balance[28..].copy_from_slice(&100_000_000u32.to_be_bytes());
        assert_eq!(decode_balance(&balance).unwrap(), U256::from(100_000_000u64));

        let mut decimals = [0u8; 32];
        decimals[31] = 6;
        assert_eq!(decode_decimals(&decimals).unwrap(), 6);
    }

    #[test]
    fn decode_decimals_rejects_garbage() {
        assert!(decode_decimals(&[0xff; 32]).is_err());
        assert!(decode_decimals(&[]).is_err());
    }
}
