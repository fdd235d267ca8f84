//! Decimal amounts at the API edge and integer base units inside.

use chain_eth::U256;
use rust_decimal::Decimal;

use crate::error::EngineError;

pub const BTC_DECIMALS: u8 = 8;
pub const ETH_DECIMALS: u8 = 18;

fn parse_decimal(input: &str) -> Result<Decimal, EngineError> {
    let trimmed = input.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        return Err(EngineError::InvalidAmount(format!(
            "{trimmed:?} is not a positive decimal number"
        )));
    }

    let value = Decimal::from_str_exact(trimmed)
        .map_err(|e| EngineError::InvalidAmount(format!("{trimmed:?}: {e}")))?
        .normalize();
    if value.is_zero() {
        return Err(EngineError::InvalidAmount("amount must be positive".into()));
    }
    Ok(value)
}

/// Check that `input` is a positive decimal number, whatever the asset.
pub fn validate_amount(input: &str) -> Result<(), EngineError> {
    parse_decimal(input).map(|_| ())
}

/// Parse a positive decimal string into base units with `decimals`
/// fractional digits.
///
/// More fractional digits than `decimals` (after dropping trailing zeros)
/// is an error, never a silent rounding.
pub fn parse_amount(input: &str, decimals: u8) -> Result<U256, EngineError> {
    let value = parse_decimal(input)?;
    let trimmed = input.trim();

    let scale = value.scale();
    if scale > u32::from(decimals) {
        return Err(EngineError::InvalidAmount(format!(
            "{trimmed} has more than {decimals} fractional digits"
        )));
    }

    let mantissa = u128::try_from(value.mantissa())
        .map_err(|_| EngineError::InvalidAmount("amount must be positive".into()))?;
    let factor = U256::from(10u8).pow(U256::from(u32::from(decimals) - scale));
    U256::from(mantissa)
        .checked_mul(factor)
        .ok_or_else(|| EngineError::InvalidAmount(format!("{trimmed} is out of range")))
}

/// Parse a whole-BTC decimal string into satoshis.
pub fn parse_btc(input: &str) -> Result<u64, EngineError> {
    let sat = parse_amount(input, BTC_DECIMALS)?;
    if sat > U256::from(u64::MAX) {
        return Err(EngineError::InvalidAmount(format!("{input} BTC is out of range")));
    }
    Ok(sat.to::<u64>())
}

/// Render base units as a decimal string, without trailing zeros.
pub fn format_units(raw: U256, decimals: u8) -> String {
    let digits = raw.to_string();
    let decimals = usize::from(decimals);
    if decimals == 0 {
        return digits;
    }

    let padded = if digits.len() <= decimals {
        format!("{}{digits}", "0".repeat(decimals + 1 - digits.len()))
    } else {
        digits
    };
    let (int_part, frac_part) = padded.split_at(padded.len() - decimals);
    let frac_part = frac_part.trim_end_matches('0');

    if frac_part.is_empty() {
        int_part.to_string()
    } else {
        format!("{int_part}.{frac_part}")
    }
}

/// Serialize a [`U256`] as a decimal string.
pub(crate) mod serde_u256 {
    use chain_eth::U256;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }
}
