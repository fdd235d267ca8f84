use bitcoin::address::{Address, NetworkUnchecked};

use crate::error::BtcError;
use crate::network::BtcNetwork;

/// Parse a Bitcoin address and require it to belong to `network`.
///
/// Supports P2PKH, P2SH, P2WPKH, P2WSH, and P2TR address formats.
pub fn parse_address(address: &str, network: BtcNetwork) -> Result<Address, BtcError> {
    address
        .trim()
        .parse::<Address<NetworkUnchecked>>()
        .map_err(|e| BtcError::InvalidAddress(format!("failed to parse address: {e}")))?
        .require_network(network.to_bitcoin_network())
        .map_err(|_| BtcError::InvalidAddress(format!("{address} is not a {network} address")))
}

/// Validate a Bitcoin address string for the given network.
///
/// Returns `true` if the address is valid for the specified network,
/// `false` if it is valid but for a different network.
pub fn validate_address(address: &str, network: BtcNetwork) -> Result<bool, BtcError> {
    let parsed = address
        .trim()
        .parse::<Address<NetworkUnchecked>>()
        .map_err(|e| BtcError::InvalidAddress(format!("failed to parse address: {e}")))?;

    Ok(parsed.is_valid_for_network(network.to_bitcoin_network()))
}
