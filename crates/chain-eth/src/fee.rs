use alloy_primitives::U256;

use crate::provider::LiveProvider;

/// Gas limit for a plain ETH transfer.
pub const NATIVE_TRANSFER_GAS: u64 = 21_000;

/// Conservative gas limit for an ERC-20 `transfer`.
pub const TOKEN_TRANSFER_GAS: u64 = 100_000;

pub const GWEI: u128 = 1_000_000_000;

/// Gas price used when live fee data cannot be fetched.
pub const FALLBACK_GAS_PRICE_WEI: u128 = 50 * GWEI;

/// Tip used when the node does not answer `eth_maxPriorityFeePerGas`.
pub const DEFAULT_PRIORITY_FEE_WEI: u128 = GWEI;

/// How a transaction pays for gas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GasPricing {
    /// Pre-1559 single gas price (signed as an EIP-155 legacy transaction).
    Legacy { gas_price: u128 },
    /// EIP-1559 fee cap and tip.
    Eip1559 {
        max_fee_per_gas: u128,
        max_priority_fee_per_gas: u128,
    },
}

impl GasPricing {
    /// Highest price per gas the sender can be charged.
    pub fn max_price_per_gas(&self) -> u128 {
        match *self {
            GasPricing::Legacy { gas_price } => gas_price,
            GasPricing::Eip1559 {
                max_fee_per_gas, ..
            } => max_fee_per_gas,
        }
    }

    /// Worst-case fee for `gas_limit`.
    pub fn max_fee(&self, gas_limit: u64) -> U256 {
        U256::from(self.max_price_per_gas()) * U256::from(gas_limit)
    }
}

/// Where a gas quote came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeSource {
    Live,
    Fallback,
    Caller,
}

/// Gas pricing for one network, fetched for one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasQuote {
    pub pricing: GasPricing,
    pub source: FeeSource,
    pub chain_id: u64,
}

impl GasQuote {
    pub fn fallback(chain_id: u64, gas_price: u128) -> Self {
        Self {
            pricing: GasPricing::Legacy { gas_price },
            source: FeeSource::Fallback,
            chain_id,
        }
    }

    /// A caller-supplied legacy gas price in gwei.
    pub fn from_caller_gwei(chain_id: u64, gwei: u64) -> Self {
        Self {
            pricing: GasPricing::Legacy {
                gas_price: u128::from(gwei) * GWEI,
            },
            source: FeeSource::Caller,
            chain_id,
        }
    }
}

async fn live_pricing(provider: &LiveProvider) -> Result<GasPricing, crate::EthError> {
    match provider.base_fee().await? {
        Some(base_fee) => {
            let tip = match provider.max_priority_fee().await {
                Ok(tip) => tip,
                Err(e) => {
                    tracing::debug!(error = %e, "eth_maxPriorityFeePerGas unavailable, using default tip");
                    DEFAULT_PRIORITY_FEE_WEI
                }
            };
            Ok(GasPricing::Eip1559 {
                max_fee_per_gas: base_fee.saturating_mul(2).saturating_add(tip),
                max_priority_fee_per_gas: tip,
            })
        }
        None => Ok(GasPricing::Legacy {
            gas_price: provider.gas_price().await?,
        }),
    }
}

/// Fetch live fee data; on any failure return a legacy quote at
/// `fallback_gas_price`.
///
/// A block with `baseFeePerGas` yields an EIP-1559 quote with
/// `max_fee = 2 * base_fee + tip`; otherwise `eth_gasPrice` is used.
pub async fn quote_gas(provider: &LiveProvider, fallback_gas_price: u128) -> GasQuote {
    let chain_id = provider.network().chain_id();
    match live_pricing(provider).await {
        Ok(pricing) => GasQuote {
            pricing,
            source: FeeSource::Live,
            chain_id,
        },
        Err(e) => {
            tracing::warn!(
                event = "FeeEstimationDegraded",
                chain = "ethereum",
                network = %provider.network(),
                endpoint = %provider.endpoint(),
                error = %e,
                fallback_gwei = fallback_gas_price / GWEI,
                "live fee data failed, using fallback gas price"
            );
            GasQuote::fallback(chain_id, fallback_gas_price)
        }
    }
}
