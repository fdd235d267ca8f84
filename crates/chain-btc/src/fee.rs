use std::collections::BTreeMap;

use crate::esplora::UtxoIndexer;
use crate::network::BtcNetwork;

/// Outputs below this value are uneconomical to spend; change under it
/// is folded into the fee.
pub const DUST_THRESHOLD_SAT: u64 = 546;

/// Size-model weight of one input, in bytes.
pub const INPUT_BYTES: u64 = 180;

/// Size-model weight of one output, in bytes.
pub const OUTPUT_BYTES: u64 = 34;

/// Fixed transaction overhead in the size model, in bytes.
pub const OVERHEAD_BYTES: u64 = 10;

/// Confirmation target (in blocks) read from the indexer's estimate table.
pub const DEFAULT_CONFIRMATION_TARGET: u16 = 6;

/// Fee rate held as satoshis per 1000 vbytes so fractional sat/vB
/// estimates survive without floating point in the fee path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FeeRate(u64);

impl FeeRate {
    pub const fn from_sat_per_vb(sat_per_vb: u64) -> Self {
        Self(sat_per_vb.saturating_mul(1000))
    }

    pub const fn from_sat_per_kvb(sat_per_kvb: u64) -> Self {
        Self(sat_per_kvb)
    }

    /// Convert an indexer estimate (fractional sat/vB), rounding up.
    /// Returns `None` for non-finite or non-positive input.
    pub fn from_sat_per_vb_f64(sat_per_vb: f64) -> Option<Self> {
        if !sat_per_vb.is_finite() || sat_per_vb <= 0.0 {
            return None;
        }
        Some(Self((sat_per_vb * 1000.0).ceil() as u64))
    }

    pub fn sat_per_kvb(self) -> u64 {
        self.0
    }

    /// Fee for `vbytes`, rounded up to the next whole satoshi.
    pub fn fee_for_size(self, vbytes: u64) -> u64 {
        vbytes.saturating_mul(self.0).div_ceil(1000)
    }
}

impl std::fmt::Display for FeeRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:03} sat/vB", self.0 / 1000, self.0 % 1000)
    }
}

/// Where a fee rate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeSource {
    Live,
    Fallback,
    Caller,
}

/// A fee rate for one network, fetched for one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeQuote {
    pub rate: FeeRate,
    pub source: FeeSource,
    pub network: BtcNetwork,
}

/// Estimated transaction size: `inputs*180 + outputs*34 + 10 - inputs`.
pub fn estimate_size(num_inputs: usize, num_outputs: usize) -> u64 {
    let inputs = num_inputs as u64;
    let outputs = num_outputs as u64;
    inputs * INPUT_BYTES + outputs * OUTPUT_BYTES + OVERHEAD_BYTES - inputs
}

/// Fee in satoshis for a transaction with the given shape, rounded up.
pub fn estimate_fee(num_inputs: usize, num_outputs: usize, rate: FeeRate) -> u64 {
    rate.fee_for_size(estimate_size(num_inputs, num_outputs))
}

/// Pick the estimate for the smallest target at or above `target` blocks,
/// falling back to the slowest target the indexer reported.
pub fn pick_estimate(estimates: &BTreeMap<u16, f64>, target: u16) -> Option<FeeRate> {
    estimates
        .range(target..)
        .next()
        .or_else(|| estimates.iter().next_back())
        .and_then(|(_, rate)| FeeRate::from_sat_per_vb_f64(*rate))
}

/// Fetch a live fee rate from the indexer, degrading to the network's
/// static fallback when the indexer errors or returns nothing usable.
pub async fn quote_fee_rate(
    indexer: &dyn UtxoIndexer,
    network: BtcNetwork,
    target: u16,
) -> FeeQuote {
    let live = match indexer.fee_estimates().await {
        Ok(estimates) => pick_estimate(&estimates, target),
        Err(e) => {
            tracing::warn!(
                event = "FeeEstimationDegraded",
                chain = "bitcoin",
                %network,
                error = %e,
                "live fee estimate failed, using fallback rate"
            );
            None
        }
    };

    match live {
        Some(rate) => FeeQuote {
            rate,
            source: FeeSource::Live,
            network,
        },
        None => {
            let rate = FeeRate::from_sat_per_vb(network.fallback_sat_per_vb());
            tracing::debug!(%network, %rate, "applying fallback fee rate");
            FeeQuote {
                rate,
                source: FeeSource::Fallback,
                network,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_model() {
        assert_eq!(estimate_size(1, 2), 180 + 68 + 10 - 1);
        assert_eq!(estimate_size(2, 2), 436);
    }

    #[test]
    fn fee_at_one_sat_per_vb_equals_size() {
        assert_eq!(estimate_fee(2, 2, FeeRate::from_sat_per_vb(1)), 436);
    }

    #[test]
    fn fractional_rate_rounds_up() {
        let rate = FeeRate::from_sat_per_vb_f64(1.001).unwrap();
        assert_eq!(rate.sat_per_kvb(), 1001);
        // 257 * 1.001 = 257.257 -> 258
        assert_eq!(estimate_fee(1, 2, rate), 258);
    }

    #[test]
    fn fee_is_monotone_in_inputs_and_outputs() {
        let rate = FeeRate::from_sat_per_vb_f64(3.7).unwrap();
        for inputs in 0..20 {
            for outputs in 0..5 {
                let base = estimate_fee(inputs, outputs, rate);
                assert!(estimate_fee(inputs + 1, outputs, rate) >= base);
                assert!(estimate_fee(inputs, outputs + 1, rate) >= base);
            }
        }
    }

    #[test]
    fn zero_rate_is_free() {
        assert_eq!(estimate_fee(5, 5, FeeRate::from_sat_per_kvb(0)), 0);
    }

    #[test]
    fn rejects_non_positive_rates() {
        assert!(FeeRate::from_sat_per_vb_f64(0.0).is_none());
        assert!(FeeRate::from_sat_per_vb_f64(-2.0).is_none());
        assert!(FeeRate::from_sat_per_vb_f64(f64::NAN).is_none());
    }

    #[test]
    fn display_rate() {
        assert_eq!(FeeRate::from_sat_per_kvb(2500).to_string(), "2.500 sat/vB");
    }

    #[test]
    fn pick_estimate_prefers_target() {
        let estimates: BTreeMap<u16, f64> =
            [(1, 20.0), (3, 12.5), (6, 8.2), (144, 1.0)].into_iter().collect();
        assert_eq!(
            pick_estimate(&estimates, 6),
            FeeRate::from_sat_per_vb_f64(8.2)
        );
        assert_eq!(
            pick_estimate(&estimates, 4),
            FeeRate::from_sat_per_vb_f64(8.2)
        );
        assert_eq!(
            pick_estimate(&estimates, 500),
            FeeRate::from_sat_per_vb_f64(1.0)
        );
        assert_eq!(pick_estimate(&BTreeMap::new(), 6), None);
    }
}
