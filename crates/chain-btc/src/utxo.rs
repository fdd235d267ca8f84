use crate::error::BtcError;
use crate::fee::{estimate_fee, FeeRate};

/// Outputs assumed when sizing the fee during selection (recipient + change).
const SELECTION_OUTPUTS: usize = 2;

/// A single unspent transaction output (UTXO).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utxo {
    /// Transaction ID as a hex string (big-endian / display order).
    pub txid: String,
    /// Output index within the transaction.
    pub vout: u32,
    /// Value in satoshis.
    pub value_sat: u64,
    /// Address that owns this output.
    pub owner_address: String,
    /// The locking script (scriptPubKey) serialized bytes.
    pub script_pubkey: Vec<u8>,
    /// Whether the funding transaction has been mined.
    pub confirmed: bool,
}

/// Confirmed and unconfirmed totals over an address's UTXO set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UtxoBalance {
    pub confirmed_sat: u64,
    pub unconfirmed_sat: u64,
}

impl UtxoBalance {
    pub fn total_sat(&self) -> u64 {
        self.confirmed_sat + self.unconfirmed_sat
    }
}

/// Sum a UTXO set, keeping confirmed and unconfirmed value apart.
pub fn summarize(utxos: &[Utxo]) -> UtxoBalance {
    utxos.iter().fold(UtxoBalance::default(), |mut acc, u| {
        if u.confirmed {
            acc.confirmed_sat += u.value_sat;
        } else {
            acc.unconfirmed_sat += u.value_sat;
        }
        acc
    })
}

/// Drop unconfirmed outputs unless the caller allows spending them.
/// Indexer order is preserved.
pub fn spendable(utxos: Vec<Utxo>, allow_unconfirmed: bool) -> Vec<Utxo> {
    if allow_unconfirmed {
        return utxos;
    }
    utxos.into_iter().filter(|u| u.confirmed).collect()
}

/// Result of UTXO selection.
///
/// Always satisfies `total_sat == spend_sat + fee_sat + change_sat`, and
/// `change_sat` is either zero or at least the dust threshold.
#[derive(Debug, Clone)]
pub struct CoinSelection {
    /// The selected UTXOs, in indexer order.
    pub selected: Vec<Utxo>,
    /// Total value of the selected UTXOs in satoshis.
    pub total_sat: u64,
    /// Amount paid to the recipient.
    pub spend_sat: u64,
    /// Fee, including any change folded in as dust.
    pub fee_sat: u64,
    /// Change returned to the sender; zero when there is no change output.
    pub change_sat: u64,
}

/// Select UTXOs to cover `spend_sat` plus the fee.
///
/// UTXOs are taken in the order given. After each addition the fee is
/// recomputed for the current input count and two outputs, and selection
/// stops as soon as the running total covers spend plus fee. Change
/// below `dust_threshold` is added to the fee instead of becoming an
/// output.
pub fn select_utxos(
    utxos: &[Utxo],
    spend_sat: u64,
    rate: FeeRate,
    dust_threshold: u64,
) -> Result<CoinSelection, BtcError> {
    if spend_sat == 0 {
        return Err(BtcError::InvalidAmount("spend amount must be positive".into()));
    }

    let mut selected: Vec<Utxo> = Vec::new();
    let mut total_sat: u64 = 0;

    for utxo in utxos {
        selected.push(utxo.clone());
        total_sat += utxo.value_sat;

        let fee = estimate_fee(selected.len(), SELECTION_OUTPUTS, rate);
        let needed = spend_sat.saturating_add(fee);
        if total_sat >= needed {
            let change = total_sat - needed;
            let (fee_sat, change_sat) = if change < dust_threshold {
                (fee + change, 0)
            } else {
                (fee, change)
            };
            return Ok(CoinSelection {
                selected,
                total_sat,
                spend_sat,
                fee_sat,
                change_sat,
            });
        }
    }

    let fee = estimate_fee(selected.len().max(1), SELECTION_OUTPUTS, rate);
    Err(BtcError::InsufficientFunds {
        available: total_sat,
        required: spend_sat.saturating_add(fee),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fee::DUST_THRESHOLD_SAT;

    fn make_utxo(txid: &str, vout: u32, value_sat: u64) -> Utxo {
        Utxo {
            txid: txid.to_string(),
            vout,
            value_sat,
            owner_address: "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH".into(),
            script_pubkey: vec![0xaa; 25],
            confirmed: true,
        }
    }

    fn one_sat() -> FeeRate {
        FeeRate::from_sat_per_vb(1)
    }

    #[test]
    fn two_utxo_scenario() {
        let utxos = vec![make_utxo("aaaa", 0, 50_000), make_utxo("bbbb", 1, 30_000)];
        let sel = select_utxos(&utxos, 60_000, one_sat(), DUST_THRESHOLD_SAT).unwrap();

        // 2*180 + 2*34 + 10 - 2 = 436 bytes at 1 sat/vB.
        assert_eq!(sel.selected.len(), 2);
        assert_eq!(sel.total_sat, 80_000);
        assert_eq!(sel.fee_sat, 436);
        assert_eq!(sel.change_sat, 19_564);
    }

    #[test]
    fn stops_at_first_sufficient_prefix() {
        let utxos = vec![
            make_utxo("small", 0, 1_000),
            make_utxo("large", 0, 100_000),
            make_utxo("medium", 0, 50_000),
        ];
        let sel = select_utxos(&utxos, 10_000, one_sat(), DUST_THRESHOLD_SAT).unwrap();
        // Indexer order, not largest first.
        assert_eq!(sel.selected.len(), 2);
        assert_eq!(sel.selected[0].txid, "small");
        assert_eq!(sel.selected[1].txid, "large");
    }

    #[test]
    fn dust_change_is_folded_into_fee() {
        let fee_one_input = estimate_fee(1, 2, one_sat());
        let spend = 100_000 - fee_one_input - 300;
        let utxos = vec![make_utxo("aaaa", 0, 100_000)];

        let sel = select_utxos(&utxos, spend, one_sat(), DUST_THRESHOLD_SAT).unwrap();
        assert_eq!(sel.change_sat, 0);
        assert_eq!(sel.fee_sat, fee_one_input + 300);
    }

    #[test]
    fn change_at_dust_threshold_is_kept() {
        let fee_one_input = estimate_fee(1, 2, one_sat());
        let spend = 100_000 - fee_one_input - DUST_THRESHOLD_SAT;
        let utxos = vec![make_utxo("aaaa", 0, 100_000)];

        let sel = select_utxos(&utxos, spend, one_sat(), DUST_THRESHOLD_SAT).unwrap();
        assert_eq!(sel.change_sat, DUST_THRESHOLD_SAT);
    }

    #[test]
    fn conservation_holds_across_amounts() {
        let utxos = vec![
            make_utxo("a", 0, 12_345),
            make_utxo("b", 0, 7_000),
            make_utxo("c", 0, 90_001),
            make_utxo("d", 0, 600),
        ];
        let rate = FeeRate::from_sat_per_vb_f64(2.3).unwrap();
        for spend in (1_000..100_000).step_by(977) {
            if let Ok(sel) = select_utxos(&utxos, spend, rate, DUST_THRESHOLD_SAT) {
                assert_eq!(sel.total_sat, sel.spend_sat + sel.fee_sat + sel.change_sat);
                assert!(sel.change_sat == 0 || sel.change_sat >= DUST_THRESHOLD_SAT);
            }
        }
    }

    #[test]
    fn insufficient_funds_reports_exact_amounts() {
        let utxos = vec![make_utxo("aaaa", 0, 50_000), make_utxo("bbbb", 0, 30_000)];
        let err = select_utxos(&utxos, 90_000, one_sat(), DUST_THRESHOLD_SAT).unwrap_err();
        match err {
            BtcError::InsufficientFunds {
                available,
                required,
            } => {
                assert_eq!(available, 80_000);
                assert_eq!(required, 90_436);
            }
            other => panic!("expected InsufficientFunds, got {other:?}"),
        }
    }

    #[test]
    fn spending_just_over_balance_minus_fee_fails() {
        let utxos = vec![make_utxo("aaaa", 0, 50_000), make_utxo("bbbb", 0, 30_000)];
        let max_spend = 80_000 - estimate_fee(2, 2, one_sat());
        assert!(select_utxos(&utxos, max_spend, one_sat(), DUST_THRESHOLD_SAT).is_ok());
        assert!(matches!(
            select_utxos(&utxos, max_spend + 1, one_sat(), DUST_THRESHOLD_SAT),
            Err(BtcError::InsufficientFunds { .. })
        ));
    }

    #[test]
    fn empty_set_is_insufficient() {
        let err = select_utxos(&[], 1_000, one_sat(), DUST_THRESHOLD_SAT).unwrap_err();
        assert!(matches!(
            err,
            BtcError::InsufficientFunds { available: 0, .. }
        ));
    }

    #[test]
    fn zero_spend_rejected() {
        let utxos = vec![make_utxo("aaaa", 0, 50_000)];
        assert!(matches!(
            select_utxos(&utxos, 0, one_sat(), DUST_THRESHOLD_SAT),
            Err(BtcError::InvalidAmount(_))
        ));
    }

    #[test]
    fn summarize_splits_confirmed() {
        let mut pending = make_utxo("cccc", 0, 5_000);
        pending.confirmed = false;
        let utxos = vec![make_utxo("aaaa", 0, 50_000), pending];

        let balance = summarize(&utxos);
        assert_eq!(balance.confirmed_sat, 50_000);
        assert_eq!(balance.unconfirmed_sat, 5_000);
        assert_eq!(balance.total_sat(), 55_000);
    }

    #[test]
    fn spendable_filters_unconfirmed_by_default() {
        let mut pending = make_utxo("cccc", 0, 5_000);
        pending.confirmed = false;
        let utxos = vec![pending, make_utxo("aaaa", 0, 50_000)];

        assert_eq!(spendable(utxos.clone(), false).len(), 1);
        assert_eq!(spendable(utxos, true).len(), 2);
    }
}
