use bitcoin::absolute::LockTime;
use bitcoin::address::Address;
use bitcoin::hashes::Hash;
use bitcoin::script::{Builder, PushBytesBuf, ScriptBuf};
use bitcoin::secp256k1::{Message, Secp256k1};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::transaction::Version;
use bitcoin::{Amount, OutPoint, Sequence, Transaction, TxIn, TxOut, Txid, Witness};

use crate::error::BtcError;
use crate::keys::BtcKey;
use crate::utxo::CoinSelection;

/// An unsigned Bitcoin transaction ready for signing.
#[derive(Debug, Clone)]
pub struct UnsignedBtcTx {
    /// The bitcoin transaction with empty scriptSigs and witnesses.
    pub tx: Transaction,
    /// The UTXOs being spent (in the same order as the transaction inputs).
    /// Needed for computing sighashes during signing.
    pub prevouts: Vec<TxOut>,
    pub fee_sat: u64,
    pub change_sat: u64,
}

/// A fully signed transaction.
#[derive(Debug, Clone)]
pub struct SignedBtcTx {
    pub tx: Transaction,
    pub raw_hex: String,
    pub txid: String,
    pub fee_sat: u64,
}

/// Build an unsigned transaction from a coin selection.
///
/// Output 0 pays `recipient`; output 1, present only when the selection
/// carries change, returns it to `change_address`. Fails if the inputs do
/// not balance outputs plus fee to the satoshi.
pub fn build_transaction(
    selection: &CoinSelection,
    recipient: &Address,
    change_address: &Address,
) -> Result<UnsignedBtcTx, BtcError> {
    let mut inputs = Vec::with_capacity(selection.selected.len());
    let mut prevouts = Vec::with_capacity(selection.selected.len());

    for utxo in &selection.selected {
        let txid: Txid = utxo
            .txid
            .parse()
            .map_err(|e| BtcError::TransactionBuildError(format!("invalid txid: {e}")))?;

        inputs.push(TxIn {
            previous_output: OutPoint::new(txid, utxo.vout),
            script_sig: ScriptBuf::new(),
            sequence: Sequence::ENABLE_RBF_NO_LOCKTIME,
            witness: Witness::default(),
        });

        prevouts.push(TxOut {
            value: Amount::from_sat(utxo.value_sat),
            script_pubkey: ScriptBuf::from(utxo.script_pubkey.clone()),
        });
    }

    let mut outputs = vec![TxOut {
        value: Amount::from_sat(selection.spend_sat),
        script_pubkey: recipient.script_pubkey(),
    }];
    if selection.change_sat > 0 {
        outputs.push(TxOut {
            value: Amount::from_sat(selection.change_sat),
            script_pubkey: change_address.script_pubkey(),
        });
    }

    let in_sum: u64 = prevouts.iter().map(|o| o.value.to_sat()).sum();
    let out_sum: u64 = outputs.iter().map(|o| o.value.to_sat()).sum();
    if in_sum != out_sum + selection.fee_sat {
        return Err(BtcError::TransactionBuildError(format!(
            "inputs {in_sum} sat do not equal outputs {out_sum} sat + fee {} sat",
            selection.fee_sat
        )));
    }

    let tx = Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: inputs,
        output: outputs,
    };

    Ok(UnsignedBtcTx {
        tx,
        prevouts,
        fee_sat: selection.fee_sat,
        change_sat: selection.change_sat,
    })
}

/// Sign every input with `key`.
///
/// P2PKH prevouts are signed with the legacy sighash and get a scriptSig;
/// P2WPKH prevouts are signed per BIP-143 and get a witness. Any other
/// script, or a prevout not locked to `key`, is a signing error. The
/// result is checked to be fully signed before it is returned.
pub fn sign_transaction(unsigned: &UnsignedBtcTx, key: &BtcKey) -> Result<SignedBtcTx, BtcError> {
    if unsigned.prevouts.len() != unsigned.tx.input.len() {
        return Err(BtcError::SigningError(
            "prevout count does not match input count".into(),
        ));
    }

    let secp = Secp256k1::signing_only();
    let p2pkh_script = key.p2pkh_script();
    let p2wpkh_script = key.p2wpkh_script();

    let mut signed_tx = unsigned.tx.clone();
    let mut sighash_cache = SighashCache::new(&unsigned.tx);

    for (index, prevout) in unsigned.prevouts.iter().enumerate() {
        let script = &prevout.script_pubkey;

        if script.is_p2pkh() {
            if *script != p2pkh_script {
                return Err(not_our_input(index));
            }
            let sighash = sighash_cache
                .legacy_signature_hash(index, script, EcdsaSighashType::All.to_u32())
                .map_err(|e| BtcError::SigningError(format!("sighash computation failed: {e}")))?;

            let msg = Message::from_digest(sighash.to_byte_array());
            let sig_bytes = der_with_sighash(secp.sign_ecdsa(&msg, key.secret_key()));

            let push = PushBytesBuf::try_from(sig_bytes)
                .map_err(|e| BtcError::SigningError(format!("signature push failed: {e}")))?;
            signed_tx.input[index].script_sig = Builder::new()
                .push_slice(push)
                .push_key(key.public_key())
                .into_script();
        } else if script.is_p2wpkh() {
            if p2wpkh_script.as_ref() != Some(script) {
                return Err(not_our_input(index));
            }
            let sighash = sighash_cache
                .p2wpkh_signature_hash(index, script, prevout.value, EcdsaSighashType::All)
                .map_err(|e| BtcError::SigningError(format!("sighash computation failed: {e}")))?;

            let msg = Message::from_digest(sighash.to_byte_array());
            let sig_bytes = der_with_sighash(secp.sign_ecdsa(&msg, key.secret_key()));

            // Witness: [signature, pubkey].
            let mut witness = Witness::new();
            witness.push(&sig_bytes);
            witness.push(key.public_key().to_bytes());
            signed_tx.input[index].witness = witness;
        } else {
            return Err(BtcError::SigningError(format!(
                "input {index} has an unsupported script type"
            )));
        }
    }

    ensure_fully_signed(&signed_tx)?;

    Ok(SignedBtcTx {
        raw_hex: bitcoin::consensus::encode::serialize_hex(&signed_tx),
        txid: signed_tx.compute_txid().to_string(),
        fee_sat: unsigned.fee_sat,
        tx: signed_tx,
    })
}

/// Every input must carry a scriptSig or a witness.
pub fn ensure_fully_signed(tx: &Transaction) -> Result<(), BtcError> {
    match tx
        .input
        .iter()
        .position(|input| input.script_sig.is_empty() && input.witness.is_empty())
    {
        Some(index) => Err(BtcError::SigningError(format!("input {index} is unsigned"))),
        None => Ok(()),
    }
}

fn der_with_sighash(signature: bitcoin::secp256k1::ecdsa::Signature) -> Vec<u8> {
    let mut sig_bytes = signature.serialize_der().to_vec();
    sig_bytes.push(EcdsaSighashType::All as u8);
    sig_bytes
}

fn not_our_input(index: usize) -> BtcError {
    BtcError::SigningError(format!("input {index} is not locked to the signing key"))
}
