use alloy_primitives::U256;
use alloy_rlp::{Encodable, RlpEncodable};
use k256::ecdsa::signature::hazmat::PrehashSigner;
use k256::ecdsa::{RecoveryId, Signature, SigningKey};
use sha3::{Digest, Keccak256};

use crate::address::parse_address;
use crate::erc20;
use crate::error::EthError;
use crate::fee::GasPricing;

/// An unsigned Ethereum transaction. The envelope (legacy or EIP-1559)
/// follows `pricing`.
#[derive(Debug, Clone)]
pub struct EthTransaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub pricing: GasPricing,
    pub gas_limit: u64,
    /// Recipient address as a 0x-prefixed hex string.
    pub to: String,
    /// Transfer value in wei.
    pub value: U256,
    /// Calldata (empty for simple ETH transfers).
    pub data: Vec<u8>,
}

/// A signed Ethereum transaction ready for broadcast.
pub struct SignedEthTransaction {
    /// Raw signed bytes (type-prefixed for EIP-1559).
    pub raw_tx: Vec<u8>,
    /// Transaction hash as a 0x-prefixed hex string.
    pub tx_hash: String,
}

/// Builds an unsigned ETH transfer.
pub fn build_transfer(
    chain_id: u64,
    nonce: u64,
    to: &str,
    value_wei: U256,
    pricing: GasPricing,
    gas_limit: u64,
) -> Result<EthTransaction, EthError> {
    parse_address(to)?;

    Ok(EthTransaction {
        chain_id,
        nonce,
        pricing,
        gas_limit,
        to: to.to_string(),
        value: value_wei,
        data: Vec::new(),
    })
}

/// Builds an unsigned ERC-20 `transfer(to, amount)` call to `token_contract`.
pub fn build_erc20_transfer(
    chain_id: u64,
    nonce: u64,
    token_contract: &str,
    to: &str,
    amount: U256,
    pricing: GasPricing,
    gas_limit: u64,
) -> Result<EthTransaction, EthError> {
    parse_address(token_contract)?;
    let calldata = erc20::encode_transfer(to, amount)?;

    Ok(EthTransaction {
        chain_id,
        nonce,
        pricing,
        gas_limit,
        to: token_contract.to_string(),
        value: U256::ZERO,
        data: calldata,
    })
}

/// Signs a transaction with the given secp256k1 private key.
///
/// Legacy transactions follow EIP-155: the signing payload is
/// `rlp([nonce, gasPrice, gas, to, value, data, chainId, 0, 0])` and
/// `v = chainId * 2 + 35 + y_parity`. EIP-1559 transactions sign
/// `0x02 || rlp(fields)` and carry `y_parity` directly. Either way the
/// signature commits to the chain id.
pub fn sign_transaction(
    tx: &EthTransaction,
    private_key: &[u8; 32],
) -> Result<SignedEthTransaction, EthError> {
    let signing_key = SigningKey::from_bytes(private_key.into())
        .map_err(|_| EthError::InvalidPrivateKey("scalar out of range".into()))?;

    let to = RlpAddress(parse_address(&tx.to)?);
    let value = RlpU256::from(tx.value);
    let data = RlpBytes(tx.data.clone());

    let raw_tx = match tx.pricing {
        GasPricing::Legacy { gas_price } => {
            let unsigned = LegacyUnsignedFields {
                nonce: tx.nonce,
                gas_price,
                gas_limit: tx.gas_limit,
                to: to.clone(),
                value: value.clone(),
                data: data.clone(),
                chain_id: tx.chain_id,
                empty_r: 0,
                empty_s: 0,
            };
            let mut payload = Vec::new();
            unsigned.encode(&mut payload);

            let (r, s, y_parity) = sign_hash(&signing_key, &payload)?;
            let v = tx
                .chain_id
                .checked_mul(2)
                .and_then(|v| v.checked_add(35 + y_parity as u64))
                .ok_or_else(|| EthError::SigningError("chain id too large for EIP-155".into()))?;

            let signed = LegacySignedFields {
                nonce: tx.nonce,
                gas_price,
                gas_limit: tx.gas_limit,
                to,
                value,
                data,
                v,
                r,
                s,
            };
            let mut raw = Vec::new();
            signed.encode(&mut raw);
            raw
        }
        GasPricing::Eip1559 {
            max_fee_per_gas,
            max_priority_fee_per_gas,
        } => {
            let payload = encode_unsigned_1559(tx, max_fee_per_gas, max_priority_fee_per_gas)?;
            let (r, s, y_parity) = sign_hash(&signing_key, &payload)?;

            let signed = Eip1559SignedFields {
                chain_id: tx.chain_id,
                nonce: tx.nonce,
                max_priority_fee_per_gas,
                max_fee_per_gas,
                gas_limit: tx.gas_limit,
                to,
                value,
                data,
                access_list: Vec::new(),
                signature_y_parity: y_parity,
                signature_r: r,
                signature_s: s,
            };
            let mut rlp_buf = Vec::new();
            signed.encode(&mut rlp_buf);

            let mut raw = Vec::with_capacity(1 + rlp_buf.len());
            raw.push(0x02);
            raw.extend_from_slice(&rlp_buf);
            raw
        }
    };

    let tx_hash = format!("0x{}", hex::encode(Keccak256::digest(&raw_tx)));
    Ok(SignedEthTransaction { raw_tx, tx_hash })
}

/// Encodes the unsigned EIP-1559 payload `0x02 || rlp(fields)`.
fn encode_unsigned_1559(
    tx: &EthTransaction,
    max_fee_per_gas: u128,
    max_priority_fee_per_gas: u128,
) -> Result<Vec<u8>, EthError> {
    let unsigned_fields = Eip1559UnsignedFields {
        chain_id: tx.chain_id,
        nonce: tx.nonce,
        max_priority_fee_per_gas,
        max_fee_per_gas,
        gas_limit: tx.gas_limit,
        to: RlpAddress(parse_address(&tx.to)?),
        value: RlpU256::from(tx.value),
        data: RlpBytes(tx.data.clone()),
        access_list: Vec::new(),
    };

    let mut rlp_buf = Vec::new();
    unsigned_fields.encode(&mut rlp_buf);

    let mut payload = Vec::with_capacity(1 + rlp_buf.len());
    payload.push(0x02);
    payload.extend_from_slice(&rlp_buf);
    Ok(payload)
}

/// Keccak-256 the payload and sign the digest. Returns `(r, s, y_parity)`.
fn sign_hash(signing_key: &SigningKey, payload: &[u8]) -> Result<(RlpU256, RlpU256, u8), EthError> {
    let msg_hash = Keccak256::digest(payload);
    let (signature, recovery_id): (Signature, RecoveryId) = signing_key
        .sign_prehash(msg_hash.as_slice())
        .map_err(|e| EthError::SigningError(e.to_string()))?;

    let mut r_bytes = [0u8; 32];
    let mut s_bytes = [0u8; 32];
    r_bytes.copy_from_slice(&signature.r().to_bytes());
    s_bytes.copy_from_slice(&signature.s().to_bytes());

    Ok((
        r_bytes.into(),
        s_bytes.into(),
        recovery_id.is_y_odd() as u8,
    ))
}

// ---------------------------------------------------------------------------
// RLP-encodable structures
// ---------------------------------------------------------------------------

#[derive(RlpEncodable)]
struct LegacyUnsignedFields {
    nonce: u64,
    gas_price: u128,
    gas_limit: u64,
    to: RlpAddress,
    value: RlpU256,
    data: RlpBytes,
    chain_id: u64,
    empty_r: u8,
    empty_s: u8,
}

#[derive(RlpEncodable)]
struct LegacySignedFields {
    nonce: u64,
    gas_price: u128,
    gas_limit: u64,
    to: RlpAddress,
    value: RlpU256,
    data: RlpBytes,
    v: u64,
    r: RlpU256,
    s: RlpU256,
}

#[derive(RlpEncodable)]
struct Eip1559UnsignedFields {
    chain_id: u64,
    nonce: u64,
    max_priority_fee_per_gas: u128,
    max_fee_per_gas: u128,
    gas_limit: u64,
    to: RlpAddress,
    value: RlpU256,
    data: RlpBytes,
    access_list: Vec<AccessListItem>,
}

#[derive(RlpEncodable)]
struct Eip1559SignedFields {
    chain_id: u64,
    nonce: u64,
    max_priority_fee_per_gas: u128,
    max_fee_per_gas: u128,
    gas_limit: u64,
    to: RlpAddress,
    value: RlpU256,
    data: RlpBytes,
    access_list: Vec<AccessListItem>,
    signature_y_parity: u8,
    signature_r: RlpU256,
    signature_s: RlpU256,
}

/// An EIP-2930 access list entry (always empty here).
#[derive(Debug, Clone, RlpEncodable)]
struct AccessListItem {
    address: RlpAddress,
    storage_keys: Vec<RlpFixedBytes<32>>,
}

/// A 20-byte address encoded as an RLP string.
#[derive(Debug, Clone)]
struct RlpAddress([u8; 20]);

impl Encodable for RlpAddress {
    fn encode(&self, out: &mut dyn alloy_rlp::BufMut) {
        self.0.as_slice().encode(out);
    }

    fn length(&self) -> usize {
        self.0.as_slice().length()
    }
}

/// Arbitrary calldata encoded as an RLP string (not a list of bytes).
#[derive(Debug, Clone)]
struct RlpBytes(Vec<u8>);

impl Encodable for RlpBytes {
    fn encode(&self, out: &mut dyn alloy_rlp::BufMut) {
        self.0.as_slice().encode(out);
    }

    fn length(&self) -> usize {
        self.0.as_slice().length()
    }
}

/// A 256-bit integer encoded as minimal big-endian bytes (leading zeros
/// stripped), the standard RLP integer encoding.
#[derive(Debug, Clone)]
struct RlpU256([u8; 32]);

impl RlpU256 {
    fn trimmed(&self) -> &[u8] {
        let start = self.0.iter().position(|&b| b != 0).unwrap_or(32);
        &self.0[start..]
    }
}

impl From<[u8; 32]> for RlpU256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl From<U256> for RlpU256 {
    fn from(value: U256) -> Self {
        Self(value.to_be_bytes::<32>())
    }
}

impl Encodable for RlpU256 {
    fn encode(&self, out: &mut dyn alloy_rlp::BufMut) {
        self.trimmed().encode(out);
    }

    fn length(&self) -> usize {
        self.trimmed().length()
    }
}

#[derive(Debug, Clone)]
struct RlpFixedBytes<const N: usize>([u8; N]);

impl<const N: usize> Encodable for RlpFixedBytes<N> {
    fn encode(&self, out: &mut dyn alloy_rlp::BufMut) {
        self.0.as_slice().encode(out);
    }

    fn length(&self) -> usize {
        self.0.as_slice().length()
    }
}
