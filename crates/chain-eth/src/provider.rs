//! Ordered RPC provider pool with liveness probing.
//!
//! [`ProviderPool::connect`] walks the endpoint list in order and probes each
//! with `eth_blockNumber`. The first endpoint that answers becomes the
//! [`LiveProvider`] for the rest of the operation; no further switching
//! happens mid-operation.

use std::sync::Arc;

use alloy_primitives::U256;
use serde_json::{json, Value};

use crate::erc20;
use crate::error::EthError;
use crate::networks::EthNetwork;
use crate::rpc::JsonRpcTransport;

/// Ordered list of RPC endpoints for one network.
#[derive(Clone)]
pub struct ProviderPool {
    network: EthNetwork,
    endpoints: Vec<String>,
    transport: Arc<dyn JsonRpcTransport>,
}

impl ProviderPool {
    pub fn new(
        network: EthNetwork,
        endpoints: Vec<String>,
        transport: Arc<dyn JsonRpcTransport>,
    ) -> Self {
        Self {
            network,
            endpoints,
            transport,
        }
    }

    pub fn network(&self) -> EthNetwork {
        self.network
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// Return a provider bound to the first endpoint that passes the probe.
    pub async fn connect(&self) -> Result<LiveProvider, EthError> {
        for endpoint in &self.endpoints {
            let probe = self
                .transport
                .call(endpoint, "eth_blockNumber", json!([]))
                .await
                .and_then(|v| parse_u64(&v));

            match probe {
                Ok(block_number) => {
                    tracing::debug!(network = %self.network, %endpoint, block_number, "rpc endpoint live");
                    return Ok(LiveProvider {
                        network: self.network,
                        endpoint: endpoint.clone(),
                        block_number,
                        transport: Arc::clone(&self.transport),
                    });
                }
                Err(e) => {
                    tracing::warn!(network = %self.network, %endpoint, error = %e, "rpc endpoint failed liveness probe");
                }
            }
        }

        tracing::error!(network = %self.network, tried = self.endpoints.len(), "all rpc endpoints down");
        Err(EthError::NoLiveProvider {
            tried: self.endpoints.len(),
        })
    }
}

impl std::fmt::Debug for ProviderPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderPool")
            .field("network", &self.network)
            .field("endpoints", &self.endpoints)
            .finish_non_exhaustive()
    }
}

/// Mined receipt of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: String,
    pub block_number: Option<u64>,
    /// `Some(true)` on success, `Some(false)` if the transaction reverted.
    pub status: Option<bool>,
    pub gas_used: Option<u128>,
    pub effective_gas_price: Option<u128>,
}

/// A single endpoint that answered the liveness probe.
#[derive(Clone)]
pub struct LiveProvider {
    network: EthNetwork,
    endpoint: String,
    block_number: u64,
    transport: Arc<dyn JsonRpcTransport>,
}

impl LiveProvider {
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn network(&self) -> EthNetwork {
        self.network
    }

    /// Chain head observed by the liveness probe.
    pub fn block_number(&self) -> u64 {
        self.block_number
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, EthError> {
        tracing::trace!(endpoint = %self.endpoint, method, "rpc call");
        self.transport.call(&self.endpoint, method, params).await
    }

    /// Native balance in wei.
    pub async fn native_balance(&self, address: &str) -> Result<U256, EthError> {
        let v = self.request("eth_getBalance", json!([address, "latest"])).await?;
        parse_u256(&v)
    }

    /// Read-only contract call against the latest block.
    pub async fn call(&self, to: &str, data: &[u8]) -> Result<Vec<u8>, EthError> {
        let tx = json!({ "to": to, "data": format!("0x{}", hex::encode(data)) });
        let v = self.request("eth_call", json!([tx, "latest"])).await?;
        parse_bytes(&v)
    }

    /// ERC-20 `balanceOf(owner)` in token base units.
    pub async fn token_balance(&self, contract: &str, owner: &str) -> Result<U256, EthError> {
        let data = erc20::encode_balance_of(owner)?;
        erc20::decode_balance(&self.call(contract, &data).await?)
    }

    /// ERC-20 `decimals()`.
    pub async fn token_decimals(&self, contract: &str) -> Result<u8, EthError> {
        erc20::decode_decimals(&self.call(contract, &erc20::encode_decimals()).await?)
    }

    /// `decimals()`, or `fallback` if the call fails.
    pub async fn token_decimals_or(&self, contract: &str, fallback: u8) -> u8 {
        match self.token_decimals(contract).await {
            Ok(decimals) => decimals,
            Err(e) => {
                tracing::warn!(%contract, fallback, error = %e, "decimals() failed, using fallback");
                fallback
            }
        }
    }

    /// `eth_gasPrice` in wei.
    pub async fn gas_price(&self) -> Result<u128, EthError> {
        parse_u128(&self.request("eth_gasPrice", json!([])).await?)
    }

    /// `baseFeePerGas` of the latest block; `None` before London.
    pub async fn base_fee(&self) -> Result<Option<u128>, EthError> {
        let block = self
            .request("eth_getBlockByNumber", json!(["latest", false]))
            .await?;
        match block.get("baseFeePerGas") {
            Some(v) if !v.is_null() => parse_u128(v).map(Some),
            _ => Ok(None),
        }
    }

    /// `eth_maxPriorityFeePerGas` in wei.
    pub async fn max_priority_fee(&self) -> Result<u128, EthError> {
        parse_u128(&self.request("eth_maxPriorityFeePerGas", json!([])).await?)
    }

    /// Next nonce for `address`, counting pending transactions.
    pub async fn nonce(&self, address: &str) -> Result<u64, EthError> {
        parse_u64(
            &self
                .request("eth_getTransactionCount", json!([address, "pending"]))
                .await?,
        )
    }

    /// Submit a signed transaction. A node-side rejection becomes
    /// [`EthError::BroadcastRejected`].
    pub async fn send_raw_transaction(&self, raw_tx: &[u8]) -> Result<String, EthError> {
        let raw_hex = format!("0x{}", hex::encode(raw_tx));
        match self.request("eth_sendRawTransaction", json!([raw_hex])).await {
            Ok(v) => v
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| EthError::EncodingError("tx hash is not a string".into())),
            Err(EthError::Rpc { message, .. }) => Err(EthError::BroadcastRejected(message)),
            Err(e) => Err(e),
        }
    }

    /// Receipt for `tx_hash`, or `None` while it is pending or unknown.
    pub async fn receipt(&self, tx_hash: &str) -> Result<Option<Receipt>, EthError> {
        let v = self
            .request("eth_getTransactionReceipt", json!([tx_hash]))
            .await?;
        if v.is_null() {
            return Ok(None);
        }

        let opt = |field: &str| v.get(field).filter(|f| !f.is_null());
        Ok(Some(Receipt {
            tx_hash: tx_hash.to_string(),
            block_number: opt("blockNumber").map(parse_u64).transpose()?,
            status: opt("status").map(parse_u64).transpose()?.map(|s| s == 1),
            gas_used: opt("gasUsed").map(parse_u128).transpose()?,
            effective_gas_price: opt("effectiveGasPrice").map(parse_u128).transpose()?,
        }))
    }
}

impl std::fmt::Debug for LiveProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveProvider")
            .field("network", &self.network)
            .field("endpoint", &self.endpoint)
            .field("block_number", &self.block_number)
            .finish_non_exhaustive()
    }
}

fn quantity(v: &Value) -> Result<&str, EthError> {
    let s = v
        .as_str()
        .ok_or_else(|| EthError::EncodingError(format!("expected hex quantity, got {v}")))?;
    let body = s
        .strip_prefix("0x")
        .ok_or_else(|| EthError::EncodingError(format!("quantity {s} lacks 0x prefix")))?;
    Ok(if body.is_empty() { "0" } else { body })
}

fn parse_u64(v: &Value) -> Result<u64, EthError> {
    let q = quantity(v)?;
    u64::from_str_radix(q, 16).map_err(|e| EthError::EncodingError(format!("bad u64 {q}: {e}")))
}

fn parse_u128(v: &Value) -> Result<u128, EthError> {
    let q = quantity(v)?;
    u128::from_str_radix(q, 16).map_err(|e| EthError::EncodingError(format!("bad u128 {q}: {e}")))
}

fn parse_u256(v: &Value) -> Result<U256, EthError> {
    let q = quantity(v)?;
    U256::from_str_radix(q, 16).map_err(|e| EthError::EncodingError(format!("bad u256 {q}: {e}")))
}

fn parse_bytes(v: &Value) -> Result<Vec<u8>, EthError> {
    let s = v
        .as_str()
        .ok_or_else(|| EthError::EncodingError(format!("expected hex data, got {v}")))?;
    hex::decode(s.strip_prefix("0x").unwrap_or(s))
        .map_err(|e| EthError::EncodingError(format!("bad hex data: {e}")))
}
