#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chain_btc::{BtcError, TxStatus, TxSummary, Utxo, UtxoIndexer};
use chain_eth::{EthError, JsonRpcTransport, ProviderPool};
use serde_json::{json, Value};
use wallet_engine::{ChainKind, Network, SendRequest};

pub const KEY_ONE: &str = "0000000000000000000000000000000000000000000000000000000000000001";
pub const KEY_TWO: &str = "0000000000000000000000000000000000000000000000000000000000000002";
pub const ETH_RECIPIENT: &str = "0x000000000000000000000000000000000000dEaD";
pub const BTC_TESTNET_RECIPIENT: &str = "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx";

/// In-memory Esplora stand-in. Outputs spent by a broadcast disappear
/// from later `utxos()` answers.
#[derive(Default)]
pub struct MemoryIndexer {
    pub utxos: Vec<Utxo>,
    /// Latency of every `utxos()` call.
    pub utxo_delay: Option<Duration>,
    /// `None` simulates a fee endpoint outage.
    pub fee_estimates: Option<BTreeMap<u16, f64>>,
    pub history: Vec<TxSummary>,
    pub status: Option<TxStatus>,
    pub history_fails: bool,
    pub broadcasts: Mutex<Vec<String>>,
    pub spent: Mutex<HashSet<(String, u32)>>,
}

impl MemoryIndexer {
    pub fn broadcasts(&self) -> Vec<String> {
        self.broadcasts.lock().unwrap().clone()
    }

    /// Every input of every broadcast, in order, duplicates kept.
    pub fn spent_inputs(&self) -> Vec<(String, u32)> {
        self.broadcasts()
            .iter()
            .flat_map(|raw| decode_tx(raw).input)
            .map(|i| (i.previous_output.txid.to_string(), i.previous_output.vout))
            .collect()
    }
}

pub fn decode_tx(raw_hex: &str) -> bitcoin::Transaction {
    bitcoin::consensus::deserialize(&hex::decode(raw_hex).unwrap()).unwrap()
}

#[async_trait]
impl UtxoIndexer for MemoryIndexer {
    async fn utxos(&self, _address: &str) -> Result<Vec<Utxo>, BtcError> {
        if let Some(delay) = self.utxo_delay {
            tokio::time::sleep(delay).await;
        }
        let spent = self.spent.lock().unwrap();
        Ok(self
            .utxos
            .iter()
            .filter(|u| !spent.contains(&(u.txid.clone(), u.vout)))
            .cloned()
            .collect())
    }

    async fn fee_estimates(&self) -> Result<BTreeMap<u16, f64>, BtcError> {
        self.fee_estimates
            .clone()
            .ok_or_else(|| BtcError::Network("fee endpoint timed out".into()))
    }

    async fn broadcast(&self, raw_hex: &str) -> Result<String, BtcError> {
        self.broadcasts.lock().unwrap().push(raw_hex.to_string());
        let bytes = hex::decode(raw_hex).map_err(|e| BtcError::BroadcastRejected(e.to_string()))?;
        let tx: bitcoin::Transaction = bitcoin::consensus::deserialize(&bytes)
            .map_err(|e| BtcError::BroadcastRejected(e.to_string()))?;
        let mut spent = self.spent.lock().unwrap();
        for input in &tx.input {
            spent.insert((input.previous_output.txid.to_string(), input.previous_output.vout));
        }
        Ok(tx.compute_txid().to_string())
    }

    async fn recent_transactions(
        &self,
        _address: &str,
        limit: usize,
    ) -> Result<Vec<TxSummary>, BtcError> {
        if self.history_fails {
            return Err(BtcError::Network("history endpoint timed out".into()));
        }
        Ok(self.history.iter().take(limit).cloned().collect())
    }

    async fn tx_status(&self, _txid: &str) -> Result<Option<TxStatus>, BtcError> {
        Ok(self.status.clone())
    }
}

/// A confirmed output locked to `address`.
pub fn utxo_for(address: &str, network: Network, vout: u32, value_sat: u64) -> Utxo {
    let script = chain_btc::address::parse_address(address, network.btc())
        .unwrap()
        .script_pubkey();
    Utxo {
        txid: format!("{:064x}", u64::from(vout) + 1),
        vout,
        value_sat,
        owner_address: address.to_string(),
        script_pubkey: script.to_bytes(),
        confirmed: true,
    }
}

type Handler = dyn Fn(&str, &str, &Value) -> Result<Value, EthError> + Send + Sync;

/// JSON-RPC transport answering from a closure and recording every call
/// as `endpoint method`.
pub struct MockRpc {
    handler: Box<Handler>,
    calls: Mutex<Vec<String>>,
    latency: Option<Duration>,
}

impl MockRpc {
    pub fn new(
        handler: impl Fn(&str, &str, &Value) -> Result<Value, EthError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
            latency: None,
        })
    }

    /// Like [`MockRpc::new`], but every call yields for `latency` first.
    pub fn slow(
        handler: impl Fn(&str, &str, &Value) -> Result<Value, EthError> + Send + Sync + 'static,
        latency: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
            latency: Some(latency),
        })
    }

    pub fn methods(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.split(' ').nth(1).unwrap_or_default().to_string())
            .collect()
    }

    pub fn endpoints(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.split(' ').next().unwrap_or_default().to_string())
            .collect()
    }
}

#[async_trait]
impl JsonRpcTransport for MockRpc {
    async fn call(&self, endpoint: &str, method: &str, params: Value) -> Result<Value, EthError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.calls.lock().unwrap().push(format!("{endpoint} {method}"));
        (self.handler)(endpoint, method, &params)
    }
}

/// A healthy Sepolia-like node.
///
/// `ether_wei` and `token_units` are the balances it reports;
/// `gas_fails` makes every fee-data method fail.
pub fn node(
    ether_wei: u128,
    token_units: u128,
    gas_fails: bool,
) -> impl Fn(&str, &str, &Value) -> Result<Value, EthError> + Send + Sync + 'static {
    move |_endpoint: &str, method: &str, params: &Value| match method {
        "eth_blockNumber" => Ok(json!("0x10")),
        "eth_getBalance" => Ok(json!(format!("0x{ether_wei:x}"))),
        "eth_call" => {
            let data = params[0]["data"].as_str().unwrap_or_default();
            if data.starts_with("0x313ce567") {
                Ok(json!(format!("0x{:064x}", 6)))
            } else {
                Ok(json!(format!("0x{token_units:064x}")))
            }
        }
        "eth_getBlockByNumber" | "eth_gasPrice" | "eth_maxPriorityFeePerGas" if gas_fails => {
            Err(EthError::Transport("fee data timed out".into()))
        }
        "eth_getBlockByNumber" => Ok(json!({ "number": "0x10", "baseFeePerGas": "0x3b9aca00" })),
        "eth_maxPriorityFeePerGas" => Ok(json!("0x3b9aca00")),
        "eth_gasPrice" => Ok(json!("0x4a817c800")),
        "eth_getTransactionCount" => Ok(json!("0x7")),
        "eth_sendRawTransaction" => Ok(json!(format!("0x{}", "ab".repeat(32)))),
        "eth_getTransactionReceipt" => Ok(Value::Null),
        other => Err(EthError::Rpc {
            code: -32601,
            message: format!("method {other} not found"),
        }),
    }
}

pub fn pool(rpc: Arc<MockRpc>, endpoints: &[&str]) -> ProviderPool {
    ProviderPool::new(
        Network::Testnet.eth(),
        endpoints.iter().map(|e| e.to_string()).collect(),
        rpc,
    )
}

pub fn request(chain: ChainKind, key: &str, to: &str, amount: &str) -> SendRequest {
    SendRequest {
        chain,
        network: Network::Testnet,
        sender_private_key: key.to_string().into(),
        sender_address: None,
        to_address: to.into(),
        amount: amount.into(),
        fee_hint: None,
    }
}
