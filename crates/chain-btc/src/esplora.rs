//! Esplora-compatible indexer client.
//!
//! The engine talks to the indexer only through [`UtxoIndexer`], so tests
//! can swap in an in-memory double per network.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use bitcoin::ScriptBuf;
use serde::Deserialize;

use crate::address::parse_address;
use crate::error::BtcError;
use crate::network::BtcNetwork;
use crate::utxo::Utxo;

/// Default timeout for read queries.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for broadcasting a transaction.
pub const DEFAULT_BROADCAST_TIMEOUT: Duration = Duration::from_secs(10);

/// Mined state of a transaction as reported by the indexer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TxStatus {
    pub confirmed: bool,
    #[serde(default)]
    pub block_height: Option<u64>,
    #[serde(default)]
    pub block_hash: Option<String>,
    #[serde(default)]
    pub block_time: Option<u64>,
}

/// One entry of an address's transaction history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxSummary {
    pub txid: String,
    pub confirmed: bool,
    pub block_height: Option<u64>,
    pub block_time: Option<u64>,
    pub fee_sat: Option<u64>,
    /// Net effect on the queried address: received minus spent.
    pub net_sat: i64,
}

/// Read and broadcast access to a UTXO indexer.
#[async_trait]
pub trait UtxoIndexer: Send + Sync {
    /// Unspent outputs of `address`, in indexer order.
    async fn utxos(&self, address: &str) -> Result<Vec<Utxo>, BtcError>;

    /// Fee estimates keyed by confirmation target in blocks, in sat/vB.
    async fn fee_estimates(&self) -> Result<BTreeMap<u16, f64>, BtcError>;

    /// Submit a raw transaction. Returns the txid reported by the indexer.
    async fn broadcast(&self, raw_hex: &str) -> Result<String, BtcError>;

    /// Most recent transactions touching `address`, newest first.
    async fn recent_transactions(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<TxSummary>, BtcError>;

    /// Status of `txid`, or `None` if the indexer does not know it.
    async fn tx_status(&self, txid: &str) -> Result<Option<TxStatus>, BtcError>;
}

/// HTTP client for the Esplora REST API.
#[derive(Debug, Clone)]
pub struct EsploraClient {
    http: reqwest::Client,
    base_url: String,
    network: BtcNetwork,
    query_timeout: Duration,
    broadcast_timeout: Duration,
}

impl EsploraClient {
    pub fn new(base_url: impl Into<String>, network: BtcNetwork) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            network,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            broadcast_timeout: DEFAULT_BROADCAST_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, query: Duration, broadcast: Duration) -> Self {
        self.query_timeout = query;
        self.broadcast_timeout = broadcast;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_text(&self, path: &str) -> Result<(reqwest::StatusCode, String), BtcError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(endpoint = %self.base_url, path, "esplora query");

        let response = self
            .http
            .get(&url)
            .timeout(self.query_timeout)
            .send()
            .await
            .map_err(|e| BtcError::Network(describe_reqwest_error(&e)))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BtcError::Network(describe_reqwest_error(&e)))?;
        Ok((status, body))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, BtcError> {
        let (status, body) = self.get_text(path).await?;
        if !status.is_success() {
            return Err(BtcError::Network(format!("{path} returned HTTP {status}")));
        }
        serde_json::from_str(&body)
            .map_err(|e| BtcError::Network(format!("unexpected response from {path}: {e}")))
    }
}

#[async_trait]
impl UtxoIndexer for EsploraClient {
    async fn utxos(&self, address: &str) -> Result<Vec<Utxo>, BtcError> {
        let script = parse_address(address, self.network)?.script_pubkey();
        let entries: Vec<EsploraUtxo> = self.get_json(&format!("/address/{address}/utxo")).await?;
        Ok(into_utxos(entries, address, &script))
    }

    async fn fee_estimates(&self) -> Result<BTreeMap<u16, f64>, BtcError> {
        let raw: BTreeMap<String, f64> = self.get_json("/fee-estimates").await?;
        Ok(parse_fee_estimates(raw))
    }

    async fn broadcast(&self, raw_hex: &str) -> Result<String, BtcError> {
        let url = format!("{}/tx", self.base_url);
        let response = self
            .http
            .post(&url)
            .timeout(self.broadcast_timeout)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(raw_hex.to_owned())
            .send()
            .await
            .map_err(|e| BtcError::Network(describe_reqwest_error(&e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BtcError::Network(describe_reqwest_error(&e)))?;

        if status.is_success() {
            let txid = body.trim().to_string();
            tracing::info!(network = %self.network, %txid, "transaction accepted by indexer");
            Ok(txid)
        } else if status.is_server_error() {
            Err(BtcError::Network(format!("broadcast returned HTTP {status}")))
        } else {
            tracing::warn!(network = %self.network, %status, "transaction rejected by indexer");
            Err(BtcError::BroadcastRejected(body.trim().to_string()))
        }
    }

    async fn recent_transactions(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<TxSummary>, BtcError> {
        parse_address(address, self.network)?;
        let txs: Vec<EsploraTx> = self.get_json(&format!("/address/{address}/txs")).await?;
        Ok(txs
            .into_iter()
            .take(limit)
            .map(|tx| tx.summarize(address))
            .collect())
    }

    async fn tx_status(&self, txid: &str) -> Result<Option<TxStatus>, BtcError> {
        let (status, body) = self.get_text(&format!("/tx/{txid}/status")).await?;
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::BAD_REQUEST {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(BtcError::Network(format!("tx status returned HTTP {status}")));
        }
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| BtcError::Network(format!("unexpected tx status response: {e}")))
    }
}

fn describe_reqwest_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "request timed out".to_string()
    } else if e.is_connect() {
        "connection failed".to_string()
    } else {
        e.to_string()
    }
}

#[derive(Debug, Deserialize)]
struct EsploraUtxo {
    txid: String,
    vout: u32,
    value: u64,
    status: TxStatus,
}

fn into_utxos(entries: Vec<EsploraUtxo>, owner: &str, script: &ScriptBuf) -> Vec<Utxo> {
    entries
        .into_iter()
        .map(|e| Utxo {
            txid: e.txid,
            vout: e.vout,
            value_sat: e.value,
            owner_address: owner.to_string(),
            script_pubkey: script.to_bytes(),
            confirmed: e.status.confirmed,
        })
        .collect()
}

/// Esplora keys the table by target as a string ("1", "144", ...).
fn parse_fee_estimates(raw: BTreeMap<String, f64>) -> BTreeMap<u16, f64> {
    raw.into_iter()
        .filter_map(|(target, rate)| target.parse::<u16>().ok().map(|t| (t, rate)))
        .collect()
}

#[derive(Debug, Deserialize)]
struct EsploraTx {
    txid: String,
    status: TxStatus,
    #[serde(default)]
    fee: Option<u64>,
    #[serde(default)]
    vin: Vec<EsploraVin>,
    #[serde(default)]
    vout: Vec<EsploraVout>,
}

#[derive(Debug, Deserialize)]
struct EsploraVin {
    #[serde(default)]
    prevout: Option<EsploraVout>,
}

#[derive(Debug, Deserialize)]
struct EsploraVout {
    #[serde(default)]
    scriptpubkey_address: Option<String>,
    value: u64,
}

impl EsploraTx {
    fn summarize(self, address: &str) -> TxSummary {
        let received: u64 = self
            .vout
            .iter()
            .filter(|o| o.scriptpubkey_address.as_deref() == Some(address))
            .map(|o| o.value)
            .sum();
        let spent: u64 = self
            .vin
            .iter()
            .filter_map(|i| i.prevout.as_ref())
            .filter(|o| o.scriptpubkey_address.as_deref() == Some(address))
            .map(|o| o.value)
            .sum();

        TxSummary {
            txid: self.txid,
            confirmed: self.status.confirmed,
            block_height: self.status.block_height,
            block_time: self.status.block_time,
            fee_sat: self.fee,
            net_sat: received as i64 - spent as i64,
        }
    }
}
