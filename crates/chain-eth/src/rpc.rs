//! JSON-RPC transport.
//!
//! [`JsonRpcTransport`] is the only seam between the provider layer and the
//! network; tests replace it with a scripted in-memory double.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EthError;

/// Default timeout for read calls.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for `eth_sendRawTransaction`.
pub const DEFAULT_BROADCAST_TIMEOUT: Duration = Duration::from_secs(10);

/// Sends one JSON-RPC call to one endpoint and returns its `result`.
#[async_trait]
pub trait JsonRpcTransport: Send + Sync {
    async fn call(&self, endpoint: &str, method: &str, params: Value) -> Result<Value, EthError>;
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// HTTP JSON-RPC transport over `reqwest`.
#[derive(Debug)]
pub struct HttpTransport {
    http: reqwest::Client,
    query_timeout: Duration,
    broadcast_timeout: Duration,
    next_id: AtomicU64,
}

impl HttpTransport {
    pub fn new(query_timeout: Duration, broadcast_timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            query_timeout,
            broadcast_timeout,
            next_id: AtomicU64::new(1),
        }
    }

    fn timeout_for(&self, method: &str) -> Duration {
        if method == "eth_sendRawTransaction" {
            self.broadcast_timeout
        } else {
            self.query_timeout
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(DEFAULT_QUERY_TIMEOUT, DEFAULT_BROADCAST_TIMEOUT)
    }
}

#[async_trait]
impl JsonRpcTransport for HttpTransport {
    async fn call(&self, endpoint: &str, method: &str, params: Value) -> Result<Value, EthError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let response = self
            .http
            .post(endpoint)
            .timeout(self.timeout_for(method))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                EthError::Transport(if e.is_timeout() {
                    format!("{method} timed out")
                } else {
                    format!("{method} request failed: {e}")
                })
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(EthError::Transport(format!("{method} returned HTTP {status}")));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| EthError::Transport(format!("{method} returned malformed JSON: {e}")))?;

        into_result(body)
    }
}

fn into_result(body: RpcResponse) -> Result<Value, EthError> {
    if let Some(err) = body.error {
        return Err(EthError::Rpc {
            code: err.code,
            message: err.message,
        });
    }
    Ok(body.result.unwrap_or(Value::Null))
}
