/// ETC node RPC client
///
/// JSON-RPC 2.0 over HTTP with a request timeout and a circuit breaker
/// that pauses calls after repeated transport failures.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{body::Buf, Method, Request};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use etc_core::consensus;

use crate::metrics::prometheus as metrics;

/// `eth_getWork` reply: header fingerprint, seed hash and boundary target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Work {
    pub header: String,
    pub seed: String,
    pub target: String,
}

/// Number and difficulty of the node's pending block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingBlock {
    pub number: u64,
    pub difficulty: BigUint,
}

/// The chain-node collaborator.
#[async_trait]
pub trait NodeClient: Send + Sync {
    async fn get_work(&self) -> Result<Work>;

    async fn get_pending_block(&self) -> Result<PendingBlock>;

    /// Forward `[nonce, header, mix]` verbatim; `Ok(false)` is a node rejection.
    async fn submit_work(&self, params: &[String]) -> Result<bool>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    pub params: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    pub result: Option<Value>,
    pub error: Option<Value>,
}

#[derive(Debug, Clone)]
struct CircuitBreaker {
    failures: u32,
    last_failure: Option<Instant>,
    is_open: bool,
    max_failures: u32,
    reset_timeout: Duration,
}

impl CircuitBreaker {
    fn new() -> Self {
        Self {
            failures: 0,
            last_failure: None,
            is_open: false,
            max_failures: 5,
            reset_timeout: Duration::from_secs(60),
        }
    }

    fn record_failure(&mut self) {
        self.failures += 1;
        self.last_failure = Some(Instant::now());

        if self.failures >= self.max_failures && !self.is_open {
            self.is_open = true;
            tracing::error!(
                "Node RPC circuit breaker open after {} failures, pausing for {}s",
                self.failures,
                self.reset_timeout.as_secs()
            );
        }
    }

    fn record_success(&mut self) {
        if self.failures > 0 {
            self.failures = 0;
            tracing::info!("Node RPC circuit breaker reset");
        }
    }

    fn check(&mut self) -> Result<()> {
        if self.is_open {
            if let Some(last_fail) = self.last_failure {
                if last_fail.elapsed() > self.reset_timeout {
                    tracing::info!("Node RPC circuit breaker half-open, retrying");
                    self.is_open = false;
                    self.failures = 0;
                } else {
                    return Err(anyhow!("node RPC circuit breaker is open"));
                }
            }
        }
        Ok(())
    }
}

pub struct EtcRpcClient {
    url: String,
    timeout: Duration,
    client: Client<HttpConnector, Full<Bytes>>,
    circuit_breaker: Arc<RwLock<CircuitBreaker>>,
}

impl EtcRpcClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let url = url.into();
        let client = Client::builder(hyper_util::rt::TokioExecutor::new()).build_http();

        tracing::info!("EtcRpcClient initialized: {}", url);

        Self {
            url,
            timeout,
            client,
            circuit_breaker: Arc::new(RwLock::new(CircuitBreaker::new())),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Make a JSON-RPC call; JSON-RPC error objects do not trip the breaker.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        metrics::inc_rpc_requests();

        let res = self.call_inner(method, params).await;
        if res.is_err() {
            metrics::inc_rpc_errors();
        }
        res
    }

    async fn call_inner(&self, method: &str, params: Value) -> Result<Value> {
        self.circuit_breaker.write().await.check()?;

        let payload = RpcRequest {
            jsonrpc: "2.0".to_string(),
            id: 0,
            method: method.to_string(),
            params,
        };
        let body = Full::new(Bytes::from(serde_json::to_vec(&payload)?));

        let req = Request::builder()
            .method(Method::POST)
            .uri(&self.url)
            .header("Content-Type", "application/json")
            .body(body)?;

        let response = match tokio::time::timeout(self.timeout, self.client.request(req)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                self.circuit_breaker.write().await.record_failure();
                return Err(anyhow!("{} connection failed: {}", method, e));
            }
            Err(_) => {
                self.circuit_breaker.write().await.record_failure();
                return Err(anyhow!("{} timed out after {:?}", method, self.timeout));
            }
        };

        let status = response.status();
        if !status.is_success() {
            self.circuit_breaker.write().await.record_failure();
            return Err(anyhow!("{} HTTP error: {}", method, status));
        }

        let body_bytes = response.into_body().collect().await?.to_bytes();
        let rpc_response: RpcResponse = match serde_json::from_reader(body_bytes.reader()) {
            Ok(r) => r,
            Err(e) => {
                self.circuit_breaker.write().await.record_failure();
                return Err(anyhow!("{} malformed response: {}", method, e));
            }
        };

        if let Some(error) = rpc_response.error {
            tracing::error!("{} RPC error: {}", method, error);
            return Err(anyhow!("{} RPC error: {}", method, error));
        }

        self.circuit_breaker.write().await.record_success();

        Ok(rpc_response.result.unwrap_or(Value::Null))
    }

    /// Node reachability for health reporting.
    pub async fn health_check(&self) -> bool {
        match self.call("net_version", json!([])).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("Node health check failed: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl NodeClient for EtcRpcClient {
    async fn get_work(&self) -> Result<Work> {
        let result = self.call("eth_getWork", json!([])).await?;
        parse_work(&result)
    }

    async fn get_pending_block(&self) -> Result<PendingBlock> {
        let result = self
            .call("eth_getBlockByNumber", json!(["pending", false]))
            .await?;
        parse_pending_block(&result)
    }

    async fn submit_work(&self, params: &[String]) -> Result<bool> {
        let result = self.call("eth_submitWork", json!(params)).await?;
        let accepted = result
            .as_bool()
            .ok_or_else(|| anyhow!("eth_submitWork returned non-boolean: {}", result))?;
        if !accepted {
            tracing::error!("eth_submitWork rejected: {:?}", params);
        }
        Ok(accepted)
    }
}

fn parse_work(value: &Value) -> Result<Work> {
    let items = value
        .as_array()
        .ok_or_else(|| anyhow!("eth_getWork: expected array, got {}", value))?;
    if items.len() < 3 {
        return Err(anyhow!("eth_getWork: expected 3 items, got {}", items.len()));
    }
    let field = |i: usize| -> Result<String> {
        items[i]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow!("eth_getWork: item {} is not a string", i))
    };
    Ok(Work {
        header: field(0)?,
        seed: field(1)?,
        target: field(2)?,
    })
}

fn parse_pending_block(value: &Value) -> Result<PendingBlock> {
    let number = value
        .get("number")
        .and_then(|v| v.as_str())
        .and_then(consensus::parse_hex_u64)
        .ok_or_else(|| anyhow!("pending block: missing or invalid number"))?;
    let difficulty = value
        .get("difficulty")
        .and_then(|v| v.as_str())
        .and_then(consensus::parse_hex_biguint)
        .ok_or_else(|| anyhow!("pending block: missing or invalid difficulty"))?;
    Ok(PendingBlock { number, difficulty })
}
