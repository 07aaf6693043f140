/// HTTP surface: health, metrics and the getwork endpoint miners post
/// JSON-RPC to at `/{login}/{worker}`.

use axum::{
    extract::{ConnectInfo, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::blockchain::{TemplateCache, TemplateSet};
use crate::metrics::prometheus as metrics;
use crate::shares::{RedisStorage, ShareValidator};

const DEFAULT_WORKER: &str = "0";

#[derive(Clone)]
pub struct ApiState {
    pub validator: Arc<ShareValidator>,
    pub templates: Arc<TemplateCache>,
    /// `None` reports Redis as not configured.
    pub storage: Option<Arc<RedisStorage>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorReply {
    pub code: i32,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct JsonRpcResponse {
    pub id: Value,
    pub jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorReply>,
}

impl JsonRpcResponse {
    fn result(id: Value, result: Value) -> Self {
        Self {
            id,
            jsonrpc: "2.0",
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            id,
            jsonrpc: "2.0",
            result: None,
            error: Some(ErrorReply {
                code,
                message: message.into(),
            }),
        }
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(api_health))
        .route("/metrics", get(api_metrics))
        .route("/:login", post(api_rpc_default_worker))
        .route("/:login/:worker", post(api_rpc))
        .with_state(state)
}

async fn api_health(State(state): State<ApiState>) -> Json<Value> {
    let redis = match &state.storage {
        Some(storage) => {
            let ok = storage.ping().await.is_ok();
            metrics::set_redis_up(ok);
            json!(ok)
        }
        None => Value::Null,
    };
    let mut body = template_status(&*state.templates.current().await);
    body["status"] = json!("ok");
    body["redis"] = redis;
    Json(body)
}

/// Node work currently served to miners.
fn template_status(set: &TemplateSet) -> Value {
    json!({
        "height": set.height,
        "header": set.header,
        "target": set.target,
        "difficulty": set.difficulty.to_string(),
        "jobs": set.headers.len(),
    })
}

async fn api_metrics() -> impl IntoResponse {
    let body = metrics::render();
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

async fn api_rpc_default_worker(
    State(state): State<ApiState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path(login): Path<String>,
    Json(req): Json<JsonRpcRequest>,
) -> Json<JsonRpcResponse> {
    Json(handle_rpc(&state, &login, DEFAULT_WORKER, addr, req).await)
}

async fn api_rpc(
    State(state): State<ApiState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Path((login, worker)): Path<(String, String)>,
    Json(req): Json<JsonRpcRequest>,
) -> Json<JsonRpcResponse> {
    Json(handle_rpc(&state, &login, &worker, addr, req).await)
}

pub async fn handle_rpc(
    state: &ApiState,
    login: &str,
    worker: &str,
    addr: SocketAddr,
    req: JsonRpcRequest,
) -> JsonRpcResponse {
    let login = login.to_lowercase();
    if !is_valid_login(&login) {
        return JsonRpcResponse::error(req.id, -1, "Invalid login");
    }
    let worker = if is_valid_worker(worker) { worker } else { DEFAULT_WORKER };
    let ip = addr.ip().to_string();

    match req.method.as_str() {
        "eth_getWork" => match state.templates.current().await.work_reply() {
            Some(work) => JsonRpcResponse::result(req.id, json!(work)),
            None => JsonRpcResponse::error(req.id, 0, "Work not ready"),
        },
        "eth_submitWork" => {
            let params = string_params(&req.params);
            let outcome = state.validator.validate_params(&login, worker, &ip, &params).await;
            match outcome.stratum_error() {
                None => JsonRpcResponse::result(req.id, json!(true)),
                Some((code, message)) => JsonRpcResponse::error(req.id, code, message),
            }
        }
        "eth_submitHashrate" => JsonRpcResponse::result(req.id, json!(true)),
        other => {
            tracing::debug!("Unsupported method {} from {}@{}", other, login, ip);
            JsonRpcResponse::error(req.id, -3, "Method not found")
        }
    }
}

/// String params, or none at all if any param is not a string.
fn string_params(params: &Value) -> Vec<String> {
    params
        .as_array()
        .and_then(|items| {
            items
                .iter()
                .map(|v| v.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
        })
        .unwrap_or_default()
}

/// `0x` followed by 40 hex digits.
pub fn is_valid_login(login: &str) -> bool {
    match login.strip_prefix("0x") {
        Some(addr) => addr.len() == 40 && addr.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

fn is_valid_worker(worker: &str) -> bool {
    !worker.is_empty()
        && worker.len() <= 8
        && worker
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
