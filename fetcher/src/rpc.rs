/// JSON-RPC client for Sui full nodes
/// Posts JSON-RPC 2.0 requests with bounded exponential backoff and degrades to a default on failure

use crate::backoff::{ExponentialBackoff, RetryPolicy};
use crate::config::Settings;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

pub const GET_NORMALIZED_MODULES: &str = "sui_getNormalizedMoveModulesByPackage";

const USER_AGENT: &str = concat!("sui-abi/", env!("CARGO_PKG_VERSION"));

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),
    #[error("Network timeout")]
    Timeout,
    #[error("Unexpected HTTP status {status}: {body}")]
    HttpStatus { status: StatusCode, body: String },
    #[error("RPC returned error: {0}")]
    Rpc(String),
    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
    #[error("No result in RPC response")]
    MissingResult,
    #[error("Failed after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

impl RpcError {
    /// Transport failures and non-200 replies are worth another attempt; a reply
    /// the node actually produced is not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RpcError::RequestFailed(_) | RpcError::Timeout | RpcError::HttpStatus { .. }
        )
    }
}

/// Sui full node client
#[derive(Debug, Clone)]
pub struct SuiRpcClient {
    endpoint: String,
    client: reqwest::Client,
    policy: RetryPolicy,
}

impl SuiRpcClient {
    pub fn new(
        endpoint: &str,
        policy: RetryPolicy,
        request_timeout: Duration,
    ) -> Result<Self, RpcError> {
        let client = reqwest::ClientBuilder::new()
            .timeout(request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| RpcError::ClientBuild(e.to_string()))?;

        Ok(SuiRpcClient {
            endpoint: normalize_endpoint(endpoint),
            client,
            policy,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, RpcError> {
        Self::new(
            &settings.rpc_url,
            RetryPolicy::new(
                settings.max_attempts,
                settings.backoff_base_secs,
                settings.backoff_max_secs,
            ),
            Duration::from_secs(settings.request_timeout_secs),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Issue one call and return its `result`, or the first error that could
    /// not be retried away.
    pub async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        let body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let response = self.post_with_retry(&body).await?;
        extract_result(&response)
    }

    /// Like [`SuiRpcClient::call`], but never fails: any error is logged and
    /// `default` is returned instead.
    pub async fn fetch(&self, method: &str, params: Vec<Value>, default: Value) -> Value {
        match self.call(method, params).await {
            Ok(result) => result,
            Err(RpcError::MissingResult) => {
                debug!(method = method, "RPC response carried no result");
                default
            }
            Err(e) => {
                error!(method = method, endpoint = %self.endpoint, error = %e, "RPC call failed");
                default
            }
        }
    }

    /// Send one JSON-RPC batch (ids 1..=n) and return the results in request
    /// order. A slot whose response is missing or an error yields `default`.
    pub async fn fetch_batch(
        &self,
        method: &str,
        params: Vec<Vec<Value>>,
        default: Value,
    ) -> Vec<Value> {
        let count = params.len();
        if count == 0 {
            return Vec::new();
        }

        let body: Vec<Value> = params
            .into_iter()
            .enumerate()
            .map(|(idx, p)| {
                json!({
                    "jsonrpc": "2.0",
                    "method": method,
                    "params": p,
                    "id": idx + 1
                })
            })
            .collect();

        let responses = match self.post_with_retry(&Value::Array(body)).await {
            Ok(Value::Array(responses)) => responses,
            Ok(other) => {
                error!(method = method, "Batch response is not an array: {}", other);
                return vec![default; count];
            }
            Err(e) => {
                error!(method = method, endpoint = %self.endpoint, error = %e, "RPC batch failed");
                return vec![default; count];
            }
        };

        (1..=count as u64)
            .map(|id| {
                let Some(response) = responses.iter().find(|r| r.get("id").and_then(Value::as_u64) == Some(id)) else {
                    error!(method = method, id = id, "No response for batch request");
                    return default.clone();
                };
                match extract_result(response) {
                    Ok(result) => result,
                    Err(e) => {
                        error!(method = method, id = id, error = %e, "Batch request failed");
                        default.clone()
                    }
                }
            })
            .collect()
    }

    /// Normalized module layout for every module of a package. `{}` on failure.
    pub async fn get_normalized_modules(&self, package: &str) -> Value {
        self.fetch(GET_NORMALIZED_MODULES, vec![json!(package)], json!({}))
            .await
    }

    pub async fn get_normalized_modules_batch(&self, packages: &[String]) -> Vec<Value> {
        let params = packages.iter().map(|p| vec![json!(p)]).collect();
        self.fetch_batch(GET_NORMALIZED_MODULES, params, json!({}))
            .await
    }

    async fn post_with_retry(&self, body: &Value) -> Result<Value, RpcError> {
        let mut backoff = ExponentialBackoff::new(self.policy);

        loop {
            match self.post_once(body).await {
                Ok(value) => {
                    backoff.on_success();
                    return Ok(value);
                }
                Err(e) if e.is_retryable() => match backoff.on_failure(&e.to_string()) {
                    Some(wait) => tokio::time::sleep(wait).await,
                    None => {
                        return Err(RpcError::Exhausted {
                            attempts: backoff.attempts(),
                            last_error: e.to_string(),
                        })
                    }
                },
                Err(e) => return Err(e),
            }
        }
    }

    async fn post_once(&self, body: &Value) -> Result<Value, RpcError> {
        debug!("POST {}", self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RpcError::Timeout
                } else {
                    RpcError::RequestFailed(e.to_string())
                }
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(RpcError::HttpStatus {
                status,
                body: response.text().await.unwrap_or_default(),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| RpcError::InvalidResponse(format!("Failed to parse RPC response: {}", e)))
    }
}

fn extract_result(response: &Value) -> Result<Value, RpcError> {
    if let Some(error) = response.get("error") {
        return Err(RpcError::Rpc(error.to_string()));
    }
    response.get("result").cloned().ok_or(RpcError::MissingResult)
}

/// Prepend `https://` when the endpoint has no scheme.
pub fn normalize_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed.trim_start_matches([':', '/']))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client_for(server: &MockServer, attempts: u32) -> SuiRpcClient {
        SuiRpcClient::new(
            &server.base_url(),
            RetryPolicy::new(attempts, 0, 0),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(normalize_endpoint("fullnode.mainnet.sui.io"), "https://fullnode.mainnet.sui.io");
        assert_eq!(normalize_endpoint("://node.example"), "https://node.example");
        assert_eq!(normalize_endpoint("http://127.0.0.1:9000"), "http://127.0.0.1:9000");
        assert_eq!(normalize_endpoint(" https://x.io "), "https://x.io");
    }

    #[test]
    fn test_retryable_errors() {
        assert!(RpcError::Timeout.is_retryable());
        assert!(RpcError::HttpStatus {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: String::new()
        }
        .is_retryable());
        assert!(!RpcError::Rpc("bad params".to_string()).is_retryable());
        assert!(!RpcError::InvalidResponse("html".to_string()).is_retryable());
        assert!(!RpcError::ClientBuild("tls backend".to_string()).is_retryable());
    }

    #[test]
    fn test_client_is_built_from_settings() {
        let settings = Settings {
            rpc_url: "fullnode.devnet.sui.io".to_string(),
            request_timeout_secs: 5,
            ..Settings::default()
        };
        let client = SuiRpcClient::from_settings(&settings).unwrap();
        assert_eq!(client.endpoint(), "https://fullnode.devnet.sui.io");
    }

    #[tokio::test]
    async fn test_call_returns_result() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/")
                    .body_contains("\"jsonrpc\":\"2.0\"")
                    .body_contains(GET_NORMALIZED_MODULES);
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({ "jsonrpc": "2.0", "id": 1, "result": { "m": {} } }));
            })
            .await;

        let client = client_for(&server, 3);
        let result = client.get_normalized_modules("0x2").await;

        mock.assert_hits_async(1).await;
        assert_eq!(result, json!({ "m": {} }));
    }

    #[tokio::test]
    async fn test_retries_then_returns_default() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/");
                then.status(503).body("busy");
            })
            .await;

        let client = client_for(&server, 3);
        let result = client.get_normalized_modules("0x2").await;

        mock.assert_hits_async(3).await;
        assert_eq!(result, json!({}));

        let err = client.call(GET_NORMALIZED_MODULES, vec![json!("0x2")]).await.unwrap_err();
        assert!(matches!(err, RpcError::Exhausted { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn test_rpc_error_is_not_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/");
                then.status(200).json_body(json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "error": { "code": -32602, "message": "Invalid params" }
                }));
            })
            .await;

        let client = client_for(&server, 4);
        let result = client
            .fetch(GET_NORMALIZED_MODULES, vec![json!("nope")], json!({ "fallback": true }))
            .await;

        mock.assert_hits_async(1).await;
        assert_eq!(result, json!({ "fallback": true }));
    }

    #[tokio::test]
    async fn test_unreachable_node_degrades() {
        let client = SuiRpcClient::new(
            "http://127.0.0.1:1",
            RetryPolicy::new(2, 0, 0),
            Duration::from_secs(2),
        )
        .unwrap();
        let result = client.get_normalized_modules("0x2").await;
        assert_eq!(result, json!({}));
    }

    #[tokio::test]
    async fn test_batch_matches_ids() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/");
                then.status(200).json_body(json!([
                    { "jsonrpc": "2.0", "id": 2, "error": { "code": -32000, "message": "not found" } },
                    { "jsonrpc": "2.0", "id": 1, "result": { "a": {} } }
                ]));
            })
            .await;

        let client = client_for(&server, 1);
        let results = client
            .get_normalized_modules_batch(&["0x2".to_string(), "0x9".to_string(), "0x3".to_string()])
            .await;

        assert_eq!(results, vec![json!({ "a": {} }), json!({}), json!({})]);
    }
}
