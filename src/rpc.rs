//! JSON-RPC plumbing and the `ContractReader` boundary.
//!
//! `EthClient` issues read-only `eth_call` queries against a single node
//! endpoint. No retries happen here: fallback policy belongs to callers,
//! because an ordered candidate probe and a bounded index scan need
//! different semantics around "this call failed".

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value as Json};

use alloy_primitives::Address;

use crate::abi::{self, Arg, ParamType, Value};

#[derive(Debug, Clone)]
pub enum RpcError {
    /// HTTP-level failure: endpoint unreachable, non-success status.
    Transport(String),
    /// The node answered with an error object (revert, unknown method).
    Node(String),
    /// The response arrived but could not be interpreted as the expected
    /// shape. This is the signal shape-probing callers branch on.
    Decode(String),
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RpcError::Transport(msg) => write!(f, "transport error: {}", msg),
            RpcError::Node(msg) => write!(f, "node error: {}", msg),
            RpcError::Decode(msg) => write!(f, "decode error: {}", msg),
        }
    }
}

impl std::error::Error for RpcError {}

#[derive(Debug, Serialize)]
struct RpcRequest {
    jsonrpc: String,
    id: u64,
    method: String,
    params: Vec<Json>,
}

/// Thin client over one JSON-RPC endpoint. Side-effect free and safe to
/// share across tasks; `reqwest::Client` pools connections internally.
#[derive(Debug, Clone)]
pub struct EthClient {
    http: Client,
    url: String,
}

impl EthClient {
    pub fn new(url: &str) -> Self {
        Self {
            http: Client::new(),
            url: url.to_string(),
        }
    }

    async fn request(&self, method: &str, params: Vec<Json>) -> Result<Json, RpcError> {
        let request = RpcRequest {
            jsonrpc: "2.0".to_string(),
            id: 1,
            method: method.to_string(),
            params,
        };

        let response = self
            .http
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| RpcError::Transport(format!("failed to send request: {}", e)))?;

        if !response.status().is_success() {
            return Err(RpcError::Transport(format!(
                "RPC HTTP error: {}",
                response.status()
            )));
        }

        let body: Json = response
            .json()
            .await
            .map_err(|e| RpcError::Decode(format!("failed to parse response: {}", e)))?;

        if let Some(error) = body.get("error") {
            return Err(RpcError::Node(format!("{}", error)));
        }

        body.get("result")
            .cloned()
            .ok_or_else(|| RpcError::Decode("response missing result".to_string()))
    }

    /// Raw `eth_call` against the latest block. Returns the hex-decoded
    /// return data, which may be empty when the target has no code for the
    /// selector.
    pub async fn call(&self, to: Address, data: Vec<u8>) -> Result<Vec<u8>, RpcError> {
        let params = vec![
            json!({
                "to": format!("0x{}", hex::encode(to.as_slice())),
                "data": format!("0x{}", hex::encode(&data)),
            }),
            Json::String("latest".to_string()),
        ];
        let result = self.request("eth_call", params).await?;
        let text = result
            .as_str()
            .ok_or_else(|| RpcError::Decode("eth_call result is not a string".to_string()))?;
        hex::decode(text.trim_start_matches("0x"))
            .map_err(|e| RpcError::Decode(format!("bad return data hex: {}", e)))
    }

    /// Block timestamp of a confirmed transaction, used to annotate the
    /// persisted stake-tx index once an external submitter reports a
    /// receipt. `None` when the transaction is unknown or still pending.
    pub async fn transaction_block_timestamp(
        &self,
        tx_hash: &str,
    ) -> Result<Option<u64>, RpcError> {
        let receipt = self
            .request(
                "eth_getTransactionReceipt",
                vec![Json::String(tx_hash.to_string())],
            )
            .await?;
        let block_number = match receipt.get("blockNumber").and_then(Json::as_str) {
            Some(n) => n.to_string(),
            None => return Ok(None),
        };
        let block = self
            .request(
                "eth_getBlockByNumber",
                vec![Json::String(block_number), Json::Bool(false)],
            )
            .await?;
        let timestamp = block
            .get("timestamp")
            .and_then(Json::as_str)
            .and_then(|t| u64::from_str_radix(t.trim_start_matches("0x"), 16).ok());
        Ok(timestamp)
    }
}

/// Typed read-only contract query boundary. Implementations must be
/// side-effect free and safe to call concurrently and repeatedly.
#[async_trait]
pub trait ContractReader: Send + Sync {
    async fn read(
        &self,
        address: Address,
        signature: &str,
        args: &[Arg],
        outputs: &[ParamType],
    ) -> Result<Vec<Value>, RpcError>;
}

#[async_trait]
impl ContractReader for EthClient {
    async fn read(
        &self,
        address: Address,
        signature: &str,
        args: &[Arg],
        outputs: &[ParamType],
    ) -> Result<Vec<Value>, RpcError> {
        let data = abi::encode_call(signature, args);
        let raw = self.call(address, data).await?;
        log::debug!(
            "read {} on 0x{} -> {} bytes",
            signature,
            hex::encode(address.as_slice()),
            raw.len()
        );
        abi::decode(outputs, &raw).map_err(|e| RpcError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_carries_context() {
        let e = RpcError::Node("execution reverted".to_string());
        assert!(e.to_string().contains("execution reverted"));
        let e = RpcError::Transport("connection refused".to_string());
        assert!(e.to_string().starts_with("transport error"));
    }
}
