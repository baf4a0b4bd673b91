//! Ethereum JSON-RPC transport.
//!
//! `RpcClient` serves both roles the client needs: read-only `eth_call`s
//! and, through the node's wallet provider, `eth_sendTransaction`. Signing,
//! account unlocking and nonce management stay with the provider.

use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use alloy_primitives::{Address, Bytes, B256};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::calls::abi::decode_revert_reason;
use crate::calls::contract_calls::{CallRequest, TxRequest};
use crate::error::{ReadError, TxError};

/// EIP-1193 "user rejected request".
pub const USER_REJECTED_CODE: i64 = 4001;
/// Geth-style "execution reverted" with revert data attached.
pub const EXECUTION_REVERTED_CODE: i64 = 3;

/// Read-only contract calls.
pub trait EthCall: Send + Sync {
    fn call(&self, request: &CallRequest) -> Result<Bytes, ReadError>;
}

/// Transaction submission through the wallet that owns `from`.
pub trait WalletProvider {
    /// Hand the transaction to the wallet. Returns once the wallet has
    /// signed and broadcast it.
    fn send_transaction(&self, from: Address, tx: &TxRequest) -> Result<B256, TxError>;

    /// Block until the transaction is mined. A reverted receipt is an error.
    fn wait_for_receipt(&self, hash: B256) -> Result<(), TxError>;
}

impl<W: WalletProvider + ?Sized> WalletProvider for Arc<W> {
    fn send_transaction(&self, from: Address, tx: &TxRequest) -> Result<B256, TxError> {
        (**self).send_transaction(from, tx)
    }

    fn wait_for_receipt(&self, hash: B256) -> Result<(), TxError> {
        (**self).wait_for_receipt(hash)
    }
}

impl<C: EthCall + ?Sized> EthCall for Arc<C> {
    fn call(&self, request: &CallRequest) -> Result<Bytes, ReadError> {
        (**self).call(request)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    pub data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct Receipt {
    status: Option<String>,
}

#[derive(Debug)]
enum RpcFailure {
    Transport(String),
    Rpc(RpcErrorObject),
}

pub struct RpcClient {
    http: reqwest::blocking::Client,
    url: String,
    receipt_poll: Duration,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: &str, timeout: Duration, receipt_poll: Duration) -> reqwest::Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            url: url.to_string(),
            receipt_poll,
            next_id: AtomicU64::new(1),
        })
    }

    fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<Option<T>, RpcFailure> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });
        debug!("rpc #{id} {method}");
        let response: RpcResponse<T> = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .and_then(|rsp| rsp.error_for_status())
            .and_then(|rsp| rsp.json())
            .map_err(|e| RpcFailure::Transport(e.to_string()))?;
        match response.error {
            Some(err) => Err(RpcFailure::Rpc(err)),
            None => Ok(response.result),
        }
    }

    pub fn chain_id(&self) -> Result<u64, ReadError> {
        let raw: String = self
            .request("eth_chainId", json!([]))
            .map_err(read_error)?
            .ok_or_else(|| ReadError::Decode("eth_chainId returned null".to_string()))?;
        parse_quantity(&raw)
    }
}

impl EthCall for RpcClient {
    fn call(&self, request: &CallRequest) -> Result<Bytes, ReadError> {
        let params = json!([
            { "to": request.to.to_string(), "data": hex_data(&request.data) },
            "latest"
        ]);
        let raw: String = self
            .request("eth_call", params)
            .map_err(read_error)?
            .ok_or_else(|| ReadError::Decode("eth_call returned null".to_string()))?;
        decode_hex_data(&raw)
    }
}

impl WalletProvider for RpcClient {
    fn send_transaction(&self, from: Address, tx: &TxRequest) -> Result<B256, TxError> {
        let params = json!([{
            "from": from.to_string(),
            "to": tx.to.to_string(),
            "data": hex_data(&tx.data),
            "value": format!("{:#x}", tx.value),
        }]);
        let raw: String = self
            .request("eth_sendTransaction", params)
            .map_err(tx_error)?
            .ok_or_else(|| TxError::Provider("eth_sendTransaction returned null".to_string()))?;
        B256::from_str(&raw).map_err(|e| TxError::Provider(format!("bad transaction hash {raw}: {e}")))
    }

    fn wait_for_receipt(&self, hash: B256) -> Result<(), TxError> {
        let params = json!([format!("0x{}", hex::encode(hash))]);
        loop {
            match self.request::<Receipt>("eth_getTransactionReceipt", params.clone()) {
                Ok(Some(receipt)) => {
                    return match receipt.status.as_deref() {
                        Some("0x0") => Err(TxError::ContractReverted { reason: None }),
                        _ => Ok(()),
                    };
                }
                Ok(None) => {}
                // The transaction is already broadcast; a failed poll is not a verdict.
                Err(RpcFailure::Transport(e)) => warn!("receipt poll failed: {e}"),
                Err(RpcFailure::Rpc(err)) => {
                    warn!("receipt poll failed: {} ({})", err.message, err.code)
                }
            }
            thread::sleep(self.receipt_poll);
        }
    }
}

fn read_error(failure: RpcFailure) -> ReadError {
    match failure {
        RpcFailure::Transport(e) => ReadError::Transport(e),
        RpcFailure::Rpc(err) if is_revert(&err) => ReadError::Reverted(err.message),
        RpcFailure::Rpc(err) => ReadError::Transport(format!("{} ({})", err.message, err.code)),
    }
}

fn tx_error(failure: RpcFailure) -> TxError {
    match failure {
        RpcFailure::Transport(e) => TxError::Provider(e),
        RpcFailure::Rpc(err) => classify_rpc_error(&err),
    }
}

fn is_revert(err: &RpcErrorObject) -> bool {
    err.code == EXECUTION_REVERTED_CODE || err.message.to_ascii_lowercase().contains("revert")
}

/// Sort a provider error into user rejection, contract revert, or anything else.
pub fn classify_rpc_error(err: &RpcErrorObject) -> TxError {
    let message = err.message.to_ascii_lowercase();
    if err.code == USER_REJECTED_CODE
        || message.contains("user rejected")
        || message.contains("user denied")
    {
        return TxError::UserRejected;
    }
    if is_revert(err) {
        let from_data = err
            .data
            .as_ref()
            .and_then(revert_data)
            .and_then(|raw| decode_hex_data(raw).ok())
            .and_then(|data| decode_revert_reason(&data));
        let from_message = err
            .message
            .split_once("reverted:")
            .map(|(_, reason)| reason.trim().to_string())
            .filter(|reason| !reason.is_empty());
        return TxError::ContractReverted {
            reason: from_data.or(from_message),
        };
    }
    TxError::Provider(err.message.clone())
}

/// Revert payload as a hex string, either bare or nested as `{"data": "0x.."}`.
fn revert_data(data: &Value) -> Option<&str> {
    match data {
        Value::String(raw) => Some(raw.as_str()),
        Value::Object(fields) => fields.get("data").and_then(Value::as_str),
        _ => None,
    }
}

fn hex_data(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

fn decode_hex_data(raw: &str) -> Result<Bytes, ReadError> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    hex::decode(digits)
        .map(Bytes::from)
        .map_err(|e| ReadError::Decode(format!("bad hex data: {e}")))
}

fn parse_quantity(raw: &str) -> Result<u64, ReadError> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    u64::from_str_radix(digits, 16).map_err(|e| ReadError::Decode(format!("bad quantity {raw}: {e}")))
}
