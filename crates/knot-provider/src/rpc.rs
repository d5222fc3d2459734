//! Ethereum JSON-RPC wire helpers shared by the node and browser providers.

use alloy_primitives::{Address, TxHash, U256};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ProviderError, TxReceipt};

pub const USER_REJECTED_CODE: i64 = 4001;
pub const UNRECOGNIZED_CHAIN_CODE: i64 = 4902;
pub const EXECUTION_REVERTED_CODE: i64 = 3;

#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcErrorObject>,
}

impl RpcResponse {
    pub fn into_result(self) -> Result<Value, ProviderError> {
        if let Some(error) = self.error {
            return Err(error.into());
        }
        Ok(self.result.unwrap_or(Value::Null))
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl From<RpcErrorObject> for ProviderError {
    fn from(error: RpcErrorObject) -> Self {
        let lowered = error.message.to_ascii_lowercase();
        match error.code {
            USER_REJECTED_CODE => ProviderError::UserRejected,
            UNRECOGNIZED_CHAIN_CODE => {
                ProviderError::UnrecognizedNetwork(error.data.as_ref().and_then(requested_chain))
            }
            _ if lowered.contains("insufficient funds") => ProviderError::InsufficientFunds,
            EXECUTION_REVERTED_CODE => ProviderError::Reverted(revert_reason(&error.message)),
            _ if lowered.contains("revert") => ProviderError::Reverted(revert_reason(&error.message)),
            code => ProviderError::Rpc {
                code,
                message: error.message,
            },
        }
    }
}

/// Chain id a 4902 error names in its `data`, either a bare quantity or
/// an object with a `chainId` member.
fn requested_chain(data: &Value) -> Option<u64> {
    let quantity = match data {
        Value::Object(fields) => fields.get("chainId")?,
        other => other,
    };
    parse_quantity(quantity).ok()
}

/// Pull the human-readable reason out of a node's revert message.
///
/// Handles `execution reverted: <reason>` and the development-node form
/// `... reverted with reason string '<reason>'`.
pub fn revert_reason(message: &str) -> String {
    const QUOTED: &str = "reverted with reason string '";
    if let Some(start) = message.find(QUOTED) {
        let rest = &message[start + QUOTED.len()..];
        let end = rest.find('\'').unwrap_or(rest.len());
        return rest[..end].to_owned();
    }
    if let Some((_, reason)) = message.split_once("execution reverted: ") {
        return reason.trim().to_owned();
    }
    message.trim().to_owned()
}

pub fn parse_quantity(value: &Value) -> Result<u64, ProviderError> {
    let raw = value
        .as_str()
        .ok_or_else(|| ProviderError::Decode(format!("expected hex quantity, got {value}")))?;
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    u64::from_str_radix(digits, 16)
        .map_err(|err| ProviderError::Decode(format!("invalid quantity `{raw}`: {err}")))
}

pub fn parse_accounts(value: Value) -> Result<Vec<Address>, ProviderError> {
    serde_json::from_value(value).map_err(|err| ProviderError::Decode(err.to_string()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReceiptResponse {
    transaction_hash: TxHash,
    block_number: Option<U256>,
    status: Option<U256>,
}

/// Parse an `eth_getTransactionReceipt` result; `Ok(None)` while unmined.
pub fn parse_receipt(value: Value) -> Result<Option<TxReceipt>, ProviderError> {
    if value.is_null() {
        return Ok(None);
    }
    let receipt: ReceiptResponse =
        serde_json::from_value(value).map_err(|err| ProviderError::Decode(err.to_string()))?;
    let Some(block_number) = receipt.block_number else {
        return Ok(None);
    };
    Ok(Some(TxReceipt {
        tx_hash: receipt.transaction_hash,
        block_number: block_number.saturating_to(),
        success: receipt.status.is_none_or(|status| status == U256::from(1)),
    }))
}
