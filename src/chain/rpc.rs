//! Ethereum JSON-RPC wire codec
//!
//! Builds request bodies and decodes the responses the web transport needs.
//! Transport-agnostic: no I/O happens here.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{Address, ChainError, ReceiptInfo, TransactionRecord, TxHash};

/// Method names
pub mod method {
    pub const NEW_PENDING_TX_FILTER: &str = "eth_newPendingTransactionFilter";
    pub const GET_FILTER_CHANGES: &str = "eth_getFilterChanges";
    pub const UNINSTALL_FILTER: &str = "eth_uninstallFilter";
    pub const BLOCK_NUMBER: &str = "eth_blockNumber";
    pub const GET_TRANSACTION: &str = "eth_getTransactionByHash";
    pub const GET_RECEIPT: &str = "eth_getTransactionReceipt";
    pub const GAS_PRICE: &str = "eth_gasPrice";
    pub const GET_BLOCK_BY_NUMBER: &str = "eth_getBlockByNumber";
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

/// Serialize a request body
pub fn request_body(id: u64, method: &str, params: Value) -> String {
    let req = RpcRequest {
        jsonrpc: "2.0",
        id,
        method,
        params,
    };
    // Serializing a struct of strings and `Value` cannot fail
    serde_json::to_string(&req).unwrap_or_default()
}

pub fn get_transaction(id: u64, hash: &TxHash) -> String {
    request_body(id, method::GET_TRANSACTION, json!([hash.to_string()]))
}

pub fn get_receipt(id: u64, hash: &TxHash) -> String {
    request_body(id, method::GET_RECEIPT, json!([hash.to_string()]))
}

pub fn block_number(id: u64) -> String {
    request_body(id, method::BLOCK_NUMBER, json!([]))
}

pub fn gas_price(id: u64) -> String {
    request_body(id, method::GAS_PRICE, json!([]))
}

/// `eth_getBlockByNumber(tag, false)` - transaction hashes only
pub fn get_block(id: u64, tag: &str) -> String {
    request_body(id, method::GET_BLOCK_BY_NUMBER, json!([tag, false]))
}

pub fn new_pending_filter(id: u64) -> String {
    request_body(id, method::NEW_PENDING_TX_FILTER, json!([]))
}

pub fn filter_changes(id: u64, filter_id: &str) -> String {
    request_body(id, method::GET_FILTER_CHANGES, json!([filter_id]))
}

pub fn uninstall_filter(id: u64, filter_id: &str) -> String {
    request_body(id, method::UNINSTALL_FILTER, json!([filter_id]))
}

/// Extract `result` from a response body. A `null` result is returned as
/// `Value::Null`, not as an error.
pub fn parse_response(body: &str) -> Result<Value, ChainError> {
    let resp: RpcResponse =
        serde_json::from_str(body).map_err(|e| ChainError::Decode(e.to_string()))?;
    if let Some(err) = resp.error {
        return Err(ChainError::Rpc {
            code: err.code,
            message: err.message,
        });
    }
    Ok(resp.result.unwrap_or(Value::Null))
}

/// Parse a hex quantity (`0x1a`). `0x` alone is zero.
pub fn parse_quantity(s: &str) -> Result<u128, ChainError> {
    let digits = strip_prefix(s)?;
    if digits.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(digits, 16).map_err(|e| ChainError::Decode(format!("quantity {s}: {e}")))
}

pub fn parse_hash(s: &str) -> Result<TxHash, ChainError> {
    let mut out = [0u8; 32];
    hex::decode_to_slice(strip_prefix(s)?, &mut out)
        .map_err(|e| ChainError::Decode(format!("hash {s}: {e}")))?;
    Ok(TxHash(out))
}

pub fn parse_address(s: &str) -> Result<Address, ChainError> {
    let mut out = [0u8; 20];
    hex::decode_to_slice(strip_prefix(s)?, &mut out)
        .map_err(|e| ChainError::Decode(format!("address {s}: {e}")))?;
    Ok(Address(out))
}

pub fn parse_bytes(s: &str) -> Result<Vec<u8>, ChainError> {
    hex::decode(strip_prefix(s)?).map_err(|e| ChainError::Decode(format!("bytes: {e}")))
}

fn strip_prefix(s: &str) -> Result<&str, ChainError> {
    s.strip_prefix("0x")
        .ok_or_else(|| ChainError::Decode(format!("missing 0x prefix: {s}")))
}

fn as_str(value: &Value) -> Result<&str, ChainError> {
    value
        .as_str()
        .ok_or_else(|| ChainError::Decode(format!("expected string, got {value}")))
}

/// Decode a quantity result (`eth_blockNumber`, `eth_gasPrice`)
pub fn decode_quantity(value: &Value) -> Result<u128, ChainError> {
    parse_quantity(as_str(value)?)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcTransaction {
    hash: String,
    from: String,
    #[serde(default)]
    to: Option<String>,
    value: String,
    #[serde(default)]
    gas_price: Option<String>,
    #[serde(default)]
    max_fee_per_gas: Option<String>,
    gas: String,
    nonce: String,
    input: String,
}

/// Decode `eth_getTransactionByHash`. `null` means unknown to the node.
pub fn decode_transaction(value: Value) -> Result<Option<TransactionRecord>, ChainError> {
    if value.is_null() {
        return Ok(None);
    }
    let raw: RpcTransaction =
        serde_json::from_value(value).map_err(|e| ChainError::Decode(e.to_string()))?;
    let gas_price = match raw.gas_price.as_deref().or(raw.max_fee_per_gas.as_deref()) {
        Some(q) => parse_quantity(q)?,
        None => 0,
    };
    Ok(Some(TransactionRecord {
        hash: parse_hash(&raw.hash)?,
        from: parse_address(&raw.from)?,
        to: raw.to.as_deref().map(parse_address).transpose()?,
        value: parse_quantity(&raw.value)?,
        gas_price,
        gas_limit: parse_quantity(&raw.gas)? as u64,
        nonce: parse_quantity(&raw.nonce)? as u64,
        input: parse_bytes(&raw.input)?,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    #[serde(default)]
    status: Option<String>,
    block_number: String,
}

/// Decode `eth_getTransactionReceipt`. `null` means still pending.
pub fn decode_receipt(value: Value) -> Result<Option<ReceiptInfo>, ChainError> {
    if value.is_null() {
        return Ok(None);
    }
    let raw: RpcReceipt =
        serde_json::from_value(value).map_err(|e| ChainError::Decode(e.to_string()))?;
    // Pre-Byzantium receipts carry no status; treat them as successful
    let success = match raw.status.as_deref() {
        Some(s) => parse_quantity(s)? == 1,
        None => true,
    };
    Ok(Some(ReceiptInfo {
        success,
        block_number: parse_quantity(&raw.block_number)? as u64,
    }))
}

/// Number of transactions in an `eth_getBlockByNumber` result
pub fn decode_block_tx_count(value: &Value) -> Result<u64, ChainError> {
    if value.is_null() {
        return Ok(0);
    }
    value
        .get("transactions")
        .and_then(Value::as_array)
        .map(|txs| txs.len() as u64)
        .ok_or_else(|| ChainError::Decode("block without transactions array".into()))
}

/// Decode `eth_getFilterChanges` for a pending-transaction or block filter
pub fn decode_hash_list(value: &Value) -> Result<Vec<TxHash>, ChainError> {
    let Some(items) = value.as_array() else {
        return Err(ChainError::Decode(format!("expected array, got {value}")));
    };
    items.iter().map(|v| parse_hash(as_str(v)?)).collect()
}

/// Filter id returned by `eth_new*Filter`
pub fn decode_filter_id(value: &Value) -> Result<String, ChainError> {
    as_str(value).map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TX_JSON: &str = r#"{
        "hash": "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b",
        "from": "0xa7d9ddbe1f17865597fbd27ec712455208b6b76d",
        "to": null,
        "value": "0xde0b6b3a7640000",
        "gasPrice": "0x4a817c800",
        "gas": "0x5208",
        "nonce": "0x15",
        "input": "0x60806040"
    }"#;

    #[test]
    fn test_request_body_shape() {
        let body = block_number(7);
        let v: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(v["jsonrpc"], "2.0");
        assert_eq!(v["id"], 7);
        assert_eq!(v["method"], "eth_blockNumber");
        assert!(v["params"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_quantity("0x").unwrap(), 0);
        assert_eq!(parse_quantity("0x1a").unwrap(), 26);
        assert!(parse_quantity("1a").is_err());
        assert!(parse_quantity("0xzz").is_err());
    }

    #[test]
    fn test_decode_contract_creation() {
        let tx = decode_transaction(serde_json::from_str(TX_JSON).unwrap())
            .unwrap()
            .unwrap();
        assert!(tx.is_contract_creation());
        assert_eq!(tx.value, 1_000_000_000_000_000_000);
        assert_eq!(tx.gas_price, 20_000_000_000);
        assert_eq!(tx.gas_limit, 21_000);
        assert_eq!(tx.nonce, 21);
        assert_eq!(tx.input, vec![0x60, 0x80, 0x60, 0x40]);
    }

    #[test]
    fn test_decode_eip1559_uses_max_fee() {
        let mut v: Value = serde_json::from_str(TX_JSON).unwrap();
        v.as_object_mut().unwrap().remove("gasPrice");
        v["maxFeePerGas"] = json!("0x3b9aca00");
        let tx = decode_transaction(v).unwrap().unwrap();
        assert_eq!(tx.gas_price, 1_000_000_000);
    }

    #[test]
    fn test_null_results_are_not_errors() {
        assert_eq!(decode_transaction(Value::Null).unwrap(), None);
        assert_eq!(decode_receipt(Value::Null).unwrap(), None);
        assert_eq!(decode_block_tx_count(&Value::Null).unwrap(), 0);
    }

    #[test]
    fn test_decode_receipt_status() {
        let ok = decode_receipt(json!({ "status": "0x1", "blockNumber": "0x10" }))
            .unwrap()
            .unwrap();
        assert!(ok.success);
        assert_eq!(ok.block_number, 16);

        let failed = decode_receipt(json!({ "status": "0x0", "blockNumber": "0x10" }))
            .unwrap()
            .unwrap();
        assert!(!failed.success);
    }

    #[test]
    fn test_parse_response_error_object() {
        let err = parse_response(r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"limit"}}"#)
            .unwrap_err();
        assert_eq!(
            err,
            ChainError::Rpc {
                code: -32000,
                message: "limit".into()
            }
        );
    }

    #[test]
    fn test_block_tx_count_and_hash_list() {
        let h = "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b";
        let block = json!({ "transactions": [h, h, h] });
        assert_eq!(decode_block_tx_count(&block).unwrap(), 3);
        let hashes = decode_hash_list(&json!([h])).unwrap();
        assert_eq!(hashes.len(), 1);
        assert_eq!(hashes[0].to_string(), h);
    }
}
