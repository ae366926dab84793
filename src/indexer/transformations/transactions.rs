use alloy_primitives::U256;
use serde_json::{Map, Value};

use crate::models::datasets::blocks::RpcBlockData;
use crate::models::datasets::transactions::{
    RpcReceiptData, RpcTransactionData, SyncedReceipt, SyncedTransaction,
};

// Quantities that can exceed 2^53, always sent as decimal strings
const BIG_QUANTITY_FIELDS: &[&str] = &[
    "value",
    "gas",
    "gasLimit",
    "gasPrice",
    "gasUsed",
    "cumulativeGasUsed",
    "effectiveGasPrice",
    "maxFeePerGas",
    "maxPriorityFeePerGas",
    "maxFeePerBlobGas",
    "blobGasPrice",
    "blobGasUsed",
];

// Quantities that stay small, sent as plain numbers
const SMALL_QUANTITY_FIELDS: &[&str] = &[
    "blockNumber",
    "transactionIndex",
    "logIndex",
    "nonce",
    "chainId",
    "type",
    "status",
    "v",
    "yParity",
];

pub trait TransactionTransformer {
    fn transform_transaction(
        self,
        receipt: RpcReceiptData,
        block: &RpcBlockData,
    ) -> (SyncedTransaction, SyncedReceipt);
}

impl TransactionTransformer for RpcTransactionData {
    fn transform_transaction(
        self,
        receipt: RpcReceiptData,
        block: &RpcBlockData,
    ) -> (SyncedTransaction, SyncedReceipt) {
        let mut fields = self.fields;
        merge_signature(&mut fields);

        let mut transaction = normalize_object(fields);
        let receipt = normalize_object(receipt.fields);

        transaction.insert("receipt".to_string(), Value::Object(receipt.clone()));
        transaction.insert("timestamp".to_string(), Value::from(block.timestamp));

        (SyncedTransaction(transaction), SyncedReceipt(receipt))
    }
}

/// Lift `r`, `s`, `v` and `yParity` out of a nested `signature` object.
fn merge_signature(fields: &mut Map<String, Value>) {
    if let Some(Value::Object(signature)) = fields.remove("signature") {
        for (key, value) in signature {
            fields.entry(key).or_insert(value);
        }
    }
}

/// Drop null fields and rewrite known quantities, recursively.
pub fn normalize_object(fields: Map<String, Value>) -> Map<String, Value> {
    fields
        .into_iter()
        .filter_map(|(key, value)| {
            let value = normalize_field(&key, value)?;
            Some((key, value))
        })
        .collect()
}

fn normalize_field(key: &str, value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(object) => Some(Value::Object(normalize_object(object))),
        Value::Array(items) => Some(Value::Array(
            items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(object) => Some(Value::Object(normalize_object(object))),
                    Value::Null => None,
                    other => Some(other),
                })
                .collect(),
        )),
        value if BIG_QUANTITY_FIELDS.contains(&key) => Some(to_decimal_string(value)),
        value if SMALL_QUANTITY_FIELDS.contains(&key) => Some(to_small_number(value)),
        value => Some(value),
    }
}

fn parse_quantity(value: &Value) -> Option<U256> {
    match value {
        Value::String(s) => match s.strip_prefix("0x") {
            Some(hex) if hex.is_empty() => Some(U256::ZERO),
            Some(hex) => U256::from_str_radix(hex, 16).ok(),
            None => U256::from_str_radix(s, 10).ok(),
        },
        Value::Number(n) => n.as_u64().map(U256::from),
        _ => None,
    }
}

fn to_decimal_string(value: Value) -> Value {
    match parse_quantity(&value) {
        Some(quantity) => Value::String(quantity.to_string()),
        None => value,
    }
}

fn to_small_number(value: Value) -> Value {
    match parse_quantity(&value) {
        Some(quantity) => match u64::try_from(quantity) {
            Ok(small) if small <= (1u64 << 53) => Value::from(small),
            _ => Value::String(quantity.to_string()),
        },
        None => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, B256, Bytes};
    use serde_json::json;

    fn block() -> RpcBlockData {
        RpcBlockData {
            hash: B256::repeat_byte(1),
            parent_hash: B256::ZERO,
            number: 3,
            timestamp: 1_700_000_123,
            nonce: None,
            difficulty: U256::ZERO,
            total_difficulty: None,
            gas_limit: U256::from(30_000_000u64),
            gas_used: U256::from(21_000u64),
            base_fee_per_gas: None,
            miner: Address::ZERO,
            extra_data: Bytes::new(),
            transactions: vec![],
        }
    }

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn normalizes_transaction_and_nests_receipt() {
        let hash = B256::repeat_byte(0xab);
        let transaction = RpcTransactionData {
            hash,
            fields: object(json!({
                "hash": hash,
                "gas": "0x1a055690d9db80000",
                "value": "0xde0b6b3a7640000",
                "nonce": "0x2",
                "blockNumber": "0x3",
                "to": null,
                "input": "0x6080",
                "signature": { "r": "0x01", "s": "0x02", "v": "0x1b" }
            })),
        };
        let receipt = RpcReceiptData {
            transaction_hash: hash,
            fields: object(json!({
                "transactionHash": hash,
                "gasUsed": "0x5208",
                "status": "0x1",
                "contractAddress": null,
                "logs": [{ "logIndex": "0x0", "data": "0x" }]
            })),
        };

        let (synced, receipt) = transaction.transform_transaction(receipt, &block());
        let synced = serde_json::to_value(&synced).unwrap();

        assert_eq!(synced["gas"], json!("30000000000000000000"));
        assert_eq!(synced["value"], json!("1000000000000000000"));
        assert_eq!(synced["nonce"], json!(2));
        assert_eq!(synced["blockNumber"], json!(3));
        assert_eq!(synced["timestamp"], json!(1_700_000_123u64));
        assert_eq!(synced["v"], json!(27));
        assert_eq!(synced["r"], json!("0x01"));
        assert_eq!(synced["input"], json!("0x6080"));
        assert!(synced.get("to").is_none());
        assert!(synced.get("signature").is_none());

        assert_eq!(synced["receipt"]["gasUsed"], json!("21000"));
        assert_eq!(synced["receipt"]["status"], json!(1));
        assert_eq!(synced["receipt"]["logs"][0]["logIndex"], json!(0));
        assert!(synced["receipt"].get("contractAddress").is_none());
        assert_eq!(Value::Object(receipt.0), synced["receipt"]);
    }

    #[test]
    fn keeps_decimal_and_non_quantity_values() {
        let normalized = normalize_object(object(json!({
            "gasPrice": "1000",
            "gasLimit": 21000,
            "accessList": [],
            "from": "0x00000000000000000000000000000000000000aa"
        })));

        assert_eq!(normalized["gasPrice"], json!("1000"));
        assert_eq!(normalized["gasLimit"], json!("21000"));
        assert_eq!(normalized["accessList"], json!([]));
        assert_eq!(
            normalized["from"],
            json!("0x00000000000000000000000000000000000000aa")
        );
    }
}
