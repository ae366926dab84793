use alloy_primitives::B256;
use serde::Serialize;
use serde_json::{Map, Value};

////////////////////////////////////// RPC Data ////////////////////////////////////////
// Transactions and receipts keep the full JSON-RPC field set, so any
// chain-specific field reaches the backend untouched apart from normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcTransactionData {
    pub hash: B256,
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RpcReceiptData {
    pub transaction_hash: B256,
    pub fields: Map<String, Value>,
}

/////////////////////////////////// Synced Data ////////////////////////////////////////
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SyncedReceipt(pub Map<String, Value>);

/// Normalized transaction with its receipt nested under `receipt` and the
/// parent block timestamp under `timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SyncedTransaction(pub Map<String, Value>);

impl SyncedTransaction {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}
