use alloy_primitives::{Address, B64, B256, Bytes, U256};
use serde::Serialize;

use crate::models::datasets::transactions::RpcTransactionData;

////////////////////////////////////// RPC Data ////////////////////////////////////////
#[derive(Debug, Clone)]
pub struct RpcBlockData {
    pub hash: B256,
    pub parent_hash: B256,
    pub number: u64,
    pub timestamp: u64,
    pub nonce: Option<B64>,
    pub difficulty: U256,
    pub total_difficulty: Option<U256>,
    pub gas_limit: U256,
    pub gas_used: U256,
    pub base_fee_per_gas: Option<U256>,
    pub miner: Address,
    pub extra_data: Bytes,
    pub transactions: Vec<RpcTransactionData>,
}

/////////////////////////////////// Synced Data ////////////////////////////////////////
// Quantities that can exceed 2^53 are sent as decimal strings
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncedBlock {
    pub hash: B256,
    pub parent_hash: B256,
    pub number: u64,
    pub timestamp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<B64>,
    pub difficulty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_difficulty: Option<String>,
    pub gas_limit: String,
    pub gas_used: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_fee_per_gas: Option<String>,
    pub miner: Address,
    pub extra_data: Bytes,
    pub transactions: Vec<B256>,
}

/// Payload for server-side sync: the backend fetches the block itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockNumberPayload {
    pub number: u64,
}
