use alloy_network::AnyRpcBlock;
use alloy_primitives::{B256, U256};
use serde_json::Value;

use crate::chain::rpc::to_object;
use crate::models::datasets::blocks::RpcBlockData;
use crate::models::datasets::transactions::RpcTransactionData;
use crate::models::errors::SyncError;

const METHOD: &str = "eth_getBlockByNumber";

pub trait BlockParser {
    fn parse_block(&self) -> Result<RpcBlockData, SyncError>;
}

impl BlockParser for AnyRpcBlock {
    fn parse_block(&self) -> Result<RpcBlockData, SyncError> {
        let inner = &self.header.inner;

        // Hashes-only blocks carry no transaction objects to sync
        let transactions = self
            .transactions
            .txns()
            .map(|transaction| {
                let fields = to_object(METHOD, transaction)?;
                let hash = fields
                    .get("hash")
                    .and_then(Value::as_str)
                    .and_then(|hash| hash.parse::<B256>().ok())
                    .ok_or_else(|| SyncError::Chain {
                        method: METHOD,
                        message: "transaction without a hash".to_string(),
                    })?;
                Ok(RpcTransactionData { hash, fields })
            })
            .collect::<Result<Vec<_>, SyncError>>()?;

        Ok(RpcBlockData {
            hash: self.header.hash,
            parent_hash: inner.parent_hash,
            number: inner.number,
            timestamp: inner.timestamp,
            nonce: inner.nonce,
            difficulty: inner.difficulty,
            total_difficulty: self.header.total_difficulty,
            gas_limit: U256::from(inner.gas_limit),
            gas_used: U256::from(inner.gas_used),
            base_fee_per_gas: inner.base_fee_per_gas.map(U256::from),
            miner: inner.beneficiary,
            extra_data: inner.extra_data.clone(),
            transactions,
        })
    }
}
