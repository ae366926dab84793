use crate::models::datasets::blocks::{RpcBlockData, SyncedBlock};

pub trait BlockTransformer {
    fn transform_block(&self) -> SyncedBlock;
}

impl BlockTransformer for RpcBlockData {
    fn transform_block(&self) -> SyncedBlock {
        SyncedBlock {
            hash: self.hash,
            parent_hash: self.parent_hash,
            number: self.number,
            timestamp: self.timestamp,
            nonce: self.nonce,
            difficulty: self.difficulty.to_string(), // Convert from Uint<256, 4> to String for proper serialization
            total_difficulty: self.total_difficulty.map(|value| value.to_string()),
            gas_limit: self.gas_limit.to_string(),
            gas_used: self.gas_used.to_string(),
            base_fee_per_gas: self.base_fee_per_gas.map(|value| value.to_string()),
            miner: self.miner,
            extra_data: self.extra_data.clone(),
            transactions: self.transactions.iter().map(|tx| tx.hash).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, B256, Bytes, U256};
    use serde_json::json;

    #[test]
    fn oversized_quantities_are_decimal_strings() {
        let block = RpcBlockData {
            hash: B256::repeat_byte(1),
            parent_hash: B256::repeat_byte(2),
            number: 12,
            timestamp: 1_700_000_000,
            nonce: None,
            difficulty: U256::from(131_072u64),
            total_difficulty: None,
            gas_limit: U256::from(30_000_000_000_000_000_000u128),
            gas_used: U256::from(21_000u64),
            base_fee_per_gas: Some(U256::from(875_000_000u64)),
            miner: Address::ZERO,
            extra_data: Bytes::new(),
            transactions: vec![],
        };

        let payload = serde_json::to_value(block.transform_block()).unwrap();
        assert_eq!(payload["gasLimit"], json!("30000000000000000000"));
        assert_eq!(payload["gasUsed"], json!("21000"));
        assert_eq!(payload["difficulty"], json!("131072"));
        assert_eq!(payload["baseFeePerGas"], json!("875000000"));
        assert_eq!(payload["number"], json!(12));
        assert!(payload.get("totalDifficulty").is_none());
        assert!(payload.get("nonce").is_none());
    }
}
