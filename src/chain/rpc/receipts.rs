use alloy_network::AnyTransactionReceipt;

use crate::chain::rpc::to_object;
use crate::models::datasets::transactions::RpcReceiptData;
use crate::models::errors::SyncError;

pub trait ReceiptParser {
    fn parse_receipt(&self) -> Result<RpcReceiptData, SyncError>;
}

impl ReceiptParser for AnyTransactionReceipt {
    fn parse_receipt(&self) -> Result<RpcReceiptData, SyncError> {
        Ok(RpcReceiptData {
            transaction_hash: self.inner.transaction_hash,
            fields: to_object("eth_getTransactionReceipt", self)?,
        })
    }
}
