pub mod rpc;

use alloy_eips::BlockNumberOrTag;
use alloy_network::AnyNetwork;
use alloy_primitives::{Address, B256, Bytes};
use alloy_provider::{Provider, ext::DebugApi};
use alloy_rpc_types_trace::geth::{
    GethDebugBuiltInTracerType, GethDebugTracerConfig, GethDebugTracerType,
    GethDebugTracingOptions, GethTrace,
};
use anyhow::anyhow;
use async_trait::async_trait;
use std::time::Instant;
use tracing::warn;

use crate::chain::rpc::{blocks::BlockParser, receipts::ReceiptParser, traces::into_trace_node};
use crate::metrics::Metrics;
use crate::models::datasets::blocks::RpcBlockData;
use crate::models::datasets::traces::TraceNode;
use crate::models::datasets::transactions::RpcReceiptData;
use crate::models::errors::SyncError;
use crate::utils::retry::{RetryConfig, retry};

/// Read-only view of the development node.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn get_block_number(&self) -> Result<u64, SyncError>;

    async fn get_block_with_transactions(&self, number: u64) -> Result<Option<RpcBlockData>, SyncError>;

    async fn get_transaction_receipt(&self, hash: B256) -> Result<Option<RpcReceiptData>, SyncError>;

    async fn get_code(&self, address: Address) -> Result<Bytes, SyncError>;
}

pub struct AlloyChainClient<P> {
    provider: P,
    retry_config: RetryConfig,
    metrics: Option<Metrics>,
}

impl<P> AlloyChainClient<P>
where
    P: Provider<AnyNetwork>,
{
    pub fn new(provider: P, metrics: Option<Metrics>) -> Self {
        Self {
            provider,
            retry_config: RetryConfig::default(),
            metrics,
        }
    }

    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    fn record(&self, method: &'static str, start: Instant, failed: bool) {
        if let Some(metrics) = &self.metrics {
            metrics.record_rpc(method, start, failed);
        }
    }

    /// Run `debug_traceTransaction` with the call tracer and convert the
    /// resulting frame tree into a [`TraceNode`] tree.
    pub async fn trace_transaction(&self, hash: B256) -> Result<Option<TraceNode>, SyncError>
    where
        P: DebugApi<AnyNetwork>,
    {
        const METHOD: &str = "debug_traceTransaction";

        let trace_options = GethDebugTracingOptions {
            tracer: Some(GethDebugTracerType::BuiltInTracer(
                GethDebugBuiltInTracerType::CallTracer,
            )),
            tracer_config: GethDebugTracerConfig(serde_json::json!({"onlyTopCall": false})), // Get nested calls
            ..Default::default()
        };

        let start = Instant::now();
        let result = self
            .provider
            .debug_trace_transaction(hash, trace_options)
            .await;
        self.record(METHOD, start, result.is_err());

        match result {
            Ok(GethTrace::CallTracer(frame)) => Ok(Some(into_trace_node(frame))),
            Ok(_) => Ok(None),
            Err(e) => Err(SyncError::Chain {
                method: METHOD,
                message: e.to_string(),
            }),
        }
    }
}

#[async_trait]
impl<P> ChainClient for AlloyChainClient<P>
where
    P: Provider<AnyNetwork> + Send + Sync,
{
    async fn get_block_number(&self) -> Result<u64, SyncError> {
        const METHOD: &str = "eth_blockNumber";
        retry(
            || async {
                let start = Instant::now();
                let result = self.provider.get_block_number().await;
                self.record(METHOD, start, result.is_err());
                result.map_err(|e| {
                    warn!("Failed to get latest block number. Error details:\n{:#?}", e);
                    anyhow!("RPC error: {}", e)
                })
            },
            &self.retry_config,
            METHOD,
        )
        .await
        .map_err(|e| chain_error(METHOD, e))
    }

    async fn get_block_with_transactions(&self, number: u64) -> Result<Option<RpcBlockData>, SyncError> {
        const METHOD: &str = "eth_getBlockByNumber";
        let block = retry(
            || async {
                let start = Instant::now();
                let result = self
                    .provider
                    .get_block_by_number(BlockNumberOrTag::Number(number))
                    .full()
                    .await;
                self.record(METHOD, start, result.is_err());
                result.map_err(|e| {
                    warn!("Failed to get block by number {}. Error details:\n{:#?}", number, e);
                    anyhow!("RPC error: {}", e)
                })
            },
            &self.retry_config,
            METHOD,
        )
        .await
        .map_err(|e| chain_error(METHOD, e))?;

        block.map(|block| block.parse_block()).transpose()
    }

    async fn get_transaction_receipt(&self, hash: B256) -> Result<Option<RpcReceiptData>, SyncError> {
        const METHOD: &str = "eth_getTransactionReceipt";
        let receipt = retry(
            || async {
                let start = Instant::now();
                let result = self.provider.get_transaction_receipt(hash).await;
                self.record(METHOD, start, result.is_err());
                result.map_err(|e| {
                    warn!("Failed to get receipt for {}. Error details:\n{:#?}", hash, e);
                    anyhow!("RPC error: {}", e)
                })
            },
            &self.retry_config,
            METHOD,
        )
        .await
        .map_err(|e| chain_error(METHOD, e))?;

        receipt.map(|receipt| receipt.parse_receipt()).transpose()
    }

    async fn get_code(&self, address: Address) -> Result<Bytes, SyncError> {
        const METHOD: &str = "eth_getCode";
        retry(
            || async {
                let start = Instant::now();
                let result = self.provider.get_code_at(address).await;
                self.record(METHOD, start, result.is_err());
                result.map_err(|e| anyhow!("RPC error: {}", e))
            },
            &self.retry_config,
            METHOD,
        )
        .await
        .map_err(|e| chain_error(METHOD, e))
    }
}

fn chain_error(method: &'static str, error: anyhow::Error) -> SyncError {
    SyncError::Chain {
        method,
        message: format!("{error:#}"),
    }
}
