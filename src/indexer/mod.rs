//! Chain event orchestration: block listening, contract pushes and trace hooks.
//!
//! Every public entry point is gated by the `disabled` flag and never returns
//! an error to the host. Failures are logged and the next independent step
//! still runs.

pub mod transformations;

use alloy_primitives::{Address, B256, keccak256};
use opentelemetry::metrics::Counter;
use std::fmt::Display;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::api::Api;
use crate::api::transport::ReqwestTransport;
use crate::artifacts::hardhat::HardhatArtifacts;
use crate::artifacts::{ArtifactResolver, ArtifactSource};
use crate::chain::ChainClient;
use crate::indexer::transformations::{
    blocks::BlockTransformer, transactions::TransactionTransformer,
};
use crate::metrics::Metrics;
use crate::models::common::{Config, ContractInput};
use crate::models::datasets::traces::{TraceNode, TraceStep};
use crate::models::errors::SyncError;
use crate::session::identity::FirebaseIdentity;
use crate::session::{Credentials, Session};
use crate::trace::{TraceBuffer, TraceCollector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Uninitialized,
    Ready,
    Listening,
}

/// What one `on_block` call managed to sync.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockReport {
    pub number: u64,
    pub block_synced: bool,
    pub transactions_synced: usize,
    pub transactions_skipped: usize,
    pub traces_synced: usize,
}

pub struct Ethernal {
    config: Config,
    session: Arc<Session>,
    api: Api,
    chain: Arc<dyn ChainClient>,
    artifacts: ArtifactResolver,
    collector: TraceCollector,
    traces: Mutex<TraceBuffer>,
    first_block_seen: AtomicBool,
    state: Mutex<ListenerState>,
    metrics: Option<Metrics>,
}

impl Ethernal {
    pub fn new(
        config: Config,
        api: Api,
        chain: Arc<dyn ChainClient>,
        artifacts: Box<dyn ArtifactSource>,
        metrics: Option<Metrics>,
    ) -> Self {
        Self {
            session: api.session().clone(),
            collector: TraceCollector::new(chain.clone()),
            artifacts: ArtifactResolver::new(artifacts),
            traces: Mutex::new(TraceBuffer::default()),
            first_block_seen: AtomicBool::new(false),
            state: Mutex::new(ListenerState::Uninitialized),
            config,
            api,
            chain,
            metrics,
        }
    }

    /// Wire the production stack: reqwest transport, Firebase identity and
    /// the Hardhat artifacts directory.
    pub fn from_config(
        config: Config,
        chain: Arc<dyn ChainClient>,
        metrics: Option<Metrics>,
    ) -> anyhow::Result<Self> {
        let transport = ReqwestTransport::new(Duration::from_secs(config.request_timeout_secs))?;
        let identity =
            FirebaseIdentity::new(config.firebase_api_key.clone(), config.auth_host.as_deref());
        let api_root: Url = config.api_root.parse()?;
        let functions_root = config
            .functions_root
            .as_deref()
            .map(Url::parse)
            .transpose()?;

        let session = Arc::new(Session::new(
            api_root,
            config.webapp_root.clone(),
            Credentials::from_config(&config),
            Arc::new(transport),
            Arc::new(identity),
        ));
        let api = Api::new(session)
            .with_ast_upload(config.ast_upload, functions_root)
            .with_verbose(config.verbose)
            .with_metrics(metrics.clone());
        let artifacts = HardhatArtifacts::new(&config.artifacts_path);

        Ok(Self::new(config, api, chain, Box::new(artifacts), metrics))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub async fn state(&self) -> ListenerState {
        *self.state.lock().await
    }

    /// Authenticate, pin the configured workspace, optionally reset it, then
    /// accept block notifications. Returns whether listening started.
    pub async fn start_listening(&self) -> bool {
        if self.config.disabled {
            debug!("Plugin disabled, not listening");
            return false;
        }
        if self.config.disable_sync {
            info!("Block sync disabled");
            return false;
        }

        if !self.session.ensure_ready(self.config.workspace.as_deref()).await {
            return false;
        }
        *self.state.lock().await = ListenerState::Ready;

        if let Some(workspace) = &self.config.reset_on_start {
            self.reset_workspace(workspace).await;
        }

        *self.state.lock().await = ListenerState::Listening;
        if let Some(workspace) = self.session.workspace_name().await {
            info!("Syncing blocks to workspace \"{}\"", workspace);
        }
        true
    }

    /// Entry point for the host's new-block subscription.
    ///
    /// The host traces a block before notifying it, so keyed traces still
    /// buffered once the notification is handled belong to transactions that
    /// won't be synced, and are dropped.
    pub async fn on_block_notification(&self, number: u64) -> Option<BlockReport> {
        if self.config.disabled {
            return None;
        }
        let report = if self.state().await != ListenerState::Listening {
            warn!("Block {} received before listening started, ignoring", number);
            None
        } else if self.config.skip_first_block
            && !self.first_block_seen.swap(true, Ordering::SeqCst)
        {
            info!("Skipping first block {}", number);
            None
        } else {
            Some(self.on_block(number).await)
        };

        let dropped = self.traces.lock().await.discard_keyed();
        if dropped > 0 {
            debug!("Dropped {} unclaimed traces after block {}", dropped, number);
        }
        report
    }

    /// Whether collected steps are still waiting for their transaction.
    pub async fn has_buffered_traces(&self) -> bool {
        !self.traces.lock().await.is_empty()
    }

    /// Entry point for the host's subscription error callback.
    pub fn on_error(&self, error: impl Display) {
        error!("Block subscription error: {}", error);
    }

    pub async fn on_block(&self, number: u64) -> BlockReport {
        let mut report = BlockReport {
            number,
            ..Default::default()
        };

        if self.config.server_sync {
            match self.api.sync_block_number(number).await {
                Ok(_) => {
                    report.block_synced = true;
                    self.log_ok(format_args!("Synced block {} (server side)", number));
                }
                Err(e) => error!("Couldn't sync block {}: {}", number, e),
            }
            // The backend fetches and traces the block itself
            self.traces.lock().await.clear();
            self.count(|metrics| &metrics.blocks_processed);
            return report;
        }

        let mut block = match self.chain.get_block_with_transactions(number).await {
            Ok(Some(block)) => block,
            Ok(None) => {
                error!("{}", SyncError::MissingBlock { number });
                return report;
            }
            Err(e) => {
                error!("Couldn't fetch block {}: {}", number, e);
                return report;
            }
        };

        let synced_block = block.transform_block();
        match self.api.sync_block(&synced_block).await {
            Ok(_) => {
                report.block_synced = true;
                self.log_ok(format_args!("Synced block {}", number));
            }
            // Transactions are still attempted
            Err(e) => error!("Couldn't sync block {}: {}", number, e),
        }

        let transactions = std::mem::take(&mut block.transactions);
        for transaction in transactions {
            let hash = transaction.hash;
            let receipt = match self.chain.get_transaction_receipt(hash).await {
                Ok(Some(receipt)) => receipt,
                Ok(None) => {
                    self.skip_transaction(hash, SyncError::MissingReceipt { hash }, &mut report)
                        .await;
                    continue;
                }
                Err(e) => {
                    self.skip_transaction(hash, e, &mut report).await;
                    continue;
                }
            };

            let (synced_transaction, synced_receipt) =
                transaction.transform_transaction(receipt, &block);
            let result = self
                .api
                .sync_transaction(&synced_block, &synced_transaction, &synced_receipt)
                .await;
            let steps = self.traces.lock().await.take(hash);

            match result {
                Ok(_) => {
                    report.transactions_synced += 1;
                    self.log_ok(format_args!("Synced transaction {}", hash));
                    if let Some(steps) = steps {
                        if self.sync_trace(hash, &steps).await {
                            report.traces_synced += 1;
                        }
                    }
                }
                Err(e) => error!("Couldn't sync transaction {}: {}", hash, e),
            }
        }

        self.count(|metrics| &metrics.blocks_processed);
        report
    }

    /// Resolve `contract` against the compiled artifacts and push it.
    /// Returns whether the contract data reached the backend.
    pub async fn push(&self, contract: &ContractInput) -> bool {
        if self.config.disabled {
            return false;
        }
        if contract.name.is_empty() || contract.address.is_empty() {
            error!("Contract name and address are mandatory");
            return false;
        }

        let workspace = contract
            .workspace
            .as_deref()
            .or(self.config.workspace.as_deref());
        if !self.session.ensure_ready(workspace).await {
            return false;
        }

        let bundle = match self.artifacts.resolve(&contract.name, &contract.address) {
            Ok(bundle) if bundle.is_empty() => {
                error!(
                    "Couldn't find contract {} in the compiled artifacts",
                    contract.name
                );
                return false;
            }
            Ok(bundle) => bundle,
            Err(e) => {
                error!("Couldn't read artifacts for {}: {}", contract.name, e);
                return false;
            }
        };

        let hashed_bytecode = self.hashed_bytecode(&bundle.address).await;
        if let Err(e) = self
            .api
            .sync_contract_data(&bundle.name, &bundle.address, &bundle.abi, hashed_bytecode)
            .await
        {
            error!("Couldn't sync contract {} ({}): {}", bundle.name, bundle.address, e);
            return false;
        }

        if !self.config.upload_ast {
            info!(
                "Updated contract {} ({}), AST upload disabled",
                bundle.name, bundle.address
            );
            return true;
        }

        if let Err(e) = self
            .api
            .sync_contract_artifact(&bundle.address, &bundle.artifact, &bundle.dependencies)
            .await
        {
            error!("Couldn't upload artifact for {}: {}", bundle.name, e);
            return true;
        }

        let dependencies: Vec<&str> = bundle.dependencies.keys().map(String::as_str).collect();
        info!(
            "Updated artifacts for contract {} ({}), with dependencies: {}",
            bundle.name,
            bundle.address,
            dependencies.join(", ")
        );
        true
    }

    /// Host hook called once per executed message trace. Steps are buffered
    /// until the transaction they belong to is synced.
    pub async fn trace_handler(
        &self,
        trace: &TraceNode,
        is_message_trace_from_call: bool,
        tx_hash: Option<B256>,
    ) {
        if self.config.disabled || self.config.disable_trace || is_message_trace_from_call {
            return;
        }

        let steps = self.collector.collect(trace).await;
        if steps.is_empty() {
            return;
        }
        debug!("Collected {} trace steps", steps.len());
        self.traces.lock().await.insert(tx_hash, steps);
    }

    pub async fn reset_workspace(&self, workspace: &str) -> bool {
        if self.config.disabled {
            return false;
        }
        if !self.session.ensure_ready(self.config.workspace.as_deref()).await {
            return false;
        }

        match self.api.reset_workspace(workspace).await {
            Ok(_) => {
                info!("Workspace \"{}\" has been reset", workspace);
                true
            }
            Err(e) => {
                error!("Error while resetting workspace \"{}\": {}", workspace, e);
                false
            }
        }
    }

    async fn sync_trace(&self, hash: B256, steps: &[TraceStep]) -> bool {
        match self.api.sync_trace(hash, steps).await {
            Ok(_) => {
                self.count(|metrics| &metrics.traces_synced);
                self.log_ok(format_args!("Synced {} trace steps for {}", steps.len(), hash));
                true
            }
            Err(e) => {
                error!("Couldn't sync trace for {}: {}", hash, e);
                false
            }
        }
    }

    async fn skip_transaction(&self, hash: B256, reason: SyncError, report: &mut BlockReport) {
        warn!("Skipping transaction {}: {}", hash, reason);
        self.traces.lock().await.discard(hash);
        report.transactions_skipped += 1;
        self.count(|metrics| &metrics.transactions_skipped);
    }

    /// `None` when the address doesn't parse, the fetch fails or no code is deployed.
    async fn hashed_bytecode(&self, address: &str) -> Option<B256> {
        let address = address.parse::<Address>().ok()?;
        match self.chain.get_code(address).await {
            Ok(code) if code.is_empty() => None,
            Ok(code) => Some(keccak256(&code)),
            Err(e) => {
                warn!("Couldn't fetch bytecode at {}: {}", address, e);
                None
            }
        }
    }

    fn count(&self, counter: impl FnOnce(&Metrics) -> &Counter<u64>) {
        if let Some(metrics) = &self.metrics {
            metrics.count(counter(metrics));
        }
    }

    fn log_ok(&self, message: std::fmt::Arguments<'_>) {
        if self.config.verbose {
            info!("{}", message);
        } else {
            debug!("{}", message);
        }
    }
}
