//! Typed request layer against the explorer backend.
//!
//! Each method checks its own parameters, requires a pinned workspace, takes a
//! fresh credential and issues exactly one request. Nothing is retried here.

pub mod transport;

use alloy_primitives::{B256, hex};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use url::Url;

use crate::api::transport::ApiRequest;
use crate::metrics::Metrics;
use crate::models::common::AstUpload;
use crate::models::datasets::blocks::{BlockNumberPayload, SyncedBlock};
use crate::models::datasets::traces::TraceStep;
use crate::models::datasets::transactions::{SyncedReceipt, SyncedTransaction};
use crate::models::errors::SyncError;
use crate::session::{Credential, Session};

#[derive(Serialize)]
struct BlockPayload<'a, B: Serialize> {
    block: &'a B,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TransactionPayload<'a> {
    block: &'a SyncedBlock,
    transaction: &'a SyncedTransaction,
    transaction_receipt: &'a SyncedReceipt,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TracePayload<'a> {
    tx_hash: B256,
    steps: &'a [TraceStep],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ContractDataPayload<'a> {
    name: &'a str,
    address: &'a str,
    abi: &'a Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    hashed_bytecode: Option<B256>,
}

#[derive(Serialize)]
struct ArtifactBundlePayload<'a> {
    artifact: &'a str,
    dependencies: &'a BTreeMap<String, String>,
}

#[derive(Serialize)]
struct ContractAstPayload<'a> {
    ast: ArtifactBundlePayload<'a>,
}

#[derive(Serialize)]
struct CallableArtifactPayload<'a> {
    address: &'a str,
    #[serde(flatten)]
    bundle: ArtifactBundlePayload<'a>,
}

#[derive(Serialize)]
struct WorkspacePayload<'a> {
    workspace: &'a str,
}

pub struct Api {
    session: Arc<Session>,
    ast_upload: AstUpload,
    functions_root: Option<Url>,
    verbose: bool,
    metrics: Option<Metrics>,
}

impl Api {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            ast_upload: AstUpload::Rest,
            functions_root: None,
            verbose: false,
            metrics: None,
        }
    }

    pub fn with_ast_upload(mut self, ast_upload: AstUpload, functions_root: Option<Url>) -> Self {
        self.ast_upload = ast_upload;
        self.functions_root = functions_root.map(|mut root| {
            if !root.path().ends_with('/') {
                let path = format!("{}/", root.path());
                root.set_path(&path);
            }
            root
        });
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_metrics(mut self, metrics: Option<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub async fn sync_block(&self, block: &SyncedBlock) -> Result<Value, SyncError> {
        const OPERATION: &str = "syncBlock";
        let data = payload(OPERATION, &BlockPayload { block })?;
        self.post(OPERATION, "api/blocks", &[("serverSync", "false")], data)
            .await
    }

    /// Server-side sync: only the number is sent, the backend fetches the rest.
    pub async fn sync_block_number(&self, number: u64) -> Result<Value, SyncError> {
        const OPERATION: &str = "syncBlock";
        let block = BlockNumberPayload { number };
        let data = payload(OPERATION, &BlockPayload { block: &block })?;
        self.post(OPERATION, "api/blocks", &[("serverSync", "true")], data)
            .await
    }

    pub async fn sync_transaction(
        &self,
        block: &SyncedBlock,
        transaction: &SyncedTransaction,
        receipt: &SyncedReceipt,
    ) -> Result<Value, SyncError> {
        const OPERATION: &str = "syncTransaction";
        if transaction.0.is_empty() {
            return Err(SyncError::MissingParameter {
                operation: OPERATION,
                parameter: "transaction",
            });
        }
        if receipt.0.is_empty() {
            return Err(SyncError::MissingParameter {
                operation: OPERATION,
                parameter: "transactionReceipt",
            });
        }

        let data = payload(
            OPERATION,
            &TransactionPayload {
                block,
                transaction,
                transaction_receipt: receipt,
            },
        )?;
        self.post(OPERATION, "api/transactions", &[], data).await
    }

    pub async fn sync_trace(&self, tx_hash: B256, steps: &[TraceStep]) -> Result<Value, SyncError> {
        const OPERATION: &str = "syncTrace";
        if tx_hash.is_zero() {
            return Err(SyncError::MissingParameter {
                operation: OPERATION,
                parameter: "transactionHash",
            });
        }

        let data = payload(OPERATION, &TracePayload { tx_hash, steps })?;
        self.post(
            OPERATION,
            &format!("api/transactions/{}/trace", hex::encode_prefixed(tx_hash)),
            &[],
            data,
        )
        .await
    }

    pub async fn sync_contract_data(
        &self,
        name: &str,
        address: &str,
        abi: &Value,
        hashed_bytecode: Option<B256>,
    ) -> Result<Value, SyncError> {
        const OPERATION: &str = "syncContractData";
        require(OPERATION, "name", name)?;
        require(OPERATION, "address", address)?;

        let data = payload(
            OPERATION,
            &ContractDataPayload {
                name,
                address,
                abi,
                hashed_bytecode,
            },
        )?;
        self.post(OPERATION, &format!("api/contracts/{address}"), &[], data)
            .await
    }

    /// Upload the serialized artifact and its dependency map. This is the
    /// heaviest call, callers gate it behind `upload_ast`.
    pub async fn sync_contract_artifact(
        &self,
        address: &str,
        artifact: &str,
        dependencies: &BTreeMap<String, String>,
    ) -> Result<Value, SyncError> {
        const OPERATION: &str = "syncContractArtifact";
        require(OPERATION, "address", address)?;
        require(OPERATION, "artifact", artifact)?;

        let bundle = ArtifactBundlePayload {
            artifact,
            dependencies,
        };

        match self.ast_upload {
            AstUpload::Rest => {
                let data = payload(OPERATION, &ContractAstPayload { ast: bundle })?;
                self.post(OPERATION, &format!("api/contracts/{address}"), &[], data)
                    .await
            }
            AstUpload::Callable => {
                let functions_root =
                    self.functions_root
                        .as_ref()
                        .ok_or(SyncError::MissingParameter {
                            operation: OPERATION,
                            parameter: "functionsRoot",
                        })?;
                let url = functions_root
                    .join("syncContractArtifact")
                    .map_err(|e| SyncError::Network {
                        operation: OPERATION,
                        message: format!("invalid functions root: {e}"),
                    })?;
                let data = payload(OPERATION, &CallableArtifactPayload { address, bundle })?;
                let (workspace, credential) = self.context(OPERATION).await?;
                self.send(OPERATION, url, with_workspace(data, workspace), credential)
                    .await
            }
        }
    }

    /// Clear everything previously synced into `workspace`.
    pub async fn reset_workspace(&self, workspace: &str) -> Result<Value, SyncError> {
        const OPERATION: &str = "resetWorkspace";
        require(OPERATION, "workspace", workspace)?;

        let data = payload(OPERATION, &WorkspacePayload { workspace })?;
        self.post(OPERATION, "api/workspaces/reset", &[], data).await
    }

    async fn context(&self, operation: &'static str) -> Result<(String, Credential), SyncError> {
        let workspace = self
            .session
            .workspace_name()
            .await
            .ok_or(SyncError::WorkspaceNotSet { operation })?;
        let credential = self.session.credential(operation).await?;
        Ok((workspace, credential))
    }

    async fn post(
        &self,
        operation: &'static str,
        path: &str,
        query: &[(&str, &str)],
        data: Value,
    ) -> Result<Value, SyncError> {
        let (workspace, credential) = self.context(operation).await?;

        let mut url = self.session.endpoint(operation, path)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }

        self.send(operation, url, with_workspace(data, workspace), credential)
            .await
    }

    async fn send(
        &self,
        operation: &'static str,
        url: Url,
        data: Value,
        credential: Credential,
    ) -> Result<Value, SyncError> {
        let mut body = json!({ "data": data });
        credential.decorate_body(&mut body);
        let request = ApiRequest::post(url, body).with_bearer(credential.bearer());

        let start = Instant::now();
        let result = self.session.transport().send(request).await;

        if let Some(metrics) = &self.metrics {
            metrics.record_sync(operation, start, result.is_err());
        }

        match result {
            Ok(response) => {
                if self.verbose {
                    info!("[{}] ok", operation);
                } else {
                    debug!("[{}] ok", operation);
                }
                Ok(response)
            }
            Err(e) => Err(e.into_sync_error(operation)),
        }
    }
}

fn require(operation: &'static str, parameter: &'static str, value: &str) -> Result<(), SyncError> {
    if value.is_empty() {
        return Err(SyncError::MissingParameter {
            operation,
            parameter,
        });
    }
    Ok(())
}

fn payload<T: Serialize>(operation: &'static str, data: &T) -> Result<Value, SyncError> {
    serde_json::to_value(data).map_err(|e| SyncError::Network {
        operation,
        message: format!("failed to encode payload: {e}"),
    })
}

// An explicit `workspace` in the payload wins over the pinned one
fn with_workspace(mut data: Value, workspace: String) -> Value {
    if let Some(object) = data.as_object_mut() {
        object
            .entry("workspace")
            .or_insert(Value::String(workspace));
    }
    data
}
