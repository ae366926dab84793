#![allow(dead_code)]

use alloy_primitives::{Address, B256, Bytes, U256};
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use ethernal_sync::api::Api;
use ethernal_sync::api::transport::{ApiRequest, HttpTransport, TransportError};
use ethernal_sync::artifacts::ArtifactSource;
use ethernal_sync::chain::ChainClient;
use ethernal_sync::indexer::Ethernal;
use ethernal_sync::models::common::Config;
use ethernal_sync::models::datasets::blocks::RpcBlockData;
use ethernal_sync::models::datasets::contracts::BuildInfo;
use ethernal_sync::models::datasets::transactions::{RpcReceiptData, RpcTransactionData};
use ethernal_sync::models::errors::{AuthError, SyncError};
use ethernal_sync::session::identity::IdentityProvider;
use ethernal_sync::session::{Credentials, Session};

pub const API_ROOT: &str = "https://api.ethernal.test";
pub const API_TOKEN: &str = "test-api-token";

//////////////////////////////////// HTTP transport ////////////////////////////////////
/// Records every request and answers `GET /api/users/me` with a fixed user.
pub struct RecordingTransport {
    user: Value,
    requests: Mutex<Vec<ApiRequest>>,
    failures: Mutex<HashMap<String, TransportError>>,
}

impl RecordingTransport {
    /// The user's current workspace is the first of `names`.
    pub fn with_workspaces(names: &[&str]) -> Arc<Self> {
        Self::build(names, true)
    }

    pub fn without_current_workspace(names: &[&str]) -> Arc<Self> {
        Self::build(names, false)
    }

    fn build(names: &[&str], pin_first: bool) -> Arc<Self> {
        let workspaces: Vec<Value> = names
            .iter()
            .map(|name| json!({ "name": name, "chainId": 31337 }))
            .collect();
        let current = match workspaces.first() {
            Some(first) if pin_first => first.clone(),
            _ => Value::Null,
        };
        Arc::new(Self {
            user: json!({
                "email": "dev@ethernal.test",
                "workspaces": workspaces,
                "currentWorkspace": current,
            }),
            requests: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
        })
    }

    /// Make every request to `path` fail with `error`.
    pub fn fail(&self, path: &str, error: TransportError) {
        self.failures.lock().unwrap().insert(path.to_string(), error);
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|request| request.path().to_string())
            .collect()
    }

    /// `data` objects of every request sent to `path`, in order.
    pub fn bodies(&self, path: &str) -> Vec<Value> {
        self.requests()
            .into_iter()
            .filter(|request| request.path() == path)
            .filter_map(|request| request.body.map(|body| body["data"].clone()))
            .collect()
    }

    pub fn clear(&self) {
        self.requests.lock().unwrap().clear();
    }
}

#[async_trait]
impl HttpTransport for RecordingTransport {
    async fn send(&self, request: ApiRequest) -> Result<Value, TransportError> {
        let path = request.path().to_string();
        self.requests.lock().unwrap().push(request);

        if let Some(error) = self.failures.lock().unwrap().get(&path) {
            return Err(error.clone());
        }
        if path == "/api/users/me" {
            return Ok(self.user.clone());
        }
        Ok(json!({}))
    }
}

/////////////////////////////////// Identity provider //////////////////////////////////
pub struct StaticIdentity {
    sign_in_error: Option<AuthError>,
    pub sign_ins: Mutex<Vec<(String, String)>>,
}

impl StaticIdentity {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sign_in_error: None,
            sign_ins: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(error: AuthError) -> Arc<Self> {
        Arc::new(Self {
            sign_in_error: Some(error),
            sign_ins: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn sign_in(&self, email: &str, password: &str) -> Result<(), AuthError> {
        self.sign_ins
            .lock()
            .unwrap()
            .push((email.to_string(), password.to_string()));
        match &self.sign_in_error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    async fn id_token(&self) -> Result<String, AuthError> {
        if self.sign_ins.lock().unwrap().is_empty() {
            return Err(AuthError::Provider {
                message: "not signed in".to_string(),
            });
        }
        Ok("test-id-token".to_string())
    }
}

///////////////////////////////////// Chain client /////////////////////////////////////
#[derive(Default)]
pub struct MockChain {
    pub blocks: Mutex<HashMap<u64, RpcBlockData>>,
    pub receipts: Mutex<HashMap<B256, RpcReceiptData>>,
    pub code: Mutex<HashMap<Address, Bytes>>,
    pub block_fetches: Mutex<Vec<u64>>,
}

impl MockChain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Add block `number` with `count` transactions, each with a receipt.
    pub fn add_block(&self, number: u64, count: u8) -> Vec<B256> {
        let hashes: Vec<B256> = (0..count)
            .map(|i| B256::with_last_byte(number as u8 * 16 + i + 1))
            .collect();
        let transactions = hashes
            .iter()
            .enumerate()
            .map(|(i, hash)| transaction(*hash, number, i as u64))
            .collect();

        self.blocks.lock().unwrap().insert(
            number,
            RpcBlockData {
                hash: B256::repeat_byte(number as u8),
                parent_hash: B256::repeat_byte(number.saturating_sub(1) as u8),
                number,
                timestamp: 1_700_000_000 + number,
                nonce: None,
                difficulty: U256::from(131_072u64),
                total_difficulty: None,
                gas_limit: U256::from(30_000_000u64),
                gas_used: U256::from(21_000u64 * count as u64),
                base_fee_per_gas: Some(U256::from(1_000_000_000u64)),
                miner: Address::repeat_byte(0xcc),
                extra_data: Bytes::new(),
                transactions,
            },
        );

        let mut receipts = self.receipts.lock().unwrap();
        for hash in &hashes {
            receipts.insert(*hash, receipt(*hash, number));
        }
        hashes
    }

    pub fn remove_receipt(&self, hash: B256) {
        self.receipts.lock().unwrap().remove(&hash);
    }

    pub fn set_code(&self, address: Address, code: &[u8]) {
        self.code
            .lock()
            .unwrap()
            .insert(address, Bytes::copy_from_slice(code));
    }
}

pub fn transaction(hash: B256, block_number: u64, index: u64) -> RpcTransactionData {
    RpcTransactionData {
        hash,
        fields: object(json!({
            "hash": hash,
            "blockNumber": format!("{block_number:#x}"),
            "transactionIndex": format!("{index:#x}"),
            "from": Address::repeat_byte(0xaa),
            "to": Address::repeat_byte(0xbb),
            "gas": "0x5208",
            "gasPrice": "0x3b9aca00",
            "value": "0x0",
            "nonce": format!("{index:#x}"),
            "input": "0x",
            "signature": { "r": "0x01", "s": "0x02", "v": "0x1b" },
        })),
    }
}

pub fn receipt(hash: B256, block_number: u64) -> RpcReceiptData {
    RpcReceiptData {
        transaction_hash: hash,
        fields: object(json!({
            "transactionHash": hash,
            "blockNumber": format!("{block_number:#x}"),
            "gasUsed": "0x5208",
            "cumulativeGasUsed": "0x5208",
            "status": "0x1",
            "contractAddress": null,
            "logs": [],
        })),
    }
}

pub fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(object) => object,
        _ => Map::new(),
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn get_block_number(&self) -> Result<u64, SyncError> {
        Ok(self.blocks.lock().unwrap().keys().max().copied().unwrap_or(0))
    }

    async fn get_block_with_transactions(&self, number: u64) -> Result<Option<RpcBlockData>, SyncError> {
        self.block_fetches.lock().unwrap().push(number);
        Ok(self.blocks.lock().unwrap().get(&number).cloned())
    }

    async fn get_transaction_receipt(&self, hash: B256) -> Result<Option<RpcReceiptData>, SyncError> {
        Ok(self.receipts.lock().unwrap().get(&hash).cloned())
    }

    async fn get_code(&self, address: Address) -> Result<Bytes, SyncError> {
        Ok(self
            .code
            .lock()
            .unwrap()
            .get(&address)
            .cloned()
            .unwrap_or_default())
    }
}

/////////////////////////////////////// Artifacts //////////////////////////////////////
#[derive(Default, Clone)]
pub struct InMemoryArtifacts {
    units: Vec<(String, Option<BuildInfo>)>,
}

impl InMemoryArtifacts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one build unit holding `contracts` in `file`, under every contract's name.
    pub fn with_build(mut self, id: &str, file: &str, contracts: &[&str]) -> Self {
        let build_info = build_info(id, file, contracts);
        for name in contracts {
            self.units
                .push((format!("{file}:{name}"), Some(build_info.clone())));
        }
        self
    }

    pub fn with_missing_build_info(mut self, fully_qualified_name: &str) -> Self {
        self.units.push((fully_qualified_name.to_string(), None));
        self
    }
}

pub fn abi_of(name: &str) -> Value {
    json!([{ "type": "function", "name": format!("{}Method", name.to_lowercase()), "inputs": [] }])
}

pub fn build_info(id: &str, file: &str, contracts: &[&str]) -> BuildInfo {
    let compiled: Map<String, Value> = contracts
        .iter()
        .map(|name| (name.to_string(), json!({ "abi": abi_of(name) })))
        .collect();
    serde_json::from_value(json!({
        "id": id,
        "input": { "sources": { file: { "content": format!("// source of {file}") } } },
        "output": {
            "contracts": { file: compiled },
            "sources": { file: { "ast": { "absolutePath": file, "nodeType": "SourceUnit" } } },
        },
    }))
    .unwrap()
}

impl ArtifactSource for InMemoryArtifacts {
    fn fully_qualified_names(&self) -> Result<Vec<String>, SyncError> {
        Ok(self.units.iter().map(|(name, _)| name.clone()).collect())
    }

    fn build_info(&self, fully_qualified_name: &str) -> Result<Option<BuildInfo>, SyncError> {
        Ok(self
            .units
            .iter()
            .find(|(name, _)| name == fully_qualified_name)
            .and_then(|(_, build_info)| build_info.clone()))
    }
}

//////////////////////////////////////// Wiring ////////////////////////////////////////
pub fn token_config() -> Config {
    Config {
        api_token: Some(API_TOKEN.to_string()),
        ..Config::default()
    }
}

pub fn session(
    config: &Config,
    transport: Arc<RecordingTransport>,
    identity: Arc<StaticIdentity>,
) -> Arc<Session> {
    Arc::new(Session::new(
        API_ROOT.parse().unwrap(),
        "https://app.ethernal.test",
        Credentials::from_config(config),
        transport,
        identity,
    ))
}

pub fn ethernal(
    config: Config,
    transport: Arc<RecordingTransport>,
    chain: Arc<MockChain>,
    artifacts: InMemoryArtifacts,
) -> Ethernal {
    let session = session(&config, transport, StaticIdentity::new());
    let functions_root = config
        .functions_root
        .as_deref()
        .map(|root| root.parse().unwrap());
    let api = Api::new(session).with_ast_upload(config.ast_upload, functions_root);
    Ethernal::new(config, api, chain, Box::new(artifacts), None)
}
