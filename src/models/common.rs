use serde::{Deserialize, Serialize};

pub const DEFAULT_API_ROOT: &str = "https://api.tryethernal.com";
pub const DEFAULT_WEBAPP_ROOT: &str = "https://app.tryethernal.com";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub address: String,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: "0.0.0.0".to_string(),
            port: 9100,
        }
    }
}

/// Which path the AST/dependency bundle takes to the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AstUpload {
    #[default]
    Rest,
    Callable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub rpc_url: String,
    pub api_root: String,
    pub webapp_root: String,
    pub functions_root: Option<String>,
    pub workspace: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub api_token: Option<String>,
    pub firebase_api_key: Option<String>,
    pub auth_host: Option<String>,
    pub reset_on_start: Option<String>,
    pub artifacts_path: String,
    pub poll_interval_ms: u64,
    pub request_timeout_secs: u64,
    pub contracts: Vec<ContractInput>,
    pub ast_upload: AstUpload,

    // Feature flags
    pub disabled: bool,
    pub disable_trace: bool,
    pub disable_sync: bool,
    pub server_sync: bool,
    pub skip_first_block: bool,
    pub upload_ast: bool,
    pub verbose: bool,

    pub metrics: MetricsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            api_root: DEFAULT_API_ROOT.to_string(),
            webapp_root: DEFAULT_WEBAPP_ROOT.to_string(),
            functions_root: None,
            workspace: None,
            email: None,
            password: None,
            api_token: None,
            firebase_api_key: None,
            auth_host: None,
            reset_on_start: None,
            artifacts_path: "artifacts".to_string(),
            poll_interval_ms: 1000,
            request_timeout_secs: 30,
            contracts: Vec::new(),
            ast_upload: AstUpload::default(),
            disabled: false,
            disable_trace: false,
            disable_sync: false,
            server_sync: false,
            skip_first_block: false,
            upload_ast: false,
            verbose: false,
            metrics: MetricsConfig::default(),
        }
    }
}

/// A contract the host asks to push to the explorer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractInput {
    pub name: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
}

impl ContractInput {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            workspace: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_server: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracing: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub workspaces: Vec<Workspace>,
    #[serde(default)]
    pub current_workspace: Option<Workspace>,
}
