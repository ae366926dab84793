use alloy_primitives::B256;
use thiserror::Error;

/// Coarse classification of a [`SyncError`], for callers that branch on the
/// failure class rather than on a specific variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Precondition,
    Auth,
    Network,
    PartialData,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing email to authenticate. Set `email` in the config or ETHERNAL_EMAIL")]
    MissingEmail,
    #[error("Missing password to authenticate. Set `password` in the config or ETHERNAL_PASSWORD")]
    MissingPassword,
    #[error("Invalid credentials: couldn't login with the specified email/password")]
    InvalidCredentials,
    #[error("Invalid API token: {message}")]
    InvalidApiToken { message: String },
    #[error("You need to create a new workspace on {webapp_root} before using the plugin")]
    NoWorkspace { webapp_root: String },
    #[error("Missing Firebase API key, set `firebase_api_key` to login with email/password")]
    MissingApiKey,
    #[error("Identity provider error: {message}")]
    Provider { message: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("[{operation}] Missing parameter: {parameter}")]
    MissingParameter {
        operation: &'static str,
        parameter: &'static str,
    },
    #[error("[{operation}] The workspace needs to be set before synchronizing")]
    WorkspaceNotSet { operation: &'static str },
    #[error("[{operation}] You need to be authenticated")]
    NotAuthenticated { operation: &'static str },
    #[error("[{operation}] Couldn't get an ID token: {source}")]
    IdToken {
        operation: &'static str,
        source: AuthError,
    },
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("Couldn't find workspace {name}. Make sure you're logged in with the correct account")]
    WorkspaceNotFound { name: String },
    #[error("[{operation}] Request failed: {message}")]
    Network {
        operation: &'static str,
        message: String,
    },
    #[error("[{operation}] Backend returned {status}: {message}")]
    Backend {
        operation: &'static str,
        status: u16,
        message: String,
    },
    #[error("Chain query {method} failed: {message}")]
    Chain {
        method: &'static str,
        message: String,
    },
    #[error("Block {number} not found on the chain client")]
    MissingBlock { number: u64 },
    #[error("Missing receipt for transaction {hash}")]
    MissingReceipt { hash: B256 },
    #[error("Failed to read compiled artifacts: {message}")]
    Artifacts { message: String },
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingParameter { .. }
            | Self::WorkspaceNotSet { .. }
            | Self::NotAuthenticated { .. } => ErrorKind::Precondition,
            Self::Auth(_) | Self::IdToken { .. } | Self::WorkspaceNotFound { .. } => {
                ErrorKind::Auth
            }
            Self::Network { .. } | Self::Backend { .. } | Self::Chain { .. } => ErrorKind::Network,
            Self::MissingBlock { .. } | Self::MissingReceipt { .. } | Self::Artifacts { .. } => {
                ErrorKind::PartialData
            }
        }
    }
}
