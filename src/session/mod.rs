//! Authentication state and the pinned workspace.
//!
//! A [`Session`] is built once per host process and shared by reference
//! between the orchestrator and the sync client. Every sync call reads the
//! pinned workspace and a fresh credential from it.

pub mod identity;

use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use url::Url;

use crate::api::transport::{ApiRequest, HttpTransport};
use crate::models::common::{Config, User, Workspace};
use crate::models::errors::{AuthError, SyncError};
use crate::session::identity::IdentityProvider;

#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub api_token: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl Credentials {
    pub fn from_config(config: &Config) -> Self {
        let non_empty = |value: &Option<String>| value.clone().filter(|v| !v.is_empty());
        Self {
            api_token: non_empty(&config.api_token),
            email: non_empty(&config.email),
            password: non_empty(&config.password),
        }
    }
}

/// How a request proves its identity to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Static token, sent as `Authorization: Bearer`.
    ApiToken(String),
    /// Short-lived identity-provider token, sent as `firebaseAuthToken`.
    IdToken(String),
}

impl Credential {
    pub fn bearer(&self) -> Option<String> {
        match self {
            Self::ApiToken(token) => Some(token.clone()),
            Self::IdToken(_) => None,
        }
    }

    pub fn id_token(&self) -> Option<&str> {
        match self {
            Self::ApiToken(_) => None,
            Self::IdToken(token) => Some(token),
        }
    }

    /// Attach this credential to a `{data: ...}` request body.
    pub fn decorate_body(&self, body: &mut Value) {
        if let (Some(token), Some(object)) = (self.id_token(), body.as_object_mut()) {
            object.insert("firebaseAuthToken".to_string(), Value::String(token.to_string()));
        }
    }

    pub fn decorate_url(&self, url: &mut Url) {
        if let Some(token) = self.id_token() {
            url.query_pairs_mut().append_pair("firebaseAuthToken", token);
        }
    }
}

#[derive(Debug, Default)]
struct SessionState {
    user: Option<User>,
    workspace: Option<Workspace>,
}

pub struct Session {
    api_root: Url,
    webapp_root: String,
    credentials: Credentials,
    transport: Arc<dyn HttpTransport>,
    identity: Arc<dyn IdentityProvider>,
    state: RwLock<SessionState>,
}

impl Session {
    pub fn new(
        api_root: Url,
        webapp_root: impl Into<String>,
        credentials: Credentials,
        transport: Arc<dyn HttpTransport>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        // Keep the root's own path when joining endpoint paths onto it
        let mut api_root = api_root;
        if !api_root.path().ends_with('/') {
            let path = format!("{}/", api_root.path());
            api_root.set_path(&path);
        }

        Self {
            api_root,
            webapp_root: webapp_root.into(),
            credentials,
            transport,
            identity,
            state: RwLock::new(SessionState::default()),
        }
    }

    pub fn api_root(&self) -> &Url {
        &self.api_root
    }

    pub fn transport(&self) -> &Arc<dyn HttpTransport> {
        &self.transport
    }

    pub fn is_using_api_token(&self) -> bool {
        self.credentials.api_token.is_some()
    }

    pub async fn is_logged_in(&self) -> bool {
        self.state.read().await.user.is_some()
    }

    pub async fn has_workspace(&self) -> bool {
        self.state.read().await.workspace.is_some()
    }

    pub async fn workspace(&self) -> Option<Workspace> {
        self.state.read().await.workspace.clone()
    }

    pub async fn workspace_name(&self) -> Option<String> {
        self.state.read().await.workspace.as_ref().map(|w| w.name.clone())
    }

    /// A credential for one outbound call. ID tokens are fetched anew each
    /// time so an expired token gets refreshed; API tokens never expire.
    pub async fn credential(&self, operation: &'static str) -> Result<Credential, SyncError> {
        if let Some(token) = &self.credentials.api_token {
            return Ok(Credential::ApiToken(token.clone()));
        }

        self.identity
            .id_token()
            .await
            .map(Credential::IdToken)
            .map_err(|source| SyncError::IdToken { operation, source })
    }

    pub async fn login(&self) -> Result<User, SyncError> {
        if self.credentials.api_token.is_some() {
            let user = self.fetch_user().await.map_err(|e| match e {
                SyncError::Backend {
                    status: 401 | 403,
                    message,
                    ..
                } => SyncError::Auth(AuthError::InvalidApiToken { message }),
                other => other,
            })?;
            info!("Authenticated with API token");
            return Ok(user);
        }

        let email = self
            .credentials
            .email
            .as_deref()
            .ok_or(AuthError::MissingEmail)?;
        let password = self
            .credentials
            .password
            .as_deref()
            .ok_or(AuthError::MissingPassword)?;

        self.identity.sign_in(email, password).await?;
        let user = self.fetch_user().await?;
        info!("Logged in as {}", email);
        Ok(user)
    }

    async fn fetch_user(&self) -> Result<User, SyncError> {
        const OPERATION: &str = "fetchUser";

        let credential = self.credential(OPERATION).await?;
        let mut url = self.endpoint(OPERATION, "api/users/me")?;
        credential.decorate_url(&mut url);

        let response = self
            .transport
            .send(ApiRequest::get(url).with_bearer(credential.bearer()))
            .await
            .map_err(|e| e.into_sync_error(OPERATION))?;

        let user: User = serde_json::from_value(response).map_err(|e| SyncError::Network {
            operation: OPERATION,
            message: format!("unexpected user payload: {e}"),
        })?;

        if user.workspaces.is_empty() {
            return Err(AuthError::NoWorkspace {
                webapp_root: self.webapp_root.clone(),
            }
            .into());
        }

        self.state.write().await.user = Some(user.clone());
        Ok(user)
    }

    /// Pin the named workspace, or the user's current one when `name` is `None`.
    pub async fn set_workspace(&self, name: Option<&str>) -> Result<Workspace, SyncError> {
        const OPERATION: &str = "setWorkspace";

        let user = self
            .state
            .read()
            .await
            .user
            .clone()
            .ok_or(SyncError::NotAuthenticated { operation: OPERATION })?;

        let workspace = match name {
            Some(name) => user
                .workspaces
                .iter()
                .find(|w| w.name == name)
                .cloned()
                .ok_or_else(|| SyncError::WorkspaceNotFound {
                    name: name.to_string(),
                })?,
            None => match &user.current_workspace {
                Some(current) => current.clone(),
                None => {
                    let first = user
                        .workspaces
                        .first()
                        .cloned()
                        .ok_or(AuthError::NoWorkspace {
                            webapp_root: self.webapp_root.clone(),
                        })?;
                    if let Err(e) = self.set_current_workspace(&first.name).await {
                        warn!("Couldn't save {} as the current workspace: {}", first.name, e);
                    }
                    first
                }
            },
        };

        self.state.write().await.workspace = Some(workspace.clone());
        Ok(workspace)
    }

    async fn set_current_workspace(&self, name: &str) -> Result<(), SyncError> {
        const OPERATION: &str = "setCurrentWorkspace";

        let credential = self.credential(OPERATION).await?;
        let url = self.endpoint(OPERATION, "api/users/me/setCurrentWorkspace")?;
        let mut body = json!({ "data": { "workspace": name } });
        credential.decorate_body(&mut body);

        self.transport
            .send(ApiRequest::post(url, body).with_bearer(credential.bearer()))
            .await
            .map(|_| ())
            .map_err(|e| e.into_sync_error(OPERATION))
    }

    /// Authenticate and pin a workspace unless both are already in place.
    /// Failures are logged and reported as `false`.
    pub async fn ensure_ready(&self, requested: Option<&str>) -> bool {
        {
            let state = self.state.read().await;
            if let (Some(_), Some(pinned)) = (&state.user, &state.workspace) {
                if requested.is_none_or(|name| name == pinned.name) {
                    return true;
                }
            }
        }

        if !self.is_logged_in().await {
            if let Err(e) = self.login().await {
                error!("Authentication failed: {}", e);
                return false;
            }
        }

        match self.set_workspace(requested).await {
            Ok(workspace) => {
                info!("Using workspace \"{}\"", workspace.name);
                true
            }
            Err(e) => {
                error!("Couldn't set workspace: {}", e);
                false
            }
        }
    }

    pub(crate) fn endpoint(&self, operation: &'static str, path: &str) -> Result<Url, SyncError> {
        self.api_root
            .join(path)
            .map_err(|e| SyncError::Network {
                operation,
                message: format!("invalid API root {}: {e}", self.api_root),
            })
    }
}
