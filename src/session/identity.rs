use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

use crate::models::errors::AuthError;
use crate::utils::extract_error_message;

const IDENTITY_TOOLKIT_HOST: &str = "https://identitytoolkit.googleapis.com";
const SECURE_TOKEN_HOST: &str = "https://securetoken.googleapis.com";
// Refresh this long before the provider-reported expiry
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Opaque "get a bearer token" capability backed by an identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<(), AuthError>;

    /// A valid ID token, refreshed when the cached one is about to expire.
    async fn id_token(&self) -> Result<String, AuthError>;
}

#[derive(Debug, Clone)]
struct Tokens {
    id_token: String,
    refresh_token: String,
    expires_at: Instant,
}

impl Tokens {
    fn is_fresh(&self) -> bool {
        Instant::now() + EXPIRY_MARGIN < self.expires_at
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

/// Firebase Authentication over its REST endpoints.
pub struct FirebaseIdentity {
    client: reqwest::Client,
    api_key: Option<String>,
    identity_root: String,
    token_root: String,
    tokens: Mutex<Option<Tokens>>,
}

impl FirebaseIdentity {
    /// `auth_host` routes every call to a local emulator (`host:port`).
    pub fn new(api_key: Option<String>, auth_host: Option<&str>) -> Self {
        let (identity_root, token_root) = match auth_host {
            Some(host) => {
                let host = host.trim_end_matches('/');
                let host = if host.starts_with("http") {
                    host.to_string()
                } else {
                    format!("http://{host}")
                };
                (
                    format!("{host}/identitytoolkit.googleapis.com"),
                    format!("{host}/securetoken.googleapis.com"),
                )
            }
            None => (IDENTITY_TOOLKIT_HOST.to_string(), SECURE_TOKEN_HOST.to_string()),
        };

        Self {
            client: reqwest::Client::new(),
            api_key,
            identity_root,
            token_root,
            tokens: Mutex::new(None),
        }
    }

    fn api_key(&self) -> Result<&str, AuthError> {
        self.api_key.as_deref().ok_or(AuthError::MissingApiKey)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Tokens, AuthError> {
        let url = format!("{}/v1/token?key={}", self.token_root, self.api_key()?);
        let response = self
            .client
            .post(url)
            .form(&[("grant_type", "refresh_token"), ("refresh_token", refresh_token)])
            .send()
            .await
            .map_err(provider_error)?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Provider {
                message: extract_error_message(&body).unwrap_or_else(|| "token refresh failed".to_string()),
            });
        }

        let refreshed: RefreshResponse = response.json().await.map_err(provider_error)?;
        Ok(Tokens {
            id_token: refreshed.id_token,
            refresh_token: refreshed.refresh_token,
            expires_at: expires_at(&refreshed.expires_in),
        })
    }
}

#[async_trait]
impl IdentityProvider for FirebaseIdentity {
    async fn sign_in(&self, email: &str, password: &str) -> Result<(), AuthError> {
        let url = format!(
            "{}/v1/accounts:signInWithPassword?key={}",
            self.identity_root,
            self.api_key()?
        );
        let response = self
            .client
            .post(url)
            .json(&json!({ "email": email, "password": password, "returnSecureToken": true }))
            .send()
            .await
            .map_err(provider_error)?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = extract_error_message(&body).unwrap_or_default();
            debug!("Sign-in rejected: {}", message);
            return Err(match message.as_str() {
                m if m.starts_with("EMAIL_NOT_FOUND")
                    || m.starts_with("INVALID_PASSWORD")
                    || m.starts_with("INVALID_LOGIN_CREDENTIALS")
                    || m.starts_with("INVALID_EMAIL") =>
                {
                    AuthError::InvalidCredentials
                }
                _ => AuthError::Provider { message },
            });
        }

        let signed_in: SignInResponse = response.json().await.map_err(provider_error)?;
        *self.tokens.lock().await = Some(Tokens {
            id_token: signed_in.id_token,
            refresh_token: signed_in.refresh_token,
            expires_at: expires_at(&signed_in.expires_in),
        });
        Ok(())
    }

    async fn id_token(&self) -> Result<String, AuthError> {
        let mut tokens = self.tokens.lock().await;
        let current = tokens.as_ref().ok_or(AuthError::Provider {
            message: "not signed in".to_string(),
        })?;

        if current.is_fresh() {
            return Ok(current.id_token.clone());
        }

        let refreshed = self.refresh(&current.refresh_token).await?;
        let id_token = refreshed.id_token.clone();
        *tokens = Some(refreshed);
        Ok(id_token)
    }
}

fn expires_at(expires_in: &str) -> Instant {
    Instant::now() + Duration::from_secs(expires_in.parse().unwrap_or(3600))
}

fn provider_error(e: reqwest::Error) -> AuthError {
    AuthError::Provider {
        message: e.to_string(),
    }
}
