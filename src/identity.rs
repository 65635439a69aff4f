//! External identity service client. Account storage, password handling and
//! email confirmation all live on the provider side; this process only
//! exchanges tokens and credentials over HTTP.

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::config::Config;
use crate::error::ApiError;
use crate::AppData;

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
    pub name: String,
}

/// Provider session as returned by the password grant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub token_type: String,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default)]
    pub refresh_token: String,
    pub user: serde_json::Value,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("invalid or expired token")]
    InvalidToken,
    /// The provider refused the request (bad credentials, duplicate email,
    /// unconfirmed address). Carries the provider's message.
    #[error("{0}")]
    Rejected(String),
    #[error("identity service unreachable: {0}")]
    Transport(#[from] reqwest::Error),
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, access_token: &str) -> Result<AuthUser, IdentityError>;

    /// Creates the account with the email-confirmation gate enabled; the
    /// first sign-in requires a confirmed address.
    async fn create_account(&self, account: NewAccount) -> Result<AuthUser, IdentityError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError>;
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Resolves the caller's identity or fails with 401. Any verifier failure is
/// reported as an authentication failure, not an internal error.
pub async fn authenticate(state: &AppData, headers: &HeaderMap) -> Result<AuthUser, ApiError> {
    let token = bearer_token(headers)
        .ok_or_else(|| ApiError::Unauthorized("No token provided".to_string()))?;
    state
        .identity
        .verify(token)
        .await
        .map_err(|_| ApiError::Unauthorized("Invalid or expired token".to_string()))
}

/// HTTP client for a GoTrue-compatible auth service.
pub struct AuthService {
    http: reqwest::Client,
    base_url: String,
    service_key: String,
    anon_key: String,
}

impl AuthService {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.auth_url.trim_end_matches('/').to_string(),
            service_key: config.auth_service_key.clone(),
            anon_key: config.auth_anon_key.clone(),
        }
    }

    async fn rejection(response: reqwest::Response) -> IdentityError {
        #[derive(Deserialize)]
        struct ErrorBody {
            msg: Option<String>,
            message: Option<String>,
            error_description: Option<String>,
        }
        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body
                .msg
                .or(body.message)
                .or(body.error_description)
                .unwrap_or_else(|| "Request rejected by identity service".to_string()),
            Err(_) => "Request rejected by identity service".to_string(),
        };
        IdentityError::Rejected(message)
    }
}

#[derive(Deserialize)]
struct ProviderUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl From<ProviderUser> for AuthUser {
    fn from(user: ProviderUser) -> Self {
        AuthUser {
            id: user.id,
            email: user.email.unwrap_or_default(),
        }
    }
}

#[async_trait]
impl IdentityVerifier for AuthService {
    async fn verify(&self, access_token: &str) -> Result<AuthUser, IdentityError> {
        let response = self
            .http
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.service_key)
            .bearer_auth(access_token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(IdentityError::InvalidToken);
        }
        let user: ProviderUser = response.json().await?;
        Ok(user.into())
    }

    async fn create_account(&self, account: NewAccount) -> Result<AuthUser, IdentityError> {
        let response = self
            .http
            .post(format!("{}/auth/v1/admin/users", self.base_url))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .json(&json!({
                "email": account.email,
                "password": account.password,
                "email_confirm": false,
                "user_metadata": { "name": account.name },
            }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }
        let user: ProviderUser = response.json().await?;
        Ok(user.into())
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        let response = self
            .http
            .post(format!(
                "{}/auth/v1/token?grant_type=password",
                self.base_url
            ))
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }
        Ok(response.json().await?)
    }
}
