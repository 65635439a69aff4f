use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use std::collections::HashSet;

use crate::error::ApiError;
use crate::identity::{authenticate, AuthUser};
use crate::{AppData, AppState};

/// The privilege allow-list. Membership is by verified email, compared
/// case-insensitively after trimming; the list itself is injected from
/// configuration, never read from the data path.
#[derive(Debug, Clone, Default)]
pub struct AdminList {
    emails: HashSet<String>,
}

impl AdminList {
    pub fn new<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            emails: emails
                .into_iter()
                .map(|email| normalize(email.as_ref()))
                .filter(|email| !email.is_empty())
                .collect(),
        }
    }

    pub fn is_admin(&self, email: &str) -> bool {
        let email = normalize(email);
        !email.is_empty() && self.emails.contains(&email)
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Authenticates the caller and checks the allow-list. 401 without a valid
/// identity, 403 for a valid identity that is not privileged.
pub async fn require_admin(state: &AppData, headers: &HeaderMap) -> Result<AuthUser, ApiError> {
    let user = authenticate(state, headers).await?;
    if !state.admins.is_admin(&user.email) {
        return Err(ApiError::Forbidden("Admin access required".to_string()));
    }
    Ok(user)
}

pub async fn check_admin(headers: HeaderMap, State(state): State<AppState>) -> impl IntoResponse {
    match require_admin(&state, &headers).await {
        Ok(user) => (
            StatusCode::OK,
            Json(json!({ "isAdmin": true, "email": user.email })),
        ),
        Err(err) => (err.status(), Json(json!({ "isAdmin": false }))),
    }
}
