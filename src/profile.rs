use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{required, ApiError};
use crate::identity::{authenticate, NewAccount};
use crate::models::Profile;
use crate::store::{self, RecordStore, StoreError};
use crate::AppState;

pub fn profile_key(user_id: &str) -> String {
    format!("profile:{}", user_id)
}

pub async fn load_profile(
    store: &dyn RecordStore,
    user_id: &str,
) -> Result<Option<Profile>, StoreError> {
    store::fetch(store, &profile_key(user_id)).await
}

/// Profile name, falling back to the local part of the email, then
/// "Anonymous".
pub fn display_name(profile: Option<&Profile>, email: &str) -> String {
    if let Some(profile) = profile {
        if !profile.name.trim().is_empty() {
            return profile.name.clone();
        }
    }
    email
        .split('@')
        .next()
        .filter(|local| !local.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| "Anonymous".to_string())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    name: Option<String>,
    email: Option<String>,
    password: Option<String>,
    student_id: Option<String>,
}

pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<Json<Value>, ApiError> {
    let name = required(req.name, "All fields are required")?;
    let email = required(req.email, "All fields are required")?;
    let password = required(req.password, "All fields are required")?;
    let student_id = required(req.student_id, "All fields are required")?;

    let account = state
        .identity
        .create_account(NewAccount {
            email: email.clone(),
            password,
            name: name.clone(),
        })
        .await?;

    let profile = Profile {
        name,
        email,
        student_id,
        bio: String::new(),
        major: String::new(),
        year: String::new(),
        interests: Vec::new(),
        github: String::new(),
        linkedin: String::new(),
        created_at: Utc::now(),
        updated_at: None,
    };
    state
        .store
        .set(&profile_key(&account.id), serde_json::to_value(&profile)?)
        .await?;

    Ok(Json(json!({
        "success": true,
        "user": { "id": account.id, "email": profile.email, "name": profile.name },
    })))
}

#[derive(Deserialize)]
pub struct GoogleSignupRequest {
    name: Option<String>,
    email: Option<String>,
}

// Profile bootstrap for identity-provider-originated accounts; they carry no
// student id at creation.
pub async fn google_signup(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(req): Json<GoogleSignupRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    let name = required(req.name, "Name and email are required")?;
    let email = required(req.email, "Name and email are required")?;

    if let Some(existing) = load_profile(state.store.as_ref(), &user.id).await? {
        return Ok(Json(json!({ "success": true, "profile": existing })));
    }

    let profile = Profile {
        name,
        email,
        student_id: String::new(),
        bio: String::new(),
        major: String::new(),
        year: String::new(),
        interests: Vec::new(),
        github: String::new(),
        linkedin: String::new(),
        created_at: Utc::now(),
        updated_at: None,
    };
    state
        .store
        .set(&profile_key(&user.id), serde_json::to_value(&profile)?)
        .await?;

    Ok(Json(json!({ "success": true, "profile": profile })))
}

#[derive(Deserialize)]
pub struct SigninRequest {
    email: Option<String>,
    password: Option<String>,
}

pub async fn signin(
    State(state): State<AppState>,
    Json(req): Json<SigninRequest>,
) -> Result<Json<Value>, ApiError> {
    let email = required(req.email, "Email and password are required")?;
    let password = required(req.password, "Email and password are required")?;

    let session = state.identity.sign_in(&email, &password).await?;
    let profile = match session.user.get("id").and_then(Value::as_str) {
        Some(user_id) => load_profile(state.store.as_ref(), user_id).await?,
        None => None,
    };

    Ok(Json(json!({
        "success": true,
        "user": session.user.clone(),
        "session": session,
        "profile": profile,
    })))
}

pub async fn get_profile(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    let profile = load_profile(state.store.as_ref(), &user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Profile not found".to_string()))?;
    Ok(Json(json!({ "success": true, "profile": profile })))
}

/// `email` and `studentId` are deliberately absent: update payloads may carry
/// them, but they are discarded and the stored values win.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    name: Option<String>,
    bio: Option<String>,
    major: Option<String>,
    year: Option<String>,
    interests: Option<Vec<String>>,
    github: Option<String>,
    linkedin: Option<String>,
}

pub async fn update_profile(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    let mut profile = load_profile(state.store.as_ref(), &user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Profile not found".to_string()))?;

    if let Some(name) = req.name {
        profile.name = name;
    }
    if let Some(bio) = req.bio {
        profile.bio = bio;
    }
    if let Some(major) = req.major {
        profile.major = major;
    }
    if let Some(year) = req.year {
        profile.year = year;
    }
    if let Some(interests) = req.interests {
        profile.interests = interests;
    }
    if let Some(github) = req.github {
        profile.github = github;
    }
    if let Some(linkedin) = req.linkedin {
        profile.linkedin = linkedin;
    }
    profile.updated_at = Some(Utc::now());

    state
        .store
        .set(&profile_key(&user.id), serde_json::to_value(&profile)?)
        .await?;

    Ok(Json(json!({ "success": true, "profile": profile })))
}

pub async fn members_count(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let profiles = state.store.get_by_prefix("profile:").await?;
    Ok(Json(json!({ "success": true, "count": profiles.len() })))
}
