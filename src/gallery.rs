use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::admin::require_admin;
use crate::error::{required, ApiError};
use crate::models::Photo;
use crate::store;
use crate::AppState;

pub async fn list_photos(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let mut photos: Vec<Photo> = store::fetch_prefix(state.store.as_ref(), "photo:").await?;
    photos.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(json!({ "success": true, "photos": photos })))
}

#[derive(Deserialize)]
pub struct AddPhotoRequest {
    url: Option<String>,
    caption: Option<String>,
    category: Option<String>,
}

pub async fn add_photo(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(req): Json<AddPhotoRequest>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers).await?;
    let url = required(req.url, "Image URL is required")?;

    let photo = Photo {
        id: format!("photo:{}", Uuid::new_v4()),
        url,
        caption: req.caption.unwrap_or_default(),
        category: req.category.unwrap_or_else(Photo::default_category),
        created_at: Utc::now(),
    };
    state
        .store
        .set(&photo.id, serde_json::to_value(&photo)?)
        .await?;

    Ok(Json(json!({ "success": true, "photo": photo })))
}

pub async fn delete_photo(
    headers: HeaderMap,
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers).await?;
    state.store.delete(&id).await?;
    Ok(Json(json!({ "success": true })))
}
