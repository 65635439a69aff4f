//! Events and the registration ledger. A registration's key is the
//! (event, user) composite, so the conditional write is the uniqueness gate;
//! deleting an event cascades over its registration prefix.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::admin::require_admin;
use crate::error::{required, ApiError};
use crate::identity::{authenticate, bearer_token};
use crate::models::{Event, Registration};
use crate::profile::{display_name, load_profile};
use crate::store;
use crate::AppState;

fn event_key() -> String {
    format!("event:{}", Uuid::new_v4())
}

fn registration_key(event_id: &str, user_id: &str) -> String {
    format!("registration:{}:{}", event_id, user_id)
}

// Trailing separator so one event key can never prefix-match another's
// registrations.
fn registration_prefix(event_id: &str) -> String {
    format!("registration:{}:", event_id)
}

pub async fn list_events(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let mut events: Vec<Event> = store::fetch_prefix(state.store.as_ref(), "event:").await?;
    events.sort_by(|a, b| (&a.date, &a.time).cmp(&(&b.date, &b.time)));

    let now = Utc::now().naive_utc();
    let mut items = Vec::with_capacity(events.len());
    for event in &events {
        let mut item = serde_json::to_value(event)?;
        item["upcoming"] = Value::Bool(event.is_upcoming(now));
        items.push(item);
    }
    Ok(Json(json!({ "success": true, "events": items })))
}

#[derive(Deserialize)]
pub struct CreateEventRequest {
    title: Option<String>,
    description: Option<String>,
    date: Option<String>,
    time: Option<String>,
    location: Option<String>,
    image: Option<String>,
    category: Option<String>,
}

pub async fn create_event(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(req): Json<CreateEventRequest>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers).await?;
    let title = required(req.title, "Title, date, time, and location are required")?;
    let date = required(req.date, "Title, date, time, and location are required")?;
    let time = required(req.time, "Title, date, time, and location are required")?;
    let location = required(req.location, "Title, date, time, and location are required")?;

    let now = Utc::now();
    let event = Event {
        id: event_key(),
        title,
        description: req.description.unwrap_or_default(),
        date,
        time,
        location,
        image: req.image.unwrap_or_default(),
        category: req.category,
        created_at: now,
        updated_at: now,
    };
    state
        .store
        .set(&event.id, serde_json::to_value(&event)?)
        .await?;

    Ok(Json(json!({ "success": true, "event": event })))
}

#[derive(Deserialize)]
pub struct UpdateEventRequest {
    title: Option<String>,
    description: Option<String>,
    date: Option<String>,
    time: Option<String>,
    location: Option<String>,
    image: Option<String>,
    category: Option<String>,
}

pub async fn update_event(
    headers: HeaderMap,
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(req): Json<UpdateEventRequest>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers).await?;
    let mut event: Event = store::fetch(state.store.as_ref(), &id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Event not found".to_string()))?;

    if let Some(title) = req.title {
        event.title = title;
    }
    if let Some(description) = req.description {
        event.description = description;
    }
    if let Some(date) = req.date {
        event.date = date;
    }
    if let Some(time) = req.time {
        event.time = time;
    }
    if let Some(location) = req.location {
        event.location = location;
    }
    if let Some(image) = req.image {
        event.image = image;
    }
    if let Some(category) = req.category {
        event.category = Some(category);
    }
    event.updated_at = Utc::now();

    state.store.set(&id, serde_json::to_value(&event)?).await?;
    Ok(Json(json!({ "success": true, "event": event })))
}

pub async fn delete_event(
    headers: HeaderMap,
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers).await?;

    // Cascade first so no orphaned registration survives the event. Single
    // failures are logged and skipped rather than aborting the sweep.
    let registrations = state
        .store
        .get_by_prefix(&registration_prefix(&id))
        .await?;
    for registration in registrations {
        let Some(key) = registration.get("id").and_then(Value::as_str) else {
            log::warn!("registration under event {} has no id field, skipping", id);
            continue;
        };
        if let Err(err) = state.store.delete(key).await {
            log::warn!("failed to delete registration {}: {}", key, err);
        }
    }

    state.store.delete(&id).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn register_for_event(
    headers: HeaderMap,
    Path(event_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    let event: Event = store::fetch(state.store.as_ref(), &event_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Event not found".to_string()))?;

    // Name and student id are snapshots taken now, not live joins.
    let profile = load_profile(state.store.as_ref(), &user.id).await?;
    let registration = Registration {
        id: registration_key(&event_id, &user.id),
        event_id: event_id.clone(),
        event_title: event.title,
        user_name: display_name(profile.as_ref(), &user.email),
        student_id: profile.map(|profile| profile.student_id).unwrap_or_default(),
        user_id: user.id,
        user_email: user.email,
        registered_at: Utc::now(),
    };

    // The conditional write is the uniqueness gate; a lost race surfaces here
    // as a conflict, never as a second record.
    let created = state
        .store
        .set_if_absent(&registration.id, serde_json::to_value(&registration)?)
        .await?;
    if !created {
        return Err(ApiError::Conflict(
            "You are already registered for this event".to_string(),
        ));
    }

    Ok(Json(json!({ "success": true, "registration": registration })))
}

// UI-convenience query; answers "not registered" instead of failing.
pub async fn check_registration(
    headers: HeaderMap,
    Path(event_id): Path<String>,
    State(state): State<AppState>,
) -> Json<Value> {
    let Some(token) = bearer_token(&headers) else {
        return Json(json!({ "isRegistered": false }));
    };
    let Ok(user) = state.identity.verify(token).await else {
        return Json(json!({ "isRegistered": false }));
    };
    match state.store.get(&registration_key(&event_id, &user.id)).await {
        Ok(Some(registration)) => {
            Json(json!({ "isRegistered": true, "registration": registration }))
        }
        _ => Json(json!({ "isRegistered": false })),
    }
}

pub async fn list_registrations(
    headers: HeaderMap,
    Path(event_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers).await?;
    let registrations: Vec<Registration> =
        store::fetch_prefix(state.store.as_ref(), &registration_prefix(&event_id)).await?;
    Ok(Json(json!({
        "success": true,
        "count": registrations.len(),
        "registrations": registrations,
    })))
}
