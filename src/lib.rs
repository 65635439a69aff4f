use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;

pub mod admin;
pub mod blogs;
pub mod config;
pub mod error;
pub mod events;
pub mod gallery;
pub mod identity;
pub mod models;
pub mod profile;
pub mod store;

use admin::AdminList;
use identity::IdentityVerifier;
use store::RecordStore;

pub type AppState = Arc<AppData>;

pub struct AppData {
    pub store: Arc<dyn RecordStore>,
    pub identity: Arc<dyn IdentityVerifier>,
    pub admins: AdminList,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        // Accounts and profiles
        .route("/api/signup", post(profile::signup))
        .route("/api/google-signup", post(profile::google_signup))
        .route("/api/signin", post(profile::signin))
        .route(
            "/api/profile",
            get(profile::get_profile).put(profile::update_profile),
        )
        .route("/api/stats/members", get(profile::members_count))
        // Privilege check
        .route("/api/admin/check", get(admin::check_admin))
        // Blog moderation
        .route("/api/blogs", get(blogs::list_public))
        .route("/api/articles/submit", post(blogs::submit_article))
        .route(
            "/api/admin/blogs",
            get(blogs::list_all).post(blogs::create_article),
        )
        .route(
            "/api/admin/blogs/:id",
            put(blogs::update_article).delete(blogs::delete_article),
        )
        .route("/api/admin/blogs/:id/approve", put(blogs::approve_article))
        .route("/api/admin/blogs/:id/reject", put(blogs::reject_article))
        // Events and registrations
        .route("/api/events", get(events::list_events))
        .route("/api/events/:id/register", post(events::register_for_event))
        .route(
            "/api/events/:id/check-registration",
            get(events::check_registration),
        )
        .route("/api/admin/events", post(events::create_event))
        .route(
            "/api/admin/events/:id",
            put(events::update_event).delete(events::delete_event),
        )
        .route(
            "/api/admin/events/:id/registrations",
            get(events::list_registrations),
        )
        // Gallery
        .route("/api/gallery", get(gallery::list_photos))
        .route("/api/admin/gallery", post(gallery::add_photo))
        .route("/api/admin/gallery/:id", delete(gallery::delete_photo))
        .layer(RequestBodyLimitLayer::new(2 * 1024 * 1024)) // 2MB limit
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
