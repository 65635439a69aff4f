//! Blog moderation workflow. Member submissions enter `pending` and become
//! visible only once a privileged caller approves them; privileged creations
//! are approved from the start.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::admin::require_admin;
use crate::error::{required, ApiError};
use crate::identity::authenticate;
use crate::models::{Article, ArticleStatus};
use crate::profile::{display_name, load_profile};
use crate::store;
use crate::AppState;

const WORDS_PER_MINUTE: usize = 200;

fn estimate_read_time(content: &str) -> String {
    let words = content.split_whitespace().count();
    let minutes = words.div_ceil(WORDS_PER_MINUTE).max(1);
    format!("{} min read", minutes)
}

fn blog_key() -> String {
    format!("blog:{}", Uuid::new_v4())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitArticleRequest {
    title: Option<String>,
    excerpt: Option<String>,
    content: Option<String>,
    tags: Option<Vec<String>>,
    image: Option<String>,
    read_time: Option<String>,
}

pub async fn submit_article(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(req): Json<SubmitArticleRequest>,
) -> Result<Json<Value>, ApiError> {
    let user = authenticate(&state, &headers).await?;
    let title = required(req.title, "Title and content are required")?;
    let content = required(req.content, "Title and content are required")?;

    let profile = load_profile(state.store.as_ref(), &user.id).await?;
    let author = display_name(profile.as_ref(), &user.email);
    let read_time = req
        .read_time
        .unwrap_or_else(|| estimate_read_time(&content));

    let now = Utc::now();
    let article = Article {
        id: blog_key(),
        title,
        excerpt: req.excerpt.unwrap_or_default(),
        content,
        author,
        author_id: Some(user.id),
        author_email: Some(user.email),
        tags: req.tags.unwrap_or_default(),
        image: req.image.unwrap_or_default(),
        read_time: Some(read_time),
        status: ArticleStatus::Pending,
        created_at: now,
        updated_at: now,
        approved_at: None,
        rejected_at: None,
    };
    state
        .store
        .set(&article.id, serde_json::to_value(&article)?)
        .await?;

    Ok(Json(json!({ "success": true, "blog": article })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateArticleRequest {
    title: Option<String>,
    excerpt: Option<String>,
    content: Option<String>,
    author: Option<String>,
    tags: Option<Vec<String>>,
    image: Option<String>,
}

pub async fn create_article(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(req): Json<CreateArticleRequest>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers).await?;
    let title = required(req.title, "Title, content, and author are required")?;
    let content = required(req.content, "Title, content, and author are required")?;
    let author = required(req.author, "Title, content, and author are required")?;

    let now = Utc::now();
    let article = Article {
        id: blog_key(),
        title,
        excerpt: req.excerpt.unwrap_or_default(),
        content,
        author,
        author_id: None,
        author_email: None,
        tags: req.tags.unwrap_or_default(),
        image: req.image.unwrap_or_default(),
        read_time: None,
        status: ArticleStatus::Approved,
        created_at: now,
        updated_at: now,
        approved_at: None,
        rejected_at: None,
    };
    state
        .store
        .set(&article.id, serde_json::to_value(&article)?)
        .await?;

    Ok(Json(json!({ "success": true, "blog": article })))
}

pub async fn list_public(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let mut blogs: Vec<Article> = store::fetch_prefix(state.store.as_ref(), "blog:").await?;
    blogs.retain(|blog| blog.status == ArticleStatus::Approved);
    blogs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(json!({ "success": true, "blogs": blogs })))
}

pub async fn list_all(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers).await?;
    let mut blogs: Vec<Article> = store::fetch_prefix(state.store.as_ref(), "blog:").await?;
    blogs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(json!({ "success": true, "blogs": blogs })))
}

async fn load_article(state: &AppState, id: &str) -> Result<Article, ApiError> {
    store::fetch(state.store.as_ref(), id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Blog not found".to_string()))
}

// Re-approving an already-approved article re-stamps the timestamps; there is
// no transition guard.
pub async fn approve_article(
    headers: HeaderMap,
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers).await?;
    let mut article = load_article(&state, &id).await?;
    let now = Utc::now();
    article.status = ArticleStatus::Approved;
    article.approved_at = Some(now);
    article.updated_at = now;
    state.store.set(&id, serde_json::to_value(&article)?).await?;
    Ok(Json(json!({ "success": true, "blog": article })))
}

pub async fn reject_article(
    headers: HeaderMap,
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers).await?;
    let mut article = load_article(&state, &id).await?;
    let now = Utc::now();
    article.status = ArticleStatus::Rejected;
    article.rejected_at = Some(now);
    article.updated_at = now;
    state.store.set(&id, serde_json::to_value(&article)?).await?;
    Ok(Json(json!({ "success": true, "blog": article })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateArticleRequest {
    title: Option<String>,
    excerpt: Option<String>,
    content: Option<String>,
    author: Option<String>,
    tags: Option<Vec<String>>,
    image: Option<String>,
    read_time: Option<String>,
    status: Option<ArticleStatus>,
}

pub async fn update_article(
    headers: HeaderMap,
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(req): Json<UpdateArticleRequest>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers).await?;
    let mut article = load_article(&state, &id).await?;

    if let Some(title) = req.title {
        article.title = title;
    }
    if let Some(excerpt) = req.excerpt {
        article.excerpt = excerpt;
    }
    if let Some(content) = req.content {
        article.content = content;
    }
    if let Some(author) = req.author {
        article.author = author;
    }
    if let Some(tags) = req.tags {
        article.tags = tags;
    }
    if let Some(image) = req.image {
        article.image = image;
    }
    if let Some(read_time) = req.read_time {
        article.read_time = Some(read_time);
    }
    // Status is preserved when the payload omits it.
    if let Some(status) = req.status {
        article.status = status;
    }
    article.updated_at = Utc::now();

    state.store.set(&id, serde_json::to_value(&article)?).await?;
    Ok(Json(json!({ "success": true, "blog": article })))
}

pub async fn delete_article(
    headers: HeaderMap,
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&state, &headers).await?;
    state.store.delete(&id).await?;
    Ok(Json(json!({ "success": true })))
}
