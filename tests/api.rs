use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use bitsa_server::admin::AdminList;
use bitsa_server::identity::{AuthUser, IdentityError, IdentityVerifier, NewAccount, Session};
use bitsa_server::models::Profile;
use bitsa_server::profile::profile_key;
use bitsa_server::store::{MemoryStore, RecordStore};
use bitsa_server::{build_router, AppData, AppState};

const MEMBER_TOKEN: &str = "member-token";
const OTHER_MEMBER_TOKEN: &str = "other-member-token";
const ADMIN_TOKEN: &str = "admin-token";

struct StaticVerifier {
    users: HashMap<String, AuthUser>,
}

#[async_trait]
impl IdentityVerifier for StaticVerifier {
    async fn verify(&self, access_token: &str) -> Result<AuthUser, IdentityError> {
        self.users
            .get(access_token)
            .cloned()
            .ok_or(IdentityError::InvalidToken)
    }

    async fn create_account(&self, account: NewAccount) -> Result<AuthUser, IdentityError> {
        Ok(AuthUser {
            id: format!("acct-{}", account.email),
            email: account.email,
        })
    }

    async fn sign_in(&self, email: &str, _password: &str) -> Result<Session, IdentityError> {
        Ok(Session {
            access_token: "fresh-token".to_string(),
            token_type: "bearer".to_string(),
            expires_in: 3600,
            refresh_token: "refresh".to_string(),
            user: json!({ "id": format!("acct-{}", email), "email": email }),
        })
    }
}

fn test_state() -> (AppState, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let mut users = HashMap::new();
    users.insert(
        MEMBER_TOKEN.to_string(),
        AuthUser {
            id: "user-1".to_string(),
            email: "member@bitsa.club".to_string(),
        },
    );
    users.insert(
        OTHER_MEMBER_TOKEN.to_string(),
        AuthUser {
            id: "user-2".to_string(),
            email: "other@bitsa.club".to_string(),
        },
    );
    // Mixed case and padding on purpose: the allow-list below is lowercase.
    users.insert(
        ADMIN_TOKEN.to_string(),
        AuthUser {
            id: "user-9".to_string(),
            email: " Chair@Bitsa.Club ".to_string(),
        },
    );
    let state = Arc::new(AppData {
        store: store.clone(),
        identity: Arc::new(StaticVerifier { users }),
        admins: AdminList::new(["chair@bitsa.club"]),
    });
    (state, store)
}

async fn send(
    state: &AppState,
    method: &str,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = build_router(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn seed_profile(store: &MemoryStore, user_id: &str, name: &str, email: &str, student_id: &str) {
    let profile = Profile {
        name: name.to_string(),
        email: email.to_string(),
        student_id: student_id.to_string(),
        bio: String::new(),
        major: String::new(),
        year: String::new(),
        interests: Vec::new(),
        github: String::new(),
        linkedin: String::new(),
        created_at: Utc::now(),
        updated_at: None,
    };
    store
        .set(&profile_key(user_id), serde_json::to_value(&profile).unwrap())
        .await
        .unwrap();
}

async fn create_event(state: &AppState, title: &str, date: &str) -> String {
    let (status, body) = send(
        state,
        "POST",
        "/api/admin/events",
        Some(ADMIN_TOKEN),
        Some(json!({
            "title": title,
            "date": date,
            "time": "18:00",
            "location": "Main Hall",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["event"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_is_public() {
    let (state, _) = test_state();
    let (status, body) = send(&state, "GET", "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn submitted_article_starts_pending_with_computed_read_time() {
    let (state, _) = test_state();
    let content = vec!["word"; 250].join(" ");
    let (status, body) = send(
        &state,
        "POST",
        "/api/articles/submit",
        Some(MEMBER_TOKEN),
        Some(json!({ "title": "A", "content": content })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["blog"]["status"], json!("pending"));
    assert_eq!(body["blog"]["readTime"], json!("2 min read"));
    // No profile seeded: the author name falls back to the email local part.
    assert_eq!(body["blog"]["author"], json!("member"));

    let (status, body) = send(&state, "GET", "/api/blogs", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["blogs"].as_array().unwrap().len(), 0);

    let (status, body) = send(&state, "GET", "/api/admin/blogs", Some(ADMIN_TOKEN), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["blogs"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn submission_requires_title_content_and_identity() {
    let (state, store) = test_state();
    let (status, _) = send(
        &state,
        "POST",
        "/api/articles/submit",
        Some(MEMBER_TOKEN),
        Some(json!({ "title": "no content" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &state,
        "POST",
        "/api/articles/submit",
        None,
        Some(json!({ "title": "A", "content": "B" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert!(store.get_by_prefix("blog:").await.unwrap().is_empty());
}

#[tokio::test]
async fn privileged_creation_is_approved_immediately() {
    let (state, _) = test_state();
    let (status, body) = send(
        &state,
        "POST",
        "/api/admin/blogs",
        Some(ADMIN_TOKEN),
        Some(json!({ "title": "News", "content": "Body", "author": "The Chair" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["blog"]["status"], json!("approved"));

    let (_, body) = send(&state, "GET", "/api/blogs", None, None).await;
    assert_eq!(body["blogs"].as_array().unwrap().len(), 1);

    let (status, _) = send(
        &state,
        "POST",
        "/api/admin/blogs",
        Some(MEMBER_TOKEN),
        Some(json!({ "title": "News", "content": "Body", "author": "Member" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn approval_and_rejection_drive_public_visibility() {
    let (state, _) = test_state();
    let (_, body) = send(
        &state,
        "POST",
        "/api/articles/submit",
        Some(MEMBER_TOKEN),
        Some(json!({ "title": "A", "content": "B" })),
    )
    .await;
    let id = body["blog"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &state,
        "PUT",
        &format!("/api/admin/blogs/{}/approve", id),
        Some(ADMIN_TOKEN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["blog"]["status"], json!("approved"));

    let (_, body) = send(&state, "GET", "/api/blogs", None, None).await;
    assert_eq!(body["blogs"][0]["id"], json!(id));

    let (status, _) = send(
        &state,
        "PUT",
        &format!("/api/admin/blogs/{}/reject", id),
        Some(ADMIN_TOKEN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&state, "GET", "/api/blogs", None, None).await;
    assert_eq!(body["blogs"].as_array().unwrap().len(), 0);

    let (status, _) = send(
        &state,
        "PUT",
        "/api/admin/blogs/blog:missing/approve",
        Some(ADMIN_TOKEN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_preserves_status_when_payload_omits_it() {
    let (state, _) = test_state();
    let (_, body) = send(
        &state,
        "POST",
        "/api/articles/submit",
        Some(MEMBER_TOKEN),
        Some(json!({ "title": "A", "content": "B" })),
    )
    .await;
    let id = body["blog"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &state,
        "PUT",
        &format!("/api/admin/blogs/{}", id),
        Some(ADMIN_TOKEN),
        Some(json!({ "title": "A, revised" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["blog"]["title"], json!("A, revised"));
    assert_eq!(body["blog"]["status"], json!("pending"));
}

#[tokio::test]
async fn listing_all_blogs_is_privileged_and_read_only_on_failure() {
    let (state, store) = test_state();
    send(
        &state,
        "POST",
        "/api/articles/submit",
        Some(MEMBER_TOKEN),
        Some(json!({ "title": "A", "content": "B" })),
    )
    .await;
    let before = store.get_by_prefix("blog:").await.unwrap();

    let (status, _) = send(&state, "GET", "/api/admin/blogs", Some(MEMBER_TOKEN), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&state, "GET", "/api/admin/blogs", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert_eq!(store.get_by_prefix("blog:").await.unwrap(), before);
}

#[tokio::test]
async fn second_registration_for_same_event_conflicts() {
    let (state, store) = test_state();
    seed_profile(&store, "user-1", "Dana", "member@bitsa.club", "S-042").await;
    let event_id = create_event(&state, "Hack Night", "2999-05-01").await;

    let (status, body) = send(
        &state,
        "POST",
        &format!("/api/events/{}/register", event_id),
        Some(MEMBER_TOKEN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["registration"]["eventTitle"], json!("Hack Night"));
    assert_eq!(body["registration"]["userName"], json!("Dana"));
    assert_eq!(body["registration"]["studentId"], json!("S-042"));

    let (status, body) = send(
        &state,
        "POST",
        &format!("/api/events/{}/register", event_id),
        Some(MEMBER_TOKEN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        body["error"],
        json!("You are already registered for this event")
    );

    let (status, body) = send(
        &state,
        "GET",
        &format!("/api/admin/events/{}/registrations", event_id),
        Some(ADMIN_TOKEN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], json!(1));

    // A different member still gets in.
    let (status, _) = send(
        &state,
        "POST",
        &format!("/api/events/{}/register", event_id),
        Some(OTHER_MEMBER_TOKEN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn registering_for_a_missing_event_is_not_found() {
    let (state, _) = test_state();
    let (status, _) = send(
        &state,
        "POST",
        "/api/events/event:missing/register",
        Some(MEMBER_TOKEN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn registration_snapshot_survives_event_rename() {
    let (state, _) = test_state();
    let event_id = create_event(&state, "Original Title", "2999-05-01").await;
    send(
        &state,
        "POST",
        &format!("/api/events/{}/register", event_id),
        Some(MEMBER_TOKEN),
        None,
    )
    .await;

    let (status, _) = send(
        &state,
        "PUT",
        &format!("/api/admin/events/{}", event_id),
        Some(ADMIN_TOKEN),
        Some(json!({ "title": "Renamed" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(
        &state,
        "GET",
        &format!("/api/admin/events/{}/registrations", event_id),
        Some(ADMIN_TOKEN),
        None,
    )
    .await;
    assert_eq!(body["registrations"][0]["eventTitle"], json!("Original Title"));
}

#[tokio::test]
async fn check_registration_never_hard_fails() {
    let (state, _) = test_state();
    let event_id = create_event(&state, "Hack Night", "2999-05-01").await;

    let path = format!("/api/events/{}/check-registration", event_id);
    let (status, body) = send(&state, "GET", &path, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isRegistered"], json!(false));

    let (status, body) = send(&state, "GET", &path, Some("garbage-token"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isRegistered"], json!(false));

    send(
        &state,
        "POST",
        &format!("/api/events/{}/register", event_id),
        Some(MEMBER_TOKEN),
        None,
    )
    .await;
    let (status, body) = send(&state, "GET", &path, Some(MEMBER_TOKEN), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isRegistered"], json!(true));
}

#[tokio::test]
async fn deleting_an_event_cascades_its_registrations() {
    let (state, store) = test_state();
    let event_id = create_event(&state, "Hack Night", "2999-05-01").await;
    let other_event = create_event(&state, "Demo Day", "2999-06-01").await;
    for token in [MEMBER_TOKEN, OTHER_MEMBER_TOKEN] {
        send(
            &state,
            "POST",
            &format!("/api/events/{}/register", event_id),
            Some(token),
            None,
        )
        .await;
    }
    send(
        &state,
        "POST",
        &format!("/api/events/{}/register", other_event),
        Some(MEMBER_TOKEN),
        None,
    )
    .await;

    let (status, _) = send(
        &state,
        "DELETE",
        &format!("/api/admin/events/{}", event_id),
        Some(ADMIN_TOKEN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(
        &state,
        "GET",
        &format!("/api/admin/events/{}/registrations", event_id),
        Some(ADMIN_TOKEN),
        None,
    )
    .await;
    assert_eq!(body["count"], json!(0));
    assert!(store.get(&event_id).await.unwrap().is_none());

    // The other event's ledger is untouched.
    let (_, body) = send(
        &state,
        "GET",
        &format!("/api/admin/events/{}/registrations", other_event),
        Some(ADMIN_TOKEN),
        None,
    )
    .await;
    assert_eq!(body["count"], json!(1));
}

#[tokio::test]
async fn events_list_classifies_upcoming_and_past() {
    let (state, _) = test_state();
    create_event(&state, "Retro", "2000-01-01").await;
    create_event(&state, "Kickoff", "2999-01-01").await;

    let (status, body) = send(&state, "GET", "/api/events", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let events = body["events"].as_array().unwrap();
    assert_eq!(events.len(), 2);
    // Sorted by date ascending: past first.
    assert_eq!(events[0]["title"], json!("Retro"));
    assert_eq!(events[0]["upcoming"], json!(false));
    assert_eq!(events[1]["title"], json!("Kickoff"));
    assert_eq!(events[1]["upcoming"], json!(true));
}

#[tokio::test]
async fn profile_email_and_student_id_are_write_once() {
    let (state, store) = test_state();
    seed_profile(&store, "user-1", "Dana", "member@bitsa.club", "S-042").await;

    let (status, body) = send(
        &state,
        "PUT",
        "/api/profile",
        Some(MEMBER_TOKEN),
        Some(json!({
            "name": "Dana K.",
            "email": "new@elsewhere.com",
            "studentId": "S-999",
            "bio": "hi",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["profile"]["name"], json!("Dana K."));
    assert_eq!(body["profile"]["bio"], json!("hi"));
    assert_eq!(body["profile"]["email"], json!("member@bitsa.club"));
    assert_eq!(body["profile"]["studentId"], json!("S-042"));

    let stored = store.get(&profile_key("user-1")).await.unwrap().unwrap();
    assert_eq!(stored["email"], json!("member@bitsa.club"));
    assert_eq!(stored["studentId"], json!("S-042"));
}

#[tokio::test]
async fn signup_seeds_a_profile_and_counts_members() {
    let (state, _) = test_state();
    let (status, _) = send(
        &state,
        "POST",
        "/api/signup",
        None,
        Some(json!({ "name": "Lee", "email": "lee@x.com", "password": "pw" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &state,
        "POST",
        "/api/signup",
        None,
        Some(json!({
            "name": "Lee",
            "email": "lee@x.com",
            "password": "pw",
            "studentId": "S-001",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["name"], json!("Lee"));

    let (_, body) = send(&state, "GET", "/api/stats/members", None, None).await;
    assert_eq!(body["count"], json!(1));
}

#[tokio::test]
async fn google_signup_returns_existing_profile_unchanged() {
    let (state, store) = test_state();
    seed_profile(&store, "user-1", "Dana", "member@bitsa.club", "S-042").await;

    let (status, body) = send(
        &state,
        "POST",
        "/api/google-signup",
        Some(MEMBER_TOKEN),
        Some(json!({ "name": "Different Name", "email": "member@bitsa.club" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["profile"]["name"], json!("Dana"));
    assert_eq!(body["profile"]["studentId"], json!("S-042"));
}

#[tokio::test]
async fn admin_check_reports_privilege_with_matching_status() {
    let (state, _) = test_state();
    let (status, body) = send(&state, "GET", "/api/admin/check", Some(ADMIN_TOKEN), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isAdmin"], json!(true));

    let (status, body) = send(&state, "GET", "/api/admin/check", Some(MEMBER_TOKEN), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["isAdmin"], json!(false));

    let (status, body) = send(&state, "GET", "/api/admin/check", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["isAdmin"], json!(false));
}

#[tokio::test]
async fn gallery_requires_url_and_supports_removal() {
    let (state, _) = test_state();
    let (status, _) = send(
        &state,
        "POST",
        "/api/admin/gallery",
        Some(ADMIN_TOKEN),
        Some(json!({ "caption": "no url" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &state,
        "POST",
        "/api/admin/gallery",
        Some(ADMIN_TOKEN),
        Some(json!({ "url": "https://img.example/1.jpg" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["photo"]["category"], json!("general"));
    let photo_id = body["photo"]["id"].as_str().unwrap().to_string();

    let (_, body) = send(&state, "GET", "/api/gallery", None, None).await;
    assert_eq!(body["photos"].as_array().unwrap().len(), 1);

    let (status, _) = send(
        &state,
        "DELETE",
        &format!("/api/admin/gallery/{}", photo_id),
        Some(ADMIN_TOKEN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&state, "GET", "/api/gallery", None, None).await;
    assert_eq!(body["photos"].as_array().unwrap().len(), 0);
}
