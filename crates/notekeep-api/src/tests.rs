//! Router tests driven with `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::{
  Router,
  body::Body,
  http::{Request, StatusCode, header},
};
use notekeep_auth::HasherConfig;
use notekeep_core::{note::now_millis, store::SessionStore};
use notekeep_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt as _;

use crate::{AppState, router};

const FAST: HasherConfig = HasherConfig { memory_kib: 64, iterations: 1, parallelism: 1 };

async fn app() -> (Router, Arc<SqliteStore>) {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  let state = AppState::new(Arc::clone(&store), &FAST, chrono::Duration::hours(24)).unwrap();
  (router(state), store)
}

async fn call(
  app: &Router,
  method: &str,
  uri: &str,
  token: Option<&str>,
  body: Option<Value>,
) -> (StatusCode, Value) {
  let mut builder = Request::builder().method(method).uri(uri);
  if let Some(token) = token {
    builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
  }
  let body = match body {
    Some(v) => {
      builder = builder.header(header::CONTENT_TYPE, "application/json");
      Body::from(v.to_string())
    }
    None => Body::empty(),
  };
  let resp = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
  (status, value)
}

async fn register(app: &Router, email: &str) -> String {
  let (status, body) = call(
    app,
    "POST",
    "/api/auth/register",
    None,
    Some(json!({ "name": "Ana Lovelace", "email": email, "password": "hunter22" })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED, "{body}");
  body["token"].as_str().unwrap().to_owned()
}

// ─── Accounts ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn register_returns_token_and_user() {
  let (app, _) = app().await;
  let (status, body) = call(
    &app,
    "POST",
    "/api/auth/register",
    None,
    Some(json!({ "name": "Ana", "email": "ana@example.com", "password": "hunter22" })),
  )
  .await;

  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(body["success"], true);
  assert_eq!(body["user"]["email"], "ana@example.com");
  assert!(body["user"]["id"].is_string());
  assert!(!body["token"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_registration_is_409() {
  let (app, _) = app().await;
  register(&app, "ana@example.com").await;
  let (status, body) = call(
    &app,
    "POST",
    "/api/auth/register",
    None,
    Some(json!({ "name": "Other", "email": "ana@example.com", "password": "secret99" })),
  )
  .await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert!(body["error"].is_string());
}

#[tokio::test]
async fn invalid_registration_is_400() {
  let (app, _) = app().await;
  let (status, body) = call(
    &app,
    "POST",
    "/api/auth/register",
    None,
    Some(json!({ "name": "Ana", "email": "ana@example.com", "password": "123" })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(body["error"].as_str().unwrap().contains("password"));
}

#[tokio::test]
async fn malformed_json_is_a_json_400() {
  let (app, _) = app().await;
  let req = Request::builder()
    .method("POST")
    .uri("/api/auth/login")
    .header(header::CONTENT_TYPE, "application/json")
    .body(Body::from("{not json"))
    .unwrap();
  let resp = app.oneshot(req).await.unwrap();
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  let body: Value = serde_json::from_slice(&bytes).unwrap();
  assert!(body["error"].is_string());
}

#[tokio::test]
async fn login_failures_share_one_response() {
  let (app, _) = app().await;
  register(&app, "ana@example.com").await;

  let bad_password = call(
    &app,
    "POST",
    "/api/auth/login",
    None,
    Some(json!({ "email": "ana@example.com", "password": "wrong-one" })),
  )
  .await;
  let unknown_email = call(
    &app,
    "POST",
    "/api/auth/login",
    None,
    Some(json!({ "email": "who@example.com", "password": "hunter22" })),
  )
  .await;

  assert_eq!(bad_password.0, StatusCode::UNAUTHORIZED);
  assert_eq!(bad_password, unknown_email);
}

#[tokio::test]
async fn login_issues_a_working_token() {
  let (app, _) = app().await;
  register(&app, "ana@example.com").await;
  let (status, body) = call(
    &app,
    "POST",
    "/api/auth/login",
    None,
    Some(json!({ "email": "ana@example.com", "password": "hunter22" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  let token = body["token"].as_str().unwrap();

  let (status, _) = call(&app, "GET", "/api/notes", Some(token), None).await;
  assert_eq!(status, StatusCode::OK);
}

// ─── Bearer auth ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn notes_require_a_valid_token() {
  let (app, _) = app().await;
  let (status, body) = call(&app, "GET", "/api/notes", None, None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  assert!(body["error"].is_string());

  let (status, _) = call(&app, "GET", "/api/notes", Some("made-up"), None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_sessions_are_rejected() {
  let (app, store) = app().await;
  register(&app, "ana@example.com").await;
  let user = notekeep_core::store::UserStore::find_user_by_email(&*store, "ana@example.com")
    .await
    .unwrap()
    .unwrap()
    .user;

  let token = notekeep_core::user::AccessToken::new("stale-token");
  store
    .insert_session(
      notekeep_auth::token_digest(&token),
      user.id,
      now_millis() - chrono::Duration::minutes(1),
    )
    .await
    .unwrap();

  let (status, _) = call(&app, "GET", "/api/notes", Some(token.as_str()), None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ─── Notes ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn note_lifecycle() {
  let (app, _) = app().await;
  let token = register(&app, "ana@example.com").await;

  let (status, created) = call(
    &app,
    "POST",
    "/api/notes",
    Some(&token),
    Some(json!({ "title": "Groceries", "content": "" })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(created["createdAt"], created["updatedAt"]);
  assert!(created["imageUrl"].is_null());
  let id = created["id"].as_str().unwrap().to_owned();

  let (status, updated) = call(
    &app,
    "PUT",
    &format!("/api/notes/{id}"),
    Some(&token),
    Some(json!({ "title": "Groceries", "content": "eggs", "imageUrl": "content://1" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(updated["content"], "eggs");
  assert_eq!(updated["createdAt"], created["createdAt"]);
  assert!(updated["updatedAt"].as_str().unwrap() > created["updatedAt"].as_str().unwrap());

  let (status, fetched) = call(&app, "GET", &format!("/api/notes/{id}"), Some(&token), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(fetched, updated);

  let (status, _) = call(&app, "DELETE", &format!("/api/notes/{id}"), Some(&token), None).await;
  assert_eq!(status, StatusCode::NO_CONTENT);
  let (status, _) = call(&app, "GET", &format!("/api/notes/{id}"), Some(&token), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_puts_to_one_note_all_apply() {
  let (app, _) = app().await;
  let token = register(&app, "ana@example.com").await;
  let (_, created) = call(
    &app,
    "POST",
    "/api/notes",
    Some(&token),
    Some(json!({ "title": "Shared", "content": "" })),
  )
  .await;
  let uri = format!("/api/notes/{}", created["id"].as_str().unwrap());

  let edits: Vec<_> = (0..8)
    .map(|i| {
      let (app, token, uri) = (app.clone(), token.clone(), uri.clone());
      tokio::spawn(async move {
        call(&app, "PUT", &uri, Some(&token), Some(json!({ "title": "Shared", "content": format!("v{i}") })))
          .await
      })
    })
    .collect();

  let mut stamps = Vec::new();
  let mut latest = Value::Null;
  for edit in edits {
    let (status, body) = edit.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let stamp = body["updatedAt"].as_str().unwrap().to_owned();
    if latest.is_null() || stamp.as_str() > latest["updatedAt"].as_str().unwrap() {
      latest = body;
    }
    stamps.push(stamp);
  }

  // Each edit saw the previous one, so no two share an `updatedAt`.
  stamps.sort();
  stamps.dedup();
  assert_eq!(stamps.len(), 8);

  let (_, fetched) = call(&app, "GET", &uri, Some(&token), None).await;
  assert_eq!(fetched, latest);
}

#[tokio::test]
async fn empty_title_is_rejected() {
  let (app, _) = app().await;
  let token = register(&app, "ana@example.com").await;
  let (status, body) = call(
    &app,
    "POST",
    "/api/notes",
    Some(&token),
    Some(json!({ "title": "   ", "content": "x" })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(body["error"].as_str().unwrap().contains("title"));
}

#[tokio::test]
async fn notes_are_private_to_their_owner() {
  let (app, _) = app().await;
  let ana = register(&app, "ana@example.com").await;
  let bob = register(&app, "bob@example.com").await;

  let (_, created) = call(
    &app,
    "POST",
    "/api/notes",
    Some(&ana),
    Some(json!({ "title": "Private", "content": "" })),
  )
  .await;
  let id = created["id"].as_str().unwrap();

  let (status, _) = call(&app, "GET", &format!("/api/notes/{id}"), Some(&bob), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  let (status, _) = call(
    &app,
    "PUT",
    &format!("/api/notes/{id}"),
    Some(&bob),
    Some(json!({ "title": "Mine now", "content": "" })),
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  // Bob's delete is a no-op, Ana still has her note.
  let (status, _) = call(&app, "DELETE", &format!("/api/notes/{id}"), Some(&bob), None).await;
  assert_eq!(status, StatusCode::NO_CONTENT);
  let (_, list) = call(&app, "GET", "/api/notes", Some(&ana), None).await;
  assert_eq!(list.as_array().unwrap().len(), 1);
  let (_, list) = call(&app, "GET", "/api/notes", Some(&bob), None).await;
  assert!(list.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn list_is_newest_first() {
  let (app, _) = app().await;
  let token = register(&app, "ana@example.com").await;
  for title in ["first", "second", "third"] {
    call(&app, "POST", "/api/notes", Some(&token), Some(json!({ "title": title }))).await;
  }

  let (_, list) = call(&app, "GET", "/api/notes", Some(&token), None).await;
  let titles: Vec<_> = list.as_array().unwrap().iter().map(|n| n["title"].clone()).collect();
  assert_eq!(titles, vec![json!("third"), json!("second"), json!("first")]);
}

#[tokio::test]
async fn deleting_an_unknown_note_is_204() {
  let (app, _) = app().await;
  let token = register(&app, "ana@example.com").await;
  let (status, _) = call(&app, "DELETE", "/api/notes/does-not-exist", Some(&token), None).await;
  assert_eq!(status, StatusCode::NO_CONTENT);
}

// ─── Health ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_needs_no_auth() {
  let (app, _) = app().await;
  let (status, body) = call(&app, "GET", "/api/health", None, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["status"], "ok");
}
