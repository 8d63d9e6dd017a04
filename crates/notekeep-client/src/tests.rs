//! `ApiClient` against the real API router served on an ephemeral port.

use std::{
  sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
  },
  time::Duration,
};

use axum::{Router, routing::get};
use notekeep_api::AppState;
use notekeep_auth::HasherConfig;
use notekeep_core::{
  Error,
  note::NoteDraft,
  store::{AuthRemote, NoteRemote},
  user::AccessToken,
};
use notekeep_store_sqlite::SqliteStore;
use tokio::net::TcpListener;

use crate::{ApiClient, ApiConfig};

const FAST: HasherConfig = HasherConfig { memory_kib: 64, iterations: 1, parallelism: 1 };

async fn spawn_router(app: Router) -> String {
  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();
  tokio::spawn(async move {
    axum::serve(listener, app).await.ok();
  });
  format!("http://{addr}")
}

async fn serve() -> String {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  let state = AppState::new(store, &FAST, chrono::Duration::hours(24)).unwrap();
  spawn_router(notekeep_api::router(state)).await
}

fn client(base_url: &str) -> ApiClient { ApiClient::new(ApiConfig::new(base_url)).unwrap() }

async fn signed_up(c: &ApiClient) -> AccessToken {
  let (token, _) = c.register("Ana Lovelace", "ana@example.com", "hunter22").await.unwrap();
  token
}

// ─── Auth ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn register_then_login() {
  let c = client(&serve().await);
  let (_, registered) = c.register("Ana Lovelace", "ana@example.com", "hunter22").await.unwrap();
  let (token, user) = c.login("ana@example.com", "hunter22").await.unwrap();

  assert_eq!(user.id, registered.id);
  assert_eq!(user.email, "ana@example.com");
  assert!(!token.as_str().is_empty());
}

#[tokio::test]
async fn duplicate_registration_is_classified() {
  let c = client(&serve().await);
  signed_up(&c).await;
  let err = c.register("Someone", "ana@example.com", "other-pass").await.unwrap_err();
  assert_eq!(err, Error::DuplicateEmail("ana@example.com".into()));
}

#[tokio::test]
async fn bad_credentials_are_classified() {
  let c = client(&serve().await);
  signed_up(&c).await;
  assert_eq!(c.login("ana@example.com", "nope-nope").await.unwrap_err(), Error::InvalidCredentials);
  assert_eq!(c.login("who@example.com", "hunter22").await.unwrap_err(), Error::InvalidCredentials);
}

#[tokio::test]
async fn other_rejections_carry_status_and_reason() {
  let c = client(&serve().await);
  let err = c.register("Ana", "ana@example.com", "123").await.unwrap_err();
  match err {
    Error::RemoteRejected { status, reason } => {
      assert_eq!(status, 400);
      assert!(reason.contains("password"), "{reason}");
    }
    other => panic!("unexpected {other:?}"),
  }
}

// ─── Notes ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn note_crud_roundtrip() {
  let c = client(&serve().await);
  let token = signed_up(&c).await;

  let created = c
    .create_note(&token, &NoteDraft::new("Groceries", "").with_image("content://7"))
    .await
    .unwrap();
  assert_eq!(created.created_at, created.updated_at);
  assert_eq!(created.image_ref.as_deref(), Some("content://7"));

  let updated = c
    .update_note(&token, &created.id, &NoteDraft::new("Groceries", "eggs"))
    .await
    .unwrap();
  assert_eq!(updated.body, "eggs");
  assert!(updated.image_ref.is_none());
  assert!(updated.updated_at > created.updated_at);

  assert_eq!(c.get_note(&token, &created.id).await.unwrap(), Some(updated.clone()));
  assert_eq!(c.list_notes(&token).await.unwrap(), vec![updated]);

  c.delete_note(&token, &created.id).await.unwrap();
  assert!(c.get_note(&token, &created.id).await.unwrap().is_none());
  assert!(c.list_notes(&token).await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_notes_are_classified() {
  let c = client(&serve().await);
  let token = signed_up(&c).await;

  assert!(c.get_note(&token, "nope").await.unwrap().is_none());
  let err = c.update_note(&token, "nope", &NoteDraft::new("T", "")).await.unwrap_err();
  assert!(matches!(err, Error::NotFound(_)));
  c.delete_note(&token, "nope").await.unwrap();
}

#[tokio::test]
async fn bad_token_is_unauthorized() {
  let c = client(&serve().await);
  let err = c.list_notes(&AccessToken::new("forged")).await.unwrap_err();
  assert_eq!(err, Error::Unauthorized);
  assert!(err.is_auth_failure());
}

#[tokio::test]
async fn undecodable_body_is_unknown() {
  let app = Router::new().route("/api/notes", get(|| async { "definitely not json" }));
  let c = client(&spawn_router(app).await);
  let err = c.list_notes(&AccessToken::new("t")).await.unwrap_err();
  assert!(matches!(err, Error::Unknown(_)), "{err:?}");
}

// ─── Transport ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn refused_connection_is_a_network_error() {
  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();
  drop(listener);

  let c = client(&format!("http://{addr}"));
  let err = c.login("ana@example.com", "hunter22").await.unwrap_err();
  assert!(matches!(err, Error::Network(_)), "{err:?}");
  assert!(err.is_retryable());
}

#[tokio::test]
async fn silent_server_times_out_after_one_retry() {
  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();
  let accepted = Arc::new(AtomicUsize::new(0));

  let counter = Arc::clone(&accepted);
  tokio::spawn(async move {
    let mut held = Vec::new();
    while let Ok((stream, _)) = listener.accept().await {
      counter.fetch_add(1, Ordering::SeqCst);
      held.push(stream);
    }
  });

  let c = ApiClient::new(ApiConfig {
    base_url: format!("http://{addr}"),
    timeout:  Duration::from_millis(200),
  })
  .unwrap();

  let err = c.list_notes(&AccessToken::new("t")).await.unwrap_err();
  assert!(matches!(err, Error::Network(_)), "{err:?}");
  assert_eq!(accepted.load(Ordering::SeqCst), 2);
}
