//! The notekeep remote service: a JSON REST API over any store that can hold
//! users, notes and sessions.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = notekeep_api::router(state);
//! axum::serve(listener, app).await?;
//! ```
//!
//! Every route lives under `/api`. Note routes require
//! `Authorization: Bearer <token>`, where the token came from
//! `/api/auth/login` or `/api/auth/register`.

pub mod accounts;
pub mod auth;
pub mod error;
pub mod health;
pub mod notes;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, post},
};
use notekeep_auth::{CredentialStore, HasherConfig};
use notekeep_core::store::{NoteCache, SessionStore, UserStore};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `NOTEKEEP_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:            String,
  pub port:            u16,
  pub store_path:      PathBuf,
  pub token_ttl_hours: i64,
  pub hasher:          HasherConfig,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:            "127.0.0.1".to_string(),
      port:            5000,
      store_path:      PathBuf::from("notekeep-server.db"),
      token_ttl_hours: 24,
      hasher:          HasherConfig::default(),
    }
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Everything the server needs from its store.
pub trait ServerStore: UserStore + NoteCache + SessionStore + 'static {}

impl<T> ServerStore for T where T: UserStore + NoteCache + SessionStore + 'static {}

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub store:       Arc<S>,
  pub credentials: CredentialStore<S>,
  pub token_ttl:   chrono::Duration,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:       Arc::clone(&self.store),
      credentials: self.credentials.clone(),
      token_ttl:   self.token_ttl,
    }
  }
}

impl<S: ServerStore> AppState<S> {
  pub fn new(store: Arc<S>, hasher: &HasherConfig, token_ttl: chrono::Duration) -> anyhow::Result<Self> {
    let credentials = CredentialStore::new(Arc::clone(&store), hasher)?;
    Ok(Self { store, credentials, token_ttl })
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// The API routes without the `/api` prefix or middleware.
pub fn api_router<S: ServerStore>(state: AppState<S>) -> Router<()> {
  Router::new()
    // Accounts
    .route("/auth/register", post(accounts::register::<S>))
    .route("/auth/login",    post(accounts::login::<S>))
    // Notes
    .route("/notes",      get(notes::list::<S>).post(notes::create::<S>))
    .route(
      "/notes/{id}",
      get(notes::get_one::<S>)
        .put(notes::update::<S>)
        .delete(notes::delete_one::<S>),
    )
    // Liveness
    .route("/health", get(health::handler))
    .with_state(state)
}

/// The complete service: [`api_router`] nested under `/api` with request
/// tracing.
pub fn router<S: ServerStore>(state: AppState<S>) -> Router {
  Router::new()
    .nest("/api", api_router(state))
    .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests;
