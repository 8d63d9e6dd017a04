//! Handlers for `/auth` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/auth/register` | 201 with a token; 409 if the email is taken |
//! | `POST` | `/auth/login`    | 200 with a token; 401 for any credential mismatch |

use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
  http::StatusCode,
  response::IntoResponse,
};
use notekeep_auth::{generate_token, token_digest};
use notekeep_core::{
  note::now_millis,
  store::SessionStore,
  user::{AccessToken, User},
  wire::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse, UserDto},
};

use crate::{AppState, ServerStore, error::{ApiError, store_error}};

/// Mint a token for `user` and persist its digest.
async fn issue_token<S: ServerStore>(state: &AppState<S>, user: &User) -> Result<AccessToken, ApiError> {
  let token = generate_token();
  let expires_at = now_millis() + state.token_ttl;
  SessionStore::insert_session(&*state.store, token_digest(&token), user.id, expires_at)
    .await
    .map_err(store_error)?;
  Ok(token)
}

// ─── Register ─────────────────────────────────────────────────────────────────

/// `POST /auth/register` with body `{"name", "email", "password"}`
pub async fn register<S: ServerStore>(
  State(state): State<AppState<S>>,
  body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
  let Json(body) = body?;
  let user = state
    .credentials
    .register(&body.name, &body.email, &body.password)
    .await?;
  let token = issue_token(&state, &user).await?;

  let response = RegisterResponse {
    success: true,
    message: "User registered successfully".into(),
    token:   token.as_str().to_owned(),
    user:    UserDto::from(&user),
  };
  Ok((StatusCode::CREATED, Json(response)))
}

// ─── Login ────────────────────────────────────────────────────────────────────

/// `POST /auth/login` with body `{"email", "password"}`
pub async fn login<S: ServerStore>(
  State(state): State<AppState<S>>,
  body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
  let Json(body) = body?;
  let user = state.credentials.login(&body.email, &body.password).await?;
  let token = issue_token(&state, &user).await?;
  tracing::info!(user_id = user.id, "issued session");

  Ok(Json(LoginResponse {
    token: token.as_str().to_owned(),
    user:  UserDto::from(&user),
  }))
}
