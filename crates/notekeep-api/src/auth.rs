//! Bearer-token extractor.

use axum::{extract::FromRequestParts, http::request::Parts};
use notekeep_auth::token_digest;
use notekeep_core::{
  note::now_millis,
  store::SessionStore,
  user::{AccessToken, User},
};

use crate::{AppState, ServerStore, error::{ApiError, store_error}};

/// The user owning the request's unexpired bearer token.
pub struct CurrentUser(pub User);

fn unauthorized() -> ApiError { ApiError::Unauthorized("missing or invalid token".into()) }

/// Pull the raw token out of an `Authorization: Bearer <token>` header.
pub fn bearer_token(parts: &Parts) -> Option<AccessToken> {
  let value = parts
    .headers
    .get(axum::http::header::AUTHORIZATION)?
    .to_str()
    .ok()?;
  let token = value.strip_prefix("Bearer ")?.trim();
  (!token.is_empty()).then(|| AccessToken::new(token))
}

impl<S: ServerStore> FromRequestParts<AppState<S>> for CurrentUser {
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let token = bearer_token(parts).ok_or_else(unauthorized)?;
    let digest = token_digest(&token);

    let user = SessionStore::session_user(&*state.store, &digest, now_millis())
      .await
      .map_err(store_error)?
      .ok_or_else(unauthorized)?;
    Ok(CurrentUser(user))
  }
}
