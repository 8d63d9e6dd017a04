//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  extract::rejection::JsonRejection,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use notekeep_core::wire::ErrorBody;
use thiserror::Error;

/// An error returned by an API handler. Every variant renders as
/// `{"error": "<message>"}`.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("{0}")]
  BadRequest(String),

  #[error("{0}")]
  Conflict(String),

  #[error("{0}")]
  Unauthorized(String),

  #[error("{0}")]
  NotFound(String),

  #[error("{0}")]
  Internal(String),
}

impl From<notekeep_core::Error> for ApiError {
  fn from(e: notekeep_core::Error) -> Self {
    use notekeep_core::Error as E;
    let message = e.to_string();
    match e {
      E::Validation { .. } => ApiError::BadRequest(message),
      E::DuplicateEmail(_) => ApiError::Conflict("email already registered".into()),
      E::InvalidCredentials => ApiError::Unauthorized(message),
      E::Unauthorized => ApiError::Unauthorized("missing or invalid token".into()),
      E::NotFound(what) => ApiError::NotFound(format!("{what} not found")),
      _ => ApiError::Internal(message),
    }
  }
}

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self { ApiError::BadRequest(rejection.body_text()) }
}

/// Lift a store-specific error into an [`ApiError`].
pub fn store_error<E: Into<notekeep_core::Error>>(e: E) -> ApiError { ApiError::from(e.into()) }

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Conflict(_) => StatusCode::CONFLICT,
      ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::Internal(m) => {
        tracing::error!(error = %m, "request failed");
        StatusCode::INTERNAL_SERVER_ERROR
      }
    };
    (status, Json(ErrorBody { error: self.to_string() })).into_response()
  }
}
