//! The error taxonomy shared by every notekeep crate.
//!
//! Variants carry only owned strings so an error can be cloned onto an
//! observable channel and compared in tests.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
  /// Bad input shape; the caller can fix it and try again.
  #[error("invalid {field}: {message}")]
  Validation {
    field:   &'static str,
    message: String,
  },

  #[error("email already registered: {0}")]
  DuplicateEmail(String),

  /// Unknown id, or an id owned by someone else.
  #[error("not found: {0}")]
  NotFound(String),

  /// Deliberately says nothing about which half of the credentials was wrong.
  #[error("invalid email or password")]
  InvalidCredentials,

  #[error("network error: {0}")]
  Network(String),

  #[error("remote rejected request ({status}): {reason}")]
  RemoteRejected { status: u16, reason: String },

  /// Missing, expired or revoked access token.
  #[error("unauthorized")]
  Unauthorized,

  #[error("an authentication attempt is already in progress")]
  AuthInProgress,

  #[error("unsupported: {0}")]
  Unsupported(String),

  /// Failure inside the local durable cache.
  #[error("local storage error: {0}")]
  LocalStorage(String),

  /// A failure inside this process, such as a panicked task.
  #[error("internal error: {0}")]
  Internal(String),

  #[error("unknown error: {0}")]
  Unknown(String),
}

/// Where an [`Error`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorOrigin {
  /// The caller's input was rejected before anything was touched.
  Input,
  /// The local cache failed.
  Local,
  /// The remote service (or the network in between) failed.
  Remote,
  /// The session state rejected the call.
  Session,
}

impl Error {
  pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
    Self::Validation { field, message: message.into() }
  }

  pub fn origin(&self) -> ErrorOrigin {
    match self {
      Self::Validation { .. } | Self::DuplicateEmail(_) => ErrorOrigin::Input,
      Self::NotFound(_) | Self::InvalidCredentials => ErrorOrigin::Input,
      Self::Network(_) | Self::RemoteRejected { .. } => ErrorOrigin::Remote,
      Self::Unauthorized | Self::AuthInProgress | Self::Unsupported(_) => {
        ErrorOrigin::Session
      }
      Self::LocalStorage(_) | Self::Internal(_) => ErrorOrigin::Local,
      Self::Unknown(_) => ErrorOrigin::Remote,
    }
  }

  /// Only transport failures are worth retrying against the network.
  pub fn is_retryable(&self) -> bool { matches!(self, Self::Network(_)) }

  /// The session must be torn down when this is returned.
  pub fn is_auth_failure(&self) -> bool { matches!(self, Self::Unauthorized) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
