//! Serde types shared by the binaries to pick a backend and an auth mode.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which [`crate::Backend`] variant to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
  /// The local cache is the only store.
  #[default]
  Local,
  /// Every call goes to the remote service.
  Remote,
  /// Remote first, local cache as the fallback and offline queue.
  Cached,
}

#[derive(Debug, Error)]
#[error("unknown backend {0:?} (expected local, remote or cached)")]
pub struct UnknownBackend(String);

impl FromStr for BackendKind {
  type Err = UnknownBackend;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "local" => Ok(Self::Local),
      "remote" => Ok(Self::Remote),
      "cached" => Ok(Self::Cached),
      other => Err(UnknownBackend(other.to_owned())),
    }
  }
}

impl fmt::Display for BackendKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Local => "local",
      Self::Remote => "remote",
      Self::Cached => "cached",
    })
  }
}

/// How logins are verified. Resolved once at start-up.
///
/// ```toml
/// [auth]
/// mode      = "development-fixed-token"
/// token     = "dev-token-123456"
/// user_name = "Developer"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum AuthMode {
  /// Local backends check the Credential Store; remote ones call the service.
  #[default]
  Production,
  /// Any credentials succeed with this token and a fixed user.
  DevelopmentFixedToken { token: String, user_name: String },
}

impl AuthMode {
  pub const DEV_TOKEN: &'static str = "dev-token-123456";

  /// Development mode with the stock token.
  pub fn development() -> Self {
    Self::DevelopmentFixedToken {
      token:     Self::DEV_TOKEN.to_owned(),
      user_name: "Developer".to_owned(),
    }
  }
}
