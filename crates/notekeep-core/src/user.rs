//! User identity records and the in-memory session.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type UserId = i64;

/// Hash string stored for identities mirrored from the remote service.
/// It is not a valid PHC string, so it can never pass local verification.
pub const UNUSABLE_PASSWORD_HASH: &str = "!";

/// A registered user. The password hash never leaves the credential layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub id:         UserId,
  pub name:       String,
  /// Unique; compared with exact, case-sensitive equality.
  pub email:      String,
  pub created_at: DateTime<Utc>,
}

/// A user row together with its stored password hash.
#[derive(Debug, Clone)]
pub struct UserRecord {
  pub user:          User,
  /// argon2 PHC string, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}

/// Input to [`crate::store::UserStore::insert_user`].
#[derive(Debug, Clone)]
pub struct NewUser {
  pub name:          String,
  pub email:         String,
  pub password_hash: String,
}

// ─── Session ─────────────────────────────────────────────────────────────────

/// An opaque bearer token. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
  pub fn new(raw: impl Into<String>) -> Self { Self(raw.into()) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Debug for AccessToken {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("AccessToken(<redacted>)")
  }
}

/// The authenticated identity plus its token, held in memory only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
  pub token: AccessToken,
  pub user:  User,
}
