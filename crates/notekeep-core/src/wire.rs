//! JSON wire format of the remote HTTP API.
//!
//! Field names are camelCase. Ids travel as strings, though `userId` is also
//! accepted as a number. Timestamps are written as
//! `YYYY-MM-DDTHH:MM:SS.mmmZ`; on read, anything malformed falls back to the
//! current time instead of failing the whole response.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  note::{Note, NoteDraft, SyncState, now_millis, to_millis},
  user::{User, UserId},
};

// ─── Notes ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteDto {
  pub id:         String,
  pub title:      String,
  #[serde(default)]
  pub content:    String,
  #[serde(default)]
  pub image_url:  Option<String>,
  #[serde(default = "now_millis", with = "lenient_timestamp")]
  pub created_at: DateTime<Utc>,
  #[serde(default = "now_millis", with = "lenient_timestamp")]
  pub updated_at: DateTime<Utc>,
  #[serde(with = "flexible_id")]
  pub user_id:    String,
}

impl From<&Note> for NoteDto {
  fn from(note: &Note) -> Self {
    Self {
      id:         note.id.clone(),
      title:      note.title.clone(),
      content:    note.body.clone(),
      image_url:  note.image_ref.clone(),
      created_at: note.created_at,
      updated_at: note.updated_at,
      user_id:    note.user_id.to_string(),
    }
  }
}

impl NoteDto {
  /// Convert into a domain note. Notes from the wire are always `Synced`.
  pub fn into_note(self) -> Result<Note> {
    Ok(Note {
      user_id:    parse_user_id(&self.user_id)?,
      id:         self.id,
      title:      self.title,
      body:       self.content,
      image_ref:  self.image_url,
      created_at: to_millis(self.created_at),
      updated_at: to_millis(self.updated_at),
      sync_state: SyncState::Synced,
    })
  }
}

/// Body of `POST /notes` and `PUT /notes/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteRequest {
  pub title:     String,
  #[serde(default)]
  pub content:   String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub image_url: Option<String>,
}

impl From<&NoteDraft> for NoteRequest {
  fn from(draft: &NoteDraft) -> Self {
    Self {
      title:     draft.title.clone(),
      content:   draft.body.clone(),
      image_url: draft.image_ref.clone(),
    }
  }
}

impl From<NoteRequest> for NoteDraft {
  fn from(req: NoteRequest) -> Self {
    NoteDraft { title: req.title, body: req.content, image_ref: req.image_url }
  }
}

// ─── Users and auth ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
  #[serde(with = "flexible_id")]
  pub id:         String,
  pub name:       String,
  pub email:      String,
  #[serde(default = "now_millis", with = "lenient_timestamp")]
  pub created_at: DateTime<Utc>,
}

impl From<&User> for UserDto {
  fn from(user: &User) -> Self {
    Self {
      id:         user.id.to_string(),
      name:       user.name.clone(),
      email:      user.email.clone(),
      created_at: user.created_at,
    }
  }
}

impl UserDto {
  pub fn into_user(self) -> Result<User> {
    Ok(User {
      id:         parse_user_id(&self.id)?,
      name:       self.name,
      email:      self.email,
      created_at: to_millis(self.created_at),
    })
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
  pub email:    String,
  pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
  pub name:     String,
  pub email:    String,
  pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
  pub token: String,
  pub user:  UserDto,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
  pub success: bool,
  pub message: String,
  pub token:   String,
  pub user:    UserDto,
}

/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
  pub error: String,
}

fn parse_user_id(raw: &str) -> Result<UserId> {
  raw
    .trim()
    .parse()
    .map_err(|_| Error::Unknown(format!("malformed user id: {raw:?}")))
}

// ─── Field codecs ────────────────────────────────────────────────────────────

/// Parse a wire timestamp: RFC 3339 with `Z` or an offset, or a zone-less
/// ISO-8601 value taken as UTC. The result is truncated to milliseconds.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
  let raw = raw.trim();
  if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
    return Some(to_millis(dt.with_timezone(&Utc)));
  }
  let naive = raw.strip_suffix('Z').unwrap_or(raw);
  NaiveDateTime::parse_from_str(naive, "%Y-%m-%dT%H:%M:%S%.f")
    .ok()
    .map(|n| to_millis(n.and_utc()))
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
  at.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

pub mod lenient_timestamp {
  use chrono::{DateTime, Utc};
  use serde::{Deserialize as _, Deserializer, Serializer};

  use crate::note::now_millis;

  pub fn serialize<S: Serializer>(at: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&super::format_timestamp(*at))
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = serde_json::Value::deserialize(d)?;
    Ok(
      raw
        .as_str()
        .and_then(super::parse_timestamp)
        .unwrap_or_else(now_millis),
    )
  }
}

/// Ids written as strings, read as either strings or integers.
pub mod flexible_id {
  use serde::{Deserialize, Deserializer, Serializer};

  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Repr {
    Text(String),
    Number(i64),
  }

  pub fn serialize<S: Serializer>(id: &str, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(id)
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Repr::deserialize(d)? {
      Repr::Text(s) => s,
      Repr::Number(n) => n.to_string(),
    })
  }
}
