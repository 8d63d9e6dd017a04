//! Notes: the user-owned records this system exists to store.

use chrono::{DateTime, Duration, SubsecRound as _, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, user::UserId};

// ─── Timestamps ──────────────────────────────────────────────────────────────

/// The current time, truncated to the millisecond precision used on the wire
/// and in storage.
pub fn now_millis() -> DateTime<Utc> { Utc::now().trunc_subsecs(3) }

/// Normalise an arbitrary timestamp to millisecond precision.
pub fn to_millis(at: DateTime<Utc>) -> DateTime<Utc> { at.trunc_subsecs(3) }

/// The `updated_at` to stamp on a mutation of a note last updated at
/// `previous`: strictly later than `previous`, and never behind the clock.
pub fn next_updated_at(previous: DateTime<Utc>) -> DateTime<Utc> {
  let floor = previous + Duration::milliseconds(1);
  now_millis().max(floor)
}

// ─── Sync state ──────────────────────────────────────────────────────────────

/// Whether the local copy of a note still carries a mutation the remote
/// service has not seen.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
  #[default]
  Synced,
  PendingCreate,
  PendingUpdate,
  /// Tombstone: hidden from reads, kept only until the delete is replayed.
  PendingDelete,
}

impl SyncState {
  pub fn is_pending(self) -> bool { !matches!(self, Self::Synced) }

  pub fn is_tombstone(self) -> bool { matches!(self, Self::PendingDelete) }
}

// ─── Note ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
  /// Client-generated for offline creation, server-assigned once synced.
  pub id:         String,
  pub title:      String,
  pub body:       String,
  /// Opaque URI or path; never inspected.
  pub image_ref:  Option<String>,
  pub user_id:    UserId,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  #[serde(default)]
  pub sync_state: SyncState,
}

impl Note {
  /// Build a brand-new note with a fresh client-side id. `created_at` and
  /// `updated_at` are identical.
  pub fn create(user_id: UserId, draft: NoteDraft, sync_state: SyncState) -> Self {
    let now = now_millis();
    Self {
      id: Uuid::new_v4().to_string(),
      title: draft.title,
      body: draft.body,
      image_ref: draft.image_ref,
      user_id,
      created_at: now,
      updated_at: now,
      sync_state,
    }
  }

  /// Apply an edit, refreshing `updated_at` and leaving `created_at` alone.
  pub fn apply(&mut self, draft: NoteDraft) {
    self.title = draft.title;
    self.body = draft.body;
    self.image_ref = draft.image_ref;
    self.updated_at = next_updated_at(self.updated_at);
  }

  /// The editable fields of this note as a draft.
  pub fn to_draft(&self) -> NoteDraft {
    NoteDraft {
      title:     self.title.clone(),
      body:      self.body.clone(),
      image_ref: self.image_ref.clone(),
    }
  }
}

// ─── NoteDraft ───────────────────────────────────────────────────────────────

/// The caller-editable part of a note: input to create and update.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NoteDraft {
  pub title:     String,
  pub body:      String,
  pub image_ref: Option<String>,
}

impl NoteDraft {
  pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
    Self { title: title.into(), body: body.into(), image_ref: None }
  }

  pub fn with_image(mut self, image_ref: impl Into<String>) -> Self {
    self.image_ref = Some(image_ref.into());
    self
  }

  /// Trim the title and reject drafts that would persist an empty one.
  pub fn validated(mut self) -> Result<Self> {
    let trimmed = self.title.trim();
    if trimmed.is_empty() {
      return Err(Error::validation("title", "title must not be empty"));
    }
    if trimmed.len() != self.title.len() {
      self.title = trimmed.to_owned();
    }
    Ok(self)
  }
}
