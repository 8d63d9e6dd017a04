//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 UTC strings with exactly three
//! fractional digits, so string order is chronological order.

use chrono::{DateTime, SecondsFormat, Utc};
use notekeep_core::{
  note::{Note, SyncState},
  user::{User, UserRecord},
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── SyncState ───────────────────────────────────────────────────────────────

pub fn encode_sync_state(s: SyncState) -> &'static str {
  match s {
    SyncState::Synced => "synced",
    SyncState::PendingCreate => "pending_create",
    SyncState::PendingUpdate => "pending_update",
    SyncState::PendingDelete => "pending_delete",
  }
}

pub fn decode_sync_state(s: &str) -> Result<SyncState> {
  match s {
    "synced" => Ok(SyncState::Synced),
    "pending_create" => Ok(SyncState::PendingCreate),
    "pending_update" => Ok(SyncState::PendingUpdate),
    "pending_delete" => Ok(SyncState::PendingDelete),
    other => Err(Error::UnknownSyncState(other.to_owned())),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const NOTE_COLUMNS: &str =
  "id, title, content, image_url, user_id, created_at, updated_at, sync_state";

/// Raw values read directly from a `notes` row.
pub struct RawNote {
  pub id:         String,
  pub title:      String,
  pub content:    String,
  pub image_url:  Option<String>,
  pub user_id:    i64,
  pub created_at: String,
  pub updated_at: String,
  pub sync_state: String,
}

impl RawNote {
  /// Map a row selected with [`NOTE_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:         row.get(0)?,
      title:      row.get(1)?,
      content:    row.get(2)?,
      image_url:  row.get(3)?,
      user_id:    row.get(4)?,
      created_at: row.get(5)?,
      updated_at: row.get(6)?,
      sync_state: row.get(7)?,
    })
  }

  pub fn into_note(self) -> Result<Note> {
    Ok(Note {
      id:         self.id,
      title:      self.title,
      body:       self.content,
      image_ref:  self.image_url,
      user_id:    self.user_id,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
      sync_state: decode_sync_state(&self.sync_state)?,
    })
  }
}

/// Column values for an INSERT/UPDATE of a note, in [`NOTE_COLUMNS`] order.
pub struct NoteParams {
  pub id:         String,
  pub title:      String,
  pub content:    String,
  pub image_url:  Option<String>,
  pub user_id:    i64,
  pub created_at: String,
  pub updated_at: String,
  pub sync_state: &'static str,
}

impl From<Note> for NoteParams {
  fn from(note: Note) -> Self {
    Self {
      id:         note.id,
      title:      note.title,
      content:    note.body,
      image_url:  note.image_ref,
      user_id:    note.user_id,
      created_at: encode_dt(note.created_at),
      updated_at: encode_dt(note.updated_at),
      sync_state: encode_sync_state(note.sync_state),
    }
  }
}

impl NoteParams {
  /// Upsert that keeps the row's `rowid`, so insertion order stays stable.
  /// A row owned by another user is never overwritten.
  pub fn upsert(&self, conn: &rusqlite::Connection) -> rusqlite::Result<usize> {
    conn.execute(
      "INSERT INTO notes (id, title, content, image_url, user_id, created_at, updated_at, sync_state)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
       ON CONFLICT(id) DO UPDATE SET
         title      = excluded.title,
         content    = excluded.content,
         image_url  = excluded.image_url,
         created_at = excluded.created_at,
         updated_at = excluded.updated_at,
         sync_state = excluded.sync_state
       WHERE notes.user_id = excluded.user_id",
      rusqlite::params![
        self.id,
        self.title,
        self.content,
        self.image_url,
        self.user_id,
        self.created_at,
        self.updated_at,
        self.sync_state,
      ],
    )
  }
}

/// Raw values read directly from a `users` row.
pub struct RawUser {
  pub id:            i64,
  pub name:          String,
  pub email:         String,
  pub password_hash: String,
  pub created_at:    String,
}

impl RawUser {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:            row.get(0)?,
      name:          row.get(1)?,
      email:         row.get(2)?,
      password_hash: row.get(3)?,
      created_at:    row.get(4)?,
    })
  }

  pub fn into_record(self) -> Result<UserRecord> {
    Ok(UserRecord {
      user:          User {
        id:         self.id,
        name:       self.name,
        email:      self.email,
        created_at: decode_dt(&self.created_at)?,
      },
      password_hash: self.password_hash,
    })
  }
}
