//! [`SqliteStore`]: the SQLite implementation of the notekeep storage traits.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;

use notekeep_core::{
  merge::MergePlan,
  note::{Note, NoteDraft, now_millis},
  store::{NoteCache, SessionStore, UserStore},
  user::{NewUser, UNUSABLE_PASSWORD_HASH, User, UserId, UserRecord},
};

use crate::{
  Error, Result,
  encode::{NOTE_COLUMNS, NoteParams, RawNote, RawUser, encode_dt},
  schema::SCHEMA,
};

const USER_COLUMNS: &str = "id, name, email, password_hash, created_at";

// ─── Store ───────────────────────────────────────────────────────────────────

/// A notekeep store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests and development.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn query_notes(&self, user_id: UserId, include_tombstones: bool) -> Result<Vec<Note>> {
    let sql = format!(
      "SELECT {NOTE_COLUMNS} FROM notes
       WHERE user_id = ?1 {}
       ORDER BY created_at DESC, rowid DESC",
      if include_tombstones { "" } else { "AND sync_state != 'pending_delete'" },
    );

    let raws: Vec<RawNote> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![user_id], RawNote::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawNote::into_note).collect()
  }
}

// ─── UserStore impl ──────────────────────────────────────────────────────────

impl UserStore for SqliteStore {
  type Error = Error;

  async fn insert_user(&self, input: NewUser) -> Result<Option<User>> {
    let created_at = now_millis();
    let at_str = encode_dt(created_at);
    let NewUser { name, email, password_hash } = input;
    let (row_name, row_email) = (name.clone(), email.clone());

    // The existence check and the insert share the connection thread, so no
    // other write can slip in between them.
    let id: Option<i64> = self
      .conn
      .call(move |conn| {
        let taken = conn
          .query_row(
            "SELECT 1 FROM users WHERE email = ?1",
            rusqlite::params![row_email],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if taken {
          return Ok(None);
        }

        conn.execute(
          "INSERT INTO users (name, email, password_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![row_name, row_email, password_hash, at_str],
        )?;
        Ok(Some(conn.last_insert_rowid()))
      })
      .await?;

    Ok(id.map(|id| User { id, name, email, created_at }))
  }

  async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
    let email = email.to_owned();

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
              rusqlite::params![email],
              RawUser::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawUser::into_record).transpose()
  }

  async fn get_user(&self, id: UserId) -> Result<Option<User>> {
    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
              rusqlite::params![id],
              RawUser::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    Ok(raw.map(RawUser::into_record).transpose()?.map(|r| r.user))
  }

  async fn set_password_hash(&self, id: UserId, password_hash: String) -> Result<bool> {
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE users SET password_hash = ?1 WHERE id = ?2",
          rusqlite::params![password_hash, id],
        )?)
      })
      .await?;
    Ok(changed > 0)
  }

  async fn delete_user(&self, id: UserId) -> Result<bool> {
    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM users WHERE id = ?1", rusqlite::params![id])?)
      })
      .await?;
    if removed > 0 {
      tracing::info!(user_id = id, "deleted user and their notes");
    }
    Ok(removed > 0)
  }

  async fn mirror_user(&self, user: User) -> Result<()> {
    let at_str = encode_dt(user.created_at);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        // The mirror follows the authority: a stale row holding this email
        // under another id belongs to an identity that no longer exists.
        tx.execute(
          "DELETE FROM users WHERE email = ?1 AND id != ?2",
          rusqlite::params![user.email, user.id],
        )?;
        tx.execute(
          "INSERT INTO users (id, name, email, password_hash, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)
           ON CONFLICT(id) DO UPDATE SET name = excluded.name, email = excluded.email",
          rusqlite::params![user.id, user.name, user.email, UNUSABLE_PASSWORD_HASH, at_str],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── NoteCache impl ──────────────────────────────────────────────────────────

impl NoteCache for SqliteStore {
  type Error = Error;

  async fn list_notes(&self, user_id: UserId) -> Result<Vec<Note>> {
    self.query_notes(user_id, false).await
  }

  async fn all_notes(&self, user_id: UserId) -> Result<Vec<Note>> {
    self.query_notes(user_id, true).await
  }

  async fn get_note(&self, id: &str, user_id: UserId) -> Result<Option<Note>> {
    let id = id.to_owned();

    let raw: Option<RawNote> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {NOTE_COLUMNS} FROM notes
                 WHERE id = ?1 AND user_id = ?2 AND sync_state != 'pending_delete'"
              ),
              rusqlite::params![id, user_id],
              RawNote::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawNote::into_note).transpose()
  }

  async fn put_note(&self, note: Note) -> Result<()> {
    let params = NoteParams::from(note);
    self
      .conn
      .call(move |conn| {
        params.upsert(conn)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn edit_note(&self, id: &str, user_id: UserId, draft: NoteDraft) -> Result<Option<Note>> {
    let id = id.to_owned();

    // Read, edit and write inside one transaction on the connection thread,
    // so concurrent edits of one note apply one after the other.
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let raw = tx
          .query_row(
            &format!(
              "SELECT {NOTE_COLUMNS} FROM notes
               WHERE id = ?1 AND user_id = ?2 AND sync_state != 'pending_delete'"
            ),
            rusqlite::params![id, user_id],
            RawNote::from_row,
          )
          .optional()?;
        let Some(raw) = raw else {
          return Ok(None);
        };

        let mut note = raw
          .into_note()
          .map_err(|e| tokio_rusqlite::Error::Other(e.to_string().into()))?;
        note.apply(draft);
        NoteParams::from(note.clone()).upsert(&tx)?;
        tx.commit()?;
        Ok(Some(note))
      })
      .await
      .map_err(Error::from)
  }

  async fn remove_note(&self, id: &str, user_id: UserId) -> Result<bool> {
    let id = id.to_owned();
    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM notes WHERE id = ?1 AND user_id = ?2",
          rusqlite::params![id, user_id],
        )?)
      })
      .await?;
    Ok(removed > 0)
  }

  async fn rekey_note(&self, old_id: &str, note: Note) -> Result<()> {
    let old_id = old_id.to_owned();
    let user_id = note.user_id;
    let params = NoteParams::from(note);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "DELETE FROM notes WHERE id = ?1 AND user_id = ?2",
          rusqlite::params![old_id, user_id],
        )?;
        params.upsert(&tx)?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn apply_merge(&self, user_id: UserId, plan: MergePlan) -> Result<()> {
    if plan.is_empty() {
      return Ok(());
    }
    let upserts: Vec<NoteParams> = plan.upserts.into_iter().map(NoteParams::from).collect();
    let removals = plan.removals;

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        for id in &removals {
          tx.execute(
            "DELETE FROM notes WHERE id = ?1 AND user_id = ?2",
            rusqlite::params![id, user_id],
          )?;
        }
        for params in &upserts {
          params.upsert(&tx)?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── SessionStore impl ───────────────────────────────────────────────────────

impl SessionStore for SqliteStore {
  type Error = Error;

  async fn insert_session(
    &self,
    token_digest: String,
    user_id:      UserId,
    expires_at:   DateTime<Utc>,
  ) -> Result<()> {
    let created_str = encode_dt(now_millis());
    let expires_str = encode_dt(expires_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO sessions (token_hash, user_id, created_at, expires_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![token_digest, user_id, created_str, expires_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn session_user(&self, token_digest: &str, now: DateTime<Utc>) -> Result<Option<User>> {
    let digest = token_digest.to_owned();
    let now_str = encode_dt(now);

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT u.id, u.name, u.email, u.password_hash, u.created_at
               FROM sessions s
               JOIN users u ON u.id = s.user_id
               WHERE s.token_hash = ?1 AND s.expires_at > ?2",
              rusqlite::params![digest, now_str],
              RawUser::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    Ok(raw.map(RawUser::into_record).transpose()?.map(|r| r.user))
  }

  async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize> {
    let now_str = encode_dt(now);
    let purged = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM sessions WHERE expires_at <= ?1",
          rusqlite::params![now_str],
        )?)
      })
      .await?;
    Ok(purged)
  }
}
