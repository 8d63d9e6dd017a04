//! Storage and remote-service traits.
//!
//! Local backends (e.g. `notekeep-store-sqlite`) implement [`UserStore`],
//! [`NoteCache`] and [`SessionStore`]. The HTTP client implements
//! [`NoteRemote`] and [`AuthRemote`]. Higher layers (`notekeep-sync`,
//! `notekeep-api`) depend on these abstractions, never on a concrete backend.
//!
//! All methods return `Send` futures so the traits can be used from spawned
//! tasks on a multi-threaded tokio runtime.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
  Error,
  merge::MergePlan,
  note::{Note, NoteDraft},
  user::{AccessToken, NewUser, User, UserId, UserRecord},
};

// ─── Users ───────────────────────────────────────────────────────────────────

/// Durable user identity records.
pub trait UserStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static + Into<Error>;

  /// Persist a new user. Returns `None`, without writing anything, when the
  /// email is already registered.
  fn insert_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// Exact, case-sensitive lookup.
  fn find_user_by_email<'a>(
    &'a self,
    email: &'a str,
  ) -> impl Future<Output = Result<Option<UserRecord>, Self::Error>> + Send + 'a;

  fn get_user(
    &self,
    id: UserId,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// Replace the stored hash. Returns `false` if the user does not exist.
  fn set_password_hash(
    &self,
    id: UserId,
    password_hash: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Delete a user and, by cascade, all of their notes. Returns `false` if
  /// the user did not exist.
  fn delete_user(
    &self,
    id: UserId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Insert or refresh an identity that is authenticated elsewhere (remote
  /// service, development mode). The row gets an unusable password hash.
  fn mirror_user(
    &self,
    user: User,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

// ─── Notes ───────────────────────────────────────────────────────────────────

/// Durable per-user note storage. Usable as the authoritative store
/// (local-only mode and the server) or as the cache in front of a remote.
pub trait NoteCache: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static + Into<Error>;

  /// Visible notes (tombstones excluded), `created_at` descending.
  fn list_notes(
    &self,
    user_id: UserId,
  ) -> impl Future<Output = Result<Vec<Note>, Self::Error>> + Send + '_;

  /// Every row for the user, tombstones included.
  fn all_notes(
    &self,
    user_id: UserId,
  ) -> impl Future<Output = Result<Vec<Note>, Self::Error>> + Send + '_;

  /// A visible note owned by `user_id`. Tombstones and other users' notes
  /// resolve to `None`.
  fn get_note<'a>(
    &'a self,
    id: &'a str,
    user_id: UserId,
  ) -> impl Future<Output = Result<Option<Note>, Self::Error>> + Send + 'a;

  /// Insert or overwrite a note by id.
  fn put_note(
    &self,
    note: Note,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Apply `draft` to a visible note owned by `user_id` as one atomic
  /// read-modify-write. `None` when there is no such note.
  fn edit_note<'a>(
    &'a self,
    id: &'a str,
    user_id: UserId,
    draft: NoteDraft,
  ) -> impl Future<Output = Result<Option<Note>, Self::Error>> + Send + 'a;

  /// Remove a row owned by `user_id`. Returns whether a row was removed.
  fn remove_note<'a>(
    &'a self,
    id: &'a str,
    user_id: UserId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Atomically replace the row `old_id` with `note` (used when the server
  /// assigns its own id to a note created offline).
  fn rekey_note<'a>(
    &'a self,
    old_id: &'a str,
    note: Note,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Apply a merge plan in a single transaction.
  fn apply_merge(
    &self,
    user_id: UserId,
    plan: MergePlan,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

// ─── Server sessions ─────────────────────────────────────────────────────────

/// Issued bearer tokens, stored by digest only.
pub trait SessionStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static + Into<Error>;

  fn insert_session(
    &self,
    token_digest: String,
    user_id: UserId,
    expires_at: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// The user owning an unexpired session with this digest.
  fn session_user<'a>(
    &'a self,
    token_digest: &'a str,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + 'a;

  /// Drop every session that expired before `now`; returns how many.
  fn purge_expired_sessions(
    &self,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;
}

// ─── Remote service ──────────────────────────────────────────────────────────

/// Authentication endpoints of the remote service.
pub trait AuthRemote: Send + Sync {
  fn login<'a>(
    &'a self,
    email: &'a str,
    password: &'a str,
  ) -> impl Future<Output = crate::Result<(AccessToken, User)>> + Send + 'a;

  fn register<'a>(
    &'a self,
    name: &'a str,
    email: &'a str,
    password: &'a str,
  ) -> impl Future<Output = crate::Result<(AccessToken, User)>> + Send + 'a;
}

/// Note endpoints of the remote service. The token scopes every call to its
/// owner, so no user id is passed.
pub trait NoteRemote: Send + Sync {
  fn list_notes<'a>(
    &'a self,
    token: &'a AccessToken,
  ) -> impl Future<Output = crate::Result<Vec<Note>>> + Send + 'a;

  /// `Ok(None)` when the service reports the note as not found.
  fn get_note<'a>(
    &'a self,
    token: &'a AccessToken,
    id: &'a str,
  ) -> impl Future<Output = crate::Result<Option<Note>>> + Send + 'a;

  fn create_note<'a>(
    &'a self,
    token: &'a AccessToken,
    draft: &'a NoteDraft,
  ) -> impl Future<Output = crate::Result<Note>> + Send + 'a;

  fn update_note<'a>(
    &'a self,
    token: &'a AccessToken,
    id: &'a str,
    draft: &'a NoteDraft,
  ) -> impl Future<Output = crate::Result<Note>> + Send + 'a;

  fn delete_note<'a>(
    &'a self,
    token: &'a AccessToken,
    id: &'a str,
  ) -> impl Future<Output = crate::Result<()>> + Send + 'a;
}
