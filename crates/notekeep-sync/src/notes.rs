//! [`NoteStore`]: per-user note lists over a configurable [`Backend`].
//!
//! Every mutation runs on a spawned task, so once started it completes and
//! updates the cache and the live views even if the caller stops waiting.
//! Mutations of one note id are serialized; distinct ids run concurrently.
//!
//! In [`Backend::Cached`] mode writes go to the remote first. Only a
//! [`Error::Network`] failure queues the write locally as `pending_*`; every
//! other remote failure is surfaced and leaves the cache untouched.

use std::{collections::HashMap, future::Future, sync::Arc};

use futures::Stream;
use notekeep_core::{
  Error, Result,
  merge::plan_merge,
  note::{Note, NoteDraft, SyncState, next_updated_at},
  store::{NoteCache, NoteRemote},
  user::{AccessToken, UserId},
};
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::{backend::Backend, locks::KeyedLocks};

type Snapshot = Arc<Vec<Note>>;

// ─── NoteList ────────────────────────────────────────────────────────────────

/// A live subscription to one user's visible notes, newest first.
#[derive(Debug, Clone)]
pub struct NoteList {
  rx: watch::Receiver<Snapshot>,
}

impl NoteList {
  /// The latest snapshot.
  pub fn current(&self) -> Snapshot { Arc::clone(&self.rx.borrow()) }

  /// Wait for the next snapshot. Returns `false` once the store has dropped
  /// this subscription (logout, [`NoteStore::clear`]).
  pub async fn changed(&mut self) -> bool { self.rx.changed().await.is_ok() }

  /// The current snapshot followed by every later one. Ends when the
  /// subscription is dropped.
  pub fn into_stream(self) -> impl Stream<Item = Snapshot> + Send + 'static {
    WatchStream::new(self.rx)
  }
}

/// Outcome of replaying queued writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
  pub pushed:    usize,
  pub remaining: usize,
}

// ─── View edits ──────────────────────────────────────────────────────────────

enum ViewChange {
  Upsert(Note),
  Remove(String),
  Rekey { old_id: String, note: Note },
}

/// Position for a note in a list ordered by `created_at` desc, where ties
/// go to the most recently inserted note.
fn insertion_index(notes: &[Note], note: &Note) -> usize {
  notes
    .iter()
    .position(|n| n.created_at <= note.created_at)
    .unwrap_or(notes.len())
}

fn apply_change(notes: &mut Vec<Note>, change: ViewChange) {
  match change {
    ViewChange::Upsert(note) if note.sync_state.is_tombstone() => {
      notes.retain(|n| n.id != note.id);
    }
    ViewChange::Upsert(note) => {
      if let Some(slot) = notes.iter_mut().find(|n| n.id == note.id) {
        *slot = note;
      } else {
        let at = insertion_index(notes, &note);
        notes.insert(at, note);
      }
    }
    ViewChange::Remove(id) => notes.retain(|n| n.id != id),
    ViewChange::Rekey { old_id, note } => {
      if let Some(slot) = notes.iter_mut().find(|n| n.id == old_id) {
        *slot = note;
      } else {
        let at = insertion_index(notes, &note);
        notes.insert(at, note);
      }
    }
  }
}

// ─── NoteStore ───────────────────────────────────────────────────────────────

struct Inner<C, R> {
  backend:   Backend<C, R>,
  token:     RwLock<Option<AccessToken>>,
  views:     Mutex<HashMap<UserId, watch::Sender<Snapshot>>>,
  locks:     KeyedLocks,
  /// Held by refresh and flush so two reconciliations never interleave.
  reconcile: tokio::sync::Mutex<()>,
}

/// Cheap to clone; clones share views, token and locks.
pub struct NoteStore<C, R> {
  inner: Arc<Inner<C, R>>,
}

impl<C, R> Clone for NoteStore<C, R> {
  fn clone(&self) -> Self { Self { inner: Arc::clone(&self.inner) } }
}

fn local<E: Into<Error>>(e: E) -> Error { e.into() }

/// The cached row for `note_id`, tombstones included.
async fn cached_row<C: NoteCache>(cache: &C, note_id: &str, user_id: UserId) -> Result<Option<Note>> {
  let rows = cache.all_notes(user_id).await.map_err(local)?;
  Ok(rows.into_iter().find(|n| n.id == note_id))
}

async fn spawn<T, F>(task: F) -> Result<T>
where
  T: Send + 'static,
  F: Future<Output = Result<T>> + Send + 'static,
{
  tokio::spawn(task)
    .await
    .map_err(|e| Error::Internal(format!("note task failed: {e}")))?
}

impl<C, R> NoteStore<C, R>
where
  C: NoteCache + 'static,
  R: NoteRemote + 'static,
{
  pub fn new(backend: Backend<C, R>) -> Self {
    Self {
      inner: Arc::new(Inner {
        backend,
        token: RwLock::new(None),
        views: Mutex::new(HashMap::new()),
        locks: KeyedLocks::default(),
        reconcile: tokio::sync::Mutex::new(()),
      }),
    }
  }

  pub fn backend(&self) -> &Backend<C, R> { &self.inner.backend }

  /// Token for remote calls. Without one, remote calls fail `Unauthorized`.
  pub fn set_token(&self, token: Option<AccessToken>) { *self.inner.token.write() = token; }

  /// Drop every live subscription; their streams end.
  pub fn clear(&self) { self.inner.views.lock().clear(); }

  /// Subscribe to `user_id`'s notes. In cached mode the remote list is
  /// merged in first, falling back to the cache when the network is down.
  pub async fn list(&self, user_id: UserId) -> Result<NoteList> {
    let inner = Arc::clone(&self.inner);
    spawn(async move {
      let notes = match &inner.backend {
        Backend::LocalOnly(cache) => cache.list_notes(user_id).await.map_err(local)?,
        Backend::RemoteOnly(remote) => remote.list_notes(&inner.token()?).await?,
        Backend::Cached { cache, .. } => match inner.merge_remote(user_id).await {
          Ok(notes) => notes,
          Err(e) if e.is_retryable() => {
            tracing::debug!(user_id, error = %e, "serving cached notes");
            cache.list_notes(user_id).await.map_err(local)?
          }
          Err(e) => return Err(e),
        },
      };
      Ok(inner.publish(user_id, notes))
    })
    .await
  }

  /// A note owned by `user_id`; someone else's note resolves to `None`.
  pub async fn get(&self, note_id: &str, user_id: UserId) -> Result<Option<Note>> {
    let inner = Arc::clone(&self.inner);
    let note_id = note_id.to_owned();
    spawn(async move { inner.get(&note_id, user_id).await }).await
  }

  pub async fn create(&self, user_id: UserId, draft: NoteDraft) -> Result<Note> {
    let draft = draft.validated()?;
    let inner = Arc::clone(&self.inner);
    spawn(async move { inner.create(user_id, draft).await }).await
  }

  pub async fn update(&self, note_id: &str, user_id: UserId, draft: NoteDraft) -> Result<Note> {
    let draft = draft.validated()?;
    let inner = Arc::clone(&self.inner);
    let note_id = note_id.to_owned();
    spawn(async move {
      let _guard = inner.locks.lock(&note_id).await;
      inner.update(&note_id, user_id, draft).await
    })
    .await
  }

  /// Idempotent: deleting an unknown id succeeds.
  pub async fn delete(&self, note_id: &str, user_id: UserId) -> Result<()> {
    let inner = Arc::clone(&self.inner);
    let note_id = note_id.to_owned();
    spawn(async move {
      let _guard = inner.locks.lock(&note_id).await;
      inner.delete(&note_id, user_id).await
    })
    .await
  }

  /// Pull the authoritative list and republish it.
  pub async fn refresh(&self, user_id: UserId) -> Result<()> {
    let inner = Arc::clone(&self.inner);
    spawn(async move {
      let notes = match &inner.backend {
        Backend::LocalOnly(cache) => cache.list_notes(user_id).await.map_err(local)?,
        Backend::RemoteOnly(remote) => remote.list_notes(&inner.token()?).await?,
        Backend::Cached { .. } => inner.merge_remote(user_id).await?,
      };
      inner.publish(user_id, notes);
      Ok(())
    })
    .await
  }

  /// Replay queued writes, oldest first. Only meaningful in cached mode.
  pub async fn flush_pending(&self, user_id: UserId) -> Result<FlushReport> {
    let inner = Arc::clone(&self.inner);
    spawn(async move { inner.flush_pending(user_id).await }).await
  }

  /// [`Self::flush_pending`] then [`Self::refresh`].
  pub async fn sync(&self, user_id: UserId) -> Result<FlushReport> {
    let report = self.flush_pending(user_id).await?;
    self.refresh(user_id).await?;
    Ok(report)
  }
}

impl<C, R> Inner<C, R>
where
  C: NoteCache + 'static,
  R: NoteRemote + 'static,
{
  fn token(&self) -> Result<AccessToken> { self.token.read().clone().ok_or(Error::Unauthorized) }

  // ── Views ──────────────────────────────────────────────────────────────────

  fn publish(&self, user_id: UserId, notes: Vec<Note>) -> NoteList {
    let mut visible: Vec<Note> =
      notes.into_iter().filter(|n| !n.sync_state.is_tombstone()).collect();
    // Stable, so equal timestamps keep the source's newest-inserted-first order.
    visible.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let mut views = self.views.lock();
    let tx = views
      .entry(user_id)
      .or_insert_with(|| watch::channel(Arc::new(Vec::new())).0);
    tx.send_replace(Arc::new(visible));
    NoteList { rx: tx.subscribe() }
  }

  fn update_view(&self, user_id: UserId, change: ViewChange) {
    let views = self.views.lock();
    if let Some(tx) = views.get(&user_id) {
      tx.send_modify(|snapshot| {
        let mut notes = snapshot.as_ref().clone();
        apply_change(&mut notes, change);
        *snapshot = Arc::new(notes);
      });
    }
  }

  // ── Reads ──────────────────────────────────────────────────────────────────

  async fn get(&self, note_id: &str, user_id: UserId) -> Result<Option<Note>> {
    match &self.backend {
      Backend::LocalOnly(cache) => cache.get_note(note_id, user_id).await.map_err(local),
      Backend::RemoteOnly(remote) => {
        let found = remote.get_note(&self.token()?, note_id).await?;
        Ok(found.filter(|n| n.user_id == user_id))
      }
      Backend::Cached { cache, remote } => {
        let cached = cached_row(cache.as_ref(), note_id, user_id).await?;
        match &cached {
          Some(n) if n.sync_state.is_tombstone() => return Ok(None),
          Some(n) if n.sync_state.is_pending() => return Ok(cached),
          _ => {}
        }
        match remote.get_note(&self.token()?, note_id).await {
          Ok(Some(note)) if note.user_id == user_id => {
            cache.put_note(note.clone()).await.map_err(local)?;
            self.update_view(user_id, ViewChange::Upsert(note.clone()));
            Ok(Some(note))
          }
          Ok(_) => {
            if cached.is_some() {
              cache.remove_note(note_id, user_id).await.map_err(local)?;
              self.update_view(user_id, ViewChange::Remove(note_id.to_owned()));
            }
            Ok(None)
          }
          Err(e) if e.is_retryable() => Ok(cached),
          Err(e) => Err(e),
        }
      }
    }
  }

  /// Fetch the remote list, merge it into the cache and return the cache's
  /// resulting visible list.
  async fn merge_remote(&self, user_id: UserId) -> Result<Vec<Note>> {
    let (Some(cache), Some(remote)) = (self.backend.cache(), self.backend.remote()) else {
      return Err(Error::Unsupported("merge needs a cache and a remote".into()));
    };
    let _reconciling = self.reconcile.lock().await;

    let fetched = remote.list_notes(&self.token()?).await?;
    // The token scopes the list, but never cache rows for another owner.
    let fetched: Vec<Note> = fetched.into_iter().filter(|n| n.user_id == user_id).collect();

    let existing = cache.all_notes(user_id).await.map_err(local)?;
    let plan = plan_merge(&existing, &fetched);
    if !plan.is_empty() {
      tracing::debug!(
        user_id,
        upserts = plan.upserts.len(),
        removals = plan.removals.len(),
        "merging remote notes",
      );
      cache.apply_merge(user_id, plan).await.map_err(local)?;
    }
    cache.list_notes(user_id).await.map_err(local)
  }

  // ── Writes ─────────────────────────────────────────────────────────────────

  async fn create(&self, user_id: UserId, draft: NoteDraft) -> Result<Note> {
    let note = match &self.backend {
      Backend::LocalOnly(cache) => {
        let note = Note::create(user_id, draft, SyncState::Synced);
        cache.put_note(note.clone()).await.map_err(local)?;
        note
      }
      Backend::RemoteOnly(remote) => remote.create_note(&self.token()?, &draft).await?,
      Backend::Cached { cache, remote } => {
        let note = match remote.create_note(&self.token()?, &draft).await {
          Ok(note) => note,
          Err(e) if e.is_retryable() => {
            tracing::info!(user_id, error = %e, "remote unreachable, queueing create");
            Note::create(user_id, draft, SyncState::PendingCreate)
          }
          Err(e) => return Err(e),
        };
        cache.put_note(note.clone()).await.map_err(local)?;
        note
      }
    };
    self.update_view(user_id, ViewChange::Upsert(note.clone()));
    Ok(note)
  }

  async fn update(&self, note_id: &str, user_id: UserId, draft: NoteDraft) -> Result<Note> {
    let not_found = || Error::NotFound(format!("note {note_id}"));

    let note = match &self.backend {
      Backend::LocalOnly(cache) => {
        cache.edit_note(note_id, user_id, draft).await.map_err(local)?.ok_or_else(not_found)?
      }
      Backend::RemoteOnly(remote) => remote.update_note(&self.token()?, note_id, &draft).await?,
      Backend::Cached { cache, remote } => {
        let cached = cached_row(cache.as_ref(), note_id, user_id).await?;

        let note = match cached {
          Some(note) if note.sync_state.is_tombstone() => return Err(not_found()),
          // Never reached the remote: edit the queued create in place.
          Some(mut note) if note.sync_state == SyncState::PendingCreate => {
            note.apply(draft);
            note
          }
          cached => match remote.update_note(&self.token()?, note_id, &draft).await {
            Ok(note) => note,
            Err(e) if e.is_retryable() => {
              // Nothing cached to edit: the offline failure is the answer.
              let Some(mut note) = cached else {
                return Err(e);
              };
              tracing::info!(user_id, note_id, error = %e, "remote unreachable, queueing update");
              note.apply(draft);
              note.sync_state = SyncState::PendingUpdate;
              note
            }
            Err(e) => return Err(e),
          },
        };
        cache.put_note(note.clone()).await.map_err(local)?;
        note
      }
    };
    self.update_view(user_id, ViewChange::Upsert(note.clone()));
    Ok(note)
  }

  async fn delete(&self, note_id: &str, user_id: UserId) -> Result<()> {
    match &self.backend {
      Backend::LocalOnly(cache) => {
        cache.remove_note(note_id, user_id).await.map_err(local)?;
      }
      Backend::RemoteOnly(remote) => match remote.delete_note(&self.token()?, note_id).await {
        Ok(()) | Err(Error::NotFound(_)) => {}
        Err(e) => return Err(e),
      },
      Backend::Cached { cache, remote } => {
        let cached = cached_row(cache.as_ref(), note_id, user_id).await?;
        match cached {
          // Already queued.
          Some(note) if note.sync_state.is_tombstone() => {}
          Some(note) if note.sync_state == SyncState::PendingCreate => {
            cache.remove_note(note_id, user_id).await.map_err(local)?;
          }
          cached => match remote.delete_note(&self.token()?, note_id).await {
            Ok(()) | Err(Error::NotFound(_)) => {
              cache.remove_note(note_id, user_id).await.map_err(local)?;
            }
            Err(e) if e.is_retryable() => {
              let Some(mut note) = cached else {
                return Err(e);
              };
              tracing::info!(user_id, note_id, error = %e, "remote unreachable, queueing delete");
              note.updated_at = next_updated_at(note.updated_at);
              note.sync_state = SyncState::PendingDelete;
              cache.put_note(note).await.map_err(local)?;
            }
            Err(e) => return Err(e),
          },
        }
      }
    }
    self.update_view(user_id, ViewChange::Remove(note_id.to_owned()));
    Ok(())
  }

  async fn flush_pending(&self, user_id: UserId) -> Result<FlushReport> {
    let Backend::Cached { cache, remote } = &self.backend else {
      return Ok(FlushReport::default());
    };
    let _reconciling = self.reconcile.lock().await;

    let mut pending: Vec<Note> = cache
      .all_notes(user_id)
      .await
      .map_err(local)?
      .into_iter()
      .filter(|n| n.sync_state.is_pending())
      .collect();
    if pending.is_empty() {
      return Ok(FlushReport::default());
    }
    // Rows arrive newest first; reversing keeps insertion order among equal
    // timestamps once the stable sort runs.
    pending.reverse();
    pending.sort_by_key(|n| n.updated_at);

    let token = self.token()?;
    let mut remaining = pending.len();
    let mut pushed = 0;

    for listed in pending {
      let _guard = self.locks.lock(&listed.id).await;
      remaining -= 1;
      // A mutation of this id may have run while we waited for the lock;
      // replay the row as it is now.
      let Some(queued) = cached_row(cache.as_ref(), &listed.id, user_id).await? else {
        continue;
      };
      if !queued.sync_state.is_pending() {
        continue;
      }
      match self.replay(cache, remote, &token, &queued).await {
        Ok(()) => pushed += 1,
        Err(e) if e.is_retryable() => {
          remaining += 1;
          tracing::info!(user_id, pushed, remaining, "flush interrupted");
          break;
        }
        Err(e) => return Err(e),
      }
    }

    if pushed > 0 {
      tracing::info!(user_id, pushed, "flushed pending notes");
    }
    Ok(FlushReport { pushed, remaining })
  }

  async fn replay(&self, cache: &C, remote: &R, token: &AccessToken, queued: &Note) -> Result<()> {
    let user_id = queued.user_id;
    match queued.sync_state {
      SyncState::Synced => Ok(()),
      SyncState::PendingCreate => self.recreate(cache, remote, token, queued).await,
      SyncState::PendingUpdate => {
        match remote.update_note(token, &queued.id, &queued.to_draft()).await {
          Ok(note) => {
            cache.put_note(note.clone()).await.map_err(local)?;
            self.update_view(user_id, ViewChange::Upsert(note));
            Ok(())
          }
          // Gone remotely: the edit is newer than the remote's copy, so it
          // comes back as a fresh note.
          Err(Error::NotFound(_)) => self.recreate(cache, remote, token, queued).await,
          Err(e) => Err(e),
        }
      }
      SyncState::PendingDelete => match remote.delete_note(token, &queued.id).await {
        Ok(()) | Err(Error::NotFound(_)) => {
          cache.remove_note(&queued.id, user_id).await.map_err(local)?;
          Ok(())
        }
        Err(e) => Err(e),
      },
    }
  }

  async fn recreate(&self, cache: &C, remote: &R, token: &AccessToken, queued: &Note) -> Result<()> {
    let note = remote.create_note(token, &queued.to_draft()).await?;
    cache.rekey_note(&queued.id, note.clone()).await.map_err(local)?;
    self.update_view(queued.user_id, ViewChange::Rekey { old_id: queued.id.clone(), note });
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use chrono::Duration;
  use notekeep_core::note::NoteDraft;

  use super::*;

  fn note(id: &str, age_secs: i64) -> Note {
    let mut n = Note::create(1, NoteDraft::new(id, ""), SyncState::Synced);
    n.id = id.to_owned();
    n.created_at -= Duration::seconds(age_secs);
    n
  }

  #[test]
  fn upserts_keep_newest_first_order() {
    let mut notes = vec![note("new", 0), note("old", 100)];
    apply_change(&mut notes, ViewChange::Upsert(note("mid", 50)));
    apply_change(&mut notes, ViewChange::Upsert(note("oldest", 500)));
    let ids: Vec<_> = notes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, ["new", "mid", "old", "oldest"]);
  }

  #[test]
  fn tombstone_upsert_removes_from_view() {
    let mut notes = vec![note("a", 0)];
    let mut gone = notes[0].clone();
    gone.sync_state = SyncState::PendingDelete;
    apply_change(&mut notes, ViewChange::Upsert(gone));
    assert!(notes.is_empty());
  }

  #[test]
  fn rekey_keeps_position() {
    let mut notes = vec![note("a", 0), note("b", 10), note("c", 20)];
    let renamed = Note { id: "server-b".into(), ..notes[1].clone() };
    apply_change(&mut notes, ViewChange::Rekey { old_id: "b".into(), note: renamed });
    let ids: Vec<_> = notes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, ["a", "server-b", "c"]);
  }
}
