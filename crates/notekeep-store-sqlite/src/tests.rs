//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::Duration;
use notekeep_core::{
  merge::MergePlan,
  note::{Note, NoteDraft, SyncState, now_millis},
  store::{NoteCache, SessionStore, UserStore},
  user::{NewUser, UNUSABLE_PASSWORD_HASH, User},
};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn new_user(email: &str) -> NewUser {
  NewUser {
    name:          "Ana".into(),
    email:         email.into(),
    password_hash: "$argon2id$placeholder".into(),
  }
}

async fn user(s: &SqliteStore, email: &str) -> User {
  s.insert_user(new_user(email)).await.unwrap().expect("fresh email")
}

fn note(user_id: i64, title: &str) -> Note {
  Note::create(user_id, NoteDraft::new(title, "body"), SyncState::Synced)
}

// ─── Users ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn insert_and_find_user() {
  let s = store().await;
  let ana = user(&s, "ana@example.com").await;

  let record = s.find_user_by_email("ana@example.com").await.unwrap().unwrap();
  assert_eq!(record.user, ana);
  assert_eq!(record.password_hash, "$argon2id$placeholder");
  assert_eq!(s.get_user(ana.id).await.unwrap(), Some(ana));
}

#[tokio::test]
async fn duplicate_email_is_refused_without_writing() {
  let s = store().await;
  let first = user(&s, "ana@example.com").await;

  let second = s.insert_user(new_user("ana@example.com")).await.unwrap();
  assert!(second.is_none());

  let record = s.find_user_by_email("ana@example.com").await.unwrap().unwrap();
  assert_eq!(record.user.id, first.id);
}

#[tokio::test]
async fn email_lookup_is_case_sensitive() {
  let s = store().await;
  user(&s, "ana@example.com").await;
  assert!(s.find_user_by_email("Ana@Example.com").await.unwrap().is_none());
}

#[tokio::test]
async fn set_password_hash_reports_missing_user() {
  let s = store().await;
  let ana = user(&s, "ana@example.com").await;

  assert!(s.set_password_hash(ana.id, "$new".into()).await.unwrap());
  assert!(!s.set_password_hash(ana.id + 100, "$new".into()).await.unwrap());

  let record = s.find_user_by_email("ana@example.com").await.unwrap().unwrap();
  assert_eq!(record.password_hash, "$new");
}

#[tokio::test]
async fn deleting_a_user_cascades_to_notes() {
  let s = store().await;
  let ana = user(&s, "ana@example.com").await;
  let bob = user(&s, "bob@example.com").await;
  s.put_note(note(ana.id, "mine")).await.unwrap();
  s.put_note(note(bob.id, "theirs")).await.unwrap();

  assert!(s.delete_user(ana.id).await.unwrap());
  assert!(!s.delete_user(ana.id).await.unwrap());

  assert!(s.all_notes(ana.id).await.unwrap().is_empty());
  assert_eq!(s.list_notes(bob.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn mirrored_user_cannot_log_in_and_is_refreshed() {
  let s = store().await;
  let remote = User {
    id:         42,
    name:       "Remote".into(),
    email:      "r@example.com".into(),
    created_at: now_millis(),
  };
  s.mirror_user(remote.clone()).await.unwrap();
  s.mirror_user(User { name: "Renamed".into(), ..remote.clone() }).await.unwrap();

  let record = s.find_user_by_email("r@example.com").await.unwrap().unwrap();
  assert_eq!(record.user.id, 42);
  assert_eq!(record.user.name, "Renamed");
  assert_eq!(record.password_hash, UNUSABLE_PASSWORD_HASH);
}

// ─── Notes ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn notes_list_newest_first() {
  let s = store().await;
  let ana = user(&s, "ana@example.com").await;

  let mut old = note(ana.id, "old");
  old.created_at = now_millis() - Duration::hours(2);
  let mut mid = note(ana.id, "mid");
  mid.created_at = now_millis() - Duration::hours(1);
  let new = note(ana.id, "new");

  s.put_note(mid).await.unwrap();
  s.put_note(new).await.unwrap();
  s.put_note(old).await.unwrap();

  let titles: Vec<_> =
    s.list_notes(ana.id).await.unwrap().into_iter().map(|n| n.title).collect();
  assert_eq!(titles, vec!["new", "mid", "old"]);
}

#[tokio::test]
async fn equal_created_at_orders_by_insertion() {
  let s = store().await;
  let ana = user(&s, "ana@example.com").await;
  let first = note(ana.id, "first");
  let second = Note { id: "second".into(), title: "second".into(), ..first.clone() };

  s.put_note(first).await.unwrap();
  s.put_note(second).await.unwrap();

  let titles: Vec<_> =
    s.list_notes(ana.id).await.unwrap().into_iter().map(|n| n.title).collect();
  assert_eq!(titles, vec!["second", "first"]);
}

#[tokio::test]
async fn notes_are_scoped_to_their_owner() {
  let s = store().await;
  let ana = user(&s, "ana@example.com").await;
  let bob = user(&s, "bob@example.com").await;
  let n = note(ana.id, "private");
  s.put_note(n.clone()).await.unwrap();

  assert!(s.get_note(&n.id, bob.id).await.unwrap().is_none());
  assert!(!s.remove_note(&n.id, bob.id).await.unwrap());
  assert_eq!(s.get_note(&n.id, ana.id).await.unwrap(), Some(n));
}

#[tokio::test]
async fn upsert_never_takes_over_another_users_row() {
  let s = store().await;
  let ana = user(&s, "ana@example.com").await;
  let bob = user(&s, "bob@example.com").await;
  let n = note(ana.id, "ana's");
  s.put_note(n.clone()).await.unwrap();

  let hijack = Note { user_id: bob.id, title: "bob's now".into(), ..n.clone() };
  s.put_note(hijack).await.unwrap();

  assert_eq!(s.get_note(&n.id, ana.id).await.unwrap().unwrap().title, "ana's");
  assert!(s.list_notes(bob.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn put_note_overwrites_in_place() {
  let s = store().await;
  let ana = user(&s, "ana@example.com").await;
  let mut n = note(ana.id, "draft");
  s.put_note(n.clone()).await.unwrap();

  n.apply(NoteDraft::new("final", "done").with_image("file:///img.png"));
  n.sync_state = SyncState::PendingUpdate;
  s.put_note(n.clone()).await.unwrap();

  let stored = s.get_note(&n.id, ana.id).await.unwrap().unwrap();
  assert_eq!(stored, n);
  assert_eq!(s.all_notes(ana.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn tombstones_are_hidden_from_reads() {
  let s = store().await;
  let ana = user(&s, "ana@example.com").await;
  let mut n = note(ana.id, "doomed");
  n.sync_state = SyncState::PendingDelete;
  s.put_note(n.clone()).await.unwrap();

  assert!(s.list_notes(ana.id).await.unwrap().is_empty());
  assert!(s.get_note(&n.id, ana.id).await.unwrap().is_none());
  let all = s.all_notes(ana.id).await.unwrap();
  assert_eq!(all.len(), 1);
  assert!(all[0].sync_state.is_tombstone());
}

#[tokio::test]
async fn edit_note_applies_in_place_for_the_owner_only() {
  let s = store().await;
  let ana = user(&s, "ana@example.com").await;
  let bob = user(&s, "bob@example.com").await;
  let n = note(ana.id, "draft");
  s.put_note(n.clone()).await.unwrap();

  let edited = s.edit_note(&n.id, ana.id, NoteDraft::new("final", "done")).await.unwrap().unwrap();
  assert_eq!(edited.created_at, n.created_at);
  assert!(edited.updated_at > n.updated_at);
  assert_eq!(s.get_note(&n.id, ana.id).await.unwrap(), Some(edited));

  assert!(s.edit_note(&n.id, bob.id, NoteDraft::new("mine", "")).await.unwrap().is_none());
  assert!(s.edit_note("missing", ana.id, NoteDraft::new("x", "")).await.unwrap().is_none());

  let mut gone = note(ana.id, "gone");
  gone.sync_state = SyncState::PendingDelete;
  s.put_note(gone.clone()).await.unwrap();
  assert!(s.edit_note(&gone.id, ana.id, NoteDraft::new("back", "")).await.unwrap().is_none());
}

#[tokio::test]
async fn concurrent_edits_each_see_the_previous_one() {
  let s = store().await;
  let ana = user(&s, "ana@example.com").await;
  let n = note(ana.id, "shared");
  s.put_note(n.clone()).await.unwrap();

  let edits: Vec<_> = (0..8)
    .map(|i| {
      let (s, id) = (s.clone(), n.id.clone());
      tokio::spawn(async move { s.edit_note(&id, ana.id, NoteDraft::new("shared", format!("v{i}"))).await })
    })
    .collect();

  let mut results = Vec::new();
  for edit in edits {
    results.push(edit.await.unwrap().unwrap().unwrap());
  }
  let mut stamps: Vec<_> = results.iter().map(|r| r.updated_at).collect();
  stamps.sort();
  stamps.dedup();
  assert_eq!(stamps.len(), 8);

  let last = results.into_iter().max_by_key(|r| r.updated_at).unwrap();
  assert_eq!(s.get_note(&n.id, ana.id).await.unwrap(), Some(last));
}

#[tokio::test]
async fn rekey_replaces_the_offline_id() {
  let s = store().await;
  let ana = user(&s, "ana@example.com").await;
  let mut offline = note(ana.id, "offline");
  offline.sync_state = SyncState::PendingCreate;
  s.put_note(offline.clone()).await.unwrap();

  let confirmed = Note {
    id: "server-7".into(),
    sync_state: SyncState::Synced,
    ..offline.clone()
  };
  s.rekey_note(&offline.id, confirmed.clone()).await.unwrap();

  assert!(s.get_note(&offline.id, ana.id).await.unwrap().is_none());
  assert_eq!(s.get_note("server-7", ana.id).await.unwrap(), Some(confirmed));
}

#[tokio::test]
async fn apply_merge_upserts_and_removes() {
  let s = store().await;
  let ana = user(&s, "ana@example.com").await;
  let keep = note(ana.id, "keep");
  let gone = note(ana.id, "gone");
  s.put_note(keep.clone()).await.unwrap();
  s.put_note(gone.clone()).await.unwrap();

  let arrived = note(ana.id, "arrived");
  let refreshed = Note { title: "keep v2".into(), ..keep.clone() };
  let plan = MergePlan {
    upserts:  vec![refreshed.clone(), arrived.clone()],
    removals: vec![gone.id.clone()],
  };
  s.apply_merge(ana.id, plan).await.unwrap();

  let mut titles: Vec<_> =
    s.all_notes(ana.id).await.unwrap().into_iter().map(|n| n.title).collect();
  titles.sort();
  assert_eq!(titles, vec!["arrived", "keep v2"]);
}

#[tokio::test]
async fn store_persists_across_reopen() {
  let dir = std::env::temp_dir().join(format!("notekeep-{}", uuid::Uuid::new_v4()));
  std::fs::create_dir_all(&dir).unwrap();
  let path = dir.join("notes.db");

  let n = {
    let s = SqliteStore::open(&path).await.unwrap();
    let ana = user(&s, "ana@example.com").await;
    let n = note(ana.id, "durable");
    s.put_note(n.clone()).await.unwrap();
    n
  };

  let s = SqliteStore::open(&path).await.unwrap();
  assert_eq!(s.get_note(&n.id, n.user_id).await.unwrap(), Some(n));
  std::fs::remove_dir_all(&dir).ok();
}

// ─── Sessions ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn sessions_resolve_until_expiry() {
  let s = store().await;
  let ana = user(&s, "ana@example.com").await;
  let now = now_millis();
  s.insert_session("digest-a".into(), ana.id, now + Duration::hours(24))
    .await
    .unwrap();

  assert_eq!(s.session_user("digest-a", now).await.unwrap(), Some(ana.clone()));
  assert!(s.session_user("digest-b", now).await.unwrap().is_none());
  assert!(
    s.session_user("digest-a", now + Duration::hours(25))
      .await
      .unwrap()
      .is_none()
  );
}

#[tokio::test]
async fn purge_removes_only_expired_sessions() {
  let s = store().await;
  let ana = user(&s, "ana@example.com").await;
  let now = now_millis();
  s.insert_session("old".into(), ana.id, now - Duration::minutes(1)).await.unwrap();
  s.insert_session("live".into(), ana.id, now + Duration::hours(1)).await.unwrap();

  assert_eq!(s.purge_expired_sessions(now).await.unwrap(), 1);
  assert!(s.session_user("live", now).await.unwrap().is_some());
}
