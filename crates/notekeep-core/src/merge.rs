//! Reconciling the local cache with a fresh copy of the remote note list.
//!
//! Conflicts resolve last-write-wins on `updated_at`. A local pending
//! mutation survives only while it is at least as recent as the remote copy.

use std::collections::{HashMap, HashSet};

use crate::note::{Note, SyncState};

/// Row-level changes to bring a cache in line with the remote list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergePlan {
  /// Notes to write as-is (remote copies arrive `Synced`).
  pub upserts:  Vec<Note>,
  /// Ids of local rows to delete.
  pub removals: Vec<String>,
}

impl MergePlan {
  pub fn is_empty(&self) -> bool { self.upserts.is_empty() && self.removals.is_empty() }
}

/// Compute the plan that merges `remote` into `local`.
///
/// `local` must contain every row for the user, tombstones included.
pub fn plan_merge(local: &[Note], remote: &[Note]) -> MergePlan {
  let local_by_id: HashMap<&str, &Note> =
    local.iter().map(|n| (n.id.as_str(), n)).collect();
  let remote_ids: HashSet<&str> =
    remote.iter().map(|n| n.id.as_str()).collect();

  let mut plan = MergePlan::default();

  for incoming in remote {
    match local_by_id.get(incoming.id.as_str()) {
      Some(existing)
        if existing.sync_state.is_pending()
          && existing.updated_at >= incoming.updated_at => {}
      Some(existing) if **existing == synced(incoming) => {}
      _ => plan.upserts.push(synced(incoming)),
    }
  }

  for existing in local {
    if remote_ids.contains(existing.id.as_str()) {
      continue;
    }
    // Created offline and never pushed: the remote cannot know it yet.
    if existing.sync_state == SyncState::PendingCreate {
      continue;
    }
    plan.removals.push(existing.id.clone());
  }

  plan
}

fn synced(note: &Note) -> Note {
  Note { sync_state: SyncState::Synced, ..note.clone() }
}
