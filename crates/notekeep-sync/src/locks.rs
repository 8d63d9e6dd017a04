//! Per-key async mutual exclusion.

use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Slots = Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

/// Serializes work on the same key; distinct keys never wait on each other.
/// Slots are created on demand and dropped with their last guard.
#[derive(Default)]
pub struct KeyedLocks {
  slots: Slots,
}

/// Held for as long as the key must stay locked.
pub struct KeyGuard {
  slots:  Slots,
  key:    String,
  _guard: OwnedMutexGuard<()>,
}

impl KeyedLocks {
  pub async fn lock(&self, key: &str) -> KeyGuard {
    let slot = {
      let mut slots = self.slots.lock();
      Arc::clone(slots.entry(key.to_owned()).or_default())
    };
    let guard = slot.lock_owned().await;
    KeyGuard {
      slots:  Arc::clone(&self.slots),
      key:    key.to_owned(),
      _guard: guard,
    }
  }

  #[cfg(test)]
  pub fn live_slots(&self) -> usize { self.slots.lock().len() }
}

impl Drop for KeyGuard {
  fn drop(&mut self) {
    let mut slots = self.slots.lock();
    // One reference is the map's, one is ours; anything more is a waiter.
    if let Some(slot) = slots.get(&self.key)
      && Arc::strong_count(slot) <= 2
    {
      slots.remove(&self.key);
    }
  }
}
