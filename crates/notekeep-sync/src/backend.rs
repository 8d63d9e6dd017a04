//! [`Backend`]: where a [`crate::NoteStore`] reads and writes.

use std::sync::Arc;

use crate::config::BackendKind;

/// Chosen once at construction.
pub enum Backend<C, R> {
  /// The cache is authoritative and notes are always `synced`.
  LocalOnly(Arc<C>),
  /// Every operation goes to the remote; the in-memory view is the only copy.
  RemoteOnly(Arc<R>),
  /// Remote first, with the cache as fallback and pending-write queue.
  Cached { cache: Arc<C>, remote: Arc<R> },
}

impl<C, R> Clone for Backend<C, R> {
  fn clone(&self) -> Self {
    match self {
      Self::LocalOnly(c) => Self::LocalOnly(Arc::clone(c)),
      Self::RemoteOnly(r) => Self::RemoteOnly(Arc::clone(r)),
      Self::Cached { cache, remote } => Self::Cached {
        cache:  Arc::clone(cache),
        remote: Arc::clone(remote),
      },
    }
  }
}

impl<C, R> Backend<C, R> {
  pub fn kind(&self) -> BackendKind {
    match self {
      Self::LocalOnly(_) => BackendKind::Local,
      Self::RemoteOnly(_) => BackendKind::Remote,
      Self::Cached { .. } => BackendKind::Cached,
    }
  }

  pub fn cache(&self) -> Option<&Arc<C>> {
    match self {
      Self::LocalOnly(c) | Self::Cached { cache: c, .. } => Some(c),
      Self::RemoteOnly(_) => None,
    }
  }

  pub fn remote(&self) -> Option<&Arc<R>> {
    match self {
      Self::RemoteOnly(r) | Self::Cached { remote: r, .. } => Some(r),
      Self::LocalOnly(_) => None,
    }
  }
}
