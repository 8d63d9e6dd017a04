//! The client side of notekeep: a [`NoteStore`] that keeps per-user note
//! lists live over a local cache, a remote service or both, and the
//! [`Coordinator`] that owns the session and drives synchronisation.
//!
//! ```rust,ignore
//! let backend = Backend::Cached { cache: Arc::new(sqlite), remote: Arc::new(client) };
//! let coordinator = Coordinator::new(backend, AuthMode::Production, &HasherConfig::default())?;
//! coordinator.login("ana@example.com", "hunter22").await?;
//! let notes = coordinator.list_notes().await?;
//! ```

pub mod backend;
pub mod config;
mod locks;
pub mod notes;
pub mod session;

pub use backend::Backend;
pub use config::{AuthMode, BackendKind};
pub use notes::{FlushReport, NoteList, NoteStore};
pub use session::{Coordinator, SessionState};
