//! Error type for `notekeep-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown sync state: {0:?}")]
  UnknownSyncState(String),
}

impl From<Error> for notekeep_core::Error {
  fn from(e: Error) -> Self { notekeep_core::Error::LocalStorage(e.to_string()) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
