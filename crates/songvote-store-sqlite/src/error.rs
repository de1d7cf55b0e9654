//! Error type for `songvote-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("date/time out of range: {0}")]
  DateRange(f64),

  #[error("{0} not found")]
  NotFound(String),

  /// A uniqueness rule rejected the write.
  #[error("conflict: {0}")]
  Conflict(String),

  /// The acting user may not perform the write.
  #[error("forbidden: {0}")]
  Forbidden(String),

  /// The caller went away before the write committed; nothing was applied.
  #[error("write cancelled before commit")]
  Cancelled,
}

impl From<rusqlite::Error> for Error {
  fn from(e: rusqlite::Error) -> Self { Self::Database(e.into()) }
}

impl From<Error> for songvote_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::NotFound(m) => Self::NotFound(m),
      Error::Conflict(m) => Self::Conflict(m),
      Error::Forbidden(m) => Self::Forbidden(m),
      other => Self::internal(other),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
