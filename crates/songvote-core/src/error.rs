//! Error types for `songvote-core`.
//!
//! Every failure the domain can report falls into one of a handful of kinds.
//! Backends convert their own errors into this enum; the request surface
//! translates each kind into exactly one HTTP status.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Malformed id or an empty required field.
  #[error("bad request: {0}")]
  BadRequest(String),

  /// The entity is absent, or retired where that means "gone".
  #[error("{0} not found")]
  NotFound(String),

  /// Uniqueness or idempotency violation.
  #[error("conflict: {0}")]
  Conflict(String),

  #[error("unauthorized: {0}")]
  Unauthorized(String),

  /// The caller is known but a precondition on their state fails.
  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("internal error: {0}")]
  Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn internal(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Internal(Box::new(e))
  }

  /// The human-readable part of the error, without the kind prefix.
  pub fn message(&self) -> String {
    match self {
      Error::BadRequest(m)
      | Error::Conflict(m)
      | Error::Unauthorized(m)
      | Error::Forbidden(m) => m.clone(),
      Error::NotFound(_) => self.to_string(),
      Error::Internal(e) => e.to_string(),
    }
  }
}

impl From<serde_json::Error> for Error {
  fn from(e: serde_json::Error) -> Self { Self::internal(e) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Lifts a backend result into the core error type.
pub(crate) trait ErrInto<T> {
  fn err_into(self) -> Result<T>;
}

impl<T, E: Into<Error>> ErrInto<T> for std::result::Result<T, E> {
  fn err_into(self) -> Result<T> { self.map_err(Into::into) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn message_strips_kind_prefix() {
    let err = Error::Conflict("user already voted for this song".into());
    assert_eq!(err.message(), "user already voted for this song");
    assert_eq!(err.to_string(), "conflict: user already voted for this song");
  }

  #[test]
  fn not_found_names_the_entity() {
    let err = Error::NotFound("song 7".into());
    assert_eq!(err.message(), "song 7 not found");
  }
}
