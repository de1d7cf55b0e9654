//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every failure leaves the API as `{"code": <status>, "message": "..."}`.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use songvote_core::Error;
use thiserror::Error;
use tracing::error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub Error);

impl ApiError {
  pub fn bad_request(message: impl Into<String>) -> Self {
    Self(Error::BadRequest(message.into()))
  }

  pub fn not_found(what: impl Into<String>) -> Self { Self(Error::NotFound(what.into())) }

  pub fn unauthorized(message: impl Into<String>) -> Self {
    Self(Error::Unauthorized(message.into()))
  }

  pub fn status(&self) -> StatusCode {
    match &self.0 {
      Error::BadRequest(_) => StatusCode::BAD_REQUEST,
      Error::NotFound(_) => StatusCode::NOT_FOUND,
      Error::Conflict(_) => StatusCode::CONFLICT,
      Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
      Error::Forbidden(_) => StatusCode::FORBIDDEN,
      Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    let message = match &self.0 {
      Error::Internal(e) => {
        error!(error = %e, "request failed");
        "internal server error".to_owned()
      }
      other => other.message(),
    };
    (status, Json(json!({ "code": status.as_u16(), "message": message }))).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn each_kind_has_one_status() {
    let cases = [
      (ApiError::bad_request("x"), 400),
      (ApiError::not_found("song 1"), 404),
      (ApiError(Error::Conflict("x".into())), 409),
      (ApiError::unauthorized("x"), 401),
      (ApiError(Error::Forbidden("x".into())), 403),
      (ApiError(Error::internal(std::io::Error::other("disk"))), 500),
    ];
    for (err, code) in cases {
      assert_eq!(err.status().as_u16(), code, "{err}");
    }
  }
}
