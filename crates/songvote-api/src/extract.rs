//! Extractors whose rejections use the API error envelope.
//!
//! Each wraps the stock axum extractor and turns its rejection into a
//! `400` [`ApiError`], so a malformed body or id never produces a bare
//! plain-text response.

use axum::{
  extract::{FromRequest, FromRequestParts, Request},
  http::{header, request::Parts},
};
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "session";

// ─── Bodies ──────────────────────────────────────────────────────────────────

/// A JSON request body.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
  S: Send + Sync,
  T: DeserializeOwned,
{
  type Rejection = ApiError;

  async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
    let axum::Json(value) = axum::Json::<T>::from_request(req, state)
      .await
      .map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    Ok(Self(value))
  }
}

/// A URL-encoded form body.
pub struct FormBody<T>(pub T);

impl<S, T> FromRequest<S> for FormBody<T>
where
  S: Send + Sync,
  T: DeserializeOwned,
{
  type Rejection = ApiError;

  async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
    let axum::Form(value) = axum::Form::<T>::from_request(req, state)
      .await
      .map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    Ok(Self(value))
  }
}

// ─── Path ────────────────────────────────────────────────────────────────────

/// The integer `{id}` segment of a route.
pub struct Id(pub i64);

impl<S> FromRequestParts<S> for Id
where
  S: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
    let axum::extract::Path(id) = axum::extract::Path::<i64>::from_request_parts(parts, state)
      .await
      .map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    Ok(Self(id))
  }
}

// ─── Session cookie ──────────────────────────────────────────────────────────

/// The session token presented by the client, if any. Never rejects.
pub struct SessionToken(pub Option<String>);

impl<S> FromRequestParts<S> for SessionToken
where
  S: Send + Sync,
{
  type Rejection = std::convert::Infallible;

  async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
    let token = parts
      .headers
      .get_all(header::COOKIE)
      .iter()
      .filter_map(|v| v.to_str().ok())
      .flat_map(|v| v.split(';'))
      .find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE && !value.is_empty()).then(|| value.to_owned())
      });
    Ok(Self(token))
  }
}

/// `Set-Cookie` value that installs `token` for `max_age_secs`.
pub fn session_cookie(token: &str, max_age_secs: u64) -> String {
  format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}")
}

/// `Set-Cookie` value that makes the client drop its session cookie.
pub fn expired_session_cookie() -> String {
  format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}
