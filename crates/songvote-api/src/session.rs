//! Login, logout and "who am I" under `/api`.

use axum::{
  Json,
  extract::State,
  http::{StatusCode, header},
  response::IntoResponse,
};
use serde::Deserialize;
use songvote_core::{
  session::{SessionStore, SessionUser},
  store::VoteStore,
};
use tracing::info;

use crate::{
  AppState,
  error::ApiError,
  extract::{FormBody, SessionToken, expired_session_cookie, session_cookie},
};

#[derive(Debug, Deserialize)]
pub struct LoginForm {
  pub username: String,
  pub password: String,
}

/// `POST /api/login`: form fields `username` and `password`.
///
/// Any session the client already holds is discarded before the new one is
/// issued.
pub async fn login<S>(
  State(state): State<AppState<S>>,
  SessionToken(previous): SessionToken,
  FormBody(form): FormBody<LoginForm>,
) -> Result<impl IntoResponse, ApiError>
where
  S: VoteStore + SessionStore + 'static,
{
  let user = state.service.login(&form.username, &form.password).await?;
  if let Some(previous) = previous {
    state.sessions.clear(&previous).await?;
  }
  let token = state.sessions.establish(&user).await?;
  let cookie = session_cookie(&token, state.sessions.lifetime().as_secs());
  Ok((StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie)]))
}

/// `GET /api/logout`. Idempotent.
pub async fn logout<S>(
  State(state): State<AppState<S>>,
  SessionToken(token): SessionToken,
) -> Result<impl IntoResponse, ApiError>
where
  S: VoteStore + SessionStore + 'static,
{
  if let Some(token) = token {
    if let Some(user) = state.sessions.current_user(&token).await? {
      info!(user_id = user.user_id, username = %user.username, "logged out");
    }
    state.sessions.clear(&token).await?;
  }
  Ok((StatusCode::NO_CONTENT, [(header::SET_COOKIE, expired_session_cookie())]))
}

/// `GET /api/me`
pub async fn me<S>(
  State(state): State<AppState<S>>,
  SessionToken(token): SessionToken,
) -> Result<Json<SessionUser>, ApiError>
where
  S: VoteStore + SessionStore + 'static,
{
  let Some(token) = token else {
    return Err(ApiError::unauthorized("not logged in"));
  };
  state
    .sessions
    .current_user(&token)
    .await?
    .map(Json)
    .ok_or_else(|| ApiError::unauthorized("not logged in"))
}
