//! Handlers for `/users` endpoints.
//!
//! | Method   | Path          | Notes |
//! |----------|---------------|-------|
//! | `GET`    | `/users`      | Active users only |
//! | `POST`   | `/users`      | Body: `{"name":"…","password":"…"}`; 201 + id, starts a session if it can |
//! | `GET`    | `/users/{id}` | 404 if absent or inactive |
//! | `PUT`    | `/users/{id}` | Any of `name`, `password`, `inactive`, `vetoes` |
//! | `DELETE` | `/users/{id}` | Soft delete |

use axum::{
  Json,
  extract::State,
  http::{StatusCode, header},
  response::{IntoResponse, Response},
};
use songvote_core::{
  session::SessionStore,
  store::VoteStore,
  user::{NewUser, User, UserPatch},
};
use tracing::warn;

use crate::{
  AppState,
  error::ApiError,
  extract::{Id, JsonBody, session_cookie},
};

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /users`
pub async fn list<S>(State(state): State<AppState<S>>) -> Result<Json<Vec<User>>, ApiError>
where
  S: VoteStore + SessionStore + 'static,
{
  Ok(Json(state.service.list_users().await?))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /users`: registers the user and logs them in.
///
/// The account exists once `register` returns, so a failure to start the
/// session is logged and the 201 goes out without a cookie; the client can
/// still log in through `/api/login`.
pub async fn create<S>(
  State(state): State<AppState<S>>,
  JsonBody(body): JsonBody<NewUser>,
) -> Result<Response, ApiError>
where
  S: VoteStore + SessionStore + 'static,
{
  let id = state.service.register(body).await?;
  let user = state.service.get_user(id).await?;
  match state.sessions.establish(&user).await {
    Ok(token) => {
      let cookie = session_cookie(&token, state.sessions.lifetime().as_secs());
      Ok((StatusCode::CREATED, [(header::SET_COOKIE, cookie)], Json(id)).into_response())
    }
    Err(e) => {
      warn!(user_id = id, error = %e, "registered user but could not start a session");
      Ok((StatusCode::CREATED, Json(id)).into_response())
    }
  }
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /users/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Id(id): Id,
) -> Result<Json<User>, ApiError>
where
  S: VoteStore + SessionStore + 'static,
{
  Ok(Json(state.service.get_user(id).await?))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// `PUT /users/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  Id(id): Id,
  JsonBody(patch): JsonBody<UserPatch>,
) -> Result<StatusCode, ApiError>
where
  S: VoteStore + SessionStore + 'static,
{
  state.service.update_user(id, patch).await?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /users/{id}`
pub async fn delete<S>(
  State(state): State<AppState<S>>,
  Id(id): Id,
) -> Result<StatusCode, ApiError>
where
  S: VoteStore + SessionStore + 'static,
{
  state.service.soft_delete_user(id).await?;
  Ok(StatusCode::NO_CONTENT)
}
