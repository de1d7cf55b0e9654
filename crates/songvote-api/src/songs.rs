//! Handlers for `/songs` endpoints, including votes and vetoes.
//!
//! | Method   | Path               | Notes |
//! |----------|--------------------|-------|
//! | `GET`    | `/songs`           | |
//! | `POST`   | `/songs`           | Body: `{"title","artist","link_url","added_by"}`; 201 + id |
//! | `GET`    | `/songs/{id}`      | |
//! | `PUT`    | `/songs/{id}`      | Any of `title`, `artist`, `link_url` |
//! | `DELETE` | `/songs/{id}`      | Removes its votes and veto too |
//! | `POST`   | `/songs/vote`      | Body: `{"song_id","user_id"}` |
//! | `GET`    | `/songs/vote/{id}` | Votes for song `id` |
//! | `POST`   | `/songs/veto`      | Body: `{"song_id","user_id"}` |
//! | `GET`    | `/songs/veto/{id}` | The user who vetoed song `id` |

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use songvote_core::{
  session::SessionStore,
  song::{Ballot, NewSong, Song, SongUpdate, Vote},
  store::VoteStore,
  user::User,
};

use crate::{
  AppState,
  error::ApiError,
  extract::{Id, JsonBody},
};

// ─── Songs ────────────────────────────────────────────────────────────────────

/// `GET /songs`
pub async fn list<S>(State(state): State<AppState<S>>) -> Result<Json<Vec<Song>>, ApiError>
where
  S: VoteStore + SessionStore + 'static,
{
  Ok(Json(state.service.list_songs().await?))
}

/// `POST /songs`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  JsonBody(body): JsonBody<NewSong>,
) -> Result<impl IntoResponse, ApiError>
where
  S: VoteStore + SessionStore + 'static,
{
  let id = state.service.add_song(body).await?;
  Ok((StatusCode::CREATED, Json(id)))
}

/// `GET /songs/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Id(id): Id,
) -> Result<Json<Song>, ApiError>
where
  S: VoteStore + SessionStore + 'static,
{
  Ok(Json(state.service.get_song(id).await?))
}

/// `PUT /songs/{id}`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  Id(id): Id,
  JsonBody(update): JsonBody<SongUpdate>,
) -> Result<StatusCode, ApiError>
where
  S: VoteStore + SessionStore + 'static,
{
  state.service.update_song(id, update).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /songs/{id}`
pub async fn delete<S>(
  State(state): State<AppState<S>>,
  Id(id): Id,
) -> Result<StatusCode, ApiError>
where
  S: VoteStore + SessionStore + 'static,
{
  state.service.delete_song(id).await?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Votes ────────────────────────────────────────────────────────────────────

/// `POST /songs/vote`
pub async fn vote<S>(
  State(state): State<AppState<S>>,
  JsonBody(ballot): JsonBody<Ballot>,
) -> Result<StatusCode, ApiError>
where
  S: VoteStore + SessionStore + 'static,
{
  state.service.vote(ballot).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// `GET /songs/vote/{id}`
pub async fn votes_for<S>(
  State(state): State<AppState<S>>,
  Id(song_id): Id,
) -> Result<Json<Vec<Vote>>, ApiError>
where
  S: VoteStore + SessionStore + 'static,
{
  Ok(Json(state.service.list_votes_for_song(song_id).await?))
}

// ─── Vetoes ───────────────────────────────────────────────────────────────────

/// `POST /songs/veto`
pub async fn veto<S>(
  State(state): State<AppState<S>>,
  JsonBody(ballot): JsonBody<Ballot>,
) -> Result<StatusCode, ApiError>
where
  S: VoteStore + SessionStore + 'static,
{
  state.service.veto(ballot).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// `GET /songs/veto/{id}`
pub async fn vetoed_by<S>(
  State(state): State<AppState<S>>,
  Id(song_id): Id,
) -> Result<Json<User>, ApiError>
where
  S: VoteStore + SessionStore + 'static,
{
  Ok(Json(state.service.get_vetoed_by(song_id).await?))
}
