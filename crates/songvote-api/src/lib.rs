//! JSON HTTP API for songvote.
//!
//! Exposes an axum [`Router`] backed by any store that implements both
//! [`VoteStore`] and [`SessionStore`]. Request logging, TLS and the listener
//! are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let state = AppState::with_hasher(store, Hasher::default());
//! let app = songvote_api::router(state).layer(TraceLayer::new_for_http());
//! ```

pub mod error;
pub mod extract;
pub mod session;
pub mod songs;
pub mod users;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use songvote_core::{
  password::Hasher,
  service::VoteService,
  session::{SessionManager, SessionStore},
  store::VoteStore,
};

pub use error::ApiError;

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub service:  VoteService<S>,
  pub sessions: SessionManager<S>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self { service: self.service.clone(), sessions: self.sessions.clone() }
  }
}

impl<S: VoteStore + SessionStore> AppState<S> {
  /// State with the default session lifetime.
  pub fn with_hasher(store: Arc<S>, hasher: Hasher) -> Self {
    Self {
      service:  VoteService::with_hasher(store.clone(), hasher),
      sessions: SessionManager::new(store),
    }
  }

  pub fn with_session_lifetime(mut self, lifetime: std::time::Duration) -> Self {
    self.sessions = self.sessions.with_lifetime(lifetime);
    self
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full API router for `state`.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: VoteStore + SessionStore + 'static,
{
  Router::new()
    // Users
    .route("/users",            get(users::list::<S>).post(users::create::<S>))
    .route(
      "/users/{id}",
      get(users::get_one::<S>).put(users::update::<S>).delete(users::delete::<S>),
    )
    // Songs
    .route("/songs",            get(songs::list::<S>).post(songs::create::<S>))
    .route(
      "/songs/{id}",
      get(songs::get_one::<S>).put(songs::update::<S>).delete(songs::delete::<S>),
    )
    .route("/songs/vote",       post(songs::vote::<S>))
    .route("/songs/vote/{id}",  get(songs::votes_for::<S>))
    .route("/songs/veto",       post(songs::veto::<S>))
    .route("/songs/veto/{id}",  get(songs::vetoed_by::<S>))
    // Sessions
    .route("/api/login",        post(session::login::<S>))
    .route("/api/logout",       get(session::logout::<S>))
    .route("/api/me",           get(session::me::<S>))
    .fallback(not_found)
    .with_state(state)
}

async fn not_found(uri: axum::http::Uri) -> ApiError {
  ApiError::not_found(format!("route {}", uri.path()))
}

// ─── Integration tests ────────────────────────────────────────────────────────
