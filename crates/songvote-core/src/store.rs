//! The `VoteStore` trait, the single capability boundary over persisted
//! users, songs, votes and vetoes.
//!
//! The trait is implemented by storage backends (`songvote-store-sqlite`, and
//! [`MemoryStore`](crate::memory::MemoryStore) for tests). The
//! [`VoteService`](crate::service::VoteService) depends on this abstraction,
//! never on a concrete backend.

use std::future::Future;

use crate::{
  song::{NewSong, Song, SongUpdate, Veto, Vote},
  user::{NewUserRecord, User, UserUpdate},
};

/// Abstraction over a songvote store backend.
///
/// Every write method is a single atomic unit: it either applies all of its
/// effects or none. Writes that touch more than one table (`add_song`,
/// `record_vote`, `record_veto`) must run inside one transaction, and
/// counters are adjusted in place rather than read-modified-written.
///
/// Uniqueness rules are enforced here as a backstop to the service's
/// pre-checks, so that concurrent writers racing past a pre-check still get a
/// `Conflict`.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait VoteStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static + Into<crate::Error>;

  // ── Users ─────────────────────────────────────────────────────────────

  /// Insert a user and return its id. Fails with a conflict when an
  /// *active* user already has the same name.
  fn add_user(
    &self,
    user: NewUserRecord,
  ) -> impl Future<Output = Result<i64, Self::Error>> + Send + '_;

  /// Active user by id. Returns `None` if absent or inactive.
  fn get_user_by_id(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// Active user by exact name. Returns `None` if absent or inactive.
  fn get_user_by_name<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + 'a;

  /// User by id, including inactive users.
  fn find_user(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// All active users in ascending id order.
  fn list_users(
    &self,
  ) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send + '_;

  /// Apply `update` to user `id` (active or not).
  ///
  /// Fails with not-found if the id is absent, and with a conflict if the
  /// resulting user would be active under a name another active user holds.
  fn update_user(
    &self,
    id: i64,
    update: UserUpdate,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Flip `inactive` on. Fails with not-found when no active row matched.
  fn soft_delete_user(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Songs ─────────────────────────────────────────────────────────────

  /// Insert a song together with its submitter's vote, returning the song id.
  ///
  /// The song starts unvetoed and ends the call with exactly one vote.
  /// Fails with a conflict on a duplicate `(title, artist)`.
  fn add_song(
    &self,
    song: NewSong,
  ) -> impl Future<Output = Result<i64, Self::Error>> + Send + '_;

  /// Retrieve a song by id. Returns `None` if not found.
  fn get_song(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Song>, Self::Error>> + Send + '_;

  /// All songs in ascending id order.
  fn list_songs(
    &self,
  ) -> impl Future<Output = Result<Vec<Song>, Self::Error>> + Send + '_;

  /// Hard-delete a song along with its votes and veto. The vetoer's budget
  /// goes back up by one in the same atomic step.
  fn delete_song(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Change the editable fields of a song.
  fn update_song(
    &self,
    id: i64,
    update: SongUpdate,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Votes ─────────────────────────────────────────────────────────────

  fn has_voted(
    &self,
    song_id: i64,
    user_id: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Insert a vote and increment the song's counter in one transaction.
  fn record_vote(
    &self,
    song_id: i64,
    user_id: i64,
  ) -> impl Future<Output = Result<i64, Self::Error>> + Send + '_;

  /// Votes for a song in ascending id order.
  fn list_votes_for_song(
    &self,
    song_id: i64,
  ) -> impl Future<Output = Result<Vec<Vote>, Self::Error>> + Send + '_;

  // ── Vetoes ────────────────────────────────────────────────────────────

  /// Insert a veto, mark the song vetoed and spend one of the user's vetoes,
  /// all in one transaction.
  ///
  /// Fails with a conflict if the song already carries a veto, and with
  /// forbidden if the user is inactive or has no vetoes left.
  fn record_veto(
    &self,
    song_id: i64,
    user_id: i64,
  ) -> impl Future<Output = Result<i64, Self::Error>> + Send + '_;

  fn get_veto_for_song(
    &self,
    song_id: i64,
  ) -> impl Future<Output = Result<Option<Veto>, Self::Error>> + Send + '_;
}
