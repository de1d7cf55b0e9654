//! Songs and the two ways users react to them: votes and vetoes.

use serde::{Deserialize, Serialize};

/// A song on the shared list.
///
/// `votes` always equals the number of [`Vote`] rows for the song, and
/// `vetoed` is true exactly when a [`Veto`] row exists for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
  pub id:       i64,
  pub title:    String,
  pub artist:   String,
  #[serde(default)]
  pub link_url: String,
  #[serde(default)]
  pub votes:    u32,
  #[serde(default)]
  pub vetoed:   bool,
  pub added_by: i64,
}

/// Submission body for `POST /songs`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewSong {
  pub title:    String,
  pub artist:   String,
  #[serde(default)]
  pub link_url: String,
  pub added_by: i64,
}

/// Editable song fields. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SongUpdate {
  pub title:    Option<String>,
  pub artist:   Option<String>,
  pub link_url: Option<String>,
}

/// One user's up-vote on one song. `(song_id, user_id)` is unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
  pub id:      i64,
  pub song_id: i64,
  pub user_id: i64,
}

/// The single veto a song can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Veto {
  pub id:      i64,
  pub song_id: i64,
  pub user_id: i64,
}

/// Request body shared by `POST /songs/vote` and `POST /songs/veto`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Ballot {
  pub song_id: i64,
  pub user_id: i64,
}
