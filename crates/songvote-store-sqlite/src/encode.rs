//! Row decoding and column encoding between domain types and SQLite.
//!
//! Booleans are stored as 0/1 integers. Session expiries are stored as Unix
//! time in fractional seconds so that range comparisons stay numeric.

use chrono::{DateTime, Utc};
use rusqlite::{Row, ffi};
use songvote_core::{
  song::{Song, Veto, Vote},
  user::User,
};

use crate::{Error, Result};

// ─── Column lists ─────────────────────────────────────────────────────────────

pub const USER_COLUMNS: &str = "id, name, password_hash, inactive, vetoes_remaining";
pub const SONG_COLUMNS: &str = "id, title, artist, link_url, votes, vetoed, added_by";

// ─── Rows ─────────────────────────────────────────────────────────────────────

pub fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
  Ok(User {
    id:               row.get(0)?,
    name:             row.get(1)?,
    password_hash:    row.get(2)?,
    inactive:         row.get(3)?,
    vetoes_remaining: row.get(4)?,
  })
}

pub fn song_from_row(row: &Row<'_>) -> rusqlite::Result<Song> {
  Ok(Song {
    id:       row.get(0)?,
    title:    row.get(1)?,
    artist:   row.get(2)?,
    link_url: row.get(3)?,
    votes:    row.get(4)?,
    vetoed:   row.get(5)?,
    added_by: row.get(6)?,
  })
}

pub fn vote_from_row(row: &Row<'_>) -> rusqlite::Result<Vote> {
  Ok(Vote { id: row.get(0)?, song_id: row.get(1)?, user_id: row.get(2)? })
}

pub fn veto_from_row(row: &Row<'_>) -> rusqlite::Result<Veto> {
  Ok(Veto { id: row.get(0)?, song_id: row.get(1)?, user_id: row.get(2)? })
}

// ─── Timestamps ───────────────────────────────────────────────────────────────

pub fn encode_expiry(dt: DateTime<Utc>) -> f64 {
  dt.timestamp_micros() as f64 / 1_000_000.0
}

pub fn decode_expiry(secs: f64) -> Result<DateTime<Utc>> {
  DateTime::from_timestamp_micros((secs * 1_000_000.0).round() as i64)
    .ok_or(Error::DateRange(secs))
}

// ─── Constraint errors ────────────────────────────────────────────────────────

fn extended_code(e: &rusqlite::Error) -> Option<i32> {
  match e {
    rusqlite::Error::SqliteFailure(err, _) => Some(err.extended_code),
    _ => None,
  }
}

/// True for `UNIQUE` and `PRIMARY KEY` violations.
pub fn is_unique_violation(e: &rusqlite::Error) -> bool {
  matches!(
    extended_code(e),
    Some(ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
  )
}

pub fn is_foreign_key_violation(e: &rusqlite::Error) -> bool {
  extended_code(e) == Some(ffi::SQLITE_CONSTRAINT_FOREIGNKEY)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn expiry_round_trips_to_the_microsecond() {
    let now = DateTime::from_timestamp_micros(1_718_000_000_123_456).unwrap();
    assert_eq!(decode_expiry(encode_expiry(now)).unwrap(), now);
  }
}
