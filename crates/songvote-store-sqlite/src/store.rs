//! [`SqliteStore`]: the SQLite implementation of [`VoteStore`] and
//! [`SessionStore`].

use std::{
  path::Path,
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension as _, Transaction, TransactionBehavior, params};
use tracing::debug;

use songvote_core::{
  session::{SessionRecord, SessionStore},
  song::{NewSong, Song, SongUpdate, Veto, Vote},
  store::VoteStore,
  user::{NewUserRecord, User, UserUpdate},
};

use crate::{
  Error, Result,
  encode::{
    SONG_COLUMNS, USER_COLUMNS, decode_expiry, encode_expiry, is_foreign_key_violation,
    is_unique_violation, song_from_row, user_from_row, veto_from_row, vote_from_row,
  },
  schema::{PRAGMAS, SCHEMA},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A songvote store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  ///
  /// Missing parent directories are created first.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      std::fs::create_dir_all(parent)?;
    }
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    debug!(path = %path.display(), "opened sqlite store");
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(PRAGMAS)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `f` on the connection thread, carrying domain rejections back out
  /// as [`Error`] values rather than connection failures.
  async fn run<T, F>(&self, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
  {
    self.conn.call(move |conn| Ok(f(conn))).await?
  }

  /// Run a write transaction on the connection thread.
  ///
  /// If the caller's future is dropped while the closure is queued or
  /// running, the closure sees [`Abandoned::check`] fail at its commit point
  /// and the transaction rolls back.
  async fn write<T, F>(&self, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(Transaction<'_>, &Abandoned) -> Result<T> + Send + 'static,
  {
    let abandoned = Abandoned::default();
    let guard     = abandoned.raise_on_drop();
    let flag      = abandoned.clone();
    let result = self
      .conn
      .call(move |conn| {
        let tx = match conn.transaction_with_behavior(TransactionBehavior::Immediate) {
          Ok(tx) => tx,
          Err(e) => return Ok(Err(Error::from(e))),
        };
        Ok(f(tx, &flag))
      })
      .await;
    guard.disarm();
    result?
  }
}

// ─── Cancellation ────────────────────────────────────────────────────────────

/// Raised once nobody is waiting for a write any more.
#[derive(Clone, Default)]
struct Abandoned(Arc<AtomicBool>);

impl Abandoned {
  fn raise_on_drop(&self) -> RaiseOnDrop { RaiseOnDrop(Some(self.clone())) }

  fn check(&self) -> Result<()> {
    if self.0.load(Ordering::Acquire) { Err(Error::Cancelled) } else { Ok(()) }
  }
}

struct RaiseOnDrop(Option<Abandoned>);

impl RaiseOnDrop {
  fn disarm(mut self) { self.0 = None; }
}

impl Drop for RaiseOnDrop {
  fn drop(&mut self) {
    if let Some(flag) = self.0.take() {
      flag.0.store(true, Ordering::Release);
    }
  }
}

/// Commit `tx` unless the caller has gone away, in which case it rolls back
/// on drop.
fn commit(tx: Transaction<'_>, abandoned: &Abandoned) -> Result<()> {
  abandoned.check()?;
  tx.commit()?;
  Ok(())
}

// ─── Row helpers ─────────────────────────────────────────────────────────────

fn select_user(conn: &Connection, id: i64) -> Result<Option<User>> {
  let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
  Ok(conn.query_row(&sql, params![id], user_from_row).optional()?)
}

fn select_song(conn: &Connection, id: i64) -> Result<Option<Song>> {
  let sql = format!("SELECT {SONG_COLUMNS} FROM songs WHERE id = ?1");
  Ok(conn.query_row(&sql, params![id], song_from_row).optional()?)
}

fn require_song(conn: &Connection, id: i64) -> Result<()> {
  let exists = conn
    .query_row("SELECT 1 FROM songs WHERE id = ?1", params![id], |_| Ok(()))
    .optional()?
    .is_some();
  if exists { Ok(()) } else { Err(Error::NotFound(format!("song {id}"))) }
}

fn require_active_user(conn: &Connection, id: i64) -> Result<()> {
  let inactive: Option<bool> = conn
    .query_row("SELECT inactive FROM users WHERE id = ?1", params![id], |r| r.get(0))
    .optional()?;
  match inactive {
    None => Err(Error::NotFound(format!("user {id}"))),
    Some(true) => Err(Error::Forbidden(format!("user {id} is inactive"))),
    Some(false) => Ok(()),
  }
}

fn active_name_taken(conn: &Connection, name: &str, except: i64) -> Result<bool> {
  Ok(
    conn
      .query_row(
        "SELECT 1 FROM users WHERE name = ?1 AND inactive = 0 AND id != ?2",
        params![name, except],
        |_| Ok(()),
      )
      .optional()?
      .is_some(),
  )
}

fn user_conflict(name: &str) -> Error { Error::Conflict(format!("user {name:?} already exists")) }

fn song_conflict(title: &str, artist: &str) -> Error {
  Error::Conflict(format!("{title:?} by {artist:?} already exists"))
}

/// Insert a vote row and bump the song's counter. Must run inside a write
/// transaction so both effects land together.
fn insert_vote(conn: &Connection, song_id: i64, user_id: i64) -> Result<i64> {
  require_song(conn, song_id)?;
  require_active_user(conn, user_id)?;

  match conn.execute(
    "INSERT INTO votes (song_id, user_id) VALUES (?1, ?2)",
    params![song_id, user_id],
  ) {
    Ok(_) => {}
    Err(e) if is_unique_violation(&e) => {
      return Err(Error::Conflict("user already voted for this song".into()));
    }
    Err(e) => return Err(e.into()),
  }
  let vote_id = conn.last_insert_rowid();

  conn.execute("UPDATE songs SET votes = votes + 1 WHERE id = ?1", params![song_id])?;
  Ok(vote_id)
}

// ─── VoteStore impl ──────────────────────────────────────────────────────────

impl VoteStore for SqliteStore {
  type Error = Error;

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn add_user(&self, user: NewUserRecord) -> Result<i64> {
    self
      .write(move |tx, abandoned| {
        let inserted = tx.execute(
          "INSERT INTO users (name, password_hash, inactive, vetoes_remaining)
           VALUES (?1, ?2, 0, ?3)",
          params![user.name, user.password_hash, user.vetoes_remaining],
        );
        match inserted {
          Ok(_) => {}
          Err(e) if is_unique_violation(&e) => return Err(user_conflict(&user.name)),
          Err(e) => return Err(e.into()),
        }
        let id = tx.last_insert_rowid();
        commit(tx, abandoned)?;
        Ok(id)
      })
      .await
  }

  async fn get_user_by_id(&self, id: i64) -> Result<Option<User>> {
    self
      .run(move |conn| Ok(select_user(conn, id)?.filter(User::is_active)))
      .await
  }

  async fn get_user_by_name(&self, name: &str) -> Result<Option<User>> {
    let name = name.to_owned();
    self
      .run(move |conn| {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE name = ?1 AND inactive = 0");
        Ok(conn.query_row(&sql, params![name], user_from_row).optional()?)
      })
      .await
  }

  async fn find_user(&self, id: i64) -> Result<Option<User>> {
    self.run(move |conn| select_user(conn, id)).await
  }

  async fn list_users(&self) -> Result<Vec<User>> {
    self
      .run(|conn| {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE inactive = 0 ORDER BY id");
        let mut stmt = conn.prepare(&sql)?;
        let users = stmt
          .query_map([], user_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
      })
      .await
  }

  async fn update_user(&self, id: i64, update: UserUpdate) -> Result<()> {
    self
      .write(move |tx, abandoned| {
        let current = select_user(&tx, id)?.ok_or_else(|| Error::NotFound(format!("user {id}")))?;

        let name     = update.name.unwrap_or(current.name);
        let inactive = update.inactive.unwrap_or(current.inactive);
        if !inactive && active_name_taken(&tx, &name, id)? {
          return Err(user_conflict(&name));
        }

        let updated = tx.execute(
          "UPDATE users
              SET name = ?2, password_hash = ?3, inactive = ?4, vetoes_remaining = ?5
            WHERE id = ?1",
          params![
            id,
            name,
            update.password_hash.unwrap_or(current.password_hash),
            inactive,
            update.vetoes_remaining.unwrap_or(current.vetoes_remaining),
          ],
        );
        match updated {
          Ok(_) => {}
          Err(e) if is_unique_violation(&e) => return Err(user_conflict(&name)),
          Err(e) => return Err(e.into()),
        }

        commit(tx, abandoned)?;
        Ok(())
      })
      .await
  }

  async fn soft_delete_user(&self, id: i64) -> Result<()> {
    self
      .write(move |tx, abandoned| {
        let changed = tx.execute(
          "UPDATE users SET inactive = 1 WHERE id = ?1 AND inactive = 0",
          params![id],
        )?;
        if changed == 0 {
          return Err(Error::NotFound(format!("user {id}")));
        }
        commit(tx, abandoned)
      })
      .await
  }

  // ── Songs ─────────────────────────────────────────────────────────────────

  async fn add_song(&self, song: NewSong) -> Result<i64> {
    self
      .write(move |tx, abandoned| {

        let inserted = tx.execute(
          "INSERT INTO songs (title, artist, link_url, votes, vetoed, added_by)
           VALUES (?1, ?2, ?3, 0, 0, ?4)",
          params![song.title, song.artist, song.link_url, song.added_by],
        );
        match inserted {
          Ok(_) => {}
          Err(e) if is_unique_violation(&e) => return Err(song_conflict(&song.title, &song.artist)),
          Err(e) if is_foreign_key_violation(&e) => {
            return Err(Error::NotFound(format!("user {}", song.added_by)));
          }
          Err(e) => return Err(e.into()),
        }
        let song_id = tx.last_insert_rowid();

        insert_vote(&tx, song_id, song.added_by)?;
        commit(tx, abandoned)?;
        Ok(song_id)
      })
      .await
  }

  async fn get_song(&self, id: i64) -> Result<Option<Song>> {
    self.run(move |conn| select_song(conn, id)).await
  }

  async fn list_songs(&self) -> Result<Vec<Song>> {
    self
      .run(|conn| {
        let sql = format!("SELECT {SONG_COLUMNS} FROM songs ORDER BY id");
        let mut stmt = conn.prepare(&sql)?;
        let songs = stmt
          .query_map([], song_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(songs)
      })
      .await
  }

  async fn delete_song(&self, id: i64) -> Result<()> {
    self
      .write(move |tx, abandoned| {
        // The veto goes with the song, so its budget goes back to the vetoer.
        tx.execute(
          "UPDATE users SET vetoes_remaining = vetoes_remaining + 1
            WHERE id = (SELECT user_id FROM vetoes WHERE song_id = ?1)",
          params![id],
        )?;
        // Votes and the veto row follow via ON DELETE CASCADE.
        let removed = tx.execute("DELETE FROM songs WHERE id = ?1", params![id])?;
        if removed == 0 {
          return Err(Error::NotFound(format!("song {id}")));
        }
        commit(tx, abandoned)
      })
      .await
  }

  async fn update_song(&self, id: i64, update: SongUpdate) -> Result<()> {
    self
      .write(move |tx, abandoned| {
        let current = select_song(&tx, id)?.ok_or_else(|| Error::NotFound(format!("song {id}")))?;

        let title  = update.title.unwrap_or(current.title);
        let artist = update.artist.unwrap_or(current.artist);

        let updated = tx.execute(
          "UPDATE songs SET title = ?2, artist = ?3, link_url = ?4 WHERE id = ?1",
          params![id, title, artist, update.link_url.unwrap_or(current.link_url)],
        );
        match updated {
          Ok(_) => {}
          Err(e) if is_unique_violation(&e) => return Err(song_conflict(&title, &artist)),
          Err(e) => return Err(e.into()),
        }

        commit(tx, abandoned)?;
        Ok(())
      })
      .await
  }

  // ── Votes ─────────────────────────────────────────────────────────────────

  async fn has_voted(&self, song_id: i64, user_id: i64) -> Result<bool> {
    self
      .run(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM votes WHERE song_id = ?1 AND user_id = ?2",
              params![song_id, user_id],
              |_| Ok(()),
            )
            .optional()?
            .is_some(),
        )
      })
      .await
  }

  async fn record_vote(&self, song_id: i64, user_id: i64) -> Result<i64> {
    self
      .write(move |tx, abandoned| {
        let vote_id = insert_vote(&tx, song_id, user_id)?;
        commit(tx, abandoned)?;
        Ok(vote_id)
      })
      .await
  }

  async fn list_votes_for_song(&self, song_id: i64) -> Result<Vec<Vote>> {
    self
      .run(move |conn| {
        let mut stmt =
          conn.prepare("SELECT id, song_id, user_id FROM votes WHERE song_id = ?1 ORDER BY id")?;
        let votes = stmt
          .query_map(params![song_id], vote_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(votes)
      })
      .await
  }

  // ── Vetoes ────────────────────────────────────────────────────────────────

  async fn record_veto(&self, song_id: i64, user_id: i64) -> Result<i64> {
    self
      .write(move |tx, abandoned| {

        require_song(&tx, song_id)?;
        let already = tx
          .query_row("SELECT 1 FROM vetoes WHERE song_id = ?1", params![song_id], |_| Ok(()))
          .optional()?
          .is_some();
        if already {
          return Err(Error::Conflict("song has already been vetoed".into()));
        }
        require_active_user(&tx, user_id)?;

        // Spend the veto in place; zero rows means the budget was empty.
        let spent = tx.execute(
          "UPDATE users SET vetoes_remaining = vetoes_remaining - 1
            WHERE id = ?1 AND inactive = 0 AND vetoes_remaining > 0",
          params![user_id],
        )?;
        if spent == 0 {
          return Err(Error::Forbidden("user has no vetoes remaining".into()));
        }

        match tx.execute(
          "INSERT INTO vetoes (song_id, user_id) VALUES (?1, ?2)",
          params![song_id, user_id],
        ) {
          Ok(_) => {}
          Err(e) if is_unique_violation(&e) => {
            return Err(Error::Conflict("song has already been vetoed".into()));
          }
          Err(e) => return Err(e.into()),
        }
        let veto_id = tx.last_insert_rowid();

        tx.execute("UPDATE songs SET vetoed = 1 WHERE id = ?1", params![song_id])?;
        commit(tx, abandoned)?;
        Ok(veto_id)
      })
      .await
  }

  async fn get_veto_for_song(&self, song_id: i64) -> Result<Option<Veto>> {
    self
      .run(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT id, song_id, user_id FROM vetoes WHERE song_id = ?1",
              params![song_id],
              veto_from_row,
            )
            .optional()?,
        )
      })
      .await
  }
}

// ─── SessionStore impl ───────────────────────────────────────────────────────

impl SessionStore for SqliteStore {
  type Error = Error;

  async fn load_session(&self, token: &str, now: DateTime<Utc>) -> Result<Option<SessionRecord>> {
    let token = token.to_owned();
    let now   = encode_expiry(now);
    self
      .run(move |conn| {
        let row: Option<(String, Vec<u8>, f64)> = conn
          .query_row(
            "SELECT token, data, expiry FROM sessions WHERE token = ?1 AND expiry > ?2",
            params![token, now],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
          )
          .optional()?;

        row
          .map(|(token, data, expiry)| {
            Ok(SessionRecord { token, data, expiry: decode_expiry(expiry)? })
          })
          .transpose()
      })
      .await
  }

  async fn save_session(&self, record: SessionRecord) -> Result<()> {
    let expiry = encode_expiry(record.expiry);
    self
      .run(move |conn| {
        conn.execute(
          "INSERT INTO sessions (token, data, expiry) VALUES (?1, ?2, ?3)
           ON CONFLICT(token) DO UPDATE SET data = excluded.data, expiry = excluded.expiry",
          params![record.token, record.data, expiry],
        )?;
        Ok(())
      })
      .await
  }

  async fn delete_session(&self, token: &str) -> Result<()> {
    let token = token.to_owned();
    self
      .run(move |conn| {
        conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
        Ok(())
      })
      .await
  }

  async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64> {
    let now = encode_expiry(now);
    self
      .run(move |conn| {
        let removed = conn.execute("DELETE FROM sessions WHERE expiry < ?1", params![now])?;
        Ok(removed as u64)
      })
      .await
  }
}
