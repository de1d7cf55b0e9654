//! [`MemoryStore`]: an in-process implementation of [`VoteStore`] and
//! [`SessionStore`].
//!
//! Every operation takes one lock over all tables, which makes each call
//! trivially atomic. Used by the service tests and anywhere a throwaway
//! backend is handy.

use std::{
  collections::BTreeMap,
  sync::{Mutex, MutexGuard},
};

use chrono::{DateTime, Utc};

use crate::{
  Error, Result,
  session::{SessionRecord, SessionStore},
  song::{NewSong, Song, SongUpdate, Veto, Vote},
  store::VoteStore,
  user::{NewUserRecord, User, UserUpdate},
};

#[derive(Default)]
struct Tables {
  users:    BTreeMap<i64, User>,
  songs:    BTreeMap<i64, Song>,
  votes:    BTreeMap<i64, Vote>,
  vetoes:   BTreeMap<i64, Veto>,
  sessions: BTreeMap<String, SessionRecord>,
  next_id:  NextIds,
}

#[derive(Default)]
struct NextIds {
  user: i64,
  song: i64,
  vote: i64,
  veto: i64,
}

fn bump(counter: &mut i64) -> i64 {
  *counter += 1;
  *counter
}

impl Tables {
  fn active_name_taken(&self, name: &str, except: Option<i64>) -> bool {
    self
      .users
      .values()
      .any(|u| u.is_active() && u.name == name && Some(u.id) != except)
  }

  fn song_pair_taken(&self, title: &str, artist: &str, except: Option<i64>) -> bool {
    self
      .songs
      .values()
      .any(|s| s.title == title && s.artist == artist && Some(s.id) != except)
  }

  fn require_active_user(&self, id: i64) -> Result<()> {
    match self.users.get(&id) {
      None => Err(Error::NotFound(format!("user {id}"))),
      Some(u) if u.inactive => Err(Error::Forbidden(format!("user {id} is inactive"))),
      Some(_) => Ok(()),
    }
  }

  fn insert_vote(&mut self, song_id: i64, user_id: i64) -> Result<i64> {
    if !self.songs.contains_key(&song_id) {
      return Err(Error::NotFound(format!("song {song_id}")));
    }
    self.require_active_user(user_id)?;
    if self.votes.values().any(|v| v.song_id == song_id && v.user_id == user_id) {
      return Err(Error::Conflict("user already voted for this song".into()));
    }

    let id = bump(&mut self.next_id.vote);
    self.votes.insert(id, Vote { id, song_id, user_id });
    if let Some(song) = self.songs.get_mut(&song_id) {
      song.votes += 1;
    }
    Ok(id)
  }
}

/// A store that lives and dies with the process.
#[derive(Default)]
pub struct MemoryStore {
  tables: Mutex<Tables>,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  fn lock(&self) -> MutexGuard<'_, Tables> {
    // A panic while holding the lock cannot leave a half-applied write
    // behind, since every method validates before mutating.
    self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }
}

// ─── VoteStore impl ──────────────────────────────────────────────────────────

impl VoteStore for MemoryStore {
  type Error = Error;

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn add_user(&self, user: NewUserRecord) -> Result<i64> {
    let mut t = self.lock();
    if t.active_name_taken(&user.name, None) {
      return Err(Error::Conflict(format!("user {:?} already exists", user.name)));
    }
    let id = bump(&mut t.next_id.user);
    t.users.insert(id, User {
      id,
      name:             user.name,
      password_hash:    user.password_hash,
      inactive:         false,
      vetoes_remaining: user.vetoes_remaining,
    });
    Ok(id)
  }

  async fn get_user_by_id(&self, id: i64) -> Result<Option<User>> {
    Ok(self.lock().users.get(&id).filter(|u| u.is_active()).cloned())
  }

  async fn get_user_by_name(&self, name: &str) -> Result<Option<User>> {
    Ok(
      self
        .lock()
        .users
        .values()
        .find(|u| u.is_active() && u.name == name)
        .cloned(),
    )
  }

  async fn find_user(&self, id: i64) -> Result<Option<User>> {
    Ok(self.lock().users.get(&id).cloned())
  }

  async fn list_users(&self) -> Result<Vec<User>> {
    Ok(self.lock().users.values().filter(|u| u.is_active()).cloned().collect())
  }

  async fn update_user(&self, id: i64, update: UserUpdate) -> Result<()> {
    let mut t = self.lock();
    let current = t
      .users
      .get(&id)
      .cloned()
      .ok_or_else(|| Error::NotFound(format!("user {id}")))?;

    let name = update.name.unwrap_or(current.name);
    let inactive = update.inactive.unwrap_or(current.inactive);
    if !inactive && t.active_name_taken(&name, Some(id)) {
      return Err(Error::Conflict(format!("user {name:?} already exists")));
    }

    t.users.insert(id, User {
      id,
      name,
      password_hash:    update.password_hash.unwrap_or(current.password_hash),
      inactive,
      vetoes_remaining: update.vetoes_remaining.unwrap_or(current.vetoes_remaining),
    });
    Ok(())
  }

  async fn soft_delete_user(&self, id: i64) -> Result<()> {
    match self.lock().users.get_mut(&id) {
      Some(u) if u.is_active() => {
        u.inactive = true;
        Ok(())
      }
      _ => Err(Error::NotFound(format!("user {id}"))),
    }
  }

  // ── Songs ─────────────────────────────────────────────────────────────────

  async fn add_song(&self, song: NewSong) -> Result<i64> {
    let mut t = self.lock();
    if t.song_pair_taken(&song.title, &song.artist, None) {
      return Err(Error::Conflict(format!(
        "{:?} by {:?} already exists",
        song.title, song.artist
      )));
    }
    t.require_active_user(song.added_by)?;

    let id = bump(&mut t.next_id.song);
    t.songs.insert(id, Song {
      id,
      title:    song.title,
      artist:   song.artist,
      link_url: song.link_url,
      votes:    0,
      vetoed:   false,
      added_by: song.added_by,
    });
    t.insert_vote(id, song.added_by)?;
    Ok(id)
  }

  async fn get_song(&self, id: i64) -> Result<Option<Song>> {
    Ok(self.lock().songs.get(&id).cloned())
  }

  async fn list_songs(&self) -> Result<Vec<Song>> {
    Ok(self.lock().songs.values().cloned().collect())
  }

  async fn delete_song(&self, id: i64) -> Result<()> {
    let mut t = self.lock();
    if t.songs.remove(&id).is_none() {
      return Err(Error::NotFound(format!("song {id}")));
    }
    let vetoer = t.vetoes.values().find(|v| v.song_id == id).map(|v| v.user_id);
    if let Some(user) = vetoer.and_then(|uid| t.users.get_mut(&uid)) {
      user.vetoes_remaining += 1;
    }
    t.votes.retain(|_, v| v.song_id != id);
    t.vetoes.retain(|_, v| v.song_id != id);
    Ok(())
  }

  async fn update_song(&self, id: i64, update: SongUpdate) -> Result<()> {
    let mut t = self.lock();
    let current = t
      .songs
      .get(&id)
      .cloned()
      .ok_or_else(|| Error::NotFound(format!("song {id}")))?;

    let title = update.title.unwrap_or(current.title);
    let artist = update.artist.unwrap_or(current.artist);
    if t.song_pair_taken(&title, &artist, Some(id)) {
      return Err(Error::Conflict(format!("{title:?} by {artist:?} already exists")));
    }

    t.songs.insert(id, Song {
      title,
      artist,
      link_url: update.link_url.unwrap_or(current.link_url),
      ..current
    });
    Ok(())
  }

  // ── Votes ─────────────────────────────────────────────────────────────────

  async fn has_voted(&self, song_id: i64, user_id: i64) -> Result<bool> {
    Ok(
      self
        .lock()
        .votes
        .values()
        .any(|v| v.song_id == song_id && v.user_id == user_id),
    )
  }

  async fn record_vote(&self, song_id: i64, user_id: i64) -> Result<i64> {
    self.lock().insert_vote(song_id, user_id)
  }

  async fn list_votes_for_song(&self, song_id: i64) -> Result<Vec<Vote>> {
    Ok(
      self
        .lock()
        .votes
        .values()
        .filter(|v| v.song_id == song_id)
        .copied()
        .collect(),
    )
  }

  // ── Vetoes ────────────────────────────────────────────────────────────────

  async fn record_veto(&self, song_id: i64, user_id: i64) -> Result<i64> {
    let mut t = self.lock();
    if !t.songs.contains_key(&song_id) {
      return Err(Error::NotFound(format!("song {song_id}")));
    }
    if t.vetoes.values().any(|v| v.song_id == song_id) {
      return Err(Error::Conflict("song has already been vetoed".into()));
    }
    t.require_active_user(user_id)?;
    match t.users.get_mut(&user_id) {
      Some(u) if u.vetoes_remaining > 0 => u.vetoes_remaining -= 1,
      _ => return Err(Error::Forbidden("user has no vetoes remaining".into())),
    }

    let id = bump(&mut t.next_id.veto);
    t.vetoes.insert(id, Veto { id, song_id, user_id });
    if let Some(song) = t.songs.get_mut(&song_id) {
      song.vetoed = true;
    }
    Ok(id)
  }

  async fn get_veto_for_song(&self, song_id: i64) -> Result<Option<Veto>> {
    Ok(self.lock().vetoes.values().find(|v| v.song_id == song_id).copied())
  }
}

// ─── SessionStore impl ───────────────────────────────────────────────────────

impl SessionStore for MemoryStore {
  type Error = Error;

  async fn load_session(&self, token: &str, now: DateTime<Utc>) -> Result<Option<SessionRecord>> {
    Ok(
      self
        .lock()
        .sessions
        .get(token)
        .filter(|r| r.expiry > now)
        .cloned(),
    )
  }

  async fn save_session(&self, record: SessionRecord) -> Result<()> {
    self.lock().sessions.insert(record.token.clone(), record);
    Ok(())
  }

  async fn delete_session(&self, token: &str) -> Result<()> {
    self.lock().sessions.remove(token);
    Ok(())
  }

  async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64> {
    let mut t = self.lock();
    let before = t.sessions.len();
    t.sessions.retain(|_, r| r.expiry >= now);
    Ok((before - t.sessions.len()) as u64)
  }
}
