//! [`VoteService`]: every user-facing state transition.
//!
//! The service validates input, checks preconditions in a fixed order so each
//! failure reports its own kind, and then hands the write to a single atomic
//! store call. The store repeats the race-sensitive checks inside its
//! transaction, so a request that slips past a pre-check still fails cleanly
//! instead of breaking an invariant.

use std::sync::Arc;

use tracing::{info, warn};

use crate::{
  Error, INITIAL_VETOES, Result,
  error::ErrInto as _,
  password::Hasher,
  song::{Ballot, NewSong, Song, SongUpdate, Veto, Vote},
  store::VoteStore,
  user::{NewUser, NewUserRecord, User, UserPatch, UserUpdate},
};

fn check_id(what: &str, id: i64) -> Result<()> {
  if id < 1 {
    return Err(Error::BadRequest(format!("invalid {what} id {id}")));
  }
  Ok(())
}

fn require_non_empty(field: &str, value: &str) -> Result<()> {
  if value.trim().is_empty() {
    return Err(Error::BadRequest(format!("{field} must not be empty")));
  }
  Ok(())
}

pub struct VoteService<S> {
  store:  Arc<S>,
  hasher: Hasher,
}

impl<S> Clone for VoteService<S> {
  fn clone(&self) -> Self {
    Self { store: self.store.clone(), hasher: self.hasher.clone() }
  }
}

impl<S: VoteStore> VoteService<S> {
  pub fn with_hasher(store: Arc<S>, hasher: Hasher) -> Self {
    Self { store, hasher }
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  async fn hash_password(&self, password: String) -> Result<String> {
    let hasher = self.hasher.clone();
    tokio::task::spawn_blocking(move || hasher.hash(&password))
      .await
      .map_err(Error::internal)?
  }

  async fn active_user(&self, id: i64) -> Result<User> {
    match self.store.find_user(id).await.err_into()? {
      None => Err(Error::NotFound(format!("user {id}"))),
      Some(u) if u.inactive => Err(Error::Forbidden(format!("user {id} is inactive"))),
      Some(u) => Ok(u),
    }
  }

  async fn existing_song(&self, id: i64) -> Result<Song> {
    self
      .store
      .get_song(id)
      .await
      .err_into()?
      .ok_or_else(|| Error::NotFound(format!("song {id}")))
  }

  // ── Users ─────────────────────────────────────────────────────────────────

  /// Register a new user with a full veto budget and return their id.
  pub async fn register(&self, req: NewUser) -> Result<i64> {
    require_non_empty("name", &req.name)?;
    if req.password.is_empty() {
      return Err(Error::BadRequest("password must not be empty".into()));
    }
    if self.store.get_user_by_name(&req.name).await.err_into()?.is_some() {
      return Err(Error::Conflict(format!("user {:?} already exists", req.name)));
    }

    let password_hash = self.hash_password(req.password).await?;
    let id = self
      .store
      .add_user(NewUserRecord {
        name: req.name.clone(),
        password_hash,
        vetoes_remaining: INITIAL_VETOES,
      })
      .await
      .err_into()?;

    info!(id, name = %req.name, "new user created");
    Ok(id)
  }

  /// Check credentials. Unknown and retired names are both not-found.
  pub async fn login(&self, name: &str, password: &str) -> Result<User> {
    let user = self
      .store
      .get_user_by_name(name)
      .await
      .err_into()?
      .ok_or_else(|| Error::NotFound(format!("user {name:?}")))?;

    let hasher = self.hasher.clone();
    let password = password.to_owned();
    let hash = user.password_hash.clone();
    let ok = tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
      .await
      .map_err(Error::internal)?;

    if !ok {
      warn!(name, "rejected login");
      return Err(Error::Unauthorized("incorrect username and/or password".into()));
    }
    info!(id = user.id, name, "logged in user");
    Ok(user)
  }

  pub async fn get_user(&self, id: i64) -> Result<User> {
    check_id("user", id)?;
    self
      .store
      .get_user_by_id(id)
      .await
      .err_into()?
      .ok_or_else(|| Error::NotFound(format!("user {id}")))
  }

  pub async fn list_users(&self) -> Result<Vec<User>> {
    self.store.list_users().await.err_into()
  }

  pub async fn update_user(&self, id: i64, patch: UserPatch) -> Result<()> {
    check_id("user", id)?;
    if let Some(name) = &patch.name {
      require_non_empty("name", name)?;
    }

    let password_hash = match patch.password {
      Some(pw) if !pw.is_empty() => Some(self.hash_password(pw).await?),
      _ => None,
    };
    let update = UserUpdate {
      name: patch.name,
      password_hash,
      inactive: patch.inactive,
      vetoes_remaining: patch.vetoes,
    };

    self.store.update_user(id, update).await.err_into()?;
    info!(id, "user updated");
    Ok(())
  }

  /// Retire a user. A second call on the same id reports not-found.
  pub async fn soft_delete_user(&self, id: i64) -> Result<()> {
    check_id("user", id)?;
    self.store.soft_delete_user(id).await.err_into()?;
    info!(id, "user deactivated");
    Ok(())
  }

  // ── Songs ─────────────────────────────────────────────────────────────────

  /// Add a song; its submitter becomes its first voter.
  pub async fn add_song(&self, song: NewSong) -> Result<i64> {
    require_non_empty("title", &song.title)?;
    require_non_empty("artist", &song.artist)?;
    check_id("user", song.added_by)?;
    self.active_user(song.added_by).await?;

    let (title, artist) = (song.title.clone(), song.artist.clone());
    let id = self.store.add_song(song).await.err_into()?;
    info!(id, %title, %artist, "new song created");
    Ok(id)
  }

  pub async fn get_song(&self, id: i64) -> Result<Song> {
    check_id("song", id)?;
    self.existing_song(id).await
  }

  pub async fn list_songs(&self) -> Result<Vec<Song>> {
    self.store.list_songs().await.err_into()
  }

  pub async fn update_song(&self, id: i64, update: SongUpdate) -> Result<()> {
    check_id("song", id)?;
    if let Some(title) = &update.title {
      require_non_empty("title", title)?;
    }
    if let Some(artist) = &update.artist {
      require_non_empty("artist", artist)?;
    }
    self.store.update_song(id, update).await.err_into()?;
    info!(id, "song updated");
    Ok(())
  }

  /// Hard-delete a song together with its votes and veto. A vetoer gets the
  /// spent veto back.
  pub async fn delete_song(&self, id: i64) -> Result<()> {
    check_id("song", id)?;
    self.store.delete_song(id).await.err_into()?;
    info!(id, "song deleted");
    Ok(())
  }

  // ── Votes ─────────────────────────────────────────────────────────────────

  pub async fn vote(&self, ballot: Ballot) -> Result<Vote> {
    let Ballot { song_id, user_id } = ballot;
    check_id("song", song_id)?;
    check_id("user", user_id)?;

    self.active_user(user_id).await.map_err(|e| match e {
      Error::Forbidden(_) => Error::Forbidden("user is inactive and cannot vote".into()),
      other => other,
    })?;
    self.existing_song(song_id).await?;
    if self.store.has_voted(song_id, user_id).await.err_into()? {
      return Err(Error::Conflict("user already voted for this song".into()));
    }

    let id = self.store.record_vote(song_id, user_id).await.err_into()?;
    info!(song_id, user_id, "vote recorded");
    Ok(Vote { id, song_id, user_id })
  }

  pub async fn list_votes_for_song(&self, song_id: i64) -> Result<Vec<Vote>> {
    check_id("song", song_id)?;
    self.existing_song(song_id).await?;
    self.store.list_votes_for_song(song_id).await.err_into()
  }

  // ── Vetoes ────────────────────────────────────────────────────────────────

  /// Veto a song, spending one of the user's vetoes. Cannot be undone.
  pub async fn veto(&self, ballot: Ballot) -> Result<Veto> {
    let Ballot { song_id, user_id } = ballot;
    check_id("song", song_id)?;
    check_id("user", user_id)?;

    let user = self.active_user(user_id).await.map_err(|e| match e {
      Error::Forbidden(_) => Error::Forbidden("user is inactive and cannot veto".into()),
      other => other,
    })?;
    let song = self.existing_song(song_id).await?;
    if song.vetoed {
      return Err(Error::Conflict("song has already been vetoed".into()));
    }
    if user.vetoes_remaining == 0 {
      return Err(Error::Forbidden("user has no vetoes remaining".into()));
    }

    let id = self.store.record_veto(song_id, user_id).await.err_into()?;
    info!(song_id, user_id, "song vetoed");
    Ok(Veto { id, song_id, user_id })
  }

  /// The user who vetoed `song_id`, even if they have since been retired.
  pub async fn get_vetoed_by(&self, song_id: i64) -> Result<User> {
    check_id("song", song_id)?;
    self.existing_song(song_id).await?;
    let veto = self
      .store
      .get_veto_for_song(song_id)
      .await
      .err_into()?
      .ok_or_else(|| Error::NotFound(format!("veto for song {song_id}")))?;
    self
      .store
      .find_user(veto.user_id)
      .await
      .err_into()?
      .ok_or_else(|| Error::NotFound(format!("user {}", veto.user_id)))
  }
}
