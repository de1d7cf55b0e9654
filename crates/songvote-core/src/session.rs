//! Server-side sessions keyed by an opaque token.
//!
//! [`SessionStore`] is raw storage for `(token, data, expiry)` rows; the data
//! is an opaque blob to the store. [`SessionManager`] layers a JSON key/value
//! map on top of it, generates tokens, and applies the session lifetime.

use std::{collections::BTreeMap, future::Future, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{Error, Result, error::ErrInto as _, user::User};

/// Default lifetime of a session, measured from its creation.
pub const DEFAULT_LIFETIME: Duration = Duration::from_secs(24 * 60 * 60);

pub const USER_ID_KEY: &str = "user_id";
pub const USERNAME_KEY: &str = "username";

/// One persisted session row.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
  pub token:  String,
  pub data:   Vec<u8>,
  pub expiry: DateTime<Utc>,
}

/// Storage for session rows.
pub trait SessionStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static + Into<crate::Error>;

  /// Load a session that has not yet expired at `now`.
  fn load_session<'a>(
    &'a self,
    token: &'a str,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<SessionRecord>, Self::Error>> + Send + 'a;

  /// Insert or replace the row for `record.token`.
  fn save_session(
    &self,
    record: SessionRecord,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Remove a session. Removing an unknown token is not an error.
  fn delete_session<'a>(
    &'a self,
    token: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Remove every session whose expiry is before `now`; returns the count.
  fn delete_expired_sessions(
    &self,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;
}

/// The identity a logged-in session carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
  pub user_id:  i64,
  pub username: String,
}

type SessionData = BTreeMap<String, serde_json::Value>;

/// Key/value session access on top of a [`SessionStore`].
pub struct SessionManager<S> {
  store:    Arc<S>,
  lifetime: Duration,
}

impl<S> Clone for SessionManager<S> {
  fn clone(&self) -> Self {
    Self { store: self.store.clone(), lifetime: self.lifetime }
  }
}

impl<S: SessionStore> SessionManager<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self { store, lifetime: DEFAULT_LIFETIME }
  }

  pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
    self.lifetime = lifetime;
    self
  }

  pub fn lifetime(&self) -> Duration { self.lifetime }

  /// 32 random bytes from the OS, hex-encoded.
  pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
  }

  async fn load(&self, token: &str) -> Result<Option<(SessionData, DateTime<Utc>)>> {
    let record = self
      .store
      .load_session(token, Utc::now())
      .await
      .err_into()?;
    match record {
      Some(r) => Ok(Some((serde_json::from_slice(&r.data)?, r.expiry))),
      None => Ok(None),
    }
  }

  /// Store `value` under `key`. A missing or expired session is started
  /// afresh with a full lifetime; an existing one keeps its expiry.
  pub async fn put(&self, token: &str, key: &str, value: impl Serialize) -> Result<()> {
    let value = serde_json::to_value(value)?;
    let (mut data, expiry) = match self.load(token).await? {
      Some(found) => found,
      None => (SessionData::new(), self.expiry_from(Utc::now())?),
    };
    data.insert(key.to_owned(), value);

    self
      .store
      .save_session(SessionRecord {
        token: token.to_owned(),
        data: serde_json::to_vec(&data)?,
        expiry,
      })
      .await
      .err_into()
  }

  pub async fn get<T: DeserializeOwned>(&self, token: &str, key: &str) -> Result<Option<T>> {
    let Some((mut data, _)) = self.load(token).await? else {
      return Ok(None);
    };
    data
      .remove(key)
      .map(serde_json::from_value)
      .transpose()
      .map_err(Error::from)
  }

  /// Drop the session entirely. Idempotent.
  pub async fn clear(&self, token: &str) -> Result<()> {
    self.store.delete_session(token).await.err_into()
  }

  pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64> {
    self.store.delete_expired_sessions(now).await.err_into()
  }

  /// Start a new session for `user` and return its token.
  pub async fn establish(&self, user: &User) -> Result<String> {
    let token = Self::generate_token();
    let mut data = SessionData::new();
    data.insert(USER_ID_KEY.to_owned(), user.id.into());
    data.insert(USERNAME_KEY.to_owned(), user.name.clone().into());

    self
      .store
      .save_session(SessionRecord {
        token:  token.clone(),
        data:   serde_json::to_vec(&data)?,
        expiry: self.expiry_from(Utc::now())?,
      })
      .await
      .err_into()?;
    Ok(token)
  }

  /// The user a live session belongs to, if any.
  pub async fn current_user(&self, token: &str) -> Result<Option<SessionUser>> {
    let Some((data, _)) = self.load(token).await? else {
      return Ok(None);
    };
    let user_id = data.get(USER_ID_KEY).and_then(serde_json::Value::as_i64);
    let username = data.get(USERNAME_KEY).and_then(serde_json::Value::as_str);
    Ok(match (user_id, username) {
      (Some(user_id), Some(username)) => Some(SessionUser { user_id, username: username.to_owned() }),
      _ => None,
    })
  }

  fn expiry_from(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let lifetime = chrono::Duration::from_std(self.lifetime).map_err(Error::internal)?;
    Ok(now + lifetime)
  }
}
