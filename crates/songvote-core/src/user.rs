//! A user is a member of the group who submits, votes on and vetoes songs.
//!
//! Users are never removed. Retiring a user flips `inactive`, which hides them
//! from listings and lookups while keeping the votes and vetoes they authored.

use serde::{Deserialize, Serialize};

/// A registered user as stored.
///
/// The password hash is accepted under the `password` key when deserialising
/// but is never serialised back out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub id:               i64,
  pub name:             String,
  #[serde(rename = "password", skip_serializing, default)]
  pub password_hash:    String,
  #[serde(default)]
  pub inactive:         bool,
  #[serde(rename = "vetoes")]
  pub vetoes_remaining: u32,
}

impl User {
  pub fn is_active(&self) -> bool { !self.inactive }
}

/// Registration request body: `{"name":"...","password":"..."}`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
  pub name:     String,
  pub password: String,
}

/// Partial update accepted by `PUT /users/{id}`.
///
/// Absent fields are left untouched. An empty `password` also keeps the
/// existing hash.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPatch {
  pub name:     Option<String>,
  pub password: Option<String>,
  pub inactive: Option<bool>,
  pub vetoes:   Option<u32>,
}

// ─── Store inputs ─────────────────────────────────────────────────────────────

/// A user row ready for insertion; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUserRecord {
  pub name:             String,
  pub password_hash:    String,
  pub vetoes_remaining: u32,
}

/// Column-level changes applied by [`VoteStore::update_user`](crate::store::VoteStore::update_user).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
  pub name:             Option<String>,
  pub password_hash:    Option<String>,
  pub inactive:         Option<bool>,
  pub vetoes_remaining: Option<u32>,
}
