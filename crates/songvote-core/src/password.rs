//! Password hashing with argon2.
//!
//! Hashes are argon2id PHC strings (`$argon2id$v=19$…`), salted per call from
//! the OS RNG. Both operations are CPU-bound; async callers should run them
//! on a blocking thread.

use argon2::{
  Algorithm, Argon2, Params, PasswordHash, PasswordHasher as _, PasswordVerifier as _,
  Version, password_hash::SaltString,
};
use rand_core::OsRng;

use crate::{Error, Result};

/// Produces and checks password hashes.
#[derive(Debug, Clone, Default)]
pub struct Hasher {
  params: Params,
}

impl Hasher {
  /// Custom argon2 cost parameters (memory in KiB, iterations, lanes).
  pub fn with_params(m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self> {
    let params = Params::new(m_cost, t_cost, p_cost, None)
      .map_err(|e| Error::Internal(format!("argon2 params: {e}").into()))?;
    Ok(Self { params })
  }

  /// The cheapest parameters argon2 accepts. Only suitable for tests.
  pub fn fast() -> Self {
    Self { params: Params::new(Params::MIN_M_COST, 1, 1, None).unwrap_or_default() }
  }

  fn argon2(&self) -> Argon2<'static> {
    Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
  }

  pub fn hash(&self, password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    self
      .argon2()
      .hash_password(password.as_bytes(), &salt)
      .map(|h| h.to_string())
      .map_err(|e| Error::Internal(format!("argon2 error: {e}").into()))
  }

  /// Check `password` against a stored PHC string. A malformed hash never
  /// verifies.
  pub fn verify(&self, password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
      return false;
    };
    self.argon2().verify_password(password.as_bytes(), &parsed).is_ok()
  }
}
