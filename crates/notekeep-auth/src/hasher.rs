//! argon2id password hashing with configurable cost parameters.

use argon2::{
  Algorithm, Argon2, Params, PasswordHash, PasswordHasher as _, PasswordVerifier as _, Version,
  password_hash::{self, SaltString},
};
use rand_core::OsRng;
use serde::Deserialize;
use thiserror::Error;

/// Argon2 cost parameters. Defaults are the argon2 crate's own defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HasherConfig {
  pub memory_kib:  u32,
  pub iterations:  u32,
  pub parallelism: u32,
}

impl Default for HasherConfig {
  fn default() -> Self {
    Self {
      memory_kib:  Params::DEFAULT_M_COST,
      iterations:  Params::DEFAULT_T_COST,
      parallelism: Params::DEFAULT_P_COST,
    }
  }
}

#[derive(Debug, Error)]
pub enum HasherError {
  #[error("invalid argon2 parameters: {0}")]
  Params(String),

  #[error("failed to hash password: {0}")]
  Hash(String),

  #[error("hashing task failed: {0}")]
  Task(String),
}

impl From<HasherError> for notekeep_core::Error {
  fn from(e: HasherError) -> Self { notekeep_core::Error::Internal(e.to_string()) }
}

/// Hashes and verifies secrets. Cloning shares nothing mutable.
#[derive(Clone)]
pub struct SecretHasher {
  argon2: Argon2<'static>,
}

impl SecretHasher {
  pub fn new(config: &HasherConfig) -> Result<Self, HasherError> {
    let params = Params::new(config.memory_kib, config.iterations, config.parallelism, None)
      .map_err(|e| HasherError::Params(e.to_string()))?;
    Ok(Self {
      argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
    })
  }

  /// PHC string for `secret` under a fresh random salt.
  pub fn hash(&self, secret: &str) -> Result<String, HasherError> {
    let salt = SaltString::generate(&mut OsRng);
    self
      .argon2
      .hash_password(secret.as_bytes(), &salt)
      .map(|h| h.to_string())
      .map_err(|e| HasherError::Hash(e.to_string()))
  }

  /// Constant-time check of `secret` against `phc`. A stored value that is
  /// not a PHC string (such as the mirror marker) never matches.
  pub fn verify(&self, phc: &str, secret: &str) -> Result<bool, HasherError> {
    let Ok(parsed) = PasswordHash::new(phc) else {
      return Ok(false);
    };
    match self.argon2.verify_password(secret.as_bytes(), &parsed) {
      Ok(()) => Ok(true),
      Err(password_hash::Error::Password) => Ok(false),
      Err(e) => Err(HasherError::Hash(e.to_string())),
    }
  }

  /// [`Self::hash`] on the blocking pool.
  pub async fn hash_blocking(&self, secret: String) -> Result<String, HasherError> {
    let hasher = self.clone();
    tokio::task::spawn_blocking(move || hasher.hash(&secret))
      .await
      .map_err(|e| HasherError::Task(e.to_string()))?
  }

  /// [`Self::verify`] on the blocking pool.
  pub async fn verify_blocking(&self, phc: String, secret: String) -> Result<bool, HasherError> {
    let hasher = self.clone();
    tokio::task::spawn_blocking(move || hasher.verify(&phc, &secret))
      .await
      .map_err(|e| HasherError::Task(e.to_string()))?
  }
}
