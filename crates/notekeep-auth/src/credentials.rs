//! [`CredentialStore`]: identity records plus secret verification.

use std::sync::Arc;

use notekeep_core::{
  Error, Result,
  store::UserStore,
  user::{NewUser, User, UserId},
};

use crate::hasher::{HasherConfig, HasherError, SecretHasher};

const MIN_NAME_CHARS: usize = 3;
const MIN_PASSWORD_CHARS: usize = 6;

pub struct CredentialStore<U> {
  users:      Arc<U>,
  hasher:     SecretHasher,
  /// Verified against when the email is unknown, so both login failure paths
  /// cost one argon2 verification.
  dummy_hash: Arc<str>,
}

impl<U> Clone for CredentialStore<U> {
  fn clone(&self) -> Self {
    Self {
      users:      Arc::clone(&self.users),
      hasher:     self.hasher.clone(),
      dummy_hash: Arc::clone(&self.dummy_hash),
    }
  }
}

impl<U: UserStore> CredentialStore<U> {
  pub fn new(users: Arc<U>, config: &HasherConfig) -> Result<Self, HasherError> {
    let hasher = SecretHasher::new(config)?;
    let dummy_hash = hasher.hash("notekeep-dummy-secret")?.into();
    Ok(Self { users, hasher, dummy_hash })
  }

  pub fn users(&self) -> &Arc<U> { &self.users }

  pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<User> {
    let name = validate_name(name)?;
    validate_email(email)?;
    validate_password(password)?;

    let password_hash = self.hasher.hash_blocking(password.to_owned()).await?;
    let inserted = self
      .users
      .insert_user(NewUser { name, email: email.to_owned(), password_hash })
      .await
      .map_err(Into::<Error>::into)?;

    match inserted {
      Some(user) => {
        tracing::info!(user_id = user.id, "registered user");
        Ok(user)
      }
      None => Err(Error::DuplicateEmail(email.to_owned())),
    }
  }

  pub async fn login(&self, email: &str, password: &str) -> Result<User> {
    let record = self.users.find_user_by_email(email).await.map_err(Into::<Error>::into)?;

    let (phc, user) = match record {
      Some(r) => (r.password_hash, Some(r.user)),
      None => (self.dummy_hash.to_string(), None),
    };
    let matched = self.hasher.verify_blocking(phc, password.to_owned()).await?;

    match user {
      Some(user) if matched => {
        tracing::debug!(user_id = user.id, "credentials verified");
        Ok(user)
      }
      _ => Err(Error::InvalidCredentials),
    }
  }

  pub async fn change_password(&self, user_id: UserId, new_password: &str) -> Result<()> {
    validate_password(new_password)?;
    let password_hash = self.hasher.hash_blocking(new_password.to_owned()).await?;

    let changed = self
      .users
      .set_password_hash(user_id, password_hash)
      .await
      .map_err(Into::<Error>::into)?;
    if !changed {
      return Err(Error::NotFound(format!("user {user_id}")));
    }
    tracing::info!(user_id, "password changed");
    Ok(())
  }

  /// Remove the user and every note they own.
  pub async fn delete_account(&self, user_id: UserId) -> Result<()> {
    let removed = self.users.delete_user(user_id).await.map_err(Into::<Error>::into)?;
    if !removed {
      return Err(Error::NotFound(format!("user {user_id}")));
    }
    Ok(())
  }
}

// ─── Input rules ─────────────────────────────────────────────────────────────

fn validate_name(name: &str) -> Result<String> {
  let trimmed = name.trim();
  if trimmed.chars().count() < MIN_NAME_CHARS {
    return Err(Error::validation(
      "name",
      format!("must be at least {MIN_NAME_CHARS} characters"),
    ));
  }
  Ok(trimmed.to_owned())
}

fn validate_password(password: &str) -> Result<()> {
  if password.chars().count() < MIN_PASSWORD_CHARS {
    return Err(Error::validation(
      "password",
      format!("must be at least {MIN_PASSWORD_CHARS} characters"),
    ));
  }
  Ok(())
}

/// `local@domain.tld`: one `@`, no whitespace, and a dotted domain whose
/// labels are all non-empty.
fn validate_email(email: &str) -> Result<()> {
  let invalid = || Error::validation("email", "must look like name@example.com");

  if email.chars().any(char::is_whitespace) {
    return Err(invalid());
  }
  let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
  if local.is_empty() || domain.contains('@') {
    return Err(invalid());
  }
  let labels: Vec<&str> = domain.split('.').collect();
  if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
    return Err(invalid());
  }
  Ok(())
}
