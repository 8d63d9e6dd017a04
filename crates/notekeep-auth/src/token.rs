//! Opaque bearer tokens.

use notekeep_core::user::AccessToken;
use rand_core::{OsRng, RngCore as _};
use sha2::{Digest as _, Sha256};

/// 32 random bytes, hex encoded.
pub fn generate_token() -> AccessToken {
  let mut bytes = [0u8; 32];
  OsRng.fill_bytes(&mut bytes);
  AccessToken::new(hex::encode(bytes))
}

/// SHA-256 hex digest of a token; the only form a server persists.
pub fn token_digest(token: &AccessToken) -> String {
  hex::encode(Sha256::digest(token.as_str().as_bytes()))
}
