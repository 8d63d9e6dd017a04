//! The Credential Store: user registration, login verification, password
//! rotation and account deletion over any [`notekeep_core::store::UserStore`].
//!
//! Raw secrets only ever live on the stack of a single call. What reaches
//! storage is an argon2id PHC string with a fresh random salt.

pub mod credentials;
pub mod hasher;
pub mod token;

pub use credentials::CredentialStore;
pub use hasher::{HasherConfig, HasherError, SecretHasher};
pub use token::{generate_token, token_digest};
