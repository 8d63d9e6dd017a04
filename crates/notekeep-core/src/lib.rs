//! Core types and trait definitions for the notekeep note store.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Storage backends, the remote client and the sync layer all depend on it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod merge;
pub mod note;
pub mod store;
pub mod user;
pub mod wire;

pub use error::{Error, ErrorOrigin, Result};
