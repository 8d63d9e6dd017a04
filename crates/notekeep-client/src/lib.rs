//! Typed async client for the notekeep JSON API.

mod client;

pub use client::{ApiClient, ApiConfig, DEFAULT_TIMEOUT};

#[cfg(test)]
mod tests;
