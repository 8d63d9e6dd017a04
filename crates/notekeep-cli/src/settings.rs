//! Resolve [`ClientSettings`] from flags, environment and the TOML file.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::{Context, Result};
use notekeep_client::DEFAULT_TIMEOUT;
use notekeep_sync::{AuthMode, BackendKind};
use serde::Deserialize;

pub const DEFAULT_URL: &str = "http://localhost:5000";
pub const DEFAULT_STORE: &str = "~/.local/share/notekeep/notes.db";

/// Shape of the optional TOML config file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
  pub backend:      Option<BackendKind>,
  pub url:          Option<String>,
  pub store_path:   Option<PathBuf>,
  pub email:        Option<String>,
  pub password:     Option<String>,
  #[serde(default)]
  pub auth:         AuthMode,
  pub timeout_secs: Option<u64>,
}

impl ConfigFile {
  pub fn load(path: &Path) -> Result<Self> {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")
  }
}

/// Values given on the command line (or through their env fallbacks).
#[derive(Debug, Default)]
pub struct Overrides {
  pub backend:    Option<BackendKind>,
  pub url:        Option<String>,
  pub store_path: Option<PathBuf>,
  pub email:      Option<String>,
  pub password:   Option<String>,
}

#[derive(Debug, Clone)]
pub struct ClientSettings {
  pub backend:    BackendKind,
  pub url:        String,
  pub store_path: PathBuf,
  pub email:      Option<String>,
  pub password:   Option<String>,
  pub auth:       AuthMode,
  pub timeout:    Duration,
}

impl ClientSettings {
  /// Flags override the file, which overrides defaults.
  pub fn resolve(flags: Overrides, file: ConfigFile) -> Self {
    let store_path = flags
      .store_path
      .or(file.store_path)
      .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE));
    Self {
      backend: flags.backend.or(file.backend).unwrap_or_default(),
      url: flags.url.or(file.url).unwrap_or_else(|| DEFAULT_URL.to_owned()),
      store_path: expand_tilde(&store_path),
      email: flags.email.or(file.email),
      password: flags.password.or(file.password),
      auth: file.auth,
      timeout: file.timeout_secs.map(Duration::from_secs).unwrap_or(DEFAULT_TIMEOUT),
    }
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
