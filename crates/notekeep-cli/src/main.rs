//! `notekeep`: command-line front end for the notekeep note store.
//!
//! # Usage
//!
//! ```text
//! notekeep --email ana@example.com --password hunter22 register --name "Ana Lovelace"
//! notekeep add "Groceries" --body "eggs, milk"
//! notekeep --backend cached --url http://localhost:5000 list
//! notekeep --config ~/.config/notekeep/config.toml sync
//! ```
//!
//! Sessions live only as long as the process, so every command signs in
//! with the configured credentials first.

mod commands;
mod settings;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use notekeep_auth::HasherConfig;
use notekeep_client::{ApiClient, ApiConfig};
use notekeep_store_sqlite::SqliteStore;
use notekeep_sync::{Backend, BackendKind, Coordinator};
use settings::{ClientSettings, ConfigFile, Overrides};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "notekeep", version, about = "Local-first notes from the terminal")]
struct Args {
  /// Path to a TOML config file.
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Where notes live: local, remote or cached.
  #[arg(long, env = "NOTEKEEP_BACKEND")]
  backend: Option<BackendKind>,

  /// Base URL of the notekeep server (default: http://localhost:5000).
  #[arg(long, env = "NOTEKEEP_URL")]
  url: Option<String>,

  /// SQLite file for local and cached backends.
  #[arg(long, env = "NOTEKEEP_STORE")]
  store: Option<PathBuf>,

  #[arg(long, env = "NOTEKEEP_EMAIL")]
  email: Option<String>,

  /// Account password (plaintext).
  #[arg(long, env = "NOTEKEEP_PASSWORD", hide_env_values = true)]
  password: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Create an account and sign in.
  Register {
    #[arg(long)]
    name: String,
  },
  /// Check the credentials and show the signed-in user.
  Login,
  /// List notes, newest first.
  List,
  /// Print one note.
  Show { id: String },
  /// Create a note.
  Add {
    title: String,
    #[arg(long, default_value = "")]
    body:  String,
    /// Opaque image reference (URI or path).
    #[arg(long)]
    image: Option<String>,
  },
  /// Edit a note; omitted fields keep their current value.
  Edit {
    id:       String,
    #[arg(long)]
    title:    Option<String>,
    #[arg(long)]
    body:     Option<String>,
    #[arg(long, conflicts_with = "no_image")]
    image:    Option<String>,
    /// Drop the image reference.
    #[arg(long)]
    no_image: bool,
  },
  /// Delete a note.
  Rm { id: String },
  /// Push queued offline writes and pull the server's notes.
  Sync,
  /// Change the password of a local account.
  Passwd { new_password: String },
  /// Delete a local account and all of its notes.
  DeleteAccount,
}

pub type NoteCoordinator = Coordinator<SqliteStore, ApiClient>;

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();

  let file_cfg = match &args.config {
    Some(path) => ConfigFile::load(path)?,
    None => ConfigFile::default(),
  };
  let settings = ClientSettings::resolve(
    Overrides {
      backend:    args.backend,
      url:        args.url,
      store_path: args.store,
      email:      args.email,
      password:   args.password,
    },
    file_cfg,
  );
  tracing::debug!(backend = %settings.backend, url = %settings.url, "resolved settings");

  let coordinator = build(&settings).await?;
  commands::run(&coordinator, &settings, args.command).await
}

async fn build(settings: &ClientSettings) -> Result<NoteCoordinator> {
  let open_cache = || async {
    if let Some(dir) = settings.store_path.parent() {
      std::fs::create_dir_all(dir)
        .with_context(|| format!("creating {}", dir.display()))?;
    }
    let store = SqliteStore::open(&settings.store_path)
      .await
      .with_context(|| format!("opening store at {}", settings.store_path.display()))?;
    anyhow::Ok(Arc::new(store))
  };
  let remote = || {
    ApiClient::new(ApiConfig { base_url: settings.url.clone(), timeout: settings.timeout })
      .map(Arc::new)
      .context("building HTTP client")
  };

  let backend = match settings.backend {
    BackendKind::Local => Backend::LocalOnly(open_cache().await?),
    BackendKind::Remote => Backend::RemoteOnly(remote()?),
    BackendKind::Cached => Backend::Cached { cache: open_cache().await?, remote: remote()? },
  };

  Coordinator::new(backend, settings.auth.clone(), &HasherConfig::default())
    .context("setting up the session")
}
