//! quire-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) plus `QUIRE_*`
//! environment overrides, opens the SQLite store, and serves the artifact
//! API over HTTP.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use quire_server::{
  backend::HttpBackend,
  config::{self, expand_tilde},
};
use quire_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Quire artifact server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let server_cfg = config::load(&cli.config)?;
  tracing::debug!(?server_cfg, "configuration loaded");

  let store_path = expand_tilde(&server_cfg.store_path);
  if let Some(parent) = store_path.parent().filter(|p| !p.as_os_str().is_empty()) {
    tokio::fs::create_dir_all(parent)
      .await
      .with_context(|| format!("failed to create {parent:?}"))?;
  }
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let backend =
    HttpBackend::new(&server_cfg.backend).context("failed to build generation backend")?;
  tracing::info!(
    endpoint = %server_cfg.backend.endpoint,
    model = %server_cfg.backend.model,
    "generation backend configured"
  );

  let app = quire_server::app(Arc::new(store), Arc::new(backend), &server_cfg)?;
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}
