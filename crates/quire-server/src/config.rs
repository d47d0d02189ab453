//! Server configuration.
//!
//! An optional TOML file is layered under environment variables prefixed
//! `QUIRE_`, with `__` separating nested keys (e.g. `QUIRE_PORT`,
//! `QUIRE_BACKEND__API_KEY`).

use std::{
  fmt,
  path::{Path, PathBuf},
};

use anyhow::Context as _;
use serde::Deserialize;

/// Runtime server configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:            String,
  #[serde(default = "default_port")]
  pub port:            u16,
  pub store_path:      PathBuf,
  /// Trusted header carrying the authenticated user id.
  #[serde(default = "default_identity_header")]
  pub identity_header: String,
  pub backend:         BackendConfig,
}

/// An OpenAI-compatible chat completions endpoint.
#[derive(Deserialize, Clone)]
pub struct BackendConfig {
  #[serde(default = "default_endpoint")]
  pub endpoint:     String,
  #[serde(default)]
  pub api_key:      Option<String>,
  pub model:        String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl fmt::Debug for BackendConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("BackendConfig")
      .field("endpoint", &self.endpoint)
      .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
      .field("model", &self.model)
      .field("timeout_secs", &self.timeout_secs)
      .finish()
  }
}

fn default_host() -> String { "127.0.0.1".into() }

fn default_port() -> u16 { 3000 }

fn default_identity_header() -> String { quire_api::DEFAULT_IDENTITY_HEADER.into() }

fn default_endpoint() -> String { "https://api.openai.com/v1".into() }

fn default_timeout_secs() -> u64 { 120 }

/// Load configuration from `path` (which may be absent) and the environment.
pub fn load(path: &Path) -> anyhow::Result<ServerConfig> {
  from_file(config::File::from(path).required(false))
}

fn from_file<F>(file: F) -> anyhow::Result<ServerConfig>
where
  F: config::Source + Send + Sync + 'static,
{
  config::Config::builder()
    .add_source(file)
    .add_source(
      config::Environment::with_prefix("QUIRE")
        .prefix_separator("_")
        .separator("__"),
    )
    .build()
    .context("failed to read configuration")?
    .try_deserialize()
    .context("failed to deserialise ServerConfig")
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
