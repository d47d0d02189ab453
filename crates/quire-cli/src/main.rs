//! `quire`: command-line client for the Quire artifact server.
//!
//! # Usage
//!
//! ```
//! quire --user alice create "Q3 Report" --kind text --prompt "Summarise revenue"
//! quire --user alice update <ID> --description "Make it shorter"
//! quire --config ~/.config/quire/cli.toml list
//! ```

mod client;
mod render;

use std::{
  io::{self, Write as _},
  path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use client::{ApiClient, ApiConfig};
use quire_core::{
  artifact::{ArtifactKind, ArtifactStatus},
  request::CreateArtifactRequest,
};
use render::Progress;
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

const DEFAULT_URL: &str = "http://localhost:3000";
const DEFAULT_IDENTITY_HEADER: &str = "x-quire-user";

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "quire", about = "Create and edit artifacts on a Quire server")]
struct Args {
  /// Path to a TOML config file (url, user, identity_header).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the quire server (default: http://localhost:3000).
  #[arg(long, env = "QUIRE_URL")]
  url: Option<String>,

  /// User id sent in the identity header.
  #[arg(long, env = "QUIRE_USER")]
  user: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Generate a new artifact, printing its content as it streams.
  Create {
    title:  String,
    #[arg(long, default_value = "text", value_parser = ArtifactKind::parse)]
    kind:   ArtifactKind,
    /// What to write; defaults to a prompt derived from the title.
    #[arg(long)]
    prompt: Option<String>,
  },
  /// Replace an artifact's content, or regenerate it from a description.
  Update {
    id:          Uuid,
    /// File holding the new content (`-` for stdin).
    #[arg(long, value_name = "FILE", conflicts_with = "description")]
    content:     Option<PathBuf>,
    #[arg(long, required_unless_present = "content")]
    description: Option<String>,
    /// Only save if the stored content still has this hash.
    #[arg(long, value_name = "HASH")]
    if_match:    Option<String>,
  },
  /// Print an artifact's content.
  Show {
    id: Uuid,
  },
  /// List your artifacts, most recently updated first.
  List {
    #[arg(long)]
    limit: Option<usize>,
  },
  /// List the committed versions of an artifact.
  History {
    id: Uuid,
  },
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:             String,
  #[serde(default)]
  user:            String,
  #[serde(default)]
  identity_header: String,
}

/// CLI flags override the config file, which overrides defaults.
fn resolve(url: Option<String>, user: Option<String>, file: ConfigFile) -> ApiConfig {
  let non_empty = |s: String| (!s.is_empty()).then_some(s);
  ApiConfig {
    base_url:        url
      .or_else(|| non_empty(file.url))
      .unwrap_or_else(|| DEFAULT_URL.to_string()),
    user:            user.or_else(|| non_empty(file.user)).unwrap_or_default(),
    identity_header: non_empty(file.identity_header)
      .unwrap_or_else(|| DEFAULT_IDENTITY_HEADER.to_string()),
  }
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .with_writer(io::stderr)
    .init();

  let args = Args::parse();

  // Load config file if provided.
  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  let api_config = resolve(args.url, args.user, file_cfg);
  tracing::debug!(url = %api_config.base_url, "using server");
  let client = ApiClient::new(api_config)?;

  match args.command {
    Command::Create { title, kind, prompt } => create(&client, title, kind, prompt).await,
    Command::Update {
      id,
      content,
      description,
      if_match,
    } => {
      let content = content.map(|path| read_content(&path)).transpose()?;
      let updated = client
        .update(id, content, description, if_match.as_deref())
        .await?;
      println!("updated {} ({})", updated.metadata.id, updated.metadata.title);
      if let Some(etag) = updated.etag {
        println!("hash {etag}");
      }
      Ok(())
    }
    Command::Show { id } => {
      let artifact = client.get(id).await?;
      eprintln!(
        "{} [{}] {}",
        artifact.title,
        artifact.kind,
        artifact.content_hash()
      );
      println!("{}", artifact.content);
      Ok(())
    }
    Command::List { limit } => {
      print!("{}", render::artifact_table(&client.list(limit).await?));
      Ok(())
    }
    Command::History { id } => {
      print!("{}", render::version_table(&client.versions(id).await?));
      Ok(())
    }
  }
}

async fn create(
  client: &ApiClient,
  title: String,
  kind: ArtifactKind,
  prompt: Option<String>,
) -> Result<()> {
  let request = CreateArtifactRequest { title, kind, prompt };
  request.validate()?;

  let mut progress = Progress::default();
  let mut stdout = io::stdout();
  let artifact = client
    .create(&request, |artifact| {
      let _ = stdout.write_all(progress.advance(&artifact.content).as_bytes());
      let _ = stdout.flush();
    })
    .await?;
  println!();

  match artifact.status {
    ArtifactStatus::Complete => {
      eprintln!("created {} ({})", artifact.id, artifact.title);
      Ok(())
    }
    ArtifactStatus::Error => bail!(
      "generation of {} failed: {}",
      artifact.id,
      artifact.error.as_deref().unwrap_or("unknown error")
    ),
    ArtifactStatus::Streaming => bail!("stream for {} ended before it settled", artifact.id),
  }
}

fn read_content(path: &Path) -> Result<String> {
  if path.as_os_str() == "-" {
    return io::read_to_string(io::stdin()).context("reading content from stdin");
  }
  std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn flags_override_file_which_overrides_defaults() {
    let file = || ConfigFile {
      url:             "http://file:1".into(),
      user:            "bob".into(),
      identity_header: String::new(),
    };

    let from_file = resolve(None, None, file());
    assert_eq!(from_file.base_url, "http://file:1");
    assert_eq!(from_file.user, "bob");
    assert_eq!(from_file.identity_header, DEFAULT_IDENTITY_HEADER);

    let from_flags = resolve(Some("http://flag:2".into()), Some("alice".into()), file());
    assert_eq!(from_flags.base_url, "http://flag:2");
    assert_eq!(from_flags.user, "alice");

    let defaults = resolve(None, None, ConfigFile::default());
    assert_eq!(defaults.base_url, DEFAULT_URL);
    assert!(defaults.user.is_empty());
  }

  #[test]
  fn config_file_parses_partial_toml() {
    let cfg: ConfigFile = toml::from_str("user = \"alice\"\nidentity_header = \"x-user\"").unwrap();
    assert_eq!(cfg.user, "alice");
    assert!(cfg.url.is_empty());
    assert_eq!(resolve(None, None, cfg).identity_header, "x-user");
  }

  #[test]
  fn update_needs_content_or_description() {
    let id = Uuid::nil().to_string();
    assert!(Args::try_parse_from(["quire", "update", &id]).is_err());
    assert!(
      Args::try_parse_from(["quire", "update", &id, "--content", "a.md", "--description", "x"])
        .is_err()
    );
    let args = Args::try_parse_from(["quire", "update", &id, "--description", "shorter"]).unwrap();
    assert!(matches!(args.command, Command::Update { description: Some(_), .. }));
  }

  #[test]
  fn create_rejects_unknown_kinds() {
    assert!(Args::try_parse_from(["quire", "create", "Notes", "--kind", "pdf"]).is_err());
    let args = Args::try_parse_from(["quire", "create", "Notes", "--kind", "code"]).unwrap();
    assert!(matches!(args.command, Command::Create {
      kind: ArtifactKind::Code,
      ..
    }));
  }
}
