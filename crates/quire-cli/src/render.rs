//! Plain-text rendering of API results for the terminal.

use std::fmt::Write as _;

use quire_core::artifact::{Artifact, ArtifactVersion};

/// Tracks how much of a streaming artifact has been printed.
#[derive(Debug, Default)]
pub struct Progress {
  printed: String,
}

impl Progress {
  /// The part of `content` not yet printed. Content that no longer extends
  /// what was printed (a restarted session) is returned whole.
  pub fn advance<'a>(&mut self, content: &'a str) -> &'a str {
    let fresh = match content.strip_prefix(self.printed.as_str()) {
      Some(rest) => rest,
      None => content,
    };
    self.printed.clear();
    self.printed.push_str(content);
    fresh
  }
}

/// One line per artifact: id, kind, last update, title.
pub fn artifact_table(artifacts: &[Artifact]) -> String {
  let mut out = String::new();
  for a in artifacts {
    let _ = writeln!(
      out,
      "{}  {:<5}  {}  {}",
      a.id,
      a.kind.as_ref(),
      a.updated_at.format("%Y-%m-%d %H:%M"),
      a.title
    );
  }
  out
}

/// One line per version: number, timestamp, short hash, size.
pub fn version_table(versions: &[ArtifactVersion]) -> String {
  let mut out = String::new();
  for v in versions {
    let short = v.content_hash.get(..12).unwrap_or(&v.content_hash);
    let _ = writeln!(
      out,
      "v{:<3} {}  {}  {} bytes",
      v.version,
      v.recorded_at.format("%Y-%m-%d %H:%M:%S"),
      short,
      v.content.len()
    );
  }
  out
}
