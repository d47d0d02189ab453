//! Artifact: a document created or edited live during a chat session.
//!
//! An artifact's `id`, `kind`, `owner_id` and `created_at` are fixed once the
//! record exists. Only `title` and `content` change, and every committed
//! content is also kept as an append-only [`ArtifactVersion`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Kind ────────────────────────────────────────────────────────────────────

/// The closed set of artifact kinds. Each kind has exactly one generation
/// mode; adding a kind is an exhaustive-match change everywhere it is used.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ArtifactKind {
  /// Records persisted before kinds existed decode as `Text`.
  #[default]
  Text,
  Code,
  Image,
  Sheet,
}

impl ArtifactKind {
  /// Parse a kind string, mapping anything outside the enumerated set to a
  /// validation error.
  pub fn parse(s: &str) -> Result<Self> {
    s.trim()
      .parse()
      .map_err(|_| Error::UnknownKind(s.to_owned()))
  }
}

// ─── Status ──────────────────────────────────────────────────────────────────

/// Lifecycle status of a generation session.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ArtifactStatus {
  Streaming,
  Complete,
  Error,
}

impl ArtifactStatus {
  pub fn is_terminal(self) -> bool { !matches!(self, Self::Streaming) }

  /// Move to `next`, rejecting anything other than `streaming → complete`
  /// and `streaming → error`.
  pub fn transition(self, next: ArtifactStatus) -> Result<ArtifactStatus> {
    match (self, next) {
      (Self::Streaming, Self::Complete) | (Self::Streaming, Self::Error) => Ok(next),
      (from, to) => Err(Error::IllegalTransition { from, to }),
    }
  }
}

// ─── Artifact ────────────────────────────────────────────────────────────────

/// A persisted artifact record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
  pub id:         Uuid,
  pub title:      String,
  #[serde(default)]
  pub kind:       ArtifactKind,
  pub content:    String,
  pub status:     ArtifactStatus,
  /// Set at creation from the caller's identity; never changed.
  pub owner_id:   String,
  /// Timestamp of first persistence.
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Artifact {
  /// Hex SHA-256 of the current content; used for `ETag`s and optimistic
  /// update checks.
  pub fn content_hash(&self) -> String { content_hash(&self.content) }

  pub fn metadata(&self, status: AckStatus) -> ArtifactMetadata {
    ArtifactMetadata {
      id: self.id,
      title: self.title.clone(),
      kind: self.kind,
      status,
    }
  }
}

/// Hex-encoded SHA-256 digest of `content`.
pub fn content_hash(content: &str) -> String {
  hex::encode(Sha256::digest(content.as_bytes()))
}

/// One committed revision of an artifact's content. Versions are append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactVersion {
  pub artifact_id:  Uuid,
  /// 1-based, increasing per artifact.
  pub version:      u32,
  pub content_hash: String,
  pub content:      String,
  pub recorded_at:  DateTime<Utc>,
}

// ─── Metadata ────────────────────────────────────────────────────────────────

/// Acknowledgement status returned by create and update operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
  /// Creation accepted; content arrives through stream events.
  Streaming,
  /// Update accepted and committed.
  Updated,
}

/// What `create_artifact` and `update_artifact` hand back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
  pub id:     Uuid,
  pub title:  String,
  pub kind:   ArtifactKind,
  pub status: AckStatus,
}
