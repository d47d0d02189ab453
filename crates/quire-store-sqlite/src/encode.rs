//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, UUIDs hyphenated lowercase strings and
//! enums their lowercase names.

use chrono::{DateTime, Utc};
use quire_core::artifact::{Artifact, ArtifactKind, ArtifactStatus, ArtifactVersion};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Enums ───────────────────────────────────────────────────────────────────

/// Rows written before kinds existed carry an empty kind; they are text.
pub fn decode_kind(s: &str) -> Result<ArtifactKind> {
  if s.trim().is_empty() {
    return Ok(ArtifactKind::default());
  }
  Ok(ArtifactKind::parse(s)?)
}

pub fn decode_status(s: &str) -> Result<ArtifactStatus> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown artifact status: {s:?}")))
}

// ─── Rows ────────────────────────────────────────────────────────────────────

/// Raw strings read directly from an `artifacts` row.
pub struct RawArtifact {
  pub artifact_id: String,
  pub owner_id:    String,
  pub title:       String,
  pub kind:        String,
  pub content:     String,
  pub status:      String,
  pub created_at:  String,
  pub updated_at:  String,
}

/// Column list matching [`RawArtifact::from_row`].
pub const ARTIFACT_COLUMNS: &str =
  "artifact_id, owner_id, title, kind, content, status, created_at, updated_at";

impl RawArtifact {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      artifact_id: row.get(0)?,
      owner_id:    row.get(1)?,
      title:       row.get(2)?,
      kind:        row.get(3)?,
      content:     row.get(4)?,
      status:      row.get(5)?,
      created_at:  row.get(6)?,
      updated_at:  row.get(7)?,
    })
  }

  pub fn into_artifact(self) -> Result<Artifact> {
    Ok(Artifact {
      id:         decode_uuid(&self.artifact_id)?,
      title:      self.title,
      kind:       decode_kind(&self.kind)?,
      content:    self.content,
      status:     decode_status(&self.status)?,
      owner_id:   self.owner_id,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values read directly from an `artifact_versions` row.
pub struct RawVersion {
  pub artifact_id:  String,
  pub version:      u32,
  pub content_hash: String,
  pub content:      String,
  pub recorded_at:  String,
}

impl RawVersion {
  pub fn into_version(self) -> Result<ArtifactVersion> {
    Ok(ArtifactVersion {
      artifact_id:  decode_uuid(&self.artifact_id)?,
      version:      self.version,
      content_hash: self.content_hash,
      content:      self.content,
      recorded_at:  decode_dt(&self.recorded_at)?,
    })
  }
}
