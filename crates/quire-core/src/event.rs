//! Stream events: the ordered, append-only notifications describing an
//! artifact generation session.
//!
//! The keyed `artifact-*` variants carry the artifact id so consumers can
//! accumulate interleaved sessions independently. The unkeyed variants belong
//! to the legacy chunk protocol, which addresses a single "current" artifact.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::artifact::ArtifactKind;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "kebab-case")]
pub enum StreamEvent {
  // ── Keyed lifecycle events ──────────────────────────────────────────────
  ArtifactStart {
    id:    Uuid,
    title: String,
    kind:  ArtifactKind,
  },
  ArtifactChunk {
    id:    Uuid,
    /// Zero-based position of this chunk within the session; lets consumers
    /// drop duplicate deliveries.
    index: u64,
    delta: String,
  },
  ArtifactEnd {
    id: Uuid,
  },
  ArtifactError {
    id:      Uuid,
    message: String,
  },

  // ── Legacy chunk protocol ───────────────────────────────────────────────
  Id(Uuid),
  Title(String),
  Kind(ArtifactKind),
  Clear,
  TextDelta(String),
  Finish,
}

impl StreamEvent {
  /// The artifact this event is keyed by, if it is a keyed variant.
  pub fn artifact_id(&self) -> Option<Uuid> {
    match self {
      Self::ArtifactStart { id, .. }
      | Self::ArtifactChunk { id, .. }
      | Self::ArtifactEnd { id }
      | Self::ArtifactError { id, .. } => Some(*id),
      Self::Id(id) => Some(*id),
      Self::Title(_) | Self::Kind(_) | Self::Clear | Self::TextDelta(_) | Self::Finish => None,
    }
  }

  /// Whether this event belongs to the unkeyed legacy protocol.
  pub fn is_legacy(&self) -> bool {
    matches!(
      self,
      Self::Id(_) | Self::Title(_) | Self::Kind(_) | Self::Clear | Self::TextDelta(_) | Self::Finish
    )
  }

  /// The wire name of the variant, e.g. `"artifact-chunk"`.
  pub fn type_name(&self) -> &'static str {
    match self {
      Self::ArtifactStart { .. } => "artifact-start",
      Self::ArtifactChunk { .. } => "artifact-chunk",
      Self::ArtifactEnd { .. } => "artifact-end",
      Self::ArtifactError { .. } => "artifact-error",
      Self::Id(_) => "id",
      Self::Title(_) => "title",
      Self::Kind(_) => "kind",
      Self::Clear => "clear",
      Self::TextDelta(_) => "text-delta",
      Self::Finish => "finish",
    }
  }

  pub fn is_terminal(&self) -> bool {
    matches!(
      self,
      Self::ArtifactEnd { .. } | Self::ArtifactError { .. } | Self::Finish
    )
  }
}
