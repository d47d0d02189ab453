//! Error types for `quire-engine`.

use quire_core::diff::UnsafeUpdate;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  /// Validation and authorization failures from the core types.
  #[error(transparent)]
  Core(#[from] quire_core::Error),

  #[error("artifact not found: {0}")]
  NotFound(Uuid),

  /// The stored content no longer matches the hash the update was based on.
  #[error("artifact {0} was modified concurrently")]
  Conflict(Uuid),

  #[error("update rejected: {0}")]
  Rejected(#[from] UnsafeUpdate),

  #[error("generation failed: {0}")]
  Generation(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("generation produced no content")]
  EmptyOutput,

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Whether the failure was detected before any state changed, i.e. the
  /// caller can fix the request and retry.
  pub fn is_rejection(&self) -> bool {
    matches!(
      self,
      Self::Core(_) | Self::NotFound(_) | Self::Conflict(_) | Self::Rejected(_)
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
