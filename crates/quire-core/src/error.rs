//! Error types for `quire-core`.

use thiserror::Error;

use crate::artifact::ArtifactStatus;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown artifact kind: {0:?}")]
  UnknownKind(String),

  #[error("invalid request: {0}")]
  InvalidRequest(String),

  #[error("unauthorized: no user identity present")]
  Unauthorized,

  #[error("illegal status transition: {from} -> {to}")]
  IllegalTransition {
    from: ArtifactStatus,
    to:   ArtifactStatus,
  },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
