//! The caller identity supplied by the session collaborator.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// An opaque user identifier, or its absence.
///
/// Any operation that touches persistence requires an identifier; its
/// absence is an authorization failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
  pub user_id: Option<String>,
}

impl Identity {
  pub fn user(user_id: impl Into<String>) -> Self {
    Self {
      user_id: Some(user_id.into()),
    }
  }

  pub fn anonymous() -> Self { Self::default() }

  /// The owner id to stamp on (or check against) persisted artifacts.
  pub fn owner(&self) -> Result<&str> {
    match self.user_id.as_deref().map(str::trim) {
      Some(id) if !id.is_empty() => Ok(id),
      _ => Err(Error::Unauthorized),
    }
  }
}
