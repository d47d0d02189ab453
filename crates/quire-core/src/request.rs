//! Normalized create and update requests.
//!
//! Whatever shape a request arrives in (HTTP body, tool-call arguments), it
//! is converted into one of these types before it reaches the coordinator.
//! Validation happens here, before any state is entered or event emitted.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, artifact::ArtifactKind};

/// A request to create and generate a new artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateArtifactRequest {
  pub title:  String,
  pub kind:   ArtifactKind,
  /// Optional content prompt; a prompt is synthesised from the title when
  /// absent.
  pub prompt: Option<String>,
}

impl CreateArtifactRequest {
  /// Build a request from loosely-typed parts, parsing the kind string.
  pub fn parse(
    title: impl Into<String>,
    kind: &str,
    prompt: Option<String>,
  ) -> Result<Self> {
    let request = Self {
      title: title.into(),
      kind: ArtifactKind::parse(kind)?,
      prompt,
    };
    request.validate()?;
    Ok(request)
  }

  pub fn validate(&self) -> Result<()> {
    if self.title.trim().is_empty() {
      return Err(Error::InvalidRequest("title must not be empty".into()));
    }
    Ok(())
  }

  /// The prompt, with blank prompts treated as absent.
  pub fn prompt(&self) -> Option<&str> {
    self.prompt.as_deref().map(str::trim).filter(|p| !p.is_empty())
  }
}

/// A request to update an existing artifact.
///
/// With `content`, the update is a direct replacement (an editor save).
/// Without it, the `description` drives a regeneration of the content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateArtifactRequest {
  pub id:            Uuid,
  pub content:       Option<String>,
  #[serde(default)]
  pub description:   String,
  /// Content hash the caller based its edit on. The update is refused if the
  /// stored content has moved on since.
  #[serde(default)]
  pub expected_hash: Option<String>,
}

impl UpdateArtifactRequest {
  pub fn validate(&self) -> Result<()> {
    match &self.content {
      Some(content) if content.is_empty() => Err(Error::InvalidRequest(
        "update content must not be empty".into(),
      )),
      Some(_) => Ok(()),
      None if self.description.trim().is_empty() => Err(Error::InvalidRequest(
        "an update needs either content or a description".into(),
      )),
      None => Ok(()),
    }
  }
}
