//! Content generation: turns a request into a stream of text deltas.
//!
//! The model itself sits behind [`GenerationBackend`]. This module owns the
//! kind-to-mode mapping and the prompts; it never persists anything.

use std::{future::Future, sync::Arc};

use futures_util::{StreamExt as _, stream::BoxStream};
use quire_core::artifact::ArtifactKind;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A stream of generated text fragments.
pub type DeltaStream<E> = BoxStream<'static, Result<String, E>>;

/// A source of streamed model output.
pub trait GenerationBackend: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Start generating for `request`. Failures to start are returned
  /// directly; failures mid-generation arrive as stream items.
  fn stream(
    &self,
    request: GenerationRequest,
  ) -> impl Future<Output = Result<DeltaStream<Self::Error>, Self::Error>> + Send + '_;
}

// ─── Mode ────────────────────────────────────────────────────────────────────

/// How content of a given kind is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GenerationMode {
  /// Free prose, Markdown allowed.
  Document,
  /// A single self-contained code snippet.
  Code,
  /// CSV with a header row.
  Sheet,
  /// A textual description of an image; no binary output.
  ImageDescription,
}

impl From<ArtifactKind> for GenerationMode {
  fn from(kind: ArtifactKind) -> Self {
    match kind {
      ArtifactKind::Text => Self::Document,
      ArtifactKind::Code => Self::Code,
      ArtifactKind::Sheet => Self::Sheet,
      ArtifactKind::Image => Self::ImageDescription,
    }
  }
}

impl GenerationMode {
  pub fn system_prompt(self) -> &'static str {
    match self {
      Self::Document => {
        "Write about the given topic. Markdown is supported. Use headings wherever appropriate."
      }
      Self::Code => {
        "You are a code generator that creates self-contained, executable code snippets. \
         Each snippet should be complete and runnable on its own, include helpful comments, \
         stay concise, and avoid external dependencies, network access and user input. \
         Reply with the code only, without surrounding prose or fences."
      }
      Self::Sheet => {
        "You are a spreadsheet creation assistant. Create a spreadsheet in CSV format based on \
         the given prompt. The spreadsheet should contain meaningful column headers and data. \
         Reply with the CSV only."
      }
      Self::ImageDescription => {
        "Describe the requested image in vivid, concrete detail: subject, composition, colours \
         and lighting. Reply with the description only."
      }
    }
  }

  /// The system prompt for revising existing `content`.
  pub fn revision_prompt(self, content: &str) -> String {
    let subject = match self {
      Self::Document => "contents of the document",
      Self::Code => "code snippet",
      Self::Sheet => "spreadsheet",
      Self::ImageDescription => "image description",
    };
    format!("Improve the following {subject} based on the given prompt.\n\n{content}")
  }
}

// ─── Request ─────────────────────────────────────────────────────────────────

/// Everything a backend needs for one generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
  pub mode:   GenerationMode,
  pub system: String,
  pub prompt: String,
}

impl GenerationRequest {
  /// A request for new content. Without an explicit prompt one is
  /// synthesised from the kind and title.
  pub fn create(kind: ArtifactKind, title: &str, prompt: Option<&str>) -> Self {
    let mode = GenerationMode::from(kind);
    let prompt = match prompt {
      Some(prompt) => prompt.to_owned(),
      None => format!("Create a {kind} artifact with the title: {title}"),
    };
    Self {
      mode,
      system: mode.system_prompt().to_owned(),
      prompt,
    }
  }

  /// A request to rewrite `current` according to `description`.
  pub fn revise(kind: ArtifactKind, current: &str, description: &str) -> Self {
    let mode = GenerationMode::from(kind);
    Self {
      mode,
      system: mode.revision_prompt(current),
      prompt: description.to_owned(),
    }
  }
}

// ─── Generator ───────────────────────────────────────────────────────────────

/// Runs requests against a backend, normalising its errors.
pub struct ArtifactGenerator<B> {
  backend: Arc<B>,
}

impl<B> Clone for ArtifactGenerator<B> {
  fn clone(&self) -> Self {
    Self {
      backend: self.backend.clone(),
    }
  }
}

impl<B: GenerationBackend> ArtifactGenerator<B> {
  pub fn new(backend: Arc<B>) -> Self { Self { backend } }

  pub async fn generate(
    &self,
    request: GenerationRequest,
  ) -> Result<BoxStream<'static, Result<String>>> {
    tracing::debug!(mode = ?request.mode, "starting generation");
    let stream = self
      .backend
      .stream(request)
      .await
      .map_err(|e| Error::Generation(Box::new(e)))?;
    Ok(
      stream
        .map(|delta| delta.map_err(|e| Error::Generation(Box::new(e))))
        .boxed(),
    )
  }
}

#[cfg(test)]
mod tests {
  use strum::IntoEnumIterator as _;

  use super::*;

  #[test]
  fn missing_prompt_is_synthesised_from_kind_and_title() {
    let request = GenerationRequest::create(ArtifactKind::Text, "Q3 Report", None);
    assert_eq!(request.prompt, "Create a text artifact with the title: Q3 Report");
    assert_eq!(request.mode, GenerationMode::Document);

    let request = GenerationRequest::create(ArtifactKind::Sheet, "Budget", Some("monthly"));
    assert_eq!(request.prompt, "monthly");
    assert_eq!(request.system, GenerationMode::Sheet.system_prompt());
  }

  #[test]
  fn every_kind_has_its_own_mode() {
    let modes: Vec<GenerationMode> = ArtifactKind::iter().map(GenerationMode::from).collect();
    for (i, a) in modes.iter().enumerate() {
      for b in &modes[i + 1..] {
        assert_ne!(a, b);
      }
    }
    assert_eq!(
      GenerationMode::from(ArtifactKind::Image),
      GenerationMode::ImageDescription
    );
  }

  #[test]
  fn revision_carries_current_content_in_the_system_prompt() {
    let request = GenerationRequest::revise(ArtifactKind::Code, "fn main() {}", "add logging");
    assert_eq!(request.prompt, "add logging");
    assert!(request.system.starts_with("Improve the following code snippet"));
    assert!(request.system.ends_with("fn main() {}"));
  }
}
