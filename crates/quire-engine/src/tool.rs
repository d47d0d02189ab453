//! Normalisation of model tool calls into artifact commands.
//!
//! Models call `createDocument` / `updateDocument` with arguments that may
//! arrive as a JSON object, as a JSON string holding that object, or (from
//! some providers) as a string holding such a string. Everything is reduced
//! to a [`CreateArtifactRequest`] or [`UpdateArtifactRequest`] here, so the
//! coordinator sees one shape only.

use quire_core::request::{CreateArtifactRequest, UpdateArtifactRequest};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{Error, Result};

/// How many layers of string-encoding are unwrapped before giving up.
const MAX_ENCODING_DEPTH: usize = 3;

/// A tool invocation as reported by a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
  #[serde(alias = "toolName")]
  pub name:      String,
  #[serde(default, alias = "args")]
  pub arguments: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactCommand {
  Create(CreateArtifactRequest),
  Update(UpdateArtifactRequest),
}

fn invalid(message: impl Into<String>) -> Error {
  Error::Core(quire_core::Error::InvalidRequest(message.into()))
}

impl ToolCall {
  /// Resolve the call into a command, validating its arguments.
  pub fn normalize(&self) -> Result<ArtifactCommand> {
    let args = unwrap_arguments(self.arguments.clone())?;
    match self.name.as_str() {
      "createDocument" | "create_document" | "createArtifact" | "create_artifact" => {
        let title = string_arg(&args, &["title"]).ok_or_else(|| invalid("missing title"))?;
        let kind = string_arg(&args, &["kind"]).ok_or_else(|| invalid("missing kind"))?;
        let prompt = string_arg(&args, &["prompt", "contentPrompt", "content_prompt"]);
        Ok(ArtifactCommand::Create(CreateArtifactRequest::parse(
          title, &kind, prompt,
        )?))
      }
      "updateDocument" | "update_document" | "updateArtifact" | "update_artifact" => {
        let id = string_arg(&args, &["id", "documentId", "document_id"])
          .ok_or_else(|| invalid("missing id"))?;
        let id = Uuid::parse_str(id.trim()).map_err(|_| invalid(format!("invalid id: {id}")))?;
        let request = UpdateArtifactRequest {
          id,
          content: string_arg(&args, &["content"]),
          description: string_arg(&args, &["description"]).unwrap_or_default(),
          expected_hash: string_arg(&args, &["expectedHash", "expected_hash"]),
        };
        request.validate()?;
        Ok(ArtifactCommand::Update(request))
      }
      other => Err(invalid(format!("unknown tool: {other}"))),
    }
  }
}

fn unwrap_arguments(mut value: Value) -> Result<Map<String, Value>> {
  for _ in 0..=MAX_ENCODING_DEPTH {
    match value {
      Value::Object(map) => return Ok(map),
      Value::Null => return Ok(Map::new()),
      Value::String(s) => {
        value = serde_json::from_str(&s)
          .map_err(|e| invalid(format!("tool arguments are not JSON: {e}")))?;
      }
      _ => return Err(invalid("tool arguments must be an object")),
    }
  }
  Err(invalid("tool arguments are nested too deeply"))
}

fn string_arg(args: &Map<String, Value>, keys: &[&str]) -> Option<String> {
  keys
    .iter()
    .find_map(|key| args.get(*key))
    .and_then(Value::as_str)
    .map(str::to_owned)
}

#[cfg(test)]
mod tests {
  use quire_core::artifact::ArtifactKind;
  use serde_json::json;

  use super::*;

  fn call(name: &str, arguments: Value) -> ToolCall {
    ToolCall {
      name: name.into(),
      arguments,
    }
  }

  #[test]
  fn object_string_and_double_encoded_arguments_agree() {
    let object = json!({ "title": "Q3 Report", "kind": "text" });
    let once = Value::String(object.to_string());
    let twice = Value::String(once.to_string());

    let expected = call("createDocument", object.clone()).normalize().unwrap();
    assert_eq!(call("createDocument", once).normalize().unwrap(), expected);
    assert_eq!(call("create_document", twice).normalize().unwrap(), expected);
    assert_eq!(
      expected,
      ArtifactCommand::Create(CreateArtifactRequest {
        title:  "Q3 Report".into(),
        kind:   ArtifactKind::Text,
        prompt: None,
      })
    );
  }

  #[test]
  fn update_call_accepts_aliases() {
    let id = Uuid::new_v4();
    let command = call(
      "updateDocument",
      json!({ "documentId": id.to_string(), "description": "tighten the intro" }),
    )
    .normalize()
    .unwrap();
    let ArtifactCommand::Update(request) = command else {
      panic!("expected an update");
    };
    assert_eq!(request.id, id);
    assert_eq!(request.description, "tighten the intro");
    assert_eq!(request.content, None);
  }

  #[test]
  fn malformed_calls_are_validation_errors() {
    for bad in [
      call("createDocument", json!({ "title": "No kind" })),
      call("createDocument", json!({ "title": "x", "kind": "video" })),
      call("createDocument", json!("{not json")),
      call("createDocument", json!([1, 2])),
      call("updateDocument", json!({ "id": "nope", "description": "x" })),
      call("updateDocument", json!({ "id": Uuid::nil().to_string() })),
      call("deleteDocument", json!({})),
    ] {
      let err = bad.normalize().unwrap_err();
      assert!(err.is_rejection(), "{bad:?} gave {err}");
    }
  }

  #[test]
  fn deserialises_provider_field_names() {
    let call: ToolCall = serde_json::from_value(json!({
      "toolName": "createDocument",
      "args": { "title": "Plot", "kind": "image" },
    }))
    .unwrap();
    assert!(matches!(call.normalize().unwrap(), ArtifactCommand::Create(r) if r.kind == ArtifactKind::Image));
  }
}
