//! The data-stream wire codec.
//!
//! Every part is one line: a type code, a colon, a JSON payload, and `\n`.
//!
//! | Code | Part | Payload |
//! |------|------|---------|
//! | `0` | text | JSON string |
//! | `2` | data | JSON array, appended to the client data array |
//! | `3` | error | JSON string |
//! | `8` | message annotations | JSON array |
//! | `d` | finish message | JSON object |
//! | `e` | finish step | JSON object |
//! | `f` | start step | JSON object |
//!
//! Unknown codes decode to [`StreamPart::Unknown`] so newer producers do not
//! break older consumers.

use quire_core::event::StreamEvent;
use serde_json::Value;

use crate::{Error, Result};

/// Type code of the "append to data array" part.
pub const DATA_CODE: &str = "2";

/// One decoded line of the data stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamPart {
  Text(String),
  Data(Vec<Value>),
  Error(String),
  MessageAnnotations(Vec<Value>),
  FinishMessage(Value),
  FinishStep(Value),
  StartStep(Value),
  Unknown { code: String, value: Value },
}

impl StreamPart {
  pub fn code(&self) -> &str {
    match self {
      Self::Text(_) => "0",
      Self::Data(_) => DATA_CODE,
      Self::Error(_) => "3",
      Self::MessageAnnotations(_) => "8",
      Self::FinishMessage(_) => "d",
      Self::FinishStep(_) => "e",
      Self::StartStep(_) => "f",
      Self::Unknown { code, .. } => code,
    }
  }

  /// The stream events carried by a data part. Values that are not stream
  /// events (other producers share the data array) are skipped.
  pub fn events(&self) -> Vec<StreamEvent> {
    match self {
      Self::Data(values) => values
        .iter()
        .filter_map(|v| serde_json::from_value(v.clone()).ok())
        .collect(),
      _ => Vec::new(),
    }
  }
}

// ─── Encoding ────────────────────────────────────────────────────────────────

/// Encode one part as a complete line, including the trailing `\n`.
pub fn encode_part(part: &StreamPart) -> Result<String> {
  let payload = match part {
    StreamPart::Text(s) | StreamPart::Error(s) => serde_json::to_string(s)?,
    StreamPart::Data(values) | StreamPart::MessageAnnotations(values) => {
      serde_json::to_string(values)?
    }
    StreamPart::FinishMessage(v)
    | StreamPart::FinishStep(v)
    | StreamPart::StartStep(v)
    | StreamPart::Unknown { value: v, .. } => serde_json::to_string(v)?,
  };
  Ok(format!("{}:{payload}\n", part.code()))
}

/// `2:` followed by a single-element JSON array holding `value`, then `\n`.
pub fn encode_data_value(value: &Value) -> Result<String> {
  Ok(format!("{DATA_CODE}:{}\n", serde_json::to_string(&[value])?))
}

/// The exact data-array framing of a single event.
pub fn encode_data_frame(event: &StreamEvent) -> Result<String> {
  Ok(format!("{DATA_CODE}:{}\n", serde_json::to_string(&[event])?))
}

// ─── Decoding ────────────────────────────────────────────────────────────────

/// Decode a single line (with or without its trailing newline).
pub fn decode_part(line: &str) -> Result<StreamPart> {
  let line = line.strip_suffix('\n').unwrap_or(line);
  let line = line.strip_suffix('\r').unwrap_or(line);
  let (code, payload) = line
    .split_once(':')
    .filter(|(code, _)| !code.is_empty())
    .ok_or_else(|| Error::MalformedPart(line.to_owned()))?;

  let value: Value = serde_json::from_str(payload)?;
  let malformed = || Error::MalformedPart(line.to_owned());

  let part = match code {
    "0" => StreamPart::Text(into_string(value).ok_or_else(malformed)?),
    "2" => StreamPart::Data(into_array(value).ok_or_else(malformed)?),
    "3" => StreamPart::Error(into_string(value).ok_or_else(malformed)?),
    "8" => StreamPart::MessageAnnotations(into_array(value).ok_or_else(malformed)?),
    "d" => StreamPart::FinishMessage(value),
    "e" => StreamPart::FinishStep(value),
    "f" => StreamPart::StartStep(value),
    other => StreamPart::Unknown {
      code: other.to_owned(),
      value,
    },
  };
  Ok(part)
}

/// Decode a complete stream body. Blank lines are ignored.
pub fn decode_stream(body: &str) -> Result<Vec<StreamPart>> {
  body
    .lines()
    .filter(|l| !l.trim().is_empty())
    .map(decode_part)
    .collect()
}

fn into_string(value: Value) -> Option<String> {
  match value {
    Value::String(s) => Some(s),
    _ => None,
  }
}

fn into_array(value: Value) -> Option<Vec<Value>> {
  match value {
    Value::Array(a) => Some(a),
    _ => None,
  }
}

// ─── Incremental decoder ─────────────────────────────────────────────────────

/// Decodes parts from a byte stream that may split lines (and UTF-8
/// sequences) at arbitrary points.
#[derive(Debug, Default)]
pub struct FrameDecoder {
  buffer: Vec<u8>,
}

impl FrameDecoder {
  pub fn new() -> Self { Self::default() }

  /// Feed `bytes` and return every part completed by them.
  pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<StreamPart>> {
    self.buffer.extend_from_slice(bytes);
    let mut parts = Vec::new();
    while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
      let line: Vec<u8> = self.buffer.drain(..=pos).collect();
      let text = std::str::from_utf8(&line)?;
      if !text.trim().is_empty() {
        parts.push(decode_part(text)?);
      }
    }
    Ok(parts)
  }

  /// Decode whatever remains after the stream ended without a final newline.
  pub fn finish(mut self) -> Result<Option<StreamPart>> {
    let rest = std::mem::take(&mut self.buffer);
    let text = std::str::from_utf8(&rest)?;
    if text.trim().is_empty() {
      return Ok(None);
    }
    decode_part(text).map(Some)
  }
}

#[cfg(test)]
mod tests {
  use quire_core::artifact::ArtifactKind;
  use serde_json::json;
  use uuid::Uuid;

  use super::*;

  #[test]
  fn data_frame_is_byte_exact() {
    let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
    let frame = encode_data_frame(&StreamEvent::ArtifactEnd { id }).unwrap();
    assert_eq!(
      frame,
      "2:[{\"type\":\"artifact-end\",\"content\":{\"id\":\"550e8400-e29b-41d4-a716-446655440000\"}}]\n"
    );
    let value = serde_json::to_value(StreamEvent::ArtifactEnd { id }).unwrap();
    assert_eq!(encode_data_value(&value).unwrap(), frame);
  }

  #[test]
  fn decodes_each_known_code() {
    let body = "0:\"hi\"\n2:[{\"a\":1}]\n3:\"boom\"\n8:[]\nd:{\"finishReason\":\"stop\"}\n";
    let parts = decode_stream(body).unwrap();
    assert_eq!(parts, vec![
      StreamPart::Text("hi".into()),
      StreamPart::Data(vec![json!({ "a": 1 })]),
      StreamPart::Error("boom".into()),
      StreamPart::MessageAnnotations(vec![]),
      StreamPart::FinishMessage(json!({ "finishReason": "stop" })),
    ]);
  }

  #[test]
  fn unknown_codes_are_preserved() {
    let part = decode_part("9:{\"toolCallId\":\"x\"}").unwrap();
    assert_eq!(part, StreamPart::Unknown {
      code:  "9".into(),
      value: json!({ "toolCallId": "x" }),
    });
    assert_eq!(encode_part(&part).unwrap(), "9:{\"toolCallId\":\"x\"}\n");
  }

  #[test]
  fn rejects_missing_code_and_wrong_payload_shape() {
    assert!(matches!(decode_part("no colon here"), Err(Error::MalformedPart(_))));
    assert!(matches!(decode_part(":\"x\""), Err(Error::MalformedPart(_))));
    assert!(matches!(decode_part("2:{\"not\":\"array\"}"), Err(Error::MalformedPart(_))));
    assert!(matches!(decode_part("0:not json"), Err(Error::Json(_))));
  }

  #[test]
  fn data_part_yields_events_and_skips_foreign_values() {
    let event = StreamEvent::Kind(ArtifactKind::Code);
    let part = StreamPart::Data(vec![json!({ "foreign": true }), serde_json::to_value(&event).unwrap()]);
    assert_eq!(part.events(), vec![event]);
  }

  #[test]
  fn incremental_decoder_handles_split_lines_and_utf8() {
    let body = "0:\"héllo\"\n0:\"wörld\"\n0:\"tail\"";
    let bytes = body.as_bytes();
    let mut decoder = FrameDecoder::new();
    let mut parts = Vec::new();
    for chunk in bytes.chunks(3) {
      parts.extend(decoder.push(chunk).unwrap());
    }
    parts.extend(decoder.finish().unwrap());
    assert_eq!(parts, vec![
      StreamPart::Text("héllo".into()),
      StreamPart::Text("wörld".into()),
      StreamPart::Text("tail".into()),
    ]);
  }
}
