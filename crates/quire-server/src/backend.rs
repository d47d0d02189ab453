//! [`HttpBackend`]: generation over an OpenAI-compatible chat completions
//! endpoint, streamed as server-sent events.

use std::{collections::VecDeque, fmt, time::Duration};

use futures_util::{StreamExt as _, stream};
use quire_engine::{DeltaStream, GenerationBackend, GenerationRequest};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::BackendConfig;

#[derive(Debug, Error)]
pub enum BackendError {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("backend returned {status}: {message}")]
  Status { status: u16, message: String },

  /// An error object delivered inside the event stream.
  #[error("backend error: {0}")]
  Upstream(String),

  #[error("malformed event stream: {0}")]
  Malformed(String),
}

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
  model:    &'a str,
  stream:   bool,
  messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
  role:    &'a str,
  content: &'a str,
}

#[derive(Deserialize)]
struct ChatChunk {
  #[serde(default)]
  choices: Vec<ChunkChoice>,
  #[serde(default)]
  error:   Option<ErrorDetail>,
}

#[derive(Deserialize)]
struct ChunkChoice {
  #[serde(default)]
  delta: ChunkDelta,
}

#[derive(Deserialize, Default)]
struct ChunkDelta {
  content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
  error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
  message: String,
}

// ─── SSE decoding ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum SseEvent {
  Delta(String),
  Done,
}

/// Splits a chat-completions event stream into text deltas.
///
/// Only `data:` lines are interpreted. Comments, other fields and chunks
/// without content (role announcements, finish reasons) are skipped.
#[derive(Debug, Default)]
pub struct SseDecoder {
  buffer: Vec<u8>,
}

impl SseDecoder {
  pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<SseEvent>, BackendError> {
    self.buffer.extend_from_slice(bytes);
    let mut events = Vec::new();
    while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
      let line: Vec<u8> = self.buffer.drain(..=pos).collect();
      let line = std::str::from_utf8(&line).map_err(|e| BackendError::Malformed(e.to_string()))?;
      if let Some(event) = decode_line(line)? {
        events.push(event);
      }
    }
    Ok(events)
  }
}

fn decode_line(line: &str) -> Result<Option<SseEvent>, BackendError> {
  let line = line.trim_end_matches(['\n', '\r']);
  let Some(data) = line.strip_prefix("data:") else {
    return Ok(None);
  };
  let data = data.trim_start();
  if data == "[DONE]" {
    return Ok(Some(SseEvent::Done));
  }

  let chunk: ChatChunk =
    serde_json::from_str(data).map_err(|e| BackendError::Malformed(format!("{e}: {data}")))?;
  if let Some(error) = chunk.error {
    return Err(BackendError::Upstream(error.message));
  }
  let delta: String = chunk
    .choices
    .into_iter()
    .filter_map(|c| c.delta.content)
    .collect();
  Ok((!delta.is_empty()).then_some(SseEvent::Delta(delta)))
}

// ─── Backend ─────────────────────────────────────────────────────────────────

pub struct HttpBackend {
  client:   Client,
  endpoint: String,
  api_key:  Option<String>,
  model:    String,
}

impl fmt::Debug for HttpBackend {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("HttpBackend")
      .field("endpoint", &self.endpoint)
      .field("model", &self.model)
      .field("api_key", &"[REDACTED]")
      .finish()
  }
}

impl HttpBackend {
  pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
    let client = Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()?;
    Ok(Self {
      client,
      endpoint: config.endpoint.trim_end_matches('/').to_owned(),
      api_key: config.api_key.clone(),
      model: config.model.clone(),
    })
  }
}

impl GenerationBackend for HttpBackend {
  type Error = BackendError;

  async fn stream(
    &self,
    request: GenerationRequest,
  ) -> Result<DeltaStream<BackendError>, BackendError> {
    let body = ChatRequest {
      model:    &self.model,
      stream:   true,
      messages: [
        ChatMessage {
          role:    "system",
          content: &request.system,
        },
        ChatMessage {
          role:    "user",
          content: &request.prompt,
        },
      ],
    };

    let mut builder = self
      .client
      .post(format!("{}/chat/completions", self.endpoint))
      .json(&body);
    if let Some(key) = &self.api_key {
      builder = builder.bearer_auth(key);
    }
    let response = builder.send().await?;

    let status = response.status();
    if !status.is_success() {
      let text = response.text().await.unwrap_or_default();
      let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error.message)
        .unwrap_or(text);
      tracing::warn!(status = status.as_u16(), %message, "generation request refused");
      return Err(BackendError::Status {
        status: status.as_u16(),
        message,
      });
    }

    let state = SseState {
      response,
      decoder: SseDecoder::default(),
      pending: VecDeque::new(),
      done: false,
    };
    Ok(stream::unfold(state, next_delta).boxed())
  }
}

struct SseState {
  response: Response,
  decoder:  SseDecoder,
  pending:  VecDeque<String>,
  done:     bool,
}

async fn next_delta(mut state: SseState) -> Option<(Result<String, BackendError>, SseState)> {
  loop {
    if let Some(delta) = state.pending.pop_front() {
      return Some((Ok(delta), state));
    }
    if state.done {
      return None;
    }
    let decoded = match state.response.chunk().await {
      Ok(Some(bytes)) => state.decoder.push(&bytes),
      Ok(None) => {
        state.done = true;
        continue;
      }
      Err(e) => Err(e.into()),
    };
    match decoded {
      Ok(events) => {
        for event in events {
          match event {
            SseEvent::Delta(delta) => state.pending.push_back(delta),
            SseEvent::Done => state.done = true,
          }
        }
      }
      Err(e) => {
        state.done = true;
        state.pending.clear();
        return Some((Err(e), state));
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use axum::{Router, routing::post};
  use futures_util::StreamExt as _;
  use quire_core::artifact::ArtifactKind;
  use tokio::net::TcpListener;

  use super::*;

  #[test]
  fn decodes_deltas_across_chunk_boundaries() {
    let mut decoder = SseDecoder::default();
    let body = concat!(
      ": keep-alive\n\n",
      "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
      "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\r\n\r\n",
      "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
      "data: [DONE]\n\n",
    );
    let mut events = Vec::new();
    for piece in body.as_bytes().chunks(7) {
      events.extend(decoder.push(piece).unwrap());
    }
    assert_eq!(events, vec![
      SseEvent::Delta("Hel".into()),
      SseEvent::Delta("lo".into()),
      SseEvent::Done,
    ]);
  }

  #[test]
  fn error_object_in_stream_is_an_error() {
    let mut decoder = SseDecoder::default();
    let err = decoder
      .push(b"data: {\"error\":{\"message\":\"overloaded\"}}\n")
      .unwrap_err();
    assert!(matches!(err, BackendError::Upstream(m) if m == "overloaded"));
  }

  #[test]
  fn garbage_data_is_malformed() {
    let mut decoder = SseDecoder::default();
    assert!(matches!(decoder.push(b"data: {nope\n"), Err(BackendError::Malformed(_))));
  }

  async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{address}/v1")
  }

  fn backend(endpoint: String) -> HttpBackend {
    HttpBackend::new(&BackendConfig {
      endpoint,
      api_key: Some("sk-test".into()),
      model: "test-model".into(),
      timeout_secs: 5,
    })
    .unwrap()
  }

  #[tokio::test]
  async fn streams_deltas_from_a_live_endpoint() {
    let app = Router::new().route(
      "/v1/chat/completions",
      post(|body: String| async move {
        assert!(body.contains("\"stream\":true"));
        assert!(body.contains("Create a sheet artifact with the title: Budget"));
        concat!(
          "data: {\"choices\":[{\"delta\":{\"content\":\"a,b\\n\"}}]}\n\n",
          "data: {\"choices\":[{\"delta\":{\"content\":\"1,2\\n\"}}]}\n\n",
          "data: [DONE]\n\n",
        )
      }),
    );
    let backend = backend(serve(app).await);

    let request = GenerationRequest::create(ArtifactKind::Sheet, "Budget", None);
    let deltas: Vec<String> = backend
      .stream(request)
      .await
      .unwrap()
      .map(Result::unwrap)
      .collect()
      .await;
    assert_eq!(deltas, ["a,b\n", "1,2\n"]);
  }

  #[tokio::test]
  async fn refused_request_reports_status_and_message() {
    let app = Router::new().route(
      "/v1/chat/completions",
      post(|| async {
        (
          axum::http::StatusCode::UNAUTHORIZED,
          "{\"error\":{\"message\":\"bad key\"}}",
        )
      }),
    );
    let backend = backend(serve(app).await);

    let request = GenerationRequest::create(ArtifactKind::Text, "x", None);
    let err = match backend.stream(request).await {
      Ok(_) => panic!("expected the request to be refused"),
      Err(e) => e,
    };
    assert!(matches!(err, BackendError::Status { status: 401, message } if message == "bad key"));
  }
}
