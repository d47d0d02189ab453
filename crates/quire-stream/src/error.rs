//! Error type for `quire-stream`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("malformed stream part: {0:?}")]
  MalformedPart(String),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("stream is not valid UTF-8: {0}")]
  Utf8(#[from] std::str::Utf8Error),

  #[error("transport error: {0}")]
  Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

  /// The live write went through but the data-array append did not. The
  /// live write is not retracted.
  #[error("data-array append failed for event #{sequence}: {source}")]
  DataArrayAppend {
    sequence: u64,
    #[source]
    source:   Box<dyn std::error::Error + Send + Sync>,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
