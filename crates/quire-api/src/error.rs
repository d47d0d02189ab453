//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  extract::rejection::JsonRejection,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("unauthorized: {0}")]
  Unauthorized(String),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// The `If-Match` hash no longer matches the stored content.
  #[error("precondition failed: {0}")]
  PreconditionFailed(String),

  /// Refused by the update-safety gate.
  #[error("update rejected: {0}")]
  Rejected(String),

  /// The generation backend failed or produced nothing.
  #[error("generation failed: {0}")]
  Upstream(String),

  #[error("internal error: {0}")]
  Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<quire_engine::Error> for ApiError {
  fn from(e: quire_engine::Error) -> Self {
    use quire_engine::Error as E;
    match e {
      E::Core(quire_core::Error::Unauthorized) => {
        Self::Unauthorized("no user identity present".into())
      }
      E::Core(inner) => Self::BadRequest(inner.to_string()),
      E::NotFound(id) => Self::NotFound(format!("artifact {id} not found")),
      E::Conflict(id) => {
        Self::PreconditionFailed(format!("artifact {id} was modified concurrently"))
      }
      E::Rejected(reason) => Self::Rejected(reason.to_string()),
      E::Generation(_) | E::EmptyOutput => Self::Upstream(e.to_string()),
      other => Self::Internal(Box::new(other)),
    }
  }
}

/// Unreadable request bodies are validation failures like any other.
impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self { Self::BadRequest(rejection.body_text()) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m.clone()),
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::PreconditionFailed(m) => (StatusCode::PRECONDITION_FAILED, m.clone()),
      ApiError::Rejected(m) => (StatusCode::UNPROCESSABLE_ENTITY, m.clone()),
      ApiError::Upstream(m) => (StatusCode::BAD_GATEWAY, m.clone()),
      ApiError::Internal(e) => {
        tracing::error!(error = %e, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
