//! HTTP API for Quire.
//!
//! Exposes an axum [`Router`] over an [`ArtifactCoordinator`]. Authentication
//! and TLS are the caller's responsibility; the authenticated user id is read
//! from a trusted request header.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", quire_api::api_router(ApiState::new(coordinator)))
//! ```

pub mod artifacts;
pub mod caller;
pub mod error;
pub mod stream;
pub mod tool_calls;

use axum::{
  Router,
  http::HeaderName,
  routing::{get, post},
};
use quire_core::store::DocumentStore;
use quire_engine::{ArtifactCoordinator, GenerationBackend};
use tower_http::trace::TraceLayer;

pub use error::ApiError;

/// Header carrying the authenticated user id, unless configured otherwise.
pub const DEFAULT_IDENTITY_HEADER: &str = "x-quire-user";

/// Shared state threaded through all handlers.
pub struct ApiState<S, B> {
  pub coordinator:     ArtifactCoordinator<S, B>,
  pub identity_header: HeaderName,
}

impl<S, B> ApiState<S, B> {
  pub fn new(coordinator: ArtifactCoordinator<S, B>) -> Self {
    Self {
      coordinator,
      identity_header: HeaderName::from_static(DEFAULT_IDENTITY_HEADER),
    }
  }

  pub fn with_identity_header(mut self, header: HeaderName) -> Self {
    self.identity_header = header;
    self
  }
}

impl<S, B> Clone for ApiState<S, B> {
  fn clone(&self) -> Self {
    Self {
      coordinator:     self.coordinator.clone(),
      identity_header: self.identity_header.clone(),
    }
  }
}

/// Build a fully-materialised API router.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, B>(state: ApiState<S, B>) -> Router<()>
where
  S: DocumentStore + 'static,
  B: GenerationBackend + 'static,
{
  Router::new()
    .route(
      "/artifacts",
      get(artifacts::list::<S, B>).post(artifacts::create::<S, B>),
    )
    .route(
      "/artifacts/{id}",
      get(artifacts::get_one::<S, B>).put(artifacts::update::<S, B>),
    )
    .route("/artifacts/{id}/versions", get(artifacts::versions::<S, B>))
    .route("/tool-calls", post(tool_calls::handler::<S, B>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
