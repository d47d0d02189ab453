//! Quire server: wires configuration, the SQLite store and the generation
//! backend into the HTTP API.

pub mod backend;
pub mod config;

use std::sync::Arc;

use anyhow::Context as _;
use axum::{Router, http::HeaderName};
use quire_api::{ApiState, api_router};
use quire_core::store::DocumentStore;
use quire_engine::{ArtifactCoordinator, GenerationBackend};

use config::ServerConfig;

/// Build the application router, with the API mounted under `/api`.
pub fn app<S, B>(store: Arc<S>, backend: Arc<B>, cfg: &ServerConfig) -> anyhow::Result<Router>
where
  S: DocumentStore + 'static,
  B: GenerationBackend + 'static,
{
  let identity_header = HeaderName::from_bytes(cfg.identity_header.as_bytes())
    .with_context(|| format!("invalid identity header {:?}", cfg.identity_header))?;
  let state = ApiState::new(ArtifactCoordinator::new(store, backend))
    .with_identity_header(identity_header);
  Ok(Router::new().nest("/api", api_router(state)))
}
