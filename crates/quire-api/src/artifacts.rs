//! Handlers for `/artifacts` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/artifacts` | Caller's artifacts, newest first; optional `?limit=N` |
//! | `POST` | `/artifacts` | Body: `{"title":"…","kind":"text","prompt":"…"}`; streams events |
//! | `GET`  | `/artifacts/{id}` | `ETag` is the content hash; 404 if not found |
//! | `PUT`  | `/artifacts/{id}` | Body: `{"content":"…"}` or `{"description":"…"}`; honours `If-Match` |
//! | `GET`  | `/artifacts/{id}/versions` | Committed versions, oldest first |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State, rejection::JsonRejection},
  http::{HeaderMap, header},
  response::{IntoResponse, Response},
};
use quire_core::{
  artifact::{AckStatus, Artifact, ArtifactVersion},
  request::{CreateArtifactRequest, UpdateArtifactRequest},
  store::DocumentStore,
};
use quire_engine::{GenerationBackend, SessionContext};
use quire_stream::{DataStreamWriter, NullTransport};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  ApiState,
  caller::Caller,
  error::ApiError,
  stream::{channel_context, stream_session},
};

/// Quoted content hash, as used in `ETag` and `If-Match`.
pub fn etag(artifact: &Artifact) -> String { format!("\"{}\"", artifact.content_hash()) }

fn if_match(headers: &HeaderMap) -> Option<String> {
  let value = headers.get(header::IF_MATCH)?.to_str().ok()?.trim();
  let value = value.strip_prefix("W/").unwrap_or(value);
  Some(value.trim_matches('"').to_owned())
}

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub limit: Option<usize>,
}

/// `GET /artifacts[?limit=N]`
pub async fn list<S, B>(
  State(state): State<ApiState<S, B>>,
  Caller(identity): Caller,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Artifact>>, ApiError>
where
  S: DocumentStore + 'static,
  B: GenerationBackend + 'static,
{
  let artifacts = state
    .coordinator
    .gateway()
    .list(&identity, params.limit)
    .await?;
  Ok(Json(artifacts))
}

// ─── Create ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub title:  String,
  pub kind:   String,
  #[serde(default)]
  pub prompt: Option<String>,
}

/// `POST /artifacts`
///
/// Responds immediately with a data stream carrying the session's events;
/// the new artifact's id is also in the `x-quire-artifact-id` header.
pub async fn create<S, B>(
  State(state): State<ApiState<S, B>>,
  Caller(identity): Caller,
  body: Result<Json<CreateBody>, JsonRejection>,
) -> Result<Response, ApiError>
where
  S: DocumentStore + 'static,
  B: GenerationBackend + 'static,
{
  let Json(body) = body?;
  let request = CreateArtifactRequest::parse(body.title, &body.kind, body.prompt)
    .map_err(quire_engine::Error::from)?;
  let (ctx, rx) = channel_context(identity);
  let session = state.coordinator.create_artifact(&ctx, request).await?;
  Ok(stream_session(session, ctx.writer, rx))
}

// ─── Get one ─────────────────────────────────────────────────────────────────

/// `GET /artifacts/{id}`
pub async fn get_one<S, B>(
  State(state): State<ApiState<S, B>>,
  Caller(identity): Caller,
  Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError>
where
  S: DocumentStore + 'static,
  B: GenerationBackend + 'static,
{
  let artifact = state.coordinator.gateway().find(&identity, id).await?;
  Ok(([(header::ETAG, etag(&artifact))], Json(artifact)))
}

// ─── Update ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UpdateBody {
  #[serde(default)]
  pub content:     Option<String>,
  #[serde(default)]
  pub description: String,
}

/// `PUT /artifacts/{id}`
///
/// Waits for the update to settle. No client is streaming, so events are
/// discarded.
pub async fn update<S, B>(
  State(state): State<ApiState<S, B>>,
  Caller(identity): Caller,
  Path(id): Path<Uuid>,
  headers: HeaderMap,
  body: Result<Json<UpdateBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: DocumentStore + 'static,
  B: GenerationBackend + 'static,
{
  let Json(body) = body?;
  let request = UpdateArtifactRequest {
    id,
    content: body.content,
    description: body.description,
    expected_hash: if_match(&headers),
  };
  let ctx = SessionContext::new(Arc::new(DataStreamWriter::new(NullTransport)), identity);
  let session = state.coordinator.begin_update(&ctx, request).await?;
  let artifact = tokio::spawn(session.run())
    .await
    .map_err(|e| ApiError::Internal(Box::new(e)))??;
  Ok((
    [(header::ETAG, etag(&artifact))],
    Json(artifact.metadata(AckStatus::Updated)),
  ))
}

// ─── Versions ────────────────────────────────────────────────────────────────

/// `GET /artifacts/{id}/versions`
pub async fn versions<S, B>(
  State(state): State<ApiState<S, B>>,
  Caller(identity): Caller,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<ArtifactVersion>>, ApiError>
where
  S: DocumentStore + 'static,
  B: GenerationBackend + 'static,
{
  let versions = state.coordinator.gateway().versions(&identity, id).await?;
  Ok(Json(versions))
}
