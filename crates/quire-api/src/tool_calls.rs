//! `POST /tool-calls`: run a model's `createDocument` / `updateDocument` call.
//!
//! The arguments are normalised first; malformed calls are answered with
//! 400 before any event is produced. Accepted calls stream their session
//! exactly like `POST /artifacts`.

use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
  response::Response,
};
use quire_core::store::DocumentStore;
use quire_engine::{ArtifactCommand, GenerationBackend, ToolCall};

use crate::{
  ApiState,
  caller::Caller,
  error::ApiError,
  stream::{channel_context, stream_session},
};

pub async fn handler<S, B>(
  State(state): State<ApiState<S, B>>,
  Caller(identity): Caller,
  call: Result<Json<ToolCall>, JsonRejection>,
) -> Result<Response, ApiError>
where
  S: DocumentStore + 'static,
  B: GenerationBackend + 'static,
{
  let Json(call) = call?;
  let command = call.normalize()?;
  tracing::debug!(tool = %call.name, "tool call accepted");

  let (ctx, rx) = channel_context(identity);
  let session = match command {
    ArtifactCommand::Create(request) => state.coordinator.create_artifact(&ctx, request).await?,
    ArtifactCommand::Update(request) => state.coordinator.begin_update(&ctx, request).await?,
  };
  Ok(stream_session(session, ctx.writer, rx))
}
