//! Streaming responses: a generation session whose events become the
//! response body as data-stream parts.

use std::{convert::Infallible, sync::Arc};

use axum::{
  body::Body,
  http::{HeaderName, header},
  response::{IntoResponse, Response},
};
use bytes::Bytes;
use quire_core::{identity::Identity, store::DocumentStore};
use quire_engine::{GenerationBackend, GenerationSession, SessionContext};
use quire_stream::{ChannelTransport, DataStreamWriter};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_stream::{StreamExt as _, wrappers::UnboundedReceiverStream};

/// Marks the body as a data stream for existing consumers.
pub const DATA_STREAM_HEADER: &str = "x-vercel-ai-data-stream";
pub const ARTIFACT_ID_HEADER: &str = "x-quire-artifact-id";

pub(crate) fn channel_context(
  identity: Identity,
) -> (SessionContext<ChannelTransport>, UnboundedReceiver<Bytes>) {
  let (transport, rx) = ChannelTransport::new();
  let writer = Arc::new(DataStreamWriter::new(transport));
  (SessionContext::new(writer, identity), rx)
}

/// Run `session` on its own task and stream its events back.
///
/// The task is detached from the request: a client that disconnects stops
/// receiving events, but the session still persists and settles.
pub(crate) fn stream_session<S, B>(
  session: GenerationSession<S, B, ChannelTransport>,
  writer: Arc<DataStreamWriter<ChannelTransport>>,
  rx: UnboundedReceiver<Bytes>,
) -> Response
where
  S: DocumentStore + 'static,
  B: GenerationBackend + 'static,
{
  let id = session.id();
  tokio::spawn(async move {
    // The outcome is already on the stream and in the log.
    let _ = session.run().await;
    if let Err(e) = writer.close().await {
      tracing::debug!(artifact_id = %id, error = %e, "stream already closed");
    }
  });

  let body = Body::from_stream(UnboundedReceiverStream::new(rx).map(Ok::<_, Infallible>));
  (
    [
      (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_owned()),
      (HeaderName::from_static(DATA_STREAM_HEADER), "v1".to_owned()),
      (HeaderName::from_static(ARTIFACT_ID_HEADER), id.to_string()),
    ],
    body,
  )
    .into_response()
}
