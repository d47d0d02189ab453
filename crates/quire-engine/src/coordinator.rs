//! [`ArtifactCoordinator`]: owns the lifecycle of every artifact session.
//!
//! A session starts in `streaming` and settles exactly once, in `complete`
//! or `error`. On the stream it produces one `artifact-start`, zero or more
//! indexed `artifact-chunk`s, and then exactly one `artifact-end` or
//! `artifact-error`. Request validation and identity checks happen before
//! the start event, so a rejected request emits nothing.
//!
//! Chunks are sanitised as they are emitted, which makes the concatenated
//! chunks of a completed session equal to the content that was persisted.
//! Emission failures are logged and do not stop the session: persistence
//! does not depend on a client still listening.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex, PoisonError, Weak},
};

use futures_util::StreamExt as _;
use quire_core::{
  artifact::{AckStatus, Artifact, ArtifactKind, ArtifactMetadata, ArtifactStatus},
  diff::ContentSanitizer,
  event::StreamEvent,
  identity::Identity,
  request::{CreateArtifactRequest, UpdateArtifactRequest},
  store::DocumentStore,
};
use quire_stream::{DataStreamWriter, Transport};
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use crate::{
  Error, Result,
  gateway::DocumentGateway,
  generate::{ArtifactGenerator, GenerationBackend, GenerationRequest},
};

// ─── Context ─────────────────────────────────────────────────────────────────

/// Per-request collaborators: where events go and who is asking.
pub struct SessionContext<T> {
  pub writer:   Arc<DataStreamWriter<T>>,
  pub identity: Identity,
}

impl<T> SessionContext<T> {
  pub fn new(writer: Arc<DataStreamWriter<T>>, identity: Identity) -> Self {
    Self { writer, identity }
  }
}

impl<T> Clone for SessionContext<T> {
  fn clone(&self) -> Self {
    Self {
      writer:   self.writer.clone(),
      identity: self.identity.clone(),
    }
  }
}

// ─── Coordinator ─────────────────────────────────────────────────────────────

type LockMap = Mutex<HashMap<Uuid, Weak<tokio::sync::Mutex<()>>>>;

pub struct ArtifactCoordinator<S, B> {
  gateway:   DocumentGateway<S>,
  generator: ArtifactGenerator<B>,
  /// One lock per artifact with an update in flight.
  locks:     Arc<LockMap>,
}

impl<S, B> Clone for ArtifactCoordinator<S, B> {
  fn clone(&self) -> Self {
    Self {
      gateway:   self.gateway.clone(),
      generator: self.generator.clone(),
      locks:     self.locks.clone(),
    }
  }
}

impl<S: DocumentStore, B: GenerationBackend> ArtifactCoordinator<S, B> {
  pub fn new(store: Arc<S>, backend: Arc<B>) -> Self {
    Self {
      gateway:   DocumentGateway::new(store),
      generator: ArtifactGenerator::new(backend),
      locks:     Arc::default(),
    }
  }

  pub fn gateway(&self) -> &DocumentGateway<S> { &self.gateway }

  /// Accept a creation request and emit its `artifact-start`.
  ///
  /// Returns the session, whose metadata is the acknowledgement for the
  /// caller. Content is produced when the session is [run](GenerationSession::run).
  pub async fn create_artifact<T: Transport>(
    &self,
    ctx: &SessionContext<T>,
    request: CreateArtifactRequest,
  ) -> Result<GenerationSession<S, B, T>> {
    request.validate()?;
    ctx.identity.owner()?;

    let generation = GenerationRequest::create(request.kind, &request.title, request.prompt());
    let session = GenerationSession {
      id:         Uuid::new_v4(),
      title:      request.title,
      kind:       request.kind,
      source:     Some(Source::Generate(generation)),
      target:     Target::Create,
      gateway:    self.gateway.clone(),
      generator:  self.generator.clone(),
      ctx:        ctx.clone(),
      status:     ArtifactStatus::Streaming,
      next_index: 0,
      _lock:      None,
    };
    session.start().await;
    Ok(session)
  }

  /// Apply an update and wait for it to settle.
  pub async fn update_artifact<T: Transport>(
    &self,
    ctx: &SessionContext<T>,
    request: UpdateArtifactRequest,
  ) -> Result<ArtifactMetadata> {
    let session = self.begin_update(ctx, request).await?;
    let artifact = session.run().await?;
    Ok(artifact.metadata(AckStatus::Updated))
  }

  /// Accept an update request and emit its `artifact-start`, without running
  /// it.
  ///
  /// The returned session holds the artifact's update lock until it is
  /// dropped, so updates to one artifact never interleave.
  pub async fn begin_update<T: Transport>(
    &self,
    ctx: &SessionContext<T>,
    request: UpdateArtifactRequest,
  ) -> Result<GenerationSession<S, B, T>> {
    request.validate()?;
    ctx.identity.owner()?;

    let lock = self.lock(request.id).await;
    let current = self.gateway.find(&ctx.identity, request.id).await?;
    let current_hash = current.content_hash();
    if request
      .expected_hash
      .as_deref()
      .is_some_and(|expected| expected != current_hash)
    {
      return Err(Error::Conflict(request.id));
    }

    let source = match request.content {
      Some(content) => Source::Provided(content),
      None => Source::Generate(GenerationRequest::revise(
        current.kind,
        &current.content,
        &request.description,
      )),
    };
    let session = GenerationSession {
      id:         current.id,
      title:      current.title,
      kind:       current.kind,
      source:     Some(source),
      target:     Target::Update {
        expected_hash: current_hash,
      },
      gateway:    self.gateway.clone(),
      generator:  self.generator.clone(),
      ctx:        ctx.clone(),
      status:     ArtifactStatus::Streaming,
      next_index: 0,
      _lock:      Some(lock),
    };
    session.start().await;
    Ok(session)
  }

  async fn lock(&self, id: Uuid) -> OwnedMutexGuard<()> {
    let mutex = {
      let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
      locks.retain(|_, lock| lock.strong_count() > 0);
      match locks.get(&id).and_then(Weak::upgrade) {
        Some(mutex) => mutex,
        None => {
          let mutex = Arc::new(tokio::sync::Mutex::new(()));
          locks.insert(id, Arc::downgrade(&mutex));
          mutex
        }
      }
    };
    mutex.lock_owned().await
  }
}

// ─── Session ─────────────────────────────────────────────────────────────────

enum Source {
  Generate(GenerationRequest),
  /// Content supplied verbatim, e.g. an editor save.
  Provided(String),
}

enum Target {
  Create,
  /// Replace existing content, provided it still hashes to `expected_hash`.
  Update { expected_hash: String },
}

/// One run of an artifact from `artifact-start` to its terminal event.
pub struct GenerationSession<S, B, T> {
  id:         Uuid,
  title:      String,
  kind:       ArtifactKind,
  source:     Option<Source>,
  target:     Target,
  gateway:    DocumentGateway<S>,
  generator:  ArtifactGenerator<B>,
  ctx:        SessionContext<T>,
  status:     ArtifactStatus,
  next_index: u64,
  _lock:      Option<OwnedMutexGuard<()>>,
}

impl<S, B, T> GenerationSession<S, B, T>
where
  S: DocumentStore,
  B: GenerationBackend,
  T: Transport,
{
  pub fn id(&self) -> Uuid { self.id }

  pub fn status(&self) -> ArtifactStatus { self.status }

  /// The acknowledgement handed back when the session is accepted.
  pub fn metadata(&self) -> ArtifactMetadata {
    ArtifactMetadata {
      id:     self.id,
      title:  self.title.clone(),
      kind:   self.kind,
      status: AckStatus::Streaming,
    }
  }

  /// Produce the content, persist it, and emit the terminal event.
  ///
  /// Returns the persisted artifact, or the error that was also reported
  /// as `artifact-error`. Nothing is persisted when generation fails.
  pub async fn run(mut self) -> Result<Artifact> {
    let outcome = match self.source.take() {
      Some(source) => self.produce(source).await,
      None => Err(Error::EmptyOutput),
    };

    match outcome {
      Ok(artifact) => {
        self.settle(ArtifactStatus::Complete)?;
        self.emit(StreamEvent::ArtifactEnd { id: self.id }).await;
        tracing::info!(artifact_id = %self.id, chunks = self.next_index, "artifact session complete");
        Ok(artifact)
      }
      Err(e) => {
        self.settle(ArtifactStatus::Error)?;
        self
          .emit(StreamEvent::ArtifactError {
            id:      self.id,
            message: e.to_string(),
          })
          .await;
        tracing::warn!(artifact_id = %self.id, error = %e, "artifact session failed");
        Err(e)
      }
    }
  }

  async fn start(&self) {
    tracing::info!(artifact_id = %self.id, kind = %self.kind, "artifact session started");
    self
      .emit(StreamEvent::ArtifactStart {
        id:    self.id,
        title: self.title.clone(),
        kind:  self.kind,
      })
      .await;
  }

  async fn produce(&mut self, source: Source) -> Result<Artifact> {
    match source {
      Source::Generate(request) => {
        let content = self.stream_generated(request).await?;
        self.persist(&content).await
      }
      Source::Provided(content) => {
        // Shown only once accepted, so a refused save leaves no trace in the
        // client's copy.
        let artifact = self.persist(&content).await?;
        self.emit_chunk(artifact.content.clone()).await;
        Ok(artifact)
      }
    }
  }

  async fn stream_generated(&mut self, request: GenerationRequest) -> Result<String> {
    let mut deltas = self.generator.generate(request).await?;
    let mut sanitizer = ContentSanitizer::new();
    let mut content = String::new();

    while let Some(delta) = deltas.next().await {
      let clean = sanitizer.push(&delta?);
      if clean.is_empty() {
        continue;
      }
      content.push_str(&clean);
      self.emit_chunk(clean).await;
    }

    if content.trim().is_empty() {
      return Err(Error::EmptyOutput);
    }
    Ok(content)
  }

  async fn persist(&self, content: &str) -> Result<Artifact> {
    let identity = &self.ctx.identity;
    match &self.target {
      Target::Create => {
        self
          .gateway
          .create(identity, self.id, &self.title, self.kind, content)
          .await
      }
      Target::Update { expected_hash } => {
        self
          .gateway
          .commit_update(identity, self.id, content, Some(expected_hash))
          .await
      }
    }
  }

  fn settle(&mut self, next: ArtifactStatus) -> Result<()> {
    self.status = self.status.transition(next)?;
    Ok(())
  }

  async fn emit_chunk(&mut self, delta: String) {
    let index = self.next_index;
    self.next_index += 1;
    self
      .emit(StreamEvent::ArtifactChunk {
        id: self.id,
        index,
        delta,
      })
      .await;
  }

  async fn emit(&self, event: StreamEvent) {
    if let Err(e) = self.ctx.writer.append_data(&event).await {
      tracing::warn!(
        artifact_id = %self.id,
        event = event.type_name(),
        error = %e,
        "failed to emit stream event"
      );
    }
  }
}
