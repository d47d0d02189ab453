//! Consumer-side reconstruction of artifacts from stream events.
//!
//! Sessions for different artifacts may interleave, so all accumulation is
//! keyed by artifact id. Events may also arrive more than once (the writer
//! delivers each event on two paths); applying an event twice leaves the
//! accumulator unchanged. Legacy events carry no position, so a legacy event
//! identical to the one just applied is taken to be its second delivery.
//!
//! An update to an artifact runs a fresh session under the same id. The
//! previous content stays visible until the new session's first chunk
//! replaces it; a session that fails before any chunk (e.g. a refused save)
//! leaves the previous content and status in place.

use std::collections::HashMap;

use quire_core::{
  artifact::{ArtifactKind, ArtifactStatus},
  event::StreamEvent,
};
use uuid::Uuid;

use crate::frame::StreamPart;

/// The client-side view of one artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct AccumulatedArtifact {
  pub id:         Uuid,
  pub title:      String,
  pub kind:       ArtifactKind,
  pub content:    String,
  pub status:     ArtifactStatus,
  /// Message of the last `artifact-error` event. Content streamed before
  /// the failure is kept.
  pub error:      Option<String>,
  next_index:     u64,
  /// Status of the previous session while a new one has produced no chunk.
  superseded:     Option<ArtifactStatus>,
}

impl AccumulatedArtifact {
  fn new(id: Uuid, title: String, kind: ArtifactKind) -> Self {
    Self {
      id,
      title,
      kind,
      content: String::new(),
      status: ArtifactStatus::Streaming,
      error: None,
      next_index: 0,
      superseded: None,
    }
  }

  /// Begin a new session over a settled artifact, keeping its content.
  fn restart(&mut self, title: String, kind: ArtifactKind) {
    self.superseded = Some(self.status);
    self.title = title;
    self.kind = kind;
    self.status = ArtifactStatus::Streaming;
    self.error = None;
    self.next_index = 0;
  }
}

/// Rebuilds artifacts from an event log.
#[derive(Debug, Default)]
pub struct ArtifactAccumulator {
  artifacts:   HashMap<Uuid, AccumulatedArtifact>,
  /// First-seen order of artifact ids.
  order:       Vec<Uuid>,
  /// Target of the unkeyed legacy events.
  current:     Option<Uuid>,
  /// The legacy event applied last, until its duplicate is seen.
  last_legacy: Option<StreamEvent>,
}

impl ArtifactAccumulator {
  pub fn new() -> Self { Self::default() }

  pub fn get(&self, id: Uuid) -> Option<&AccumulatedArtifact> { self.artifacts.get(&id) }

  /// The artifact addressed by the most recent legacy `id` event.
  pub fn current(&self) -> Option<&AccumulatedArtifact> {
    self.current.and_then(|id| self.artifacts.get(&id))
  }

  /// Artifacts in the order their first event was seen.
  pub fn iter(&self) -> impl Iterator<Item = &AccumulatedArtifact> {
    self.order.iter().filter_map(|id| self.artifacts.get(id))
  }

  pub fn len(&self) -> usize { self.order.len() }

  pub fn is_empty(&self) -> bool { self.order.is_empty() }

  /// Apply every event carried by a decoded stream part; returns how many
  /// changed state.
  pub fn apply_part(&mut self, part: &StreamPart) -> usize {
    part
      .events()
      .iter()
      .filter(|event| self.apply(event))
      .count()
  }

  /// Apply one event. Returns `false` when the event was a duplicate or had
  /// no target.
  pub fn apply(&mut self, event: &StreamEvent) -> bool {
    if !event.is_legacy() {
      self.last_legacy = None;
      return self.apply_keyed(event);
    }
    if self.last_legacy.take().as_ref() == Some(event) {
      return false;
    }
    let changed = self.apply_legacy(event);
    self.last_legacy = Some(event.clone());
    changed
  }

  fn apply_keyed(&mut self, event: &StreamEvent) -> bool {
    match event {
      StreamEvent::ArtifactStart { id, title, kind } => match self.artifacts.get_mut(id) {
        // Duplicate delivery of the start of the running session.
        Some(existing) if existing.status == ArtifactStatus::Streaming => false,
        // A new session (an update) for an artifact whose last one ended.
        Some(existing) => {
          existing.restart(title.clone(), *kind);
          true
        }
        None => {
          self.insert(AccumulatedArtifact::new(*id, title.clone(), *kind));
          true
        }
      },
      StreamEvent::ArtifactChunk { id, index, delta } => {
        let Some(artifact) = self.streaming_mut(*id) else {
          return false;
        };
        if *index < artifact.next_index {
          return false;
        }
        if artifact.superseded.take().is_some() {
          artifact.content.clear();
        }
        artifact.content.push_str(delta);
        artifact.next_index = index + 1;
        true
      }
      StreamEvent::ArtifactEnd { id } => match self.streaming_mut(*id) {
        Some(artifact) => {
          artifact.superseded = None;
          artifact.status = ArtifactStatus::Complete;
          true
        }
        None => false,
      },
      StreamEvent::ArtifactError { id, message } => match self.streaming_mut(*id) {
        Some(artifact) => {
          artifact.status = artifact.superseded.take().unwrap_or(ArtifactStatus::Error);
          artifact.error = Some(message.clone());
          true
        }
        None => false,
      },
      _ => false,
    }
  }

  fn apply_legacy(&mut self, event: &StreamEvent) -> bool {
    match event {
      StreamEvent::Id(id) => {
        self.current = Some(*id);
        if self.artifacts.contains_key(id) {
          return false;
        }
        self.insert(AccumulatedArtifact::new(*id, String::new(), ArtifactKind::default()));
        true
      }
      StreamEvent::Title(title) => self.with_current(|a| {
        let changed = a.title != *title;
        a.title.clone_from(title);
        changed
      }),
      StreamEvent::Kind(kind) => self.with_current(|a| {
        let changed = a.kind != *kind;
        a.kind = *kind;
        changed
      }),
      StreamEvent::Clear => self.with_current(|a| {
        let changed = !a.content.is_empty();
        a.content.clear();
        changed
      }),
      StreamEvent::TextDelta(delta) => self.with_current(|a| {
        a.content.push_str(delta);
        !delta.is_empty()
      }),
      StreamEvent::Finish => self.with_current(|a| {
        a.status = ArtifactStatus::Complete;
        true
      }),
      _ => false,
    }
  }

  fn insert(&mut self, artifact: AccumulatedArtifact) {
    self.order.push(artifact.id);
    self.artifacts.insert(artifact.id, artifact);
  }

  fn streaming_mut(&mut self, id: Uuid) -> Option<&mut AccumulatedArtifact> {
    self
      .artifacts
      .get_mut(&id)
      .filter(|a| a.status == ArtifactStatus::Streaming)
  }

  fn with_current(&mut self, f: impl FnOnce(&mut AccumulatedArtifact) -> bool) -> bool {
    let current = self.current;
    match current.and_then(|id| self.streaming_mut(id)) {
      Some(artifact) => f(artifact),
      None => false,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{transport::MemoryTransport, writer::DataStreamWriter};

  fn session(id: Uuid, chunks: &[&str], terminal: StreamEvent) -> Vec<StreamEvent> {
    let mut events = vec![StreamEvent::ArtifactStart {
      id,
      title: "Notes".into(),
      kind: ArtifactKind::Text,
    }];
    events.extend(chunks.iter().enumerate().map(|(i, c)| StreamEvent::ArtifactChunk {
      id,
      index: i as u64,
      delta: (*c).to_owned(),
    }));
    events.push(terminal);
    events
  }

  #[test]
  fn replaying_chunks_reconstructs_content() {
    let id = Uuid::new_v4();
    let mut acc = ArtifactAccumulator::new();
    for event in session(id, &["Hello", ", ", "world"], StreamEvent::ArtifactEnd { id }) {
      acc.apply(&event);
    }
    let artifact = acc.get(id).unwrap();
    assert_eq!(artifact.content, "Hello, world");
    assert_eq!(artifact.status, ArtifactStatus::Complete);
  }

  #[test]
  fn duplicate_delivery_is_idempotent() {
    let id = Uuid::new_v4();
    let mut acc = ArtifactAccumulator::new();
    for event in session(id, &["a", "b", "c"], StreamEvent::ArtifactEnd { id }) {
      assert!(acc.apply(&event));
      assert!(!acc.apply(&event));
    }
    assert_eq!(acc.get(id).unwrap().content, "abc");
    assert_eq!(acc.len(), 1);
  }

  #[test]
  fn interleaved_sessions_are_kept_apart() {
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let sa = session(a, &["1", "2"], StreamEvent::ArtifactEnd { id: a });
    let sb = session(b, &["x", "y"], StreamEvent::ArtifactEnd { id: b });

    let mut acc = ArtifactAccumulator::new();
    for (ea, eb) in sa.iter().zip(sb.iter()) {
      acc.apply(eb);
      acc.apply(ea);
    }
    assert_eq!(acc.get(a).unwrap().content, "12");
    assert_eq!(acc.get(b).unwrap().content, "xy");
    let ids: Vec<Uuid> = acc.iter().map(|x| x.id).collect();
    assert_eq!(ids, vec![b, a]);
  }

  #[test]
  fn error_keeps_partial_content_and_freezes_artifact() {
    let id = Uuid::new_v4();
    let mut acc = ArtifactAccumulator::new();
    let failed = StreamEvent::ArtifactError {
      id,
      message: "backend unavailable".into(),
    };
    for event in session(id, &["partial"], failed) {
      acc.apply(&event);
    }
    // A late chunk or end cannot revive a terminal artifact.
    assert!(!acc.apply(&StreamEvent::ArtifactChunk {
      id,
      index: 1,
      delta: "more".into(),
    }));
    assert!(!acc.apply(&StreamEvent::ArtifactEnd { id }));

    let artifact = acc.get(id).unwrap();
    assert_eq!(artifact.status, ArtifactStatus::Error);
    assert_eq!(artifact.content, "partial");
    assert_eq!(artifact.error.as_deref(), Some("backend unavailable"));
  }

  #[test]
  fn new_session_for_finished_artifact_replaces_content() {
    let id = Uuid::new_v4();
    let mut acc = ArtifactAccumulator::new();
    for event in session(id, &["first"], StreamEvent::ArtifactEnd { id }) {
      acc.apply(&event);
    }
    for event in session(id, &["second", " draft"], StreamEvent::ArtifactEnd { id }) {
      acc.apply(&event);
    }
    let artifact = acc.get(id).unwrap();
    assert_eq!(artifact.content, "second draft");
    assert_eq!(artifact.status, ArtifactStatus::Complete);
    assert_eq!(acc.len(), 1);
  }

  #[test]
  fn refused_update_keeps_previous_content() {
    let id = Uuid::new_v4();
    let mut acc = ArtifactAccumulator::new();
    for event in session(id, &["original text"], StreamEvent::ArtifactEnd { id }) {
      acc.apply(&event);
    }

    let refused = session(id, &[], StreamEvent::ArtifactError {
      id,
      message: "update rejected: change too large".into(),
    });
    for event in &refused {
      acc.apply(event);
      // Mid-session the previous content is still shown.
      assert_eq!(acc.get(id).unwrap().content, "original text");
      acc.apply(event);
    }

    let artifact = acc.get(id).unwrap();
    assert_eq!(artifact.content, "original text");
    assert_eq!(artifact.status, ArtifactStatus::Complete);
    assert_eq!(
      artifact.error.as_deref(),
      Some("update rejected: change too large")
    );
  }

  #[test]
  fn failed_update_after_first_chunk_keeps_partial_content() {
    let id = Uuid::new_v4();
    let mut acc = ArtifactAccumulator::new();
    for event in session(id, &["original"], StreamEvent::ArtifactEnd { id }) {
      acc.apply(&event);
    }
    let failed = StreamEvent::ArtifactError {
      id,
      message: "backend unavailable".into(),
    };
    for event in session(id, &["rewr"], failed) {
      acc.apply(&event);
    }
    let artifact = acc.get(id).unwrap();
    assert_eq!(artifact.content, "rewr");
    assert_eq!(artifact.status, ArtifactStatus::Error);
  }

  #[tokio::test]
  async fn legacy_session_replayed_from_writer_is_not_doubled() {
    let writer = DataStreamWriter::new(MemoryTransport::new());
    let id = Uuid::new_v4();
    for event in [
      StreamEvent::Id(id),
      StreamEvent::Title("Notes".into()),
      StreamEvent::Clear,
      StreamEvent::TextDelta("ab".into()),
      StreamEvent::TextDelta("ab".into()),
      StreamEvent::TextDelta("c".into()),
      StreamEvent::Finish,
    ] {
      writer.append_data(&event).await.unwrap();
    }

    let events = writer.transport().events().unwrap();
    assert_eq!(events.len(), 14);
    let mut acc = ArtifactAccumulator::new();
    for event in &events {
      acc.apply(event);
    }
    let artifact = acc.current().unwrap();
    assert_eq!(artifact.content, "ababc");
    assert_eq!(artifact.status, ArtifactStatus::Complete);
  }

  #[test]
  fn chunk_without_start_is_ignored() {
    let mut acc = ArtifactAccumulator::new();
    assert!(!acc.apply(&StreamEvent::ArtifactChunk {
      id:    Uuid::new_v4(),
      index: 0,
      delta: "orphan".into(),
    }));
    assert!(acc.is_empty());
  }

  #[test]
  fn legacy_protocol_targets_the_current_artifact() {
    let id = Uuid::new_v4();
    let mut acc = ArtifactAccumulator::new();
    for event in [
      StreamEvent::Id(id),
      StreamEvent::Title("Budget".into()),
      StreamEvent::Kind(ArtifactKind::Sheet),
      StreamEvent::TextDelta("stale".into()),
      StreamEvent::Clear,
      StreamEvent::TextDelta("a,b\n".into()),
      StreamEvent::TextDelta("1,2\n".into()),
      StreamEvent::Finish,
    ] {
      acc.apply(&event);
    }
    let artifact = acc.current().unwrap();
    assert_eq!(artifact.id, id);
    assert_eq!(artifact.title, "Budget");
    assert_eq!(artifact.kind, ArtifactKind::Sheet);
    assert_eq!(artifact.content, "a,b\n1,2\n");
    assert_eq!(artifact.status, ArtifactStatus::Complete);
  }

  #[test]
  fn legacy_deltas_without_an_id_are_dropped() {
    let mut acc = ArtifactAccumulator::new();
    assert!(!acc.apply(&StreamEvent::TextDelta("lost".into())));
    assert!(acc.current().is_none());
  }
}
