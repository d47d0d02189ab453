//! [`DataStreamWriter`] makes every emitted event visible both live and in
//! the client's ordered data array.
//!
//! The transport's data write and its raw write are independent operations.
//! [`DataStreamWriter::append_data`] performs both, in that order, for every
//! event. Delivery to the data array is at-least-once: a failed second write
//! is reported but neither retried nor used to retract the first.

use quire_core::event::StreamEvent;
use tokio::sync::Mutex;

use crate::{
  Error, Result,
  frame::{self, StreamPart},
  transport::Transport,
};

/// Wraps a [`Transport`]; all operations other than `append_data` pass
/// straight through.
#[derive(Debug)]
pub struct DataStreamWriter<T> {
  transport: T,
  /// Next sequence number. Held across both writes of an append so that
  /// concurrent callers cannot interleave their frames.
  next_sequence: Mutex<u64>,
}

impl<T: Transport> DataStreamWriter<T> {
  pub fn new(transport: T) -> Self {
    Self {
      transport,
      next_sequence: Mutex::new(0),
    }
  }

  pub fn transport(&self) -> &T { &self.transport }

  /// Emit `event` and return its position in the event log.
  ///
  /// Fails with [`Error::Transport`] if the live write fails (nothing was
  /// delivered and no sequence number is consumed), or with
  /// [`Error::DataArrayAppend`] if only the second write fails.
  pub async fn append_data(&self, event: &StreamEvent) -> Result<u64> {
    let value = serde_json::to_value(event)?;
    let data_frame = frame::encode_data_frame(event)?;

    let mut next = self.next_sequence.lock().await;

    self
      .transport
      .write_data(value)
      .await
      .map_err(|e| Error::Transport(Box::new(e)))?;

    let sequence = *next;
    *next += 1;

    if let Err(e) = self.transport.write_raw(data_frame).await {
      tracing::warn!(
        sequence,
        event = event.type_name(),
        error = %e,
        "data-array append failed after live delivery"
      );
      return Err(Error::DataArrayAppend {
        sequence,
        source: Box::new(e),
      });
    }

    Ok(sequence)
  }

  /// Number of events appended so far.
  pub async fn appended(&self) -> u64 { *self.next_sequence.lock().await }

  // ── Pass-through ──────────────────────────────────────────────────────────

  pub async fn write_data(&self, value: serde_json::Value) -> Result<()> {
    self
      .transport
      .write_data(value)
      .await
      .map_err(|e| Error::Transport(Box::new(e)))
  }

  pub async fn write_raw(&self, frame: String) -> Result<()> {
    self
      .transport
      .write_raw(frame)
      .await
      .map_err(|e| Error::Transport(Box::new(e)))
  }

  /// Write a `0:` text part.
  pub async fn write_text(&self, text: impl Into<String>) -> Result<()> {
    self
      .write_raw(frame::encode_part(&StreamPart::Text(text.into()))?)
      .await
  }

  /// Write a `3:` error part.
  pub async fn write_error(&self, message: impl Into<String>) -> Result<()> {
    self
      .write_raw(frame::encode_part(&StreamPart::Error(message.into()))?)
      .await
  }

  pub async fn close(&self) -> Result<()> {
    self
      .transport
      .close()
      .await
      .map_err(|e| Error::Transport(Box::new(e)))
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  };

  use serde_json::Value;
  use uuid::Uuid;

  use super::*;
  use crate::transport::MemoryTransport;

  #[derive(Debug, thiserror::Error)]
  #[error("injected failure")]
  struct Injected;

  /// Records frames like `MemoryTransport`, but can fail either write path.
  #[derive(Default)]
  struct FlakyTransport {
    inner:     MemoryTransport,
    fail_data: AtomicBool,
    fail_raw:  AtomicBool,
  }

  impl Transport for FlakyTransport {
    type Error = Injected;

    async fn write_data(&self, value: Value) -> Result<(), Injected> {
      if self.fail_data.load(Ordering::SeqCst) {
        return Err(Injected);
      }
      let _ = self.inner.write_data(value).await;
      Ok(())
    }

    async fn write_raw(&self, frame: String) -> Result<(), Injected> {
      if self.fail_raw.load(Ordering::SeqCst) {
        return Err(Injected);
      }
      let _ = self.inner.write_raw(frame).await;
      Ok(())
    }

    async fn close(&self) -> Result<(), Injected> { Ok(()) }
  }

  #[tokio::test]
  async fn append_writes_live_then_data_array() {
    let writer = DataStreamWriter::new(MemoryTransport::new());
    let id = Uuid::new_v4();
    let event = StreamEvent::ArtifactEnd { id };

    assert_eq!(writer.append_data(&event).await.unwrap(), 0);

    let frames = writer.transport().frames();
    let expected = frame::encode_data_frame(&event).unwrap();
    assert_eq!(frames, vec![expected.clone(), expected]);
  }

  #[tokio::test]
  async fn sequence_numbers_follow_call_order() {
    let writer = DataStreamWriter::new(MemoryTransport::new());
    let id = Uuid::new_v4();
    for index in 0..5 {
      let seq = writer
        .append_data(&StreamEvent::ArtifactChunk {
          id,
          index,
          delta: index.to_string(),
        })
        .await
        .unwrap();
      assert_eq!(seq, index);
    }
    assert_eq!(writer.appended().await, 5);

    let deltas: Vec<String> = writer
      .transport()
      .events()
      .unwrap()
      .into_iter()
      .filter_map(|e| match e {
        StreamEvent::ArtifactChunk { delta, .. } => Some(delta),
        _ => None,
      })
      .collect();
    assert_eq!(deltas, ["0", "0", "1", "1", "2", "2", "3", "3", "4", "4"]);
  }

  #[tokio::test]
  async fn failed_second_write_is_reported_not_retracted() {
    let transport = FlakyTransport::default();
    transport.fail_raw.store(true, Ordering::SeqCst);
    let writer = DataStreamWriter::new(transport);
    let id = Uuid::new_v4();

    let err = writer
      .append_data(&StreamEvent::ArtifactEnd { id })
      .await
      .unwrap_err();
    assert!(matches!(err, Error::DataArrayAppend { sequence: 0, .. }));

    // The live write stays delivered, exactly once.
    assert_eq!(writer.transport().inner.frames().len(), 1);
    assert_eq!(writer.appended().await, 1);
  }

  #[tokio::test]
  async fn failed_live_write_consumes_no_sequence() {
    let transport = FlakyTransport::default();
    transport.fail_data.store(true, Ordering::SeqCst);
    let writer = DataStreamWriter::new(transport);

    let err = writer.append_data(&StreamEvent::Clear).await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
    assert!(writer.transport().inner.frames().is_empty());
    assert_eq!(writer.appended().await, 0);
  }

  #[tokio::test]
  async fn concurrent_appends_do_not_interleave_frames() {
    let writer = Arc::new(DataStreamWriter::new(MemoryTransport::new()));
    let mut handles = Vec::new();
    for n in 0..8 {
      let writer = writer.clone();
      handles.push(tokio::spawn(async move {
        writer
          .append_data(&StreamEvent::TextDelta(n.to_string()))
          .await
          .unwrap()
      }));
    }
    for handle in handles {
      handle.await.unwrap();
    }

    let frames = writer.transport().frames();
    assert_eq!(frames.len(), 16);
    for pair in frames.chunks(2) {
      assert_eq!(pair[0], pair[1]);
    }
  }

  #[tokio::test]
  async fn pass_through_writes_use_their_own_codes() {
    let writer = DataStreamWriter::new(MemoryTransport::new());
    writer.write_text("hello").await.unwrap();
    writer.write_error("bad").await.unwrap();
    writer.close().await.unwrap();
    assert_eq!(writer.transport().frames(), vec!["0:\"hello\"\n", "3:\"bad\"\n"]);
    assert!(writer.transport().is_closed());
  }
}
