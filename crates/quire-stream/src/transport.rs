//! The `Transport` trait and concrete one-way sinks.
//!
//! A transport is the channel between server-side generation and the client.
//! It offers two independent write primitives: the native data write that
//! drives live display, and a raw write of an already-framed part.

use std::{
  convert::Infallible,
  future::Future,
  sync::{Mutex, PoisonError, RwLock},
};

use bytes::Bytes;
use quire_core::event::StreamEvent;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::frame::{self, StreamPart};

/// A one-way, ordered sink for data-stream parts.
pub trait Transport: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Deliver `value` through the transport's own data path.
  fn write_data(
    &self,
    value: Value,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Write one pre-framed part (including its trailing newline) verbatim.
  fn write_raw(
    &self,
    frame: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Signal that no further parts will be written.
  fn close(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

// ─── Channel ─────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ChannelError {
  #[error("stream channel closed")]
  Closed,
  #[error("failed to encode data part: {0}")]
  Encode(#[from] crate::Error),
}

/// Sends frames over an unbounded tokio channel; the receiving half usually
/// becomes an HTTP response body.
#[derive(Debug)]
pub struct ChannelTransport {
  tx: RwLock<Option<mpsc::UnboundedSender<Bytes>>>,
}

impl ChannelTransport {
  pub fn new() -> (Self, mpsc::UnboundedReceiver<Bytes>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
      Self {
        tx: RwLock::new(Some(tx)),
      },
      rx,
    )
  }

  fn send(&self, frame: String) -> Result<(), ChannelError> {
    let guard = self.tx.read().unwrap_or_else(PoisonError::into_inner);
    let tx = guard.as_ref().ok_or(ChannelError::Closed)?;
    tx.send(Bytes::from(frame)).map_err(|_| ChannelError::Closed)
  }
}

impl Transport for ChannelTransport {
  type Error = ChannelError;

  async fn write_data(&self, value: Value) -> Result<(), ChannelError> {
    let frame = frame::encode_data_value(&value)?;
    self.send(frame)
  }

  async fn write_raw(&self, frame: String) -> Result<(), ChannelError> { self.send(frame) }

  async fn close(&self) -> Result<(), ChannelError> {
    self.tx.write().unwrap_or_else(PoisonError::into_inner).take();
    Ok(())
  }
}

// ─── Memory ──────────────────────────────────────────────────────────────────

/// Records every frame in memory. Used for replay and in tests.
#[derive(Debug, Default)]
pub struct MemoryTransport {
  frames: Mutex<Vec<String>>,
  closed: Mutex<bool>,
}

impl MemoryTransport {
  pub fn new() -> Self { Self::default() }

  /// All frames written so far, in order.
  pub fn frames(&self) -> Vec<String> {
    self.frames.lock().unwrap_or_else(PoisonError::into_inner).clone()
  }

  /// The concatenated stream body.
  pub fn body(&self) -> String { self.frames().concat() }

  /// Decode every data frame back into events, in delivery order. Events
  /// delivered through both write paths appear twice.
  pub fn events(&self) -> crate::Result<Vec<StreamEvent>> {
    Ok(
      frame::decode_stream(&self.body())?
        .iter()
        .flat_map(StreamPart::events)
        .collect(),
    )
  }

  pub fn is_closed(&self) -> bool {
    *self.closed.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn push(&self, frame: String) {
    self
      .frames
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .push(frame);
  }
}

impl Transport for MemoryTransport {
  type Error = Infallible;

  async fn write_data(&self, value: Value) -> Result<(), Infallible> {
    if let Ok(frame) = frame::encode_data_value(&value) {
      self.push(frame);
    }
    Ok(())
  }

  async fn write_raw(&self, frame: String) -> Result<(), Infallible> {
    self.push(frame);
    Ok(())
  }

  async fn close(&self) -> Result<(), Infallible> {
    *self.closed.lock().unwrap_or_else(PoisonError::into_inner) = true;
    Ok(())
  }
}

// ─── Null ────────────────────────────────────────────────────────────────────

/// Discards everything. Used where no client is listening, e.g. editor saves.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTransport;

impl Transport for NullTransport {
  type Error = Infallible;

  async fn write_data(&self, _value: Value) -> Result<(), Infallible> { Ok(()) }

  async fn write_raw(&self, _frame: String) -> Result<(), Infallible> { Ok(()) }

  async fn close(&self) -> Result<(), Infallible> { Ok(()) }
}
