//! Data-stream plumbing for Quire.
//!
//! - [`frame`]: the `TYPE:JSON\n` wire codec shared with existing consumers.
//! - [`transport`]: the [`Transport`] trait and concrete sinks.
//! - [`writer`]: [`DataStreamWriter`], which delivers every event both live
//!   and to the client-visible data array.
//! - [`accumulate`]: the consumer side, rebuilding artifacts from events.

pub mod accumulate;
pub mod error;
pub mod frame;
pub mod transport;
pub mod writer;

pub use accumulate::{AccumulatedArtifact, ArtifactAccumulator};
pub use error::{Error, Result};
pub use frame::{FrameDecoder, StreamPart};
pub use transport::{ChannelError, ChannelTransport, MemoryTransport, NullTransport, Transport};
pub use writer::DataStreamWriter;
