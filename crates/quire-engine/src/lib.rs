//! Generation and lifecycle engine for Quire artifacts.
//!
//! - [`generate`]: prompts and the [`GenerationBackend`] seam to the model.
//! - [`gateway`]: [`DocumentGateway`], the single write path to the store.
//! - [`coordinator`]: [`ArtifactCoordinator`], which turns create and update
//!   requests into event-emitting sessions.
//! - [`tool`]: normalisation of model tool calls into requests.

pub mod coordinator;
pub mod error;
pub mod gateway;
pub mod generate;
pub mod tool;

pub use coordinator::{ArtifactCoordinator, GenerationSession, SessionContext};
pub use error::{Error, Result};
pub use gateway::DocumentGateway;
pub use generate::{ArtifactGenerator, DeltaStream, GenerationBackend, GenerationMode, GenerationRequest};
pub use tool::{ArtifactCommand, ToolCall};
