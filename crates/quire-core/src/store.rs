//! The `DocumentStore` trait: durable storage for artifacts.
//!
//! The trait is implemented by storage backends (e.g. `quire-store-sqlite`).
//! Higher layers depend on this abstraction, not on any concrete backend.
//! Ownership checks and the update-safety gate live above the store, in the
//! engine's document gateway; the store only enforces immutability of the
//! identity fields.

use std::future::Future;

use uuid::Uuid;

use crate::artifact::{Artifact, ArtifactVersion};

/// Abstraction over a Quire document store backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait DocumentStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Insert `artifact`, or update the existing record with the same id.
  ///
  /// An update replaces `title`, `content`, `status` and `updated_at` only;
  /// `kind`, `owner_id` and `created_at` of an existing record are kept.
  /// Every call appends a new [`ArtifactVersion`]. Returns the stored record.
  fn insert_or_update(
    &self,
    artifact: Artifact,
  ) -> impl Future<Output = Result<Artifact, Self::Error>> + Send + '_;

  /// Retrieve an artifact by id. Returns `None` if not found.
  fn find_by_id(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Artifact>, Self::Error>> + Send + '_;

  /// List the artifacts owned by `owner_id`, most recently updated first.
  fn list_by_owner<'a>(
    &'a self,
    owner_id: &'a str,
    limit: Option<usize>,
  ) -> impl Future<Output = Result<Vec<Artifact>, Self::Error>> + Send + 'a;

  /// All committed versions of an artifact, oldest first.
  fn versions(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Vec<ArtifactVersion>, Self::Error>> + Send + '_;
}
