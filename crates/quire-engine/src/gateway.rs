//! [`DocumentGateway`]: the only path by which artifact content reaches the
//! store.
//!
//! Every write goes through an ownership check and the content sanitiser.
//! Writes that replace existing content additionally pass the update-safety
//! gate and, when the caller supplies one, an expected content hash.

use std::sync::Arc;

use chrono::Utc;
use quire_core::{
  artifact::{Artifact, ArtifactKind, ArtifactStatus, ArtifactVersion},
  diff::{is_update_safe, sanitize_document_content},
  identity::Identity,
  store::DocumentStore,
};
use uuid::Uuid;

use crate::{Error, Result};

pub struct DocumentGateway<S> {
  store: Arc<S>,
}

impl<S> Clone for DocumentGateway<S> {
  fn clone(&self) -> Self {
    Self {
      store: self.store.clone(),
    }
  }
}

fn store_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> Error {
  Error::Store(Box::new(e))
}

impl<S: DocumentStore> DocumentGateway<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  pub fn store(&self) -> &Arc<S> { &self.store }

  /// Persist a new artifact owned by the caller. There is nothing to compare
  /// against, so the safety gate does not apply.
  pub async fn create(
    &self,
    identity: &Identity,
    id: Uuid,
    title: &str,
    kind: ArtifactKind,
    content: &str,
  ) -> Result<Artifact> {
    let owner = identity.owner()?;
    let now = Utc::now();
    let artifact = Artifact {
      id,
      title: title.to_owned(),
      kind,
      content: sanitize_document_content(content),
      status: ArtifactStatus::Complete,
      owner_id: owner.to_owned(),
      created_at: now,
      updated_at: now,
    };
    let stored = self
      .store
      .insert_or_update(artifact)
      .await
      .map_err(store_err)?;
    tracing::info!(artifact_id = %id, %kind, bytes = stored.content.len(), "artifact created");
    Ok(stored)
  }

  /// Fetch an artifact the caller owns. Artifacts of other owners are
  /// reported as missing.
  pub async fn find(&self, identity: &Identity, id: Uuid) -> Result<Artifact> {
    let owner = identity.owner()?;
    self
      .store
      .find_by_id(id)
      .await
      .map_err(store_err)?
      .filter(|a| a.owner_id == owner)
      .ok_or(Error::NotFound(id))
  }

  pub async fn list(&self, identity: &Identity, limit: Option<usize>) -> Result<Vec<Artifact>> {
    let owner = identity.owner()?;
    self
      .store
      .list_by_owner(owner, limit)
      .await
      .map_err(store_err)
  }

  pub async fn versions(&self, identity: &Identity, id: Uuid) -> Result<Vec<ArtifactVersion>> {
    self.find(identity, id).await?;
    self.store.versions(id).await.map_err(store_err)
  }

  /// Replace the content of an existing artifact.
  ///
  /// The raw `update` is checked against the stored content; what is
  /// persisted is its sanitised form. `kind`, owner and creation time are
  /// carried over unchanged.
  pub async fn commit_update(
    &self,
    identity: &Identity,
    id: Uuid,
    update: &str,
    expected_hash: Option<&str>,
  ) -> Result<Artifact> {
    let current = self.find(identity, id).await?;

    if expected_hash.is_some_and(|expected| current.content_hash() != expected) {
      tracing::warn!(artifact_id = %id, "stale update refused");
      return Err(Error::Conflict(id));
    }

    if let Err(reason) = is_update_safe(&current.content, update) {
      tracing::warn!(artifact_id = %id, %reason, "update rejected by safety gate");
      return Err(reason.into());
    }

    let artifact = Artifact {
      content: sanitize_document_content(update),
      status: ArtifactStatus::Complete,
      updated_at: Utc::now(),
      ..current
    };
    let stored = self
      .store
      .insert_or_update(artifact)
      .await
      .map_err(store_err)?;
    tracing::info!(artifact_id = %id, bytes = stored.content.len(), "artifact updated");
    Ok(stored)
  }
}
