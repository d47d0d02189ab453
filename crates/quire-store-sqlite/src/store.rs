//! [`SqliteStore`]: the SQLite implementation of [`DocumentStore`].

use std::path::Path;

use quire_core::{
  artifact::{Artifact, ArtifactVersion, content_hash},
  store::DocumentStore,
};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{ARTIFACT_COLUMNS, RawArtifact, RawVersion, encode_dt, encode_uuid},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Quire document store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store; useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── DocumentStore impl ──────────────────────────────────────────────────────

impl DocumentStore for SqliteStore {
  type Error = Error;

  async fn insert_or_update(&self, artifact: Artifact) -> Result<Artifact> {
    let id_str     = encode_uuid(artifact.id);
    let hash       = content_hash(&artifact.content);
    let created_at = encode_dt(artifact.created_at);
    let updated_at = encode_dt(artifact.updated_at);
    let kind_str   = artifact.kind.as_ref().to_owned();
    let status_str = artifact.status.as_ref().to_owned();
    let Artifact {
      title,
      content,
      owner_id,
      ..
    } = artifact;

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        // Identity columns are only written by the INSERT branch.
        tx.execute(
          "INSERT INTO artifacts
             (artifact_id, owner_id, title, kind, content, status, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
           ON CONFLICT(artifact_id) DO UPDATE SET
             title      = excluded.title,
             content    = excluded.content,
             status     = excluded.status,
             updated_at = excluded.updated_at",
          rusqlite::params![
            id_str, owner_id, title, kind_str, content, status_str, created_at, updated_at
          ],
        )?;
        tx.execute(
          "INSERT INTO artifact_versions
             (artifact_id, version, content_hash, content, recorded_at)
           SELECT ?1, COALESCE(MAX(version), 0) + 1, ?2, ?3, ?4
             FROM artifact_versions WHERE artifact_id = ?1",
          rusqlite::params![id_str, hash, content, updated_at],
        )?;
        let raw = tx.query_row(
          &format!("SELECT {ARTIFACT_COLUMNS} FROM artifacts WHERE artifact_id = ?1"),
          rusqlite::params![id_str],
          RawArtifact::from_row,
        )?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    let stored = raw.into_artifact()?;
    tracing::debug!(artifact_id = %stored.id, "artifact row written");
    Ok(stored)
  }

  async fn find_by_id(&self, id: Uuid) -> Result<Option<Artifact>> {
    let id_str = encode_uuid(id);
    let raw: Option<RawArtifact> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {ARTIFACT_COLUMNS} FROM artifacts WHERE artifact_id = ?1"),
            rusqlite::params![id_str],
            RawArtifact::from_row,
          )
          .optional()?)
      })
      .await?;
    raw.map(RawArtifact::into_artifact).transpose()
  }

  async fn list_by_owner<'a>(
    &'a self,
    owner_id: &'a str,
    limit: Option<usize>,
  ) -> Result<Vec<Artifact>> {
    let owner = owner_id.to_owned();
    // SQLite treats a negative LIMIT as "no limit".
    let limit = limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));

    let raws: Vec<RawArtifact> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ARTIFACT_COLUMNS} FROM artifacts
           WHERE owner_id = ?1
           ORDER BY updated_at DESC, rowid DESC
           LIMIT ?2"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![owner, limit], RawArtifact::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawArtifact::into_artifact).collect()
  }

  async fn versions(&self, id: Uuid) -> Result<Vec<ArtifactVersion>> {
    let id_str = encode_uuid(id);
    let raws: Vec<RawVersion> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT artifact_id, version, content_hash, content, recorded_at
           FROM artifact_versions
           WHERE artifact_id = ?1
           ORDER BY version ASC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawVersion {
              artifact_id:  row.get(0)?,
              version:      row.get(1)?,
              content_hash: row.get(2)?,
              content:      row.get(3)?,
              recorded_at:  row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawVersion::into_version).collect()
  }
}
