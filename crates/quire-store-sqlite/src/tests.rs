//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{Duration, Utc};
use quire_core::{
  artifact::{Artifact, ArtifactKind, ArtifactStatus, content_hash},
  store::DocumentStore,
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn artifact(owner: &str, title: &str, kind: ArtifactKind, content: &str) -> Artifact {
  let now = Utc::now();
  Artifact {
    id: Uuid::new_v4(),
    title: title.into(),
    kind,
    content: content.into(),
    status: ArtifactStatus::Complete,
    owner_id: owner.into(),
    created_at: now,
    updated_at: now,
  }
}

#[tokio::test]
async fn insert_and_find() {
  let s = store().await;
  let a = artifact("alice", "Q3 Report", ArtifactKind::Text, "# Q3\n");

  let stored = s.insert_or_update(a.clone()).await.unwrap();
  assert_eq!(stored.id, a.id);
  assert_eq!(stored.kind, ArtifactKind::Text);

  let fetched = s.find_by_id(a.id).await.unwrap().unwrap();
  assert_eq!(fetched.title, "Q3 Report");
  assert_eq!(fetched.content, "# Q3\n");
  assert_eq!(fetched.owner_id, "alice");
  assert_eq!(fetched.status, ArtifactStatus::Complete);
}

#[tokio::test]
async fn find_missing_returns_none() {
  let s = store().await;
  assert!(s.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn update_keeps_identity_fields() {
  let s = store().await;
  let original = s
    .insert_or_update(artifact("alice", "Script", ArtifactKind::Code, "print(1)"))
    .await
    .unwrap();

  let later = original.updated_at + Duration::seconds(5);
  let updated = s
    .insert_or_update(Artifact {
      kind: ArtifactKind::Sheet,
      owner_id: "mallory".into(),
      created_at: later,
      content: "print(2)".into(),
      title: "Script v2".into(),
      updated_at: later,
      ..original.clone()
    })
    .await
    .unwrap();

  assert_eq!(updated.kind, ArtifactKind::Code);
  assert_eq!(updated.owner_id, "alice");
  assert_eq!(updated.created_at, original.created_at);
  assert_eq!(updated.content, "print(2)");
  assert_eq!(updated.title, "Script v2");
  assert_eq!(updated.updated_at, later);
}

#[tokio::test]
async fn every_write_appends_a_version() {
  let s = store().await;
  let a = s
    .insert_or_update(artifact("alice", "Notes", ArtifactKind::Text, "one"))
    .await
    .unwrap();
  s.insert_or_update(Artifact {
    content: "two".into(),
    ..a.clone()
  })
  .await
  .unwrap();

  let versions = s.versions(a.id).await.unwrap();
  assert_eq!(versions.len(), 2);
  assert_eq!(versions[0].version, 1);
  assert_eq!(versions[0].content, "one");
  assert_eq!(versions[1].version, 2);
  assert_eq!(versions[1].content_hash, content_hash("two"));

  assert!(s.versions(Uuid::new_v4()).await.unwrap().is_empty());
}

#[tokio::test]
async fn list_is_scoped_to_owner_newest_first() {
  let s = store().await;
  let base = Utc::now();
  for (i, owner) in ["alice", "bob", "alice", "alice"].into_iter().enumerate() {
    let at = base + Duration::seconds(i as i64);
    s.insert_or_update(Artifact {
      created_at: at,
      updated_at: at,
      ..artifact(owner, &format!("doc {i}"), ArtifactKind::Text, "x")
    })
    .await
    .unwrap();
  }

  let titles: Vec<String> = s
    .list_by_owner("alice", None)
    .await
    .unwrap()
    .into_iter()
    .map(|a| a.title)
    .collect();
  assert_eq!(titles, ["doc 3", "doc 2", "doc 0"]);

  let limited = s.list_by_owner("alice", Some(1)).await.unwrap();
  assert_eq!(limited.len(), 1);
  assert_eq!(limited[0].title, "doc 3");

  assert!(s.list_by_owner("carol", None).await.unwrap().is_empty());
}

#[tokio::test]
async fn every_kind_round_trips() {
  let s = store().await;
  for kind in [ArtifactKind::Text, ArtifactKind::Code, ArtifactKind::Image, ArtifactKind::Sheet] {
    let a = s
      .insert_or_update(artifact("alice", "k", kind, "body"))
      .await
      .unwrap();
    assert_eq!(s.find_by_id(a.id).await.unwrap().unwrap().kind, kind);
  }
}
