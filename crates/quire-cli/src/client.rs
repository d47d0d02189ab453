//! Async HTTP client wrapping the quire JSON API.

use anyhow::{Context, Result, anyhow, bail};
use quire_core::{
  artifact::{Artifact, ArtifactMetadata, ArtifactVersion},
  request::CreateArtifactRequest,
};
use quire_stream::{AccumulatedArtifact, ArtifactAccumulator, FrameDecoder, StreamPart};
use reqwest::{Client, RequestBuilder, Response, header};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use uuid::Uuid;

/// Connection settings for the quire API.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
  pub base_url:        String,
  pub user:            String,
  pub identity_header: String,
}

/// The body the server sends alongside any non-2xx status.
#[derive(Deserialize)]
struct ErrorBody {
  error: String,
}

/// A committed update, as acknowledged by `PUT /artifacts/{id}`.
#[derive(Debug)]
pub struct Updated {
  pub metadata: ArtifactMetadata,
  pub etag:     Option<String>,
}

/// Async HTTP client for the quire JSON REST API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    // Generation can take minutes, so only the connect phase is bounded.
    let client = Client::builder()
      .connect_timeout(Duration::from_secs(10))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!(
      "{}/api{}",
      self.config.base_url.trim_end_matches('/'),
      path
    )
  }

  fn auth(&self, req: RequestBuilder) -> RequestBuilder {
    if self.config.user.is_empty() {
      req
    } else {
      req.header(self.config.identity_header.as_str(), &self.config.user)
    }
  }

  // ── Artifacts ─────────────────────────────────────────────────────────────

  /// `GET /api/artifacts[?limit=N]`
  pub async fn list(&self, limit: Option<usize>) -> Result<Vec<Artifact>> {
    let mut req = self.auth(self.client.get(self.url("/artifacts")));
    if let Some(limit) = limit {
      req = req.query(&[("limit", limit)]);
    }
    let resp = req.send().await.context("GET /artifacts failed")?;
    check(resp, "GET /artifacts")
      .await?
      .json()
      .await
      .context("deserialising artifacts")
  }

  /// `GET /api/artifacts/{id}`
  pub async fn get(&self, id: Uuid) -> Result<Artifact> {
    let resp = self
      .auth(self.client.get(self.url(&format!("/artifacts/{id}"))))
      .send()
      .await
      .context("GET /artifacts/{id} failed")?;
    check(resp, "GET /artifacts/{id}")
      .await?
      .json()
      .await
      .context("deserialising artifact")
  }

  /// `GET /api/artifacts/{id}/versions`
  pub async fn versions(&self, id: Uuid) -> Result<Vec<ArtifactVersion>> {
    let resp = self
      .auth(self.client.get(self.url(&format!("/artifacts/{id}/versions"))))
      .send()
      .await
      .context("GET /artifacts/{id}/versions failed")?;
    check(resp, "GET /artifacts/{id}/versions")
      .await?
      .json()
      .await
      .context("deserialising versions")
  }

  /// `POST /api/artifacts`
  ///
  /// Reads the data stream as it arrives. `on_progress` sees the artifact
  /// after every part that changed it; the settled artifact is returned.
  pub async fn create(
    &self,
    request: &CreateArtifactRequest,
    mut on_progress: impl FnMut(&AccumulatedArtifact),
  ) -> Result<AccumulatedArtifact> {
    let resp = self
      .auth(self.client.post(self.url("/artifacts")))
      .json(request)
      .send()
      .await
      .context("POST /artifacts failed")?;
    let mut resp = check(resp, "POST /artifacts").await?;

    let mut decoder = FrameDecoder::new();
    let mut accumulator = ArtifactAccumulator::new();
    let mut apply = |part: StreamPart| -> Result<()> {
      if let StreamPart::Error(message) = &part {
        bail!("server reported: {message}");
      }
      if accumulator.apply_part(&part) > 0
        && let Some(artifact) = accumulator.iter().next()
      {
        on_progress(artifact);
      }
      Ok(())
    };

    while let Some(bytes) = resp.chunk().await.context("reading data stream")? {
      for part in decoder.push(&bytes)? {
        apply(part)?;
      }
    }
    if let Some(part) = decoder.finish()? {
      apply(part)?;
    }

    accumulator
      .iter()
      .next()
      .cloned()
      .ok_or_else(|| anyhow!("stream ended before the artifact started"))
  }

  /// `PUT /api/artifacts/{id}`
  ///
  /// Exactly one of `content` (a direct save) or `description` (a
  /// regeneration) is expected. `if_match` makes the save conditional on the
  /// stored content hash.
  pub async fn update(
    &self,
    id: Uuid,
    content: Option<String>,
    description: Option<String>,
    if_match: Option<&str>,
  ) -> Result<Updated> {
    let mut req = self
      .auth(self.client.put(self.url(&format!("/artifacts/{id}"))))
      .json(&json!({
        "content": content,
        "description": description.unwrap_or_default(),
      }));
    if let Some(hash) = if_match {
      req = req.header(header::IF_MATCH, format!("\"{}\"", hash.trim_matches('"')));
    }
    let resp = req.send().await.context("PUT /artifacts/{id} failed")?;
    let resp = check(resp, "PUT /artifacts/{id}").await?;

    let etag = resp
      .headers()
      .get(header::ETAG)
      .and_then(|v| v.to_str().ok())
      .map(|v| v.trim_matches('"').to_owned());
    let metadata = resp.json().await.context("deserialising update ack")?;
    Ok(Updated { metadata, etag })
  }
}

/// Pass a successful response through; turn anything else into an error
/// carrying the server's message.
async fn check(resp: Response, what: &str) -> Result<Response> {
  let status = resp.status();
  if status.is_success() {
    return Ok(resp);
  }
  let message = resp
    .json::<ErrorBody>()
    .await
    .map(|b| b.error)
    .unwrap_or_else(|_| status.canonical_reason().unwrap_or("").to_owned());
  Err(anyhow!("{what} → {status}: {message}"))
}
