//! YouTube Data API client using the resumable upload protocol.
//!
//! An upload session is opened with the video metadata, then the file is
//! sent in chunks with `Content-Range`. Server errors (5xx) and dropped
//! connections are retried with exponential backoff; before a retried chunk
//! the session is queried for the offset the server actually holds.

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, LOCATION, RANGE};
use reqwest::{redirect, Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info};
use url::Url;

use crate::collaborators::{PublishRequest, VideoPublisher};
use crate::error::{WorkerError, WorkerResult};
use crate::retry::{retry_async_when, RetryConfig};

const UPLOAD_URL: &str =
    "https://www.googleapis.com/upload/youtube/v3/videos?uploadType=resumable&part=snippet,status";
const WATCH_URL: &str = "https://www.youtube.com/watch?v=";
/// "Music"
const MUSIC_CATEGORY: &str = "10";
/// Multiple of 256 KiB, as the protocol requires for non-final chunks.
const CHUNK_SIZE: u64 = 8 * 1024 * 1024;
const MAX_RETRIES: u32 = 5;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoResource<'a> {
    snippet: Snippet<'a>,
    status: PrivacyStatus<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Snippet<'a> {
    title: &'a str,
    description: &'a str,
    tags: &'a [String],
    category_id: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrivacyStatus<'a> {
    privacy_status: &'a str,
}

#[derive(Debug, Deserialize)]
struct UploadedVideo {
    id: String,
}

/// Where an upload session stands.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ChunkOutcome {
    /// Server holds bytes `0..next`
    Incomplete(u64),
    /// Upload finished; the video ID
    Done(String),
}

#[derive(Debug)]
struct UploadFailure {
    transient: bool,
    message: String,
}

impl UploadFailure {
    fn network(e: reqwest::Error) -> Self {
        Self {
            transient: true,
            message: format!("connection failed: {}", e),
        }
    }

    fn status(status: StatusCode, body: String) -> Self {
        Self {
            transient: status.is_server_error(),
            message: format!("YouTube API returned {}: {}", status, body),
        }
    }

    fn fatal(message: impl Into<String>) -> Self {
        Self {
            transient: false,
            message: message.into(),
        }
    }
}

impl fmt::Display for UploadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<UploadFailure> for WorkerError {
    fn from(e: UploadFailure) -> Self {
        WorkerError::collaborator("publish", e.message)
    }
}

/// Offset after a `Range: bytes=0-N` header.
fn next_offset(range: Option<&str>) -> u64 {
    range
        .and_then(|r| r.trim().strip_prefix("bytes="))
        .and_then(|r| r.split('-').nth(1))
        .and_then(|end| end.trim().parse::<u64>().ok())
        .map(|end| end + 1)
        .unwrap_or(0)
}

fn content_range(start: u64, len: u64, total: u64) -> String {
    if len == 0 {
        format!("bytes */{}", total)
    } else {
        format!("bytes {}-{}/{}", start, start + len - 1, total)
    }
}

/// YouTube upload client.
pub struct YouTubeClient {
    client: Client,
    access_token: String,
    privacy_status: String,
    retry: RetryConfig,
}

impl YouTubeClient {
    pub fn new(access_token: impl Into<String>, privacy_status: impl Into<String>) -> WorkerResult<Self> {
        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| WorkerError::config_error(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            access_token: access_token.into(),
            privacy_status: privacy_status.into(),
            retry: RetryConfig::new("youtube_upload")
                .with_max_retries(MAX_RETRIES)
                .with_base_delay(Duration::from_secs(1))
                .with_max_delay(Duration::from_secs(64)),
        })
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    async fn open_session(
        &self,
        request: &PublishRequest,
        total: u64,
    ) -> Result<String, UploadFailure> {
        let resource = VideoResource {
            snippet: Snippet {
                title: &request.title,
                description: &request.description,
                tags: &request.tags,
                category_id: MUSIC_CATEGORY,
            },
            status: PrivacyStatus {
                privacy_status: &self.privacy_status,
            },
        };

        let response = self
            .client
            .post(UPLOAD_URL)
            .header(AUTHORIZATION, self.bearer())
            .header("X-Upload-Content-Type", "video/mp4")
            .header("X-Upload-Content-Length", total.to_string())
            .json(&resource)
            .send()
            .await
            .map_err(UploadFailure::network)?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(UploadFailure::status(status, response.text().await.unwrap_or_default()));
        }

        response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Url::parse(v).ok())
            .map(String::from)
            .ok_or_else(|| UploadFailure::fatal("upload session has no valid Location header"))
    }

    async fn read_outcome(response: reqwest::Response) -> Result<ChunkOutcome, UploadFailure> {
        let status = response.status();
        if status.as_u16() == 308 {
            let range = response.headers().get(RANGE).and_then(|v| v.to_str().ok());
            return Ok(ChunkOutcome::Incomplete(next_offset(range)));
        }
        if status.is_success() {
            let video: UploadedVideo = response
                .json()
                .await
                .map_err(|e| UploadFailure::fatal(format!("unreadable upload response: {}", e)))?;
            return Ok(ChunkOutcome::Done(video.id));
        }
        Err(UploadFailure::status(status, response.text().await.unwrap_or_default()))
    }

    async fn query_offset(&self, session: &str, total: u64) -> Result<ChunkOutcome, UploadFailure> {
        let response = self
            .client
            .put(session)
            .header(AUTHORIZATION, self.bearer())
            .header(CONTENT_RANGE, content_range(0, 0, total))
            .header(CONTENT_LENGTH, 0)
            .send()
            .await
            .map_err(UploadFailure::network)?;
        Self::read_outcome(response).await
    }

    async fn put_chunk(
        &self,
        session: &str,
        path: &Path,
        start: u64,
        total: u64,
    ) -> Result<ChunkOutcome, UploadFailure> {
        let len = CHUNK_SIZE.min(total - start);
        let mut file = tokio::fs::File::open(path)
            .await
            .map_err(|e| UploadFailure::fatal(format!("cannot open video: {}", e)))?;
        file.seek(std::io::SeekFrom::Start(start))
            .await
            .map_err(|e| UploadFailure::fatal(e.to_string()))?;
        let mut chunk = vec![0u8; len as usize];
        file.read_exact(&mut chunk)
            .await
            .map_err(|e| UploadFailure::fatal(format!("cannot read video: {}", e)))?;

        let response = self
            .client
            .put(session)
            .header(AUTHORIZATION, self.bearer())
            .header(CONTENT_TYPE, "video/mp4")
            .header(CONTENT_RANGE, content_range(start, len, total))
            .body(chunk)
            .send()
            .await
            .map_err(UploadFailure::network)?;
        Self::read_outcome(response).await
    }

    async fn upload(&self, request: &PublishRequest) -> Result<String, UploadFailure> {
        let path = request.video_path.as_path();
        let total = tokio::fs::metadata(path)
            .await
            .map_err(|e| UploadFailure::fatal(format!("cannot stat {}: {}", path.display(), e)))?
            .len();
        if total == 0 {
            return Err(UploadFailure::fatal("video file is empty"));
        }

        let session = retry_async_when(
            &self.retry,
            || self.open_session(request, total),
            |e: &UploadFailure| e.transient,
        )
        .await
        .into_result()?;
        info!(bytes = total, "YouTube upload session opened");

        let mut offset = 0u64;
        loop {
            let attempts = AtomicU32::new(0);
            let attempts = &attempts;
            let session = session.as_str();

            let outcome = retry_async_when(
                &self.retry,
                || async move {
                    let mut start = offset;
                    if attempts.fetch_add(1, Ordering::SeqCst) > 0 {
                        match self.query_offset(session, total).await? {
                            ChunkOutcome::Done(id) => return Ok(ChunkOutcome::Done(id)),
                            ChunkOutcome::Incomplete(next) => start = next,
                        }
                    }
                    self.put_chunk(session, path, start, total).await
                },
                |e: &UploadFailure| e.transient,
            )
            .await
            .into_result()?;

            match outcome {
                ChunkOutcome::Done(id) => return Ok(id),
                ChunkOutcome::Incomplete(next) if next > offset => {
                    debug!("Uploaded {}/{} bytes", next, total);
                    offset = next;
                }
                ChunkOutcome::Incomplete(next) => {
                    return Err(UploadFailure::fatal(format!(
                        "upload stalled at byte {} of {}",
                        next, total
                    )));
                }
            }
        }
    }
}

#[async_trait]
impl VideoPublisher for YouTubeClient {
    async fn publish(&self, request: &PublishRequest) -> WorkerResult<String> {
        let id = self.upload(request).await?;
        let url = format!("{}{}", WATCH_URL, id);
        info!("Video uploaded: {}", url);
        Ok(url)
    }
}
