//! Suno studio client for song synthesis.
//!
//! Flow: exchange the browser session cookie for a JWT, submit a custom-mode
//! generation, poll the feed until every clip is complete, then download
//! each clip into the songs directory.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, COOKIE, USER_AGENT};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use mvgen_media::write_atomic;
use mvgen_models::{Gender, LyricsRecord};

use crate::collaborators::{SongSynthesizer, SynthesisRequest};
use crate::error::{WorkerError, WorkerResult};

const CLERK_CLIENT_URL: &str =
    "https://clerk.suno.com/v1/client?__clerk_api_version=2025-04-10&_clerk_js_version=5.102.0";
const API_BASE: &str = "https://studio-api.prod.suno.com/api";
const BROWSER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/141.0.0.0";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    project_id: Option<&'a str>,
    generation_type: &'static str,
    mv: &'a str,
    prompt: &'a str,
    tags: &'a str,
    title: &'a str,
    make_instrumental: bool,
    metadata: GenerateMetadata,
}

#[derive(Debug, Serialize)]
struct GenerateMetadata {
    create_mode: &'static str,
    stream: bool,
    priority: u32,
    control_sliders: ControlSliders,
    #[serde(skip_serializing_if = "Option::is_none")]
    vocal_gender: Option<&'static str>,
}

#[derive(Debug, Serialize)]
struct ControlSliders {
    style_weight: f64,
    weirdness_constraint: f64,
}

#[derive(Debug, Deserialize)]
struct ClipsResponse {
    #[serde(default)]
    clips: Vec<Clip>,
}

#[derive(Debug, Clone, Deserialize)]
struct Clip {
    id: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct DownloadResponse {
    url: Option<String>,
}

/// Wire value of a vocal gender.
fn vocal_gender(gender: Gender) -> &'static str {
    match gender {
        Gender::Female => "f",
        Gender::Male => "m",
    }
}

/// JWT of the last active Clerk session.
fn session_jwt(body: &Value) -> Option<String> {
    body.pointer("/response/sessions/0/last_active_token/jwt")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Suno API client.
pub struct SunoClient {
    client: Client,
    cookie: String,
    device_id: String,
    project_id: Option<String>,
    poll_interval: Duration,
    poll_timeout: Duration,
    token: Mutex<Option<String>>,
}

impl SunoClient {
    pub fn new(cookie: impl Into<String>, project_id: Option<String>) -> Self {
        Self {
            client: Client::new(),
            cookie: cookie.into(),
            device_id: Uuid::new_v4().to_string(),
            project_id,
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            token: Mutex::new(None),
        }
    }

    fn base_headers(&self) -> WorkerResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_AGENT));
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&self.cookie)
                .map_err(|_| WorkerError::config_error("SUNO_COOKIE is not a valid header value"))?,
        );
        headers.insert(
            "device-id",
            HeaderValue::from_str(&self.device_id)
                .map_err(|e| WorkerError::collaborator("synthesize", e.to_string()))?,
        );
        Ok(headers)
    }

    async fn authed_headers(&self) -> WorkerResult<HeaderMap> {
        let token = self.session_token().await?;
        let mut headers = self.base_headers()?;
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| WorkerError::collaborator("synthesize", e.to_string()))?,
        );
        Ok(headers)
    }

    async fn session_token(&self) -> WorkerResult<String> {
        let mut token = self.token.lock().await;
        if let Some(jwt) = token.as_ref() {
            return Ok(jwt.clone());
        }

        let response = self
            .client
            .get(CLERK_CLIENT_URL)
            .headers(self.base_headers()?)
            .send()
            .await
            .map_err(|e| WorkerError::collaborator("suno_session", e.to_string()))?;
        let body: Value = Self::checked(response, "suno_session").await?.json().await.map_err(
            |e| WorkerError::collaborator("suno_session", format!("unreadable response: {}", e)),
        )?;

        let jwt = session_jwt(&body).ok_or_else(|| {
            WorkerError::collaborator("suno_session", "no active session token in Clerk response")
        })?;
        *token = Some(jwt.clone());
        Ok(jwt)
    }

    async fn checked(
        response: reqwest::Response,
        operation: &str,
    ) -> WorkerResult<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(WorkerError::collaborator(
            operation,
            format!("Suno API returned {}: {}", status, body),
        ))
    }

    async fn generate(&self, request: &SynthesisRequest) -> WorkerResult<Vec<Clip>> {
        let payload = GenerateRequest {
            project_id: self.project_id.as_deref(),
            generation_type: "TEXT",
            mv: &request.model,
            prompt: &request.lyrics,
            tags: &request.tags,
            title: &request.title,
            make_instrumental: request.instrumental,
            metadata: GenerateMetadata {
                create_mode: "custom",
                stream: true,
                priority: 10,
                control_sliders: ControlSliders {
                    style_weight: 0.5,
                    weirdness_constraint: 0.5,
                },
                vocal_gender: (!request.instrumental).then(|| vocal_gender(request.gender)),
            },
        };

        let response = self
            .client
            .post(format!("{}/generate/v2-web/", API_BASE))
            .headers(self.authed_headers().await?)
            .json(&payload)
            .send()
            .await
            .map_err(|e| WorkerError::collaborator("suno_generate", e.to_string()))?;

        let clips: ClipsResponse = Self::checked(response, "suno_generate")
            .await?
            .json()
            .await
            .map_err(|e| WorkerError::collaborator("suno_generate", e.to_string()))?;

        if clips.clips.is_empty() {
            return Err(WorkerError::collaborator("suno_generate", "no clips were queued"));
        }
        Ok(clips.clips)
    }

    async fn wait_for_clips(&self, ids: &[String]) -> WorkerResult<Vec<Clip>> {
        let url = format!("{}/feed/v2?ids={}", API_BASE, ids.join(","));
        let deadline = Instant::now() + self.poll_timeout;

        loop {
            let response = self
                .client
                .get(&url)
                .headers(self.authed_headers().await?)
                .send()
                .await
                .map_err(|e| WorkerError::collaborator("suno_poll", e.to_string()))?;
            let feed: ClipsResponse = Self::checked(response, "suno_poll")
                .await?
                .json()
                .await
                .map_err(|e| WorkerError::collaborator("suno_poll", e.to_string()))?;

            if let Some(failed) = feed.clips.iter().find(|c| c.status == "error") {
                return Err(WorkerError::collaborator(
                    "suno_poll",
                    format!("clip {} failed to generate", failed.id),
                ));
            }
            if !feed.clips.is_empty() && feed.clips.iter().all(|c| c.status == "complete") {
                return Ok(feed.clips);
            }

            if Instant::now() >= deadline {
                return Err(WorkerError::collaborator(
                    "suno_poll",
                    format!("clips not complete after {:?}", self.poll_timeout),
                ));
            }
            debug!("Clips not ready, polling again in {:?}", self.poll_interval);
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn download(&self, clip_id: &str, dest: PathBuf) -> WorkerResult<PathBuf> {
        let response = self
            .client
            .post(format!("{}/billing/clips/{}/download/", API_BASE, clip_id))
            .headers(self.authed_headers().await?)
            .send()
            .await
            .map_err(|e| WorkerError::collaborator("suno_download", e.to_string()))?;
        let link: DownloadResponse = Self::checked(response, "suno_download")
            .await?
            .json()
            .await
            .map_err(|e| WorkerError::collaborator("suno_download", e.to_string()))?;
        let url = link
            .url
            .ok_or_else(|| WorkerError::collaborator("suno_download", "no download URL"))?;

        let audio = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| WorkerError::collaborator("suno_download", e.to_string()))?;
        let bytes = Self::checked(audio, "suno_download")
            .await?
            .bytes()
            .await
            .map_err(|e| WorkerError::collaborator("suno_download", e.to_string()))?;

        write_atomic(&dest, &bytes).await?;
        Ok(dest)
    }
}

#[async_trait]
impl SongSynthesizer for SunoClient {
    async fn synthesize(&self, request: &SynthesisRequest) -> WorkerResult<Vec<PathBuf>> {
        let queued = self.generate(request).await?;
        let ids: Vec<String> = queued.into_iter().map(|c| c.id).collect();
        info!(title = %request.title, clips = ids.len(), "Synthesis queued");

        let clips = self.wait_for_clips(&ids).await?;

        let mut paths = Vec::with_capacity(clips.len());
        for (take, clip) in clips.iter().enumerate() {
            let name = LyricsRecord::audio_file_name(request.index, &request.title, take + 1);
            match self.download(&clip.id, request.dest_dir.join(name)).await {
                Ok(path) => paths.push(path),
                Err(e) => warn!("Download of clip {} failed: {}", clip.id, e),
            }
        }

        if paths.is_empty() {
            return Err(WorkerError::collaborator(
                "synthesize",
                format!("no clip of \"{}\" could be downloaded", request.title),
            ));
        }
        Ok(paths)
    }
}
