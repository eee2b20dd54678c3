//! Run context and the deltas stages return.
//!
//! Stages never mutate the context directly: each returns a [`StageDelta`]
//! which the orchestrator folds in with [`RunContext::apply`].

use std::path::PathBuf;
use tracing::warn;

use mvgen_models::{LyricsRecord, RunConfig, RunId, SongPlanItem, VideoMetadata};

use crate::error::{WorkerError, WorkerResult};
use crate::layout::ArtifactLayout;

/// A lyrics record together with the file it lives in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LyricsArtifact {
    pub path: PathBuf,
    pub record: LyricsRecord,
}

impl LyricsArtifact {
    /// Index prefix of the artifact file name, if any.
    pub fn index(&self) -> Option<u32> {
        let name = self.path.file_name()?.to_str()?;
        let digits: String = name.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse().ok()
    }

    pub async fn load(path: PathBuf) -> WorkerResult<Self> {
        let content = tokio::fs::read_to_string(&path).await?;
        Ok(Self {
            record: LyricsRecord::parse(&content),
            path,
        })
    }
}

/// What a stage produced.
#[derive(Debug, Clone)]
pub enum StageDelta {
    Planned(Vec<SongPlanItem>),
    Drafted(Vec<LyricsArtifact>),
    Refined(Vec<LyricsArtifact>),
    Synthesized(Vec<PathBuf>),
    Assembled(PathBuf),
    Described(VideoMetadata),
    Published(String),
    Reported(PathBuf),
}

/// Everything a run knows while it is active.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: RunId,
    pub config: RunConfig,
    pub plan: Vec<SongPlanItem>,
    /// Lyrics artifacts in natural order
    pub lyrics: Vec<LyricsArtifact>,
    /// Synthesized audio in natural order
    pub songs: Vec<PathBuf>,
    pub video_path: Option<PathBuf>,
    pub metadata: Option<VideoMetadata>,
    pub youtube_url: Option<String>,
    pub report_path: Option<PathBuf>,
}

impl RunContext {
    pub fn new(run_id: RunId, config: RunConfig) -> Self {
        Self {
            run_id,
            config,
            plan: Vec::new(),
            lyrics: Vec::new(),
            songs: Vec::new(),
            video_path: None,
            metadata: None,
            youtube_url: None,
            report_path: None,
        }
    }

    pub fn apply(self, delta: StageDelta) -> Self {
        match delta {
            StageDelta::Planned(plan) => Self { plan, ..self },
            StageDelta::Drafted(lyrics) | StageDelta::Refined(lyrics) => Self { lyrics, ..self },
            StageDelta::Synthesized(songs) => Self { songs, ..self },
            StageDelta::Assembled(path) => Self {
                video_path: Some(path),
                ..self
            },
            StageDelta::Described(metadata) => Self {
                metadata: Some(metadata),
                ..self
            },
            StageDelta::Published(url) => Self {
                youtube_url: Some(url),
                ..self
            },
            StageDelta::Reported(path) => Self {
                report_path: Some(path),
                ..self
            },
        }
    }

    /// Rebuild the context from the artifacts on disk.
    pub async fn rehydrate(
        run_id: RunId,
        config: RunConfig,
        layout: &ArtifactLayout,
    ) -> WorkerResult<Self> {
        let mut ctx = Self::new(run_id, config);

        let plan_path = layout.song_plan_path();
        if plan_path.is_file() {
            let raw = tokio::fs::read_to_string(&plan_path).await?;
            match serde_json::from_str(&raw) {
                Ok(plan) => ctx.plan = plan,
                Err(e) => warn!("Ignoring unreadable song plan {}: {}", plan_path.display(), e),
            }
        }

        for path in layout.list_lyrics()? {
            ctx.lyrics.push(LyricsArtifact::load(path).await?);
        }
        ctx.songs = layout.list_songs()?;

        let video = layout.final_video_path();
        if video.is_file() {
            ctx.video_path = Some(video);
        }

        let metadata_path = layout.metadata_path();
        if metadata_path.is_file() {
            let raw = tokio::fs::read_to_string(&metadata_path).await?;
            let metadata = VideoMetadata::parse(&raw)
                .map_err(|e| WorkerError::artifact(&metadata_path, e))?;
            ctx.metadata = Some(metadata);
        }

        Ok(ctx)
    }

    /// Lyrics bodies in artifact order.
    pub fn lyric_bodies(&self) -> Vec<String> {
        self.lyrics
            .iter()
            .map(|artifact| artifact.record.prompt_body.clone())
            .collect()
    }
}
