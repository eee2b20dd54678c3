//! Third-party collaborator interfaces.
//!
//! Stage bodies only talk to the outside world through these traits. Real
//! implementations live in [`crate::clients`]; tests pass fakes.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use mvgen_media::{AssemblerConfig, MediaAssembler};
use mvgen_models::{Gender, PlanEntry, VideoMetadata};

use crate::error::WorkerResult;
use crate::progress::RenderCallback;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanRequest {
    pub prompt: String,
    pub total: u32,
    pub language: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LyricsRequest {
    /// Detailed prompt embedding the planned title and description
    pub prompt: String,
    pub style: String,
    pub language: String,
    pub gender: Gender,
    /// 1-based position of the song
    pub index: u32,
    pub total: u32,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentalRequest {
    pub prompt: String,
    pub style: String,
    pub language: String,
    pub index: u32,
    pub total: u32,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefineRequest {
    pub original_prompt: String,
    pub draft: String,
    pub style: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRequest {
    pub prompt: String,
    pub style: String,
    pub lyrics_sample: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisRequest {
    pub lyrics: String,
    pub tags: String,
    pub title: String,
    pub gender: Gender,
    pub instrumental: bool,
    pub model: String,
    /// Index prefix of the audio file names
    pub index: u32,
    /// Directory the audio files are written to
    pub dest_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    pub video_path: PathBuf,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
}

/// Inputs of one assembly, rebuilt on every ASSEMBLE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyJob {
    pub audio_paths: Vec<PathBuf>,
    /// One text per audio path when `subtitles` is set
    pub lyrics_texts: Vec<String>,
    pub subtitles: bool,
}

/// Text generation for plans, lyrics and metadata.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate_song_plan(&self, request: &PlanRequest) -> WorkerResult<Vec<PlanEntry>>;

    /// Raw lyrics record text with TITLE/PROMPT/TAGS sections.
    async fn generate_lyrics(&self, request: &LyricsRequest) -> WorkerResult<String>;

    async fn generate_instrumental_prompt(
        &self,
        request: &InstrumentalRequest,
    ) -> WorkerResult<String>;

    /// Refined lyrics body.
    async fn refine_lyrics(&self, request: &RefineRequest) -> WorkerResult<String>;

    async fn generate_metadata(&self, request: &MetadataRequest) -> WorkerResult<VideoMetadata>;
}

/// Music synthesis.
#[async_trait]
pub trait SongSynthesizer: Send + Sync {
    /// Synthesize and download every take; returns the written paths.
    async fn synthesize(&self, request: &SynthesisRequest) -> WorkerResult<Vec<PathBuf>>;
}

/// Video publishing.
#[async_trait]
pub trait VideoPublisher: Send + Sync {
    /// Upload and return the public URL.
    async fn publish(&self, request: &PublishRequest) -> WorkerResult<String>;
}

/// Video assembly.
#[async_trait]
pub trait VideoAssembler: Send + Sync {
    async fn assemble(
        &self,
        job: AssemblyJob,
        cancel: watch::Receiver<bool>,
        on_progress: RenderCallback,
    ) -> WorkerResult<PathBuf>;
}

/// [`VideoAssembler`] rendering with FFmpeg.
#[derive(Debug, Clone)]
pub struct FfmpegAssembler {
    config: AssemblerConfig,
}

impl FfmpegAssembler {
    pub fn new(config: AssemblerConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl VideoAssembler for FfmpegAssembler {
    async fn assemble(
        &self,
        job: AssemblyJob,
        cancel: watch::Receiver<bool>,
        on_progress: RenderCallback,
    ) -> WorkerResult<PathBuf> {
        let assembler = MediaAssembler::new(self.config.clone()).with_cancel(cancel);
        let output = assembler
            .assemble_with_progress(&job.audio_paths, &job.lyrics_texts, job.subtitles, on_progress)
            .await?;
        Ok(output.path)
    }
}

/// Collaborators of a run.
#[derive(Clone)]
pub struct Collaborators {
    pub language_model: Arc<dyn LanguageModel>,
    pub synthesizer: Arc<dyn SongSynthesizer>,
    pub publisher: Arc<dyn VideoPublisher>,
    pub assembler: Arc<dyn VideoAssembler>,
}

impl Collaborators {
    pub fn new(
        language_model: Arc<dyn LanguageModel>,
        synthesizer: Arc<dyn SongSynthesizer>,
        publisher: Arc<dyn VideoPublisher>,
        assembler: Arc<dyn VideoAssembler>,
    ) -> Self {
        Self {
            language_model,
            synthesizer,
            publisher,
            assembler,
        }
    }
}
