//! Music video pipeline worker.
//!
//! This crate provides:
//! - Resumable stage orchestration from on-disk artifacts
//! - Stage bodies for planning, lyrics, synthesis, assembly and publishing
//! - Collaborator traits and their HTTP clients
//! - Run registry with progress and cancellation

pub mod checkpoint;
pub mod clients;
pub mod collaborators;
pub mod config;
pub mod context;
pub mod error;
pub mod layout;
pub mod logging;
pub mod orchestrator;
pub mod progress;
pub mod registry;
pub mod retry;
pub mod stages;

pub use checkpoint::{route, ArtifactScanner, CheckpointSnapshot};
pub use collaborators::{
    AssemblyJob, Collaborators, FfmpegAssembler, LanguageModel, SongSynthesizer, VideoAssembler,
    VideoPublisher,
};
pub use config::WorkerConfig;
pub use context::{LyricsArtifact, RunContext, StageDelta};
pub use error::{WorkerError, WorkerResult};
pub use layout::ArtifactLayout;
pub use logging::RunLogger;
pub use orchestrator::PipelineOrchestrator;
pub use progress::{ProgressReporter, StageProgress};
pub use registry::RunRegistry;
