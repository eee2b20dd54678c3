//! HTTP implementations of the collaborator traits.

pub mod gemini;
pub mod suno;
pub mod youtube;

use std::sync::Arc;

pub use gemini::GeminiClient;
pub use suno::SunoClient;
pub use youtube::YouTubeClient;

use crate::collaborators::{Collaborators, FfmpegAssembler};
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};

/// Build the production collaborators; every credential must be present.
pub fn from_config(config: &WorkerConfig) -> WorkerResult<Collaborators> {
    let providers = &config.providers;
    let missing = |name: &str| WorkerError::config_error(format!("{} not set", name));

    let gemini = GeminiClient::new(
        providers
            .gemini_api_key
            .clone()
            .ok_or_else(|| missing("GEMINI_API_KEY"))?,
    );
    let suno = SunoClient::new(
        providers
            .suno_cookie
            .clone()
            .ok_or_else(|| missing("SUNO_COOKIE"))?,
        providers.suno_project_id.clone(),
    );
    let youtube = YouTubeClient::new(
        providers
            .youtube_access_token
            .clone()
            .ok_or_else(|| missing("YOUTUBE_ACCESS_TOKEN"))?,
        providers.youtube_privacy_status.clone(),
    )?;

    Ok(Collaborators::new(
        Arc::new(gemini),
        Arc::new(suno),
        Arc::new(youtube),
        Arc::new(FfmpegAssembler::new(config.assembler_config())),
    ))
}
