//! Worker configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use mvgen_media::{AssemblerConfig, CaptionStyle};
use mvgen_models::EncodingProfile;

use crate::error::{WorkerError, WorkerResult};
use crate::layout::ArtifactLayout;

/// Default YouTube privacy status for uploads.
pub const DEFAULT_PRIVACY_STATUS: &str = "private";

/// Credentials and endpoints of the third-party providers.
#[derive(Clone, Default)]
pub struct ProviderConfig {
    pub gemini_api_key: Option<String>,
    /// Browser cookie string for the music service session
    pub suno_cookie: Option<String>,
    pub suno_project_id: Option<String>,
    /// OAuth access token with the youtube.upload scope
    pub youtube_access_token: Option<String>,
    pub youtube_privacy_status: String,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("gemini_api_key", &self.gemini_api_key.as_ref().map(|_| "***"))
            .field("suno_cookie", &self.suno_cookie.as_ref().map(|_| "***"))
            .field("suno_project_id", &self.suno_project_id)
            .field("youtube_access_token", &self.youtube_access_token.as_ref().map(|_| "***"))
            .field("youtube_privacy_status", &self.youtube_privacy_status)
            .finish()
    }
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Root of the project whose artifacts a run reads and writes
    pub project_dir: PathBuf,
    pub lyrics_dir: PathBuf,
    pub songs_dir: PathBuf,
    pub clips_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Parent of per-render temporary directories
    pub work_dir: PathBuf,
    /// Timeout of a single FFmpeg invocation
    pub ffmpeg_timeout: Option<Duration>,
    /// FFmpeg encoder threads for the final render
    pub ffmpeg_threads: usize,
    /// Crossfade between adjacent clips
    pub transition_secs: f64,
    /// Caption font; fontconfig's default when unset
    pub caption_font: Option<PathBuf>,
    pub providers: ProviderConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::with_project_dir(".")
    }
}

fn env_path(key: &str, project_dir: &Path, default: &str) -> PathBuf {
    let value = std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string());
    let path = PathBuf::from(value);
    if path.is_absolute() {
        path
    } else {
        project_dir.join(path)
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl WorkerConfig {
    /// Standard layout under `project_dir`.
    pub fn with_project_dir(project_dir: impl Into<PathBuf>) -> Self {
        let project_dir = project_dir.into();
        Self {
            lyrics_dir: project_dir.join("lyrics"),
            songs_dir: project_dir.join("songs"),
            clips_dir: project_dir.join("clips"),
            output_dir: project_dir.join("output"),
            work_dir: std::env::temp_dir().join("mvgen"),
            project_dir,
            ffmpeg_timeout: None,
            ffmpeg_threads: mvgen_models::encoding::DEFAULT_THREADS,
            transition_secs: mvgen_media::assembler::DEFAULT_TRANSITION_SECS,
            caption_font: None,
            providers: ProviderConfig {
                youtube_privacy_status: DEFAULT_PRIVACY_STATUS.to_string(),
                ..Default::default()
            },
        }
    }

    /// Create config from environment variables.
    ///
    /// Relative artifact directories are resolved against the project
    /// directory.
    pub fn from_env() -> Self {
        let project_dir = PathBuf::from(
            env_string("MVGEN_PROJECT_DIR").unwrap_or_else(|| ".".to_string()),
        );

        Self {
            lyrics_dir: env_path("MVGEN_LYRICS_DIR", &project_dir, "lyrics"),
            songs_dir: env_path("MVGEN_SONGS_DIR", &project_dir, "songs"),
            clips_dir: env_path("MVGEN_CLIPS_DIR", &project_dir, "clips"),
            output_dir: env_path("MVGEN_OUTPUT_DIR", &project_dir, "output"),
            work_dir: env_string("MVGEN_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join("mvgen")),
            ffmpeg_timeout: std::env::var("MVGEN_FFMPEG_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            ffmpeg_threads: std::env::var("MVGEN_FFMPEG_THREADS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(mvgen_models::encoding::DEFAULT_THREADS),
            transition_secs: std::env::var("MVGEN_TRANSITION_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs: &f64| secs.is_finite() && *secs >= 0.0)
                .unwrap_or(mvgen_media::assembler::DEFAULT_TRANSITION_SECS),
            caption_font: env_string("MVGEN_CAPTION_FONT").map(PathBuf::from),
            providers: ProviderConfig {
                gemini_api_key: env_string("GEMINI_API_KEY"),
                suno_cookie: env_string("SUNO_COOKIE"),
                suno_project_id: env_string("SUNO_PROJECT_ID"),
                youtube_access_token: env_string("YOUTUBE_ACCESS_TOKEN"),
                youtube_privacy_status: env_string("YOUTUBE_PRIVACY_STATUS")
                    .unwrap_or_else(|| DEFAULT_PRIVACY_STATUS.to_string()),
            },
            project_dir,
        }
    }

    /// Check the project directory and create the output directories.
    ///
    /// The clips directory is never created: missing clips are reported when
    /// the video is assembled.
    pub fn validate(&self) -> WorkerResult<()> {
        if !self.project_dir.is_dir() {
            return Err(WorkerError::config_error(format!(
                "project directory {} does not exist",
                self.project_dir.display()
            )));
        }
        if self.ffmpeg_threads == 0 {
            return Err(WorkerError::config_error("ffmpeg threads must be at least 1"));
        }

        for dir in [&self.lyrics_dir, &self.songs_dir, &self.output_dir, &self.work_dir] {
            std::fs::create_dir_all(dir).map_err(|e| {
                WorkerError::config_error(format!("cannot create {}: {}", dir.display(), e))
            })?;
        }
        Ok(())
    }

    /// Artifact layout of the project.
    pub fn layout(&self) -> ArtifactLayout {
        ArtifactLayout::new(
            &self.lyrics_dir,
            &self.songs_dir,
            &self.clips_dir,
            &self.output_dir,
        )
    }

    /// Assembler settings rendering to the canonical video path.
    pub fn assembler_config(&self) -> AssemblerConfig {
        let profile = EncodingProfile::default().with_threads(self.ffmpeg_threads);
        let mut style = CaptionStyle::default();
        if let Some(font) = &self.caption_font {
            style = style.with_font_file(font);
        }

        let mut config = AssemblerConfig::new(
            &self.clips_dir,
            self.layout().final_video_path(),
            &self.work_dir,
        )
        .with_transition(self.transition_secs)
        .with_profile(profile)
        .with_caption_style(style);

        if let Some(timeout) = self.ffmpeg_timeout {
            config = config.with_timeout(timeout.as_secs());
        }
        config
    }
}
