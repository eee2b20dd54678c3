//! Worker error types.

use std::path::PathBuf;
use thiserror::Error;

use mvgen_media::MediaError;
use mvgen_models::ModelError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("{operation} failed: {message}")]
    Collaborator { operation: String, message: String },

    #[error("Run already complete: a publication report exists")]
    AlreadyComplete,

    #[error("Missing clips: no .mp4/.mov files to assemble")]
    MissingClips,

    #[error("Not enough progress to resume")]
    NotEnoughProgress,

    #[error("Run cancelled")]
    Cancelled,

    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("Invalid artifact {path}: {source}")]
    Artifact {
        path: PathBuf,
        #[source]
        source: ModelError,
    },

    #[error("Invalid run config: {0}")]
    Model(#[from] ModelError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn resource_not_found(msg: impl Into<String>) -> Self {
        Self::ResourceNotFound(msg.into())
    }

    /// A third-party call failed.
    pub fn collaborator(operation: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Collaborator {
            operation: operation.into(),
            message: msg.into(),
        }
    }

    pub fn artifact(path: impl Into<PathBuf>, source: ModelError) -> Self {
        Self::Artifact {
            path: path.into(),
            source,
        }
    }

    /// Missing directories, credentials or an invalid run request.
    pub fn is_config_error(&self) -> bool {
        matches!(self, WorkerError::ConfigError(_) | WorkerError::Model(_))
    }

    /// No clips or no synthesized audio.
    pub fn is_resource_not_found(&self) -> bool {
        match self {
            WorkerError::ResourceNotFound(_) => true,
            WorkerError::Media(e) => e.is_missing_resource(),
            _ => false,
        }
    }

    /// FFmpeg/FFprobe failures, timeouts and other rendering problems.
    pub fn is_render_error(&self) -> bool {
        matches!(self, WorkerError::Media(e) if !e.is_missing_resource())
    }

    pub fn is_collaborator_error(&self) -> bool {
        matches!(self, WorkerError::Collaborator { .. })
    }

    /// Resume was refused by the routing table.
    pub fn is_resume_rejection(&self) -> bool {
        matches!(
            self,
            WorkerError::AlreadyComplete | WorkerError::MissingClips | WorkerError::NotEnoughProgress
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_errors_are_classified() {
        let missing = WorkerError::from(MediaError::NoClips(PathBuf::from("/p/clips")));
        assert!(missing.is_resource_not_found());
        assert!(!missing.is_render_error());

        let render = WorkerError::from(MediaError::Timeout(30));
        assert!(render.is_render_error());
        assert!(!render.is_resource_not_found());
    }

    #[test]
    fn test_resume_rejections() {
        assert!(WorkerError::AlreadyComplete.is_resume_rejection());
        assert!(WorkerError::NotEnoughProgress.is_resume_rejection());
        assert!(!WorkerError::Cancelled.is_resume_rejection());
        assert_eq!(
            WorkerError::NotEnoughProgress.to_string(),
            "Not enough progress to resume"
        );
    }

    #[test]
    fn test_collaborator_message() {
        let e = WorkerError::collaborator("generate_lyrics", "HTTP 500");
        assert!(e.is_collaborator_error());
        assert_eq!(e.to_string(), "generate_lyrics failed: HTTP 500");
    }
}
