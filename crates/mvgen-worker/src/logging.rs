//! Structured run logging.
//!
//! Every pipeline event carries the run ID and the stage it belongs to.

use tracing::{error, info, warn, Span};
use mvgen_models::{RunId, Stage};

/// Logger for the lifecycle events of one run.
#[derive(Debug, Clone)]
pub struct RunLogger {
    run_id: String,
    operation: String,
}

impl RunLogger {
    /// Logger for `operation` within run `run_id`.
    pub fn new(run_id: &RunId, operation: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            operation: operation.to_string(),
        }
    }

    /// Logger for one pipeline stage.
    pub fn for_stage(run_id: &RunId, stage: Stage) -> Self {
        Self::new(run_id, stage.as_str())
    }

    pub fn log_start(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            operation = %self.operation,
            "Stage started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            operation = %self.operation,
            "Stage progress: {}", message
        );
    }

    /// Recoverable problem; the stage goes on with a fallback.
    pub fn log_warning(&self, message: &str) {
        warn!(
            run_id = %self.run_id,
            operation = %self.operation,
            "Stage warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            run_id = %self.run_id,
            operation = %self.operation,
            "Stage error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            operation = %self.operation,
            "Stage completed: {}", message
        );
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Span carrying the run ID and operation.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "run",
            run_id = %self.run_id,
            operation = %self.operation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_logger_creation() {
        let run_id = RunId::new();
        let logger = RunLogger::new(&run_id, "pipeline");

        assert_eq!(logger.run_id(), run_id.to_string());
        assert_eq!(logger.operation(), "pipeline");
    }

    #[test]
    fn test_stage_logger() {
        let run_id = RunId::from_string("run-123");
        let logger = RunLogger::for_stage(&run_id, Stage::Synth);

        assert_eq!(logger.run_id(), "run-123");
        assert_eq!(logger.operation(), "synth");
    }
}
