//! Stage state machine.
//!
//! Drives a run forward from its entry stage through the active stages of
//! its config, strictly one stage at a time.

use std::time::Instant;

use metrics::histogram;
use tokio::sync::watch;
use tracing::Instrument;

use mvgen_models::Stage;

use crate::collaborators::Collaborators;
use crate::context::RunContext;
use crate::error::{WorkerError, WorkerResult};
use crate::layout::ArtifactLayout;
use crate::logging::RunLogger;
use crate::progress::ProgressReporter;
use crate::stages::{self, StageEnv};

/// Runs the pipeline stages of one project.
#[derive(Clone)]
pub struct PipelineOrchestrator {
    layout: ArtifactLayout,
    collaborators: Collaborators,
}

impl PipelineOrchestrator {
    pub fn new(layout: ArtifactLayout, collaborators: Collaborators) -> Self {
        Self {
            layout,
            collaborators,
        }
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    /// Run from `start` to DONE.
    ///
    /// Cancellation is checked before each stage. On failure the reporter is
    /// left at FAILURE with the error message as detail.
    pub async fn run(
        &self,
        ctx: RunContext,
        start: Stage,
        progress: &ProgressReporter,
        cancel: watch::Receiver<bool>,
    ) -> WorkerResult<RunContext> {
        let logger = RunLogger::new(&ctx.run_id, "pipeline");
        match self.drive(ctx, start, progress, cancel).await {
            Ok(ctx) => {
                progress.done();
                logger.log_completion("all stages finished");
                Ok(ctx)
            }
            Err(e) => {
                logger.log_error(&e.to_string());
                progress.fail(e.to_string());
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        mut ctx: RunContext,
        start: Stage,
        progress: &ProgressReporter,
        cancel: watch::Receiver<bool>,
    ) -> WorkerResult<RunContext> {
        let stages = ctx.config.stages();
        let total = stages.len();
        let first = stages.iter().position(|s| *s == start).ok_or_else(|| {
            WorkerError::config_error(format!("{} is not an active stage of this run", start))
        })?;

        self.layout.ensure_dirs().await?;

        for (completed, &stage) in stages.iter().enumerate().skip(first) {
            if *cancel.borrow() {
                return Err(WorkerError::Cancelled);
            }

            let logger = RunLogger::for_stage(&ctx.run_id, stage);
            let env = StageEnv {
                layout: &self.layout,
                collaborators: &self.collaborators,
                cancel: cancel.clone(),
                logger: logger.clone(),
                progress: progress.stage(stage, completed, total),
            };

            logger.log_start(&format!("{}/{}", completed + 1, total));
            let started = Instant::now();

            let delta = stages::execute(stage, &ctx, &env)
                .instrument(logger.create_span())
                .await?;

            let elapsed = started.elapsed().as_secs_f64();
            histogram!("mvgen_stage_duration_seconds", "stage" => stage.as_str()).record(elapsed);
            logger.log_completion(&format!("took {:.1}s", elapsed));

            ctx = ctx.apply(delta);
        }

        Ok(ctx)
    }
}
