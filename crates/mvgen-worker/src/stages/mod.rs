//! Stage bodies.
//!
//! Every stage reads the [`RunContext`], writes its artifacts atomically and
//! returns a [`StageDelta`]. Only REFINE, SYNTH, PLAN and METADATA recover
//! locally; every other error fails the run.

use tokio::sync::watch;

use mvgen_models::Stage;

use crate::collaborators::Collaborators;
use crate::context::{RunContext, StageDelta};
use crate::error::{WorkerError, WorkerResult};
use crate::layout::ArtifactLayout;
use crate::logging::RunLogger;
use crate::progress::StageProgress;

pub mod assemble;
pub mod draft;
pub mod metadata;
pub mod plan;
pub mod publish;
pub mod refine;
pub mod report;
pub mod synth;

/// What a stage body needs besides the context.
pub struct StageEnv<'a> {
    pub layout: &'a ArtifactLayout,
    pub collaborators: &'a Collaborators,
    pub cancel: watch::Receiver<bool>,
    pub logger: RunLogger,
    pub progress: StageProgress,
}

/// Run one stage.
pub async fn execute(stage: Stage, ctx: &RunContext, env: &StageEnv<'_>) -> WorkerResult<StageDelta> {
    match stage {
        Stage::Plan => plan::run(ctx, env).await,
        Stage::Draft => draft::run(ctx, env).await,
        Stage::Refine => refine::run(ctx, env).await,
        Stage::Synth => synth::run(ctx, env).await,
        Stage::Assemble => assemble::run(ctx, env).await,
        Stage::Metadata => metadata::run(ctx, env).await,
        Stage::Publish => publish::run(ctx, env).await,
        Stage::Report => report::run(ctx, env).await,
        Stage::Done | Stage::Failure => Err(WorkerError::config_error(format!(
            "{} is not an executable stage",
            stage
        ))),
    }
}
