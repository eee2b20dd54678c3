//! PUBLISH: upload the rendered video. Failures are fatal.

use crate::collaborators::PublishRequest;
use crate::context::{RunContext, StageDelta};
use crate::error::{WorkerError, WorkerResult};

use super::StageEnv;

pub async fn run(ctx: &RunContext, env: &StageEnv<'_>) -> WorkerResult<StageDelta> {
    let video_path = ctx
        .video_path
        .clone()
        .ok_or_else(|| WorkerError::resource_not_found("no rendered video to publish"))?;
    let metadata = ctx
        .metadata
        .clone()
        .ok_or_else(|| WorkerError::resource_not_found("no video metadata to publish with"))?;

    env.progress
        .detail(format!("uploading {}", video_path.display()));

    let request = PublishRequest {
        video_path,
        title: metadata.title,
        description: metadata.description,
        tags: metadata.tags,
    };
    let url = env.collaborators.publisher.publish(&request).await?;

    env.logger.log_progress(&format!("Published at {}", url));
    Ok(StageDelta::Published(url))
}
