//! METADATA: title, description and tags for the published video.

use mvgen_media::write_atomic;
use mvgen_models::VideoMetadata;

use crate::collaborators::MetadataRequest;
use crate::context::{RunContext, StageDelta};
use crate::error::WorkerResult;

use super::StageEnv;

pub async fn run(ctx: &RunContext, env: &StageEnv<'_>) -> WorkerResult<StageDelta> {
    let config = &ctx.config;
    let sample = ctx
        .lyrics
        .first()
        .map(|artifact| artifact.record.prompt_body.clone())
        .unwrap_or_default();

    let request = MetadataRequest {
        prompt: config.prompt.clone(),
        style: config.style.clone(),
        lyrics_sample: sample,
        model: config.lyrics_model.clone(),
    };

    let metadata = match env
        .collaborators
        .language_model
        .generate_metadata(&request)
        .await
    {
        Ok(metadata) if !metadata.title.trim().is_empty() => metadata,
        Ok(_) => {
            env.logger
                .log_warning("Generated metadata has no title, using fallback");
            VideoMetadata::fallback(&config.prompt, &config.style)
        }
        Err(e) => {
            env.logger
                .log_warning(&format!("Metadata generation failed, using fallback: {}", e));
            VideoMetadata::fallback(&config.prompt, &config.style)
        }
    };

    write_atomic(env.layout.metadata_path(), metadata.to_artifact_text()).await?;
    env.progress.detail(format!("title: {}", metadata.title));

    Ok(StageDelta::Described(metadata))
}
