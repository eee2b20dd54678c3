//! SYNTH: synthesize audio for every lyrics artifact.

use mvgen_models::sort_paths_naturally;

use crate::collaborators::SynthesisRequest;
use crate::context::{RunContext, StageDelta};
use crate::error::{WorkerError, WorkerResult};

use super::StageEnv;

pub async fn run(ctx: &RunContext, env: &StageEnv<'_>) -> WorkerResult<StageDelta> {
    let config = &ctx.config;
    let total = ctx.lyrics.len();
    let mut songs = Vec::new();

    for (position, artifact) in ctx.lyrics.iter().enumerate() {
        let record = &artifact.record;
        let request = SynthesisRequest {
            lyrics: record.prompt_body.clone(),
            tags: record.tags_or(&config.style).to_string(),
            title: record.title.clone(),
            gender: record.gender,
            instrumental: config.instrumental,
            model: config.music_model.clone(),
            index: artifact.index().unwrap_or(position as u32 + 1),
            dest_dir: env.layout.songs_dir.clone(),
        };

        env.progress
            .detail(format!("synthesizing {}/{}: {}", position + 1, total, record.title));

        match env.collaborators.synthesizer.synthesize(&request).await {
            Ok(paths) if paths.is_empty() => {
                env.logger
                    .log_warning(&format!("No audio returned for \"{}\"", record.title));
            }
            Ok(paths) => {
                env.logger.log_progress(&format!(
                    "Synthesized {} take(s) of \"{}\"",
                    paths.len(),
                    record.title
                ));
                songs.extend(paths);
            }
            Err(e) => {
                env.logger.log_error(&format!(
                    "Synthesis of \"{}\" failed, skipping: {}",
                    record.title, e
                ));
            }
        }
    }

    if songs.is_empty() {
        return Err(WorkerError::resource_not_found(
            "no songs were synthesized",
        ));
    }

    sort_paths_naturally(&mut songs);
    Ok(StageDelta::Synthesized(songs))
}
