//! ASSEMBLE: render the music video from the songs and source clips.

use mvgen_media::reconcile_lyrics;

use crate::collaborators::AssemblyJob;
use crate::context::{RunContext, StageDelta};
use crate::error::WorkerResult;

use super::StageEnv;

/// Assembly inputs with lyrics aligned to the audio tracks.
pub fn build_job(ctx: &RunContext) -> AssemblyJob {
    let reconciled = reconcile_lyrics(&ctx.lyric_bodies(), ctx.songs.len(), ctx.config.subtitles);
    AssemblyJob {
        audio_paths: ctx.songs.clone(),
        lyrics_texts: reconciled.texts,
        subtitles: reconciled.subtitles,
    }
}

pub async fn run(ctx: &RunContext, env: &StageEnv<'_>) -> WorkerResult<StageDelta> {
    let job = build_job(ctx);
    env.progress.detail(format!(
        "assembling {} songs{}",
        job.audio_paths.len(),
        if job.subtitles { " with subtitles" } else { "" }
    ));

    let path = env
        .collaborators
        .assembler
        .assemble(job, env.cancel.clone(), env.progress.render_callback())
        .await?;

    env.logger
        .log_progress(&format!("Rendered video {}", path.display()));
    Ok(StageDelta::Assembled(path))
}
