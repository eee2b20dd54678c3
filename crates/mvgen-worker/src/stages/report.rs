//! REPORT: write the publication report, the run's final artifact.

use mvgen_media::write_atomic;
use mvgen_models::PublicationReport;

use crate::context::{RunContext, StageDelta};
use crate::error::{WorkerError, WorkerResult};

use super::StageEnv;

/// Report for a context that went through PUBLISH.
pub fn build_report(ctx: &RunContext) -> WorkerResult<PublicationReport> {
    let missing = |what: &str| WorkerError::resource_not_found(format!("report needs {}", what));

    let video = ctx.video_path.as_ref().ok_or_else(|| missing("a rendered video"))?;
    let metadata = ctx.metadata.clone().ok_or_else(|| missing("video metadata"))?;
    let url = ctx.youtube_url.clone().ok_or_else(|| missing("a published URL"))?;

    Ok(PublicationReport {
        user_prompt: ctx.config.prompt.clone(),
        song_style: ctx.config.style.clone(),
        youtube_url: url,
        final_video_path: video.to_string_lossy().into_owned(),
        video_metadata: metadata,
        song_paths: ctx
            .songs
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect(),
    })
}

pub async fn run(ctx: &RunContext, env: &StageEnv<'_>) -> WorkerResult<StageDelta> {
    let report = build_report(ctx)?;
    let path = env.layout.report_path();
    write_atomic(&path, serde_json::to_vec_pretty(&report)?).await?;

    env.progress.detail("report written");
    env.logger
        .log_progress(&format!("Publication report at {}", path.display()));
    Ok(StageDelta::Reported(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mvgen_models::{RunConfig, RunId, VideoMetadata};
    use std::path::PathBuf;

    #[test]
    fn test_report_requires_published_url() {
        let mut ctx = RunContext::new(RunId::new(), RunConfig::new("rain", "lofi"));
        ctx.video_path = Some(PathBuf::from("/o/final_video.mp4"));
        ctx.metadata = Some(VideoMetadata::fallback("rain", "lofi"));
        assert!(build_report(&ctx).is_err());

        ctx.youtube_url = Some("https://www.youtube.com/watch?v=abc".to_string());
        ctx.songs = vec![PathBuf::from("/s/1_a.mp3"), PathBuf::from("/s/2_b.mp3")];
        let report = build_report(&ctx).unwrap();
        assert_eq!(report.user_prompt, "rain");
        assert_eq!(report.final_video_path, "/o/final_video.mp4");
        assert_eq!(report.song_paths, vec!["/s/1_a.mp3", "/s/2_b.mp3"]);
    }
}
