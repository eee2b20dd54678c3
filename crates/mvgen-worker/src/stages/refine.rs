//! REFINE: rewrite each draft's lyrics body in place.
//!
//! A failed or empty refinement leaves that artifact untouched.

use mvgen_media::write_atomic;
use mvgen_models::LyricsRecord;

use crate::collaborators::RefineRequest;
use crate::context::{LyricsArtifact, RunContext, StageDelta};
use crate::error::{WorkerError, WorkerResult};

use super::StageEnv;

/// Lyrics body out of a refinement response.
fn refined_body(response: &str) -> Option<String> {
    let body = LyricsRecord::parse_generated(response).prompt_body;
    if body.trim().is_empty() {
        None
    } else {
        Some(body)
    }
}

async fn refine_one(
    ctx: &RunContext,
    env: &StageEnv<'_>,
    artifact: &LyricsArtifact,
) -> WorkerResult<LyricsArtifact> {
    let request = RefineRequest {
        original_prompt: ctx.config.prompt.clone(),
        draft: artifact.record.prompt_body.clone(),
        style: ctx.config.style.clone(),
        model: ctx.config.lyrics_model.clone(),
    };
    let response = env
        .collaborators
        .language_model
        .refine_lyrics(&request)
        .await?;
    let body = refined_body(&response)
        .ok_or_else(|| WorkerError::collaborator("refine_lyrics", "empty refined lyrics"))?;

    let record = LyricsRecord {
        prompt_body: body,
        ..artifact.record.clone()
    };
    write_atomic(&artifact.path, record.to_artifact_text()).await?;

    Ok(LyricsArtifact {
        path: artifact.path.clone(),
        record,
    })
}

pub async fn run(ctx: &RunContext, env: &StageEnv<'_>) -> WorkerResult<StageDelta> {
    let total = ctx.lyrics.len();
    let mut refined = Vec::with_capacity(total);
    let mut kept = 0usize;

    for (i, artifact) in ctx.lyrics.iter().enumerate() {
        match refine_one(ctx, env, artifact).await {
            Ok(updated) => refined.push(updated),
            Err(e) => {
                kept += 1;
                env.logger.log_warning(&format!(
                    "Keeping draft of {}: {}",
                    artifact.path.display(),
                    e
                ));
                refined.push(artifact.clone());
            }
        }
        env.progress.detail(format!("refined {}/{}", i + 1, total));
    }

    env.logger.log_progress(&format!(
        "Refined {} of {} lyrics",
        total - kept,
        total
    ));
    Ok(StageDelta::Refined(refined))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refined_body() {
        assert_eq!(refined_body("  new words \n").as_deref(), Some("new words"));
        assert_eq!(
            refined_body("TITLE: X\nPROMPT:\nverse\nTAGS: pop").as_deref(),
            Some("verse")
        );
        assert_eq!(refined_body("   \n"), None);
        assert_eq!(refined_body("TITLE: X\nPROMPT:\n\nTAGS: pop"), None);
    }
}
