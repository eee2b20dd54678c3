//! DRAFT: one lyrics artifact per planned song.

use mvgen_media::write_atomic;
use mvgen_models::{Gender, LyricsRecord, SongPlanItem, TitleRegistry};

use crate::collaborators::{InstrumentalRequest, LyricsRequest};
use crate::context::{LyricsArtifact, RunContext, StageDelta};
use crate::error::WorkerResult;

use super::StageEnv;

/// Prompt for one song, embedding its plan entry and the album concept.
pub fn song_prompt(item: &SongPlanItem, total: u32, concept: &str) -> String {
    format!(
        "Song {} of {} titled \"{}\". {}\nOverall album concept: {}",
        item.index,
        total,
        item.title,
        item.description.trim(),
        concept.trim()
    )
}

pub async fn run(ctx: &RunContext, env: &StageEnv<'_>) -> WorkerResult<StageDelta> {
    let config = &ctx.config;
    let total = config.total_songs();
    let plan = if ctx.plan.is_empty() {
        SongPlanItem::placeholders(total, &config.prompt)
    } else {
        ctx.plan.clone()
    };

    let llm = &env.collaborators.language_model;
    let mut titles = TitleRegistry::new();
    let mut drafted = Vec::with_capacity(plan.len());

    for (position, item) in plan.iter().enumerate() {
        let prompt = song_prompt(item, total, &config.prompt);

        let (raw, gender) = if config.instrumental {
            let request = InstrumentalRequest {
                prompt,
                style: config.style.clone(),
                language: config.language.clone(),
                index: item.index,
                total,
                model: config.lyrics_model.clone(),
            };
            (llm.generate_instrumental_prompt(&request).await?, Gender::Female)
        } else {
            let gender = config.voice_for(position);
            let request = LyricsRequest {
                prompt,
                style: config.style.clone(),
                language: config.language.clone(),
                gender,
                index: item.index,
                total,
                model: config.lyrics_model.clone(),
            };
            (llm.generate_lyrics(&request).await?, gender)
        };

        let mut record = LyricsRecord::parse_generated(&raw);
        record.title = titles.claim(&item.title);
        record.gender = gender;

        let path = env
            .layout
            .lyrics_path(&LyricsRecord::file_name(item.index, &record.title));
        write_atomic(&path, record.to_artifact_text()).await?;

        env.progress.detail(format!(
            "drafted {}/{}: {}",
            position + 1,
            plan.len(),
            record.title
        ));
        drafted.push(LyricsArtifact { path, record });
    }

    env.logger
        .log_progress(&format!("Drafted {} lyrics artifacts", drafted.len()));
    Ok(StageDelta::Drafted(drafted))
}
