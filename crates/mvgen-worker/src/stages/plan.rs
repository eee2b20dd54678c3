//! PLAN: turn the user prompt into an ordered song plan.

use mvgen_media::write_atomic;
use mvgen_models::SongPlanItem;

use crate::collaborators::PlanRequest;
use crate::context::{RunContext, StageDelta};
use crate::error::{WorkerError, WorkerResult};

use super::StageEnv;

pub async fn run(ctx: &RunContext, env: &StageEnv<'_>) -> WorkerResult<StageDelta> {
    let config = &ctx.config;
    let total = config.total_songs();
    if total == 0 {
        return Err(WorkerError::config_error(
            "total song count must be greater than zero",
        ));
    }

    env.progress.detail(format!("planning {} songs", total));

    let request = PlanRequest {
        prompt: config.prompt.clone(),
        total,
        language: config.language.clone(),
        model: config.lyrics_model.clone(),
    };

    let plan = match env.collaborators.language_model.generate_song_plan(&request).await {
        Ok(entries) if !entries.is_empty() => {
            if entries.len() != total as usize {
                env.logger.log_warning(&format!(
                    "Song plan has {} entries for {} songs, normalizing",
                    entries.len(),
                    total
                ));
            }
            SongPlanItem::from_entries(entries, total, &config.prompt)
        }
        Ok(_) => {
            env.logger
                .log_warning("Song plan came back empty, using placeholders");
            SongPlanItem::placeholders(total, &config.prompt)
        }
        Err(e) => {
            env.logger
                .log_warning(&format!("Song planning failed, using placeholders: {}", e));
            SongPlanItem::placeholders(total, &config.prompt)
        }
    };

    let path = env.layout.song_plan_path();
    write_atomic(&path, serde_json::to_vec_pretty(&plan)?).await?;

    env.logger.log_progress(&format!(
        "Planned {} songs in {}",
        plan.len(),
        path.display()
    ));
    Ok(StageDelta::Planned(plan))
}
