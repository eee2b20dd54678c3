//! Run identity, configuration, pipeline stages and progress records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{ModelError, ModelResult};
use crate::lyrics::Gender;

/// Default lyrics language.
pub const DEFAULT_LANGUAGE: &str = "spanish";
/// Default language model used for lyrics and planning.
pub const DEFAULT_LYRICS_MODEL: &str = "gemini-2.5-flash";
/// Default music synthesis model.
pub const DEFAULT_MUSIC_MODEL: &str = "chirp-crow";
/// Upper bound on the songs of one run.
pub const MAX_SONGS: u32 = 100;

/// Unique identifier for a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    /// Generate a new random run ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user request for one end-to-end run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RunConfig {
    /// The idea the songs are about
    pub prompt: String,

    /// Musical style, also the fallback synthesis tags
    pub style: String,

    /// Lyrics language
    #[serde(default = "default_language")]
    pub language: String,

    /// Generate instrumental tracks only
    #[serde(default)]
    pub instrumental: bool,

    /// Number of songs for instrumental runs
    #[serde(default)]
    pub instrumental_count: u32,

    /// Number of songs sung by a female voice
    #[serde(default)]
    pub female_count: u32,

    /// Number of songs sung by a male voice
    #[serde(default)]
    pub male_count: u32,

    /// Burn per-line captions into the video
    #[serde(default = "default_true")]
    pub subtitles: bool,

    /// Run the lyrics refinement stage
    #[serde(default = "default_true")]
    pub refine: bool,

    /// Language model selector
    #[serde(default = "default_lyrics_model")]
    pub lyrics_model: String,

    /// Music synthesis model selector
    #[serde(default = "default_music_model")]
    pub music_model: String,
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}
fn default_true() -> bool {
    true
}
fn default_lyrics_model() -> String {
    DEFAULT_LYRICS_MODEL.to_string()
}
fn default_music_model() -> String {
    DEFAULT_MUSIC_MODEL.to_string()
}

impl RunConfig {
    /// Create a vocal run config with the given voice split.
    pub fn new(prompt: impl Into<String>, style: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            style: style.into(),
            language: default_language(),
            instrumental: false,
            instrumental_count: 0,
            female_count: 0,
            male_count: 0,
            subtitles: true,
            refine: true,
            lyrics_model: default_lyrics_model(),
            music_model: default_music_model(),
        }
    }

    pub fn with_voices(mut self, female: u32, male: u32) -> Self {
        self.instrumental = false;
        self.female_count = female;
        self.male_count = male;
        self
    }

    pub fn with_instrumental(mut self, count: u32) -> Self {
        self.instrumental = true;
        self.instrumental_count = count;
        self
    }

    pub fn with_subtitles(mut self, enabled: bool) -> Self {
        self.subtitles = enabled;
        self
    }

    pub fn with_refine(mut self, enabled: bool) -> Self {
        self.refine = enabled;
        self
    }

    /// Total number of songs this run plans, `None` if the voice counts
    /// overflow.
    pub fn checked_total_songs(&self) -> Option<u32> {
        if self.instrumental {
            Some(self.instrumental_count)
        } else {
            self.female_count.checked_add(self.male_count)
        }
    }

    /// Total number of songs this run plans. Saturates on overflow;
    /// [`RunConfig::validate`] rejects such configs.
    pub fn total_songs(&self) -> u32 {
        self.checked_total_songs().unwrap_or(u32::MAX)
    }

    /// Voice for the song at a zero-based position: female songs first.
    pub fn voice_for(&self, position: usize) -> Gender {
        if !self.instrumental && position as u32 >= self.female_count && self.male_count > 0 {
            Gender::Male
        } else {
            Gender::Female
        }
    }

    /// Whether the REFINE stage runs for this config.
    pub fn refine_enabled(&self) -> bool {
        self.refine && !self.instrumental
    }

    /// Stages this run walks through, in order, excluding DONE.
    pub fn stages(&self) -> Vec<Stage> {
        Stage::PIPELINE
            .iter()
            .copied()
            .filter(|s| *s != Stage::Refine || self.refine_enabled())
            .collect()
    }

    /// Validate the request.
    pub fn validate(&self) -> ModelResult<()> {
        if self.prompt.trim().is_empty() {
            return Err(ModelError::invalid_config("prompt must not be empty"));
        }
        let total = self
            .checked_total_songs()
            .ok_or_else(|| ModelError::invalid_config("song counts overflow"))?;
        if total == 0 {
            return Err(ModelError::invalid_config(
                "total song count must be greater than zero",
            ));
        }
        if total > MAX_SONGS {
            return Err(ModelError::invalid_config(format!(
                "total song count {} exceeds the maximum of {}",
                total, MAX_SONGS
            )));
        }
        Ok(())
    }
}

/// Pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Plan,
    Draft,
    Refine,
    Synth,
    Assemble,
    Metadata,
    Publish,
    Report,
    Done,
    Failure,
}

impl Stage {
    /// Every working stage in forward order.
    pub const PIPELINE: [Stage; 8] = [
        Stage::Plan,
        Stage::Draft,
        Stage::Refine,
        Stage::Synth,
        Stage::Assemble,
        Stage::Metadata,
        Stage::Publish,
        Stage::Report,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Plan => "plan",
            Stage::Draft => "draft",
            Stage::Refine => "refine",
            Stage::Synth => "synth",
            Stage::Assemble => "assemble",
            Stage::Metadata => "metadata",
            Stage::Publish => "publish",
            Stage::Report => "report",
            Stage::Done => "done",
            Stage::Failure => "failure",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Failure)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Run lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Running,
    Done,
    Failed,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Running => "running",
            RunState::Done => "done",
            RunState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }
}

/// Latest progress of a run: `{stage, percent, detail}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ProgressUpdate {
    pub stage: Stage,
    /// Percentage 0-100
    pub percent: u8,
    pub detail: String,
}

impl ProgressUpdate {
    pub fn new(stage: Stage, percent: u8, detail: impl Into<String>) -> Self {
        Self {
            stage,
            percent: percent.min(100),
            detail: detail.into(),
        }
    }

    /// Initial update before any stage runs.
    pub fn queued() -> Self {
        Self::new(Stage::Plan, 0, "queued")
    }

    /// `round(100 * completed / total)`, clamped to 100.
    pub fn percent_for(completed: usize, total: usize) -> u8 {
        if total == 0 {
            return 100;
        }
        let pct = (100.0 * completed as f64 / total as f64).round();
        pct.clamp(0.0, 100.0) as u8
    }
}

/// Status view returned to observers.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RunStatus {
    pub run_id: RunId,
    pub state: RunState,
    pub progress: ProgressUpdate,
    pub started_at: DateTime<Utc>,
    /// Set once the run reaches DONE or FAILURE
    pub finished_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_songs() {
        let vocal = RunConfig::new("space", "synthwave").with_voices(2, 3);
        assert_eq!(vocal.total_songs(), 5);

        let inst = RunConfig::new("space", "ambient").with_instrumental(4);
        assert_eq!(inst.total_songs(), 4);
    }

    #[test]
    fn test_validate_rejects_zero_songs() {
        let cfg = RunConfig::new("space", "synthwave");
        assert!(matches!(cfg.validate(), Err(ModelError::InvalidConfig(_))));
        assert!(cfg.with_voices(1, 0).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_overflowing_counts() {
        let config: RunConfig = serde_json::from_str(
            r#"{"prompt":"p","style":"s","female_count":4294967295,"male_count":1}"#,
        )
        .unwrap();
        assert_eq!(config.checked_total_songs(), None);
        assert_eq!(config.total_songs(), u32::MAX);
        assert!(matches!(config.validate(), Err(ModelError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_caps_song_count() {
        let at_limit = RunConfig::new("p", "s").with_voices(MAX_SONGS, 0);
        assert!(at_limit.validate().is_ok());

        let over = RunConfig::new("p", "s").with_voices(MAX_SONGS, 1);
        assert!(over.validate().is_err());

        let instrumental = RunConfig::new("p", "s").with_instrumental(MAX_SONGS + 1);
        assert!(instrumental.validate().is_err());
    }

    #[test]
    fn test_voice_split() {
        let cfg = RunConfig::new("p", "s").with_voices(2, 1);
        assert_eq!(cfg.voice_for(0), Gender::Female);
        assert_eq!(cfg.voice_for(1), Gender::Female);
        assert_eq!(cfg.voice_for(2), Gender::Male);

        let male_only = RunConfig::new("p", "s").with_voices(0, 2);
        assert_eq!(male_only.voice_for(0), Gender::Male);
    }

    #[test]
    fn test_stages_skip_refine() {
        let vocal = RunConfig::new("p", "s").with_voices(1, 0);
        assert_eq!(vocal.stages().len(), 8);
        assert!(vocal.stages().contains(&Stage::Refine));

        let inst = RunConfig::new("p", "s").with_instrumental(1);
        assert_eq!(inst.stages().len(), 7);
        assert!(!inst.stages().contains(&Stage::Refine));

        let no_refine = RunConfig::new("p", "s").with_voices(1, 0).with_refine(false);
        assert!(!no_refine.stages().contains(&Stage::Refine));
    }

    #[test]
    fn test_percent_rounding() {
        assert_eq!(ProgressUpdate::percent_for(0, 7), 0);
        assert_eq!(ProgressUpdate::percent_for(1, 7), 14);
        assert_eq!(ProgressUpdate::percent_for(3, 8), 38);
        assert_eq!(ProgressUpdate::percent_for(7, 7), 100);
        assert_eq!(ProgressUpdate::percent_for(1, 0), 100);
    }

    #[test]
    fn test_config_defaults_from_json() {
        let cfg: RunConfig =
            serde_json::from_str(r#"{"prompt":"p","style":"s","female_count":1}"#).unwrap();
        assert!(cfg.subtitles);
        assert!(cfg.refine);
        assert_eq!(cfg.language, DEFAULT_LANGUAGE);
        assert_eq!(cfg.music_model, DEFAULT_MUSIC_MODEL);
    }
}
