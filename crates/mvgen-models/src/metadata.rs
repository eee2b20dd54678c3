//! Video metadata record and its artifact format.
//!
//! The metadata artifact is three lines:
//!
//! ```text
//! Title: ...
//! Description: ...
//! Tags: tag one, tag two
//! ```

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// YouTube title length limit.
pub const MAX_TITLE_CHARS: usize = 100;

const TITLE_KEYS: &[&str] = &["title:", "título:", "titulo:"];
const DESCRIPTION_KEYS: &[&str] = &["description:", "descripción:", "descripcion:"];
const TAGS_KEYS: &[&str] = &["tags:", "etiquetas:"];

/// Title, description and tags for the published video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct VideoMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
}

impl VideoMetadata {
    pub fn new(title: impl Into<String>, description: impl Into<String>, tags: Vec<String>) -> Self {
        Self {
            title: truncate_chars(title.into().trim(), MAX_TITLE_CHARS),
            description: description.into().trim().to_string(),
            tags,
        }
    }

    /// Deterministic metadata used when generation fails.
    pub fn fallback(prompt: &str, style: &str) -> Self {
        let mut tags = vec!["AI music".to_string()];
        tags.extend(split_tags(style));
        tags.push("music video".to_string());
        Self::new(
            format!("A song about {}", prompt.trim()),
            format!("Enjoy this {} song created with AI.", style.trim()),
            tags,
        )
    }

    /// Comma-separated tags.
    pub fn tags_line(&self) -> String {
        self.tags.join(", ")
    }

    /// Render the three-line artifact.
    pub fn to_artifact_text(&self) -> String {
        format!(
            "Title: {}\nDescription: {}\nTags: {}\n",
            single_line(&self.title),
            single_line(&self.description),
            self.tags_line()
        )
    }

    /// Parse the artifact (or equivalently formatted model output).
    ///
    /// Keys are matched case-insensitively, in English or Spanish. The title
    /// is required; description and tags may be empty.
    pub fn parse(text: &str) -> ModelResult<Self> {
        let mut title = None;
        let mut description = None;
        let mut tags = None;

        for line in text.lines() {
            let line = line.trim().trim_start_matches(['*', '#', '-']).trim();
            if let Some(v) = strip_key(line, TITLE_KEYS) {
                title.get_or_insert(v);
            } else if let Some(v) = strip_key(line, DESCRIPTION_KEYS) {
                description.get_or_insert(v);
            } else if let Some(v) = strip_key(line, TAGS_KEYS) {
                tags.get_or_insert(v);
            }
        }

        let title = title
            .filter(|t| !t.is_empty())
            .ok_or(ModelError::MissingField("title"))?;
        let tags = tags
            .map(|t| split_tags(t.trim_matches(|c: char| c == '[' || c == ']')))
            .unwrap_or_default();

        Ok(Self::new(title, description.unwrap_or_default(), tags))
    }
}

fn strip_key<'a>(line: &'a str, keys: &[&str]) -> Option<&'a str> {
    let lower = line.to_lowercase();
    keys.iter().find_map(|key| {
        if lower.starts_with(key) {
            // lowercasing keeps the byte length of every key character
            line.get(key.len()..)
                .map(|v| v.trim_start_matches('*').trim())
        } else {
            None
        }
    })
}

fn split_tags(s: &str) -> Vec<String> {
    s.split(',')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

fn single_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
