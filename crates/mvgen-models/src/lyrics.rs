//! Lyrics artifact records.
//!
//! A lyrics artifact is a plain text file with four sections:
//!
//! ```text
//! TITLE: Night Drive
//! PROMPT:
//! [Verse]
//! ...
//! TAGS: synthwave, dreamy
//! GENERO: Femenino
//! ```
//!
//! Section headers are matched case-insensitively at the start of a line.
//! Parsing never fails: missing sections keep their defaults.

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Title used when a record has none.
pub const UNTITLED: &str = "Untitled Song";

static PROMPT_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^[ \t]*PROMPT:").expect("valid PROMPT regex"));
static TAGS_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^[ \t]*TAGS:").expect("valid TAGS regex"));
static GENERO_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^[ \t]*GENERO:").expect("valid GENERO regex"));
static TITLE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)TITLE:(.*)").expect("valid TITLE regex"));

/// Vocal gender of a song.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    #[default]
    Female,
    Male,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Female => "female",
            Gender::Male => "male",
        }
    }

    /// Spanish label stored in the `GENERO:` section.
    pub fn artifact_label(&self) -> &'static str {
        match self {
            Gender::Female => "Femenino",
            Gender::Male => "Masculino",
        }
    }

    /// Parse a `GENERO:` section body.
    pub fn from_artifact_label(s: &str) -> Option<Self> {
        let lower = s.to_lowercase();
        if lower.contains("femenino") || lower.contains("female") {
            Some(Gender::Female)
        } else if lower.contains("masculino") || lower.contains("male") {
            Some(Gender::Male)
        } else {
            None
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parsed view of a lyrics artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LyricsRecord {
    pub title: String,
    /// Lyrics (or instrumental description) sent to synthesis
    pub prompt_body: String,
    /// Comma-separated synthesis tags; empty means "use the run style"
    pub tags: String,
    pub gender: Gender,
}

impl Default for LyricsRecord {
    fn default() -> Self {
        Self {
            title: UNTITLED.to_string(),
            prompt_body: String::new(),
            tags: String::new(),
            gender: Gender::Female,
        }
    }
}

impl LyricsRecord {
    pub fn new(
        title: impl Into<String>,
        prompt_body: impl Into<String>,
        tags: impl Into<String>,
        gender: Gender,
    ) -> Self {
        Self {
            title: title.into(),
            prompt_body: prompt_body.into(),
            tags: tags.into(),
            gender,
        }
    }

    /// Parse the text of a lyrics artifact.
    pub fn parse(content: &str) -> Self {
        let mut record = Self::default();

        let (header, body) = split_once_at(&PROMPT_HEADER, content);

        if let Some(caps) = TITLE_LINE.captures(header) {
            let title = caps[1].trim().trim_matches(|c: char| c == '\'' || c == '"').trim();
            if !title.is_empty() {
                record.title = title.to_string();
            }
        }

        let Some(body) = body else {
            return record;
        };

        let (prompt, tags_body) = split_once_at(&TAGS_HEADER, body);
        record.prompt_body = prompt.trim().to_string();

        if let Some(tags_body) = tags_body {
            let (tags, genero) = split_once_at(&GENERO_HEADER, tags_body);
            record.tags = tags.trim().to_string();
            if let Some(genero) = genero {
                if let Some(gender) = Gender::from_artifact_label(genero.trim()) {
                    record.gender = gender;
                }
            }
        }

        record
    }

    /// Parse model output, keeping the raw text as the body when the model
    /// ignored the section format.
    pub fn parse_generated(content: &str) -> Self {
        let mut record = Self::parse(content);
        if record.prompt_body.is_empty() && !PROMPT_HEADER.is_match(content) {
            record.prompt_body = content.trim().to_string();
        }
        record
    }

    /// Render the artifact text.
    pub fn to_artifact_text(&self) -> String {
        format!(
            "TITLE: {}\nPROMPT:\n{}\nTAGS: {}\nGENERO: {}\n",
            self.title.trim(),
            self.prompt_body.trim(),
            self.tags.trim(),
            self.gender.artifact_label()
        )
    }

    /// Tags for synthesis, falling back to the run style.
    pub fn tags_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        let tags = self.tags.trim();
        if tags.is_empty() {
            fallback
        } else {
            tags
        }
    }

    /// Artifact file name: `<index>_<sanitizedTitle>.txt`.
    pub fn file_name(index: u32, title: &str) -> String {
        format!("{}_{}.txt", index, sanitize_title(title))
    }

    /// Audio file name for a synthesized take: the first take is
    /// `<index>_<sanitizedTitle>.mp3`, later ones get a `_<take>` suffix.
    pub fn audio_file_name(index: u32, title: &str, take: usize) -> String {
        if take <= 1 {
            format!("{}_{}.mp3", index, sanitize_title(title))
        } else {
            format!("{}_{}_{}.mp3", index, sanitize_title(title), take)
        }
    }
}

fn split_once_at<'a>(re: &Regex, text: &'a str) -> (&'a str, Option<&'a str>) {
    match re.find(text) {
        Some(m) => (&text[..m.start()], Some(&text[m.end()..])),
        None => (text, None),
    }
}

/// Keep only alphanumerics, spaces, `_` and `-`.
pub fn sanitize_title(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '_' || *c == '-')
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        "song".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "TITLE: 'Night Drive'\nPROMPT:\n[Verse]\nNeon lights\n\n[Chorus]\nWe ride\nTAGS: synthwave, dreamy\nGENERO: Masculino\n";

    #[test]
    fn test_parse_all_sections() {
        let record = LyricsRecord::parse(SAMPLE);
        assert_eq!(record.title, "Night Drive");
        assert_eq!(record.prompt_body, "[Verse]\nNeon lights\n\n[Chorus]\nWe ride");
        assert_eq!(record.tags, "synthwave, dreamy");
        assert_eq!(record.gender, Gender::Male);
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        let record = LyricsRecord::parse("title: Hola\nprompt: la la\ntags: pop\ngenero: femenino");
        assert_eq!(record.title, "Hola");
        assert_eq!(record.prompt_body, "la la");
        assert_eq!(record.tags, "pop");
        assert_eq!(record.gender, Gender::Female);
    }

    #[test]
    fn test_parse_defaults() {
        let record = LyricsRecord::parse("just some words");
        assert_eq!(record.title, UNTITLED);
        assert!(record.prompt_body.is_empty());
        assert!(record.tags.is_empty());
        assert_eq!(record.gender, Gender::Female);
    }

    #[test]
    fn test_parse_generated_keeps_raw_text() {
        let record = LyricsRecord::parse_generated("[Verse]\nline one\nline two");
        assert_eq!(record.prompt_body, "[Verse]\nline one\nline two");
    }

    #[test]
    fn test_artifact_text_parses_back() {
        let record = LyricsRecord::new("Café 2", "line a\nline b", "", Gender::Male);
        let parsed = LyricsRecord::parse(&record.to_artifact_text());
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_tags_fallback() {
        let mut record = LyricsRecord::default();
        assert_eq!(record.tags_or("lofi"), "lofi");
        record.tags = "rock".into();
        assert_eq!(record.tags_or("lofi"), "rock");
    }

    #[test]
    fn test_sanitize_title() {
        assert_eq!(sanitize_title("Hello, World! (2)"), "Hello World 2");
        assert_eq!(sanitize_title("a/b\\c:d*e?"), "abcde");
        assert_eq!(sanitize_title("keep_this-too"), "keep_this-too");
        assert_eq!(sanitize_title("???"), "song");
    }

    #[test]
    fn test_file_names() {
        assert_eq!(LyricsRecord::file_name(3, "Night Drive?"), "3_Night Drive.txt");
        assert_eq!(LyricsRecord::audio_file_name(3, "Night Drive", 1), "3_Night Drive.mp3");
        assert_eq!(LyricsRecord::audio_file_name(3, "Night Drive", 2), "3_Night Drive_2.mp3");
    }
}
