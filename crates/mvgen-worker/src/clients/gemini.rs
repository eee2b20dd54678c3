//! Gemini client for song plans, lyrics and video metadata.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use mvgen_models::{PlanEntry, VideoMetadata};

use crate::collaborators::{
    InstrumentalRequest, LanguageModel, LyricsRequest, MetadataRequest, PlanRequest,
    RefineRequest,
};
use crate::error::{WorkerError, WorkerResult};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Tried in order after the requested model.
const FALLBACK_MODELS: &[&str] = &["gemini-2.5-flash", "gemini-2.5-flash-lite", "gemini-2.5-pro"];

/// Gemini API client.
pub struct GeminiClient {
    api_key: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

/// Strip a surrounding markdown code fence, with or without a language tag.
pub fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = match rest.find('\n') {
        Some(newline) if !rest[..newline].contains(' ') => &rest[newline + 1..],
        _ => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Parse a song plan response: a JSON array of `{title, description}`, or
/// an object wrapping one under `songs`.
pub fn parse_plan(text: &str) -> WorkerResult<Vec<PlanEntry>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PlanResponse {
        List(Vec<PlanEntry>),
        Wrapped { songs: Vec<PlanEntry> },
    }

    let parsed: PlanResponse = serde_json::from_str(strip_code_fence(text)).map_err(|e| {
        WorkerError::collaborator("generate_song_plan", format!("invalid plan JSON: {}", e))
    })?;
    Ok(match parsed {
        PlanResponse::List(entries) | PlanResponse::Wrapped { songs: entries } => entries,
    })
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            client: Client::new(),
        }
    }

    fn models_for(requested: &str) -> Vec<&str> {
        let mut models = vec![requested];
        models.extend(FALLBACK_MODELS.iter().copied().filter(|m| *m != requested));
        models
    }

    /// Generate text, falling back through the model list.
    async fn generate(
        &self,
        operation: &str,
        model: &str,
        prompt: &str,
        json: bool,
    ) -> WorkerResult<String> {
        let mut last_error = None;

        for model in Self::models_for(model) {
            debug!("Attempting Gemini {} with model {}", operation, model);
            match self.call_gemini_api(operation, model, prompt, json).await {
                Ok(text) => {
                    info!("Gemini {} succeeded with {}", operation, model);
                    return Ok(text);
                }
                Err(e) => {
                    warn!("Gemini {} failed with model {}: {}", operation, model, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| WorkerError::collaborator(operation, "all Gemini models failed")))
    }

    async fn call_gemini_api(
        &self,
        operation: &str,
        model: &str,
        prompt: &str,
        json: bool,
    ) -> WorkerResult<String> {
        let url = format!("{}/{}:generateContent", API_BASE, model);

        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: json.then(|| GenerationConfig {
                response_mime_type: "application/json".to_string(),
            }),
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| WorkerError::collaborator(operation, format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(WorkerError::collaborator(
                operation,
                format!("Gemini API returned {}: {}", status, error_text),
            ));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            WorkerError::collaborator(operation, format!("unreadable Gemini response: {}", e))
        })?;

        let text = gemini_response
            .candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<String>()
            })
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| WorkerError::collaborator(operation, "no content in Gemini response"))?;

        Ok(strip_code_fence(&text).to_string())
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn generate_song_plan(&self, request: &PlanRequest) -> WorkerResult<Vec<PlanEntry>> {
        let prompt = format!(
            "Plan an album of {total} songs in {language} about: {concept}\n\
             Return ONLY a JSON array of {total} objects with \"title\" and \"description\" fields.",
            total = request.total,
            language = request.language,
            concept = request.prompt,
        );
        let text = self
            .generate("generate_song_plan", &request.model, &prompt, true)
            .await?;
        parse_plan(&text)
    }

    async fn generate_lyrics(&self, request: &LyricsRequest) -> WorkerResult<String> {
        let prompt = format!(
            "Write song lyrics in {language} for a {gender} voice, style {style}.\n\
             {brief}\n\
             Answer exactly in this format:\nTITLE: <title>\nPROMPT:\n<lyrics with [Verse]/[Chorus] markers>\nTAGS: <comma-separated music tags>",
            language = request.language,
            gender = request.gender,
            style = request.style,
            brief = request.prompt,
        );
        self.generate("generate_lyrics", &request.model, &prompt, false)
            .await
    }

    async fn generate_instrumental_prompt(
        &self,
        request: &InstrumentalRequest,
    ) -> WorkerResult<String> {
        let prompt = format!(
            "Describe an instrumental track in style {style} for a music generator, in at most 400 characters.\n\
             {brief}\n\
             Answer exactly in this format:\nTITLE: <title>\nPROMPT:\n<description>\nTAGS: <comma-separated music tags>",
            style = request.style,
            brief = request.prompt,
        );
        self.generate("generate_instrumental_prompt", &request.model, &prompt, false)
            .await
    }

    async fn refine_lyrics(&self, request: &RefineRequest) -> WorkerResult<String> {
        let prompt = format!(
            "Improve these {style} lyrics written for \"{concept}\". Keep the language and the \
             section markers. Return only the lyrics.\n\n{draft}",
            style = request.style,
            concept = request.original_prompt,
            draft = request.draft,
        );
        self.generate("refine_lyrics", &request.model, &prompt, false)
            .await
    }

    async fn generate_metadata(&self, request: &MetadataRequest) -> WorkerResult<VideoMetadata> {
        let prompt = format!(
            "Write YouTube metadata for a {style} music video about \"{concept}\".\n\
             Sample lyrics:\n{sample}\n\n\
             Answer with exactly three lines:\nTitle: <title>\nDescription: <description>\nTags: <comma-separated tags>",
            style = request.style,
            concept = request.prompt,
            sample = request.lyrics_sample,
        );
        let text = self
            .generate("generate_metadata", &request.model, &prompt, false)
            .await?;
        VideoMetadata::parse(&text)
            .map_err(|e| WorkerError::collaborator("generate_metadata", e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n[1, 2]\n```"), "[1, 2]");
        assert_eq!(strip_code_fence("```\nTitle: x\n```"), "Title: x");
        assert_eq!(strip_code_fence("  plain text "), "plain text");
    }

    #[test]
    fn test_parse_plan_variants() {
        let list = parse_plan(r#"[{"title": "A", "description": "first"}]"#).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].title, "A");

        let wrapped =
            parse_plan("```json\n{\"songs\": [{\"title\": \"B\"}, {\"title\": \"C\"}]}\n```")
                .unwrap();
        assert_eq!(wrapped.len(), 2);
        assert_eq!(wrapped[1].description, "");

        let err = parse_plan("not json").unwrap_err();
        assert!(err.is_collaborator_error());
    }

    #[test]
    fn test_model_fallback_order() {
        assert_eq!(
            GeminiClient::models_for("gemini-2.5-flash"),
            vec!["gemini-2.5-flash", "gemini-2.5-flash-lite", "gemini-2.5-pro"]
        );
        assert_eq!(GeminiClient::models_for("custom")[0], "custom");
        assert_eq!(GeminiClient::models_for("custom").len(), 4);
    }
}
