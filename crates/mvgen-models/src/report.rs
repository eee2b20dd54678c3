//! Final publication report.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::metadata::VideoMetadata;

/// Immutable record written once when a run completes.
///
/// Its presence on disk marks the project directory as finished; a resume
/// against that directory is refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PublicationReport {
    pub user_prompt: String,
    pub song_style: String,
    pub youtube_url: String,
    pub final_video_path: String,
    pub video_metadata: VideoMetadata,
    pub song_paths: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_json_shape() {
        let report = PublicationReport {
            user_prompt: "space".into(),
            song_style: "synthwave".into(),
            youtube_url: "https://www.youtube.com/watch?v=abc".into(),
            final_video_path: "/p/output/final_video.mp4".into(),
            video_metadata: VideoMetadata::new("T", "D", vec!["a".into()]),
            song_paths: vec!["/p/songs/1_a.mp3".into()],
        };

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["youtube_url"], "https://www.youtube.com/watch?v=abc");
        assert_eq!(json["video_metadata"]["tags"][0], "a");
        assert_eq!(json["song_paths"].as_array().unwrap().len(), 1);

        let back: PublicationReport = serde_json::from_value(json).unwrap();
        assert_eq!(back, report);
    }
}
