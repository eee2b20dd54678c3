//! Output encoding profile for the rendered music video.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default encoding preset
pub const DEFAULT_PRESET: &str = "medium";
/// Default video bitrate
pub const DEFAULT_VIDEO_BITRATE: &str = "4000k";
/// Default audio bitrate
pub const DEFAULT_AUDIO_BITRATE: &str = "192k";
/// Output frame size
pub const DEFAULT_WIDTH: u32 = 1920;
pub const DEFAULT_HEIGHT: u32 = 1080;
/// Output frame rate
pub const DEFAULT_FPS: u32 = 30;
/// Pixel format compatible with every player
pub const DEFAULT_PIXEL_FORMAT: &str = "yuv420p";
/// Encoder threads
pub const DEFAULT_THREADS: usize = 4;

/// Fixed codec / bitrate / frame-rate profile of the final render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EncodingProfile {
    #[serde(default = "default_video_codec")]
    pub video_codec: String,

    #[serde(default = "default_preset")]
    pub preset: String,

    #[serde(default = "default_video_bitrate")]
    pub video_bitrate: String,

    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    #[serde(default = "default_fps")]
    pub fps: u32,

    #[serde(default = "default_pixel_format")]
    pub pixel_format: String,

    /// FFmpeg worker threads for the final encode
    #[serde(default = "default_threads")]
    pub threads: usize,
}

fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_preset() -> String {
    DEFAULT_PRESET.to_string()
}
fn default_video_bitrate() -> String {
    DEFAULT_VIDEO_BITRATE.to_string()
}
fn default_audio_codec() -> String {
    DEFAULT_AUDIO_CODEC.to_string()
}
fn default_audio_bitrate() -> String {
    DEFAULT_AUDIO_BITRATE.to_string()
}
fn default_width() -> u32 {
    DEFAULT_WIDTH
}
fn default_height() -> u32 {
    DEFAULT_HEIGHT
}
fn default_fps() -> u32 {
    DEFAULT_FPS
}
fn default_pixel_format() -> String {
    DEFAULT_PIXEL_FORMAT.to_string()
}
fn default_threads() -> usize {
    DEFAULT_THREADS
}

impl Default for EncodingProfile {
    fn default() -> Self {
        Self {
            video_codec: default_video_codec(),
            preset: default_preset(),
            video_bitrate: default_video_bitrate(),
            audio_codec: default_audio_codec(),
            audio_bitrate: default_audio_bitrate(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            fps: DEFAULT_FPS,
            pixel_format: default_pixel_format(),
            threads: DEFAULT_THREADS,
        }
    }
}

impl EncodingProfile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    /// Scale-and-pad filter that fits any clip into the output frame.
    pub fn normalize_filter(&self) -> String {
        format!(
            "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1,fps={fps},format={pix}",
            w = self.width,
            h = self.height,
            fps = self.fps,
            pix = self.pixel_format
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profile() {
        let profile = EncodingProfile::default();
        assert_eq!(profile.video_codec, "libx264");
        assert_eq!(profile.audio_codec, "aac");
        assert_eq!(profile.fps, 30);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let profile: EncodingProfile = serde_json::from_str(r#"{"fps": 24}"#).unwrap();
        assert_eq!(profile.fps, 24);
        assert_eq!(profile.width, DEFAULT_WIDTH);
    }

    #[test]
    fn test_normalize_filter() {
        let filter = EncodingProfile::default().with_size(1280, 720).normalize_filter();
        assert!(filter.starts_with("scale=1280:720"));
        assert!(filter.contains("fps=30"));
        assert!(filter.ends_with("format=yuv420p"));
    }
}
