//! Per-line caption scheduling and rendering.
//!
//! Each track's lyrics are split into non-empty trimmed lines which share the
//! track's duration evenly. Every distinct line is rendered once to a
//! transparent full-frame PNG with `drawtext`; cues that repeat a line reuse
//! the same image.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::filters::escape_filter_value;
use crate::fs_utils::write_atomic;

/// Fade-in / fade-out length of each caption.
pub const CAPTION_FADE_SECS: f64 = 0.3;

/// One caption on the output timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionCue {
    /// Index of the audio track the line belongs to
    pub track: usize,
    pub text: String,
    /// Start on the concatenated timeline, in seconds
    pub start: f64,
    pub duration: f64,
}

impl CaptionCue {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// Non-empty trimmed lines of a lyrics text. Section markers such as
/// `[Chorus]` are kept as ordinary lines.
pub fn caption_lines(text: &str) -> Vec<&str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}

/// Lay out caption cues for tracks of the given durations.
///
/// Track `i` starts at the sum of the durations before it; its lines split
/// the track duration evenly. Tracks without lines produce no cues but still
/// advance the offset.
pub fn schedule_captions(durations: &[f64], texts: &[String]) -> Vec<CaptionCue> {
    let mut cues = Vec::new();
    let mut offset = 0.0;

    for (track, (&duration, text)) in durations.iter().zip(texts).enumerate() {
        let lines = caption_lines(text);
        if !lines.is_empty() {
            let per_line = duration / lines.len() as f64;
            for (j, line) in lines.into_iter().enumerate() {
                cues.push(CaptionCue {
                    track,
                    text: line.to_string(),
                    start: offset + j as f64 * per_line,
                    duration: per_line,
                });
            }
        }
        offset += duration;
    }

    cues
}

/// Distinct caption texts plus, per cue, the index of its text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptionSet {
    pub texts: Vec<String>,
    pub cue_sources: Vec<usize>,
}

/// Deduplicate cues by exact text.
pub fn dedupe_cues(cues: &[CaptionCue]) -> CaptionSet {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut set = CaptionSet::default();

    for cue in cues {
        let source = *index.entry(cue.text.as_str()).or_insert_with(|| {
            set.texts.push(cue.text.clone());
            set.texts.len() - 1
        });
        set.cue_sources.push(source);
    }

    set
}

/// Look of the rendered captions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionStyle {
    /// TrueType font; fontconfig's default sans font when unset
    #[serde(default)]
    pub font_file: Option<PathBuf>,
    #[serde(default = "default_font_size")]
    pub font_size: u32,
    #[serde(default = "default_font_color")]
    pub font_color: String,
    #[serde(default = "default_border_color")]
    pub border_color: String,
    #[serde(default = "default_border_width")]
    pub border_width: u32,
    /// Distance from the bottom edge to the last text line
    #[serde(default = "default_bottom_margin")]
    pub bottom_margin: u32,
}

fn default_font_size() -> u32 {
    48
}
fn default_font_color() -> String {
    "white".to_string()
}
fn default_border_color() -> String {
    "black".to_string()
}
fn default_border_width() -> u32 {
    3
}
fn default_bottom_margin() -> u32 {
    80
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            font_file: None,
            font_size: default_font_size(),
            font_color: default_font_color(),
            border_color: default_border_color(),
            border_width: default_border_width(),
            bottom_margin: default_bottom_margin(),
        }
    }
}

impl CaptionStyle {
    pub fn with_font_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.font_file = Some(path.into());
        self
    }

    pub fn with_font_size(mut self, size: u32) -> Self {
        self.font_size = size;
        self
    }

    /// Characters per line that fit in 90% of `width`.
    pub fn max_chars(&self, width: u32) -> usize {
        let glyph = (self.font_size.max(1) as f64) * 0.55;
        ((width as f64 * 0.9) / glyph).floor().max(10.0) as usize
    }

    /// `drawtext` filter reading its text from `textfile`.
    pub fn drawtext_filter(&self, textfile: &Path) -> String {
        let mut filter = format!(
            "drawtext=textfile={}:expansion=none:fontsize={}:fontcolor={}:borderw={}:bordercolor={}:line_spacing=8:x=(w-text_w)/2:y=h-text_h-{}",
            escape_filter_value(&textfile.to_string_lossy()),
            self.font_size,
            self.font_color,
            self.border_width,
            self.border_color,
            self.bottom_margin,
        );
        match &self.font_file {
            Some(font) => {
                filter.push_str(":fontfile=");
                filter.push_str(&escape_filter_value(&font.to_string_lossy()));
            }
            None => filter.push_str(":font=Sans"),
        }
        filter
    }
}

/// Greedy word wrap to `max_chars` per line. Words longer than a line are
/// kept whole.
pub fn wrap_caption(text: &str, max_chars: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }

    lines.join("\n")
}

/// Renders caption images into a job directory, once per distinct text.
pub struct CaptionRenderer {
    runner: FfmpegRunner,
    dir: PathBuf,
    style: CaptionStyle,
    width: u32,
    height: u32,
    cache: HashMap<String, PathBuf>,
}

impl CaptionRenderer {
    pub fn new(
        runner: FfmpegRunner,
        dir: impl Into<PathBuf>,
        style: CaptionStyle,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            runner,
            dir: dir.into(),
            style,
            width,
            height,
            cache: HashMap::new(),
        }
    }

    /// Number of images rendered so far.
    pub fn rendered(&self) -> usize {
        self.cache.len()
    }

    /// Image for `text`, rendering it on first use.
    pub async fn render(&mut self, text: &str) -> MediaResult<PathBuf> {
        if let Some(path) = self.cache.get(text) {
            return Ok(path.clone());
        }

        let n = self.cache.len();
        let textfile = self.dir.join(format!("caption_{}.txt", n));
        let image = self.dir.join(format!("caption_{}.png", n));

        write_atomic(&textfile, wrap_caption(text, self.style.max_chars(self.width))).await?;

        let canvas = format!(
            "color=c=black@0.0:s={}x{}:d=1,format=rgba",
            self.width, self.height
        );
        let cmd = FfmpegCommand::with_output(&image)
            .input_with(["-f", "lavfi"], canvas)
            .video_filter(self.style.drawtext_filter(&textfile))
            .single_frame()
            .pixel_format("rgba");

        self.runner.run(&cmd).await?;
        debug!(caption = n, "Rendered caption image {}", image.display());

        self.cache.insert(text.to_string(), image.clone());
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caption_lines() {
        let text = "  [Verse]\n\nfirst line  \n   \nsecond line\n";
        assert_eq!(caption_lines(text), vec!["[Verse]", "first line", "second line"]);
        assert!(caption_lines("\n  \n").is_empty());
    }

    #[test]
    fn test_time_per_line_sums_to_track() {
        let texts = vec!["a\nb\nc\nd".to_string()];
        let cues = schedule_captions(&[30.0], &texts);
        assert_eq!(cues.len(), 4);
        for cue in &cues {
            assert!((cue.duration - 7.5).abs() < 1e-9);
        }
        let sum: f64 = cues.iter().map(|c| c.duration).sum();
        assert!((sum - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_offsets_accumulate_over_empty_tracks() {
        let texts = vec!["x\ny".to_string(), "   ".to_string(), "z".to_string()];
        let cues = schedule_captions(&[10.0, 20.0, 5.0], &texts);
        assert_eq!(cues.len(), 3);
        assert_eq!(cues[1].start, 5.0);
        assert_eq!(cues[2].track, 2);
        assert_eq!(cues[2].start, 30.0);
        assert_eq!(cues[2].end(), 35.0);
    }

    #[test]
    fn test_cues_of_a_track_do_not_overlap() {
        let texts = vec!["1\n2\n3".to_string(), "4\n5\n6\n7\n8\n9\n10".to_string()];
        let cues = schedule_captions(&[30.0, 45.0], &texts);
        assert_eq!(cues.len(), 10);
        for pair in cues.windows(2) {
            if pair[0].track == pair[1].track {
                assert!(pair[0].end() <= pair[1].start + 1e-9);
            }
        }
        let last = cues.last().unwrap();
        assert!((last.end() - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_dedupe_by_exact_text() {
        let texts = vec!["la la\noh\nla la\nLa la".to_string()];
        let cues = schedule_captions(&[8.0], &texts);
        let set = dedupe_cues(&cues);
        assert_eq!(set.texts, vec!["la la", "oh", "La la"]);
        assert_eq!(set.cue_sources, vec![0, 1, 0, 2]);
    }

    #[test]
    fn test_wrap_caption() {
        assert_eq!(wrap_caption("one two three four", 9), "one two\nthree\nfour");
        assert_eq!(wrap_caption("supercalifragilistic", 5), "supercalifragilistic");
        assert_eq!(wrap_caption("  short  ", 40), "short");
    }

    #[test]
    fn test_drawtext_filter() {
        let style = CaptionStyle::default();
        let filter = style.drawtext_filter(Path::new("/tmp/job/caption_0.txt"));
        assert!(filter.starts_with("drawtext=textfile=/tmp/job/caption_0.txt:expansion=none"));
        assert!(filter.ends_with(":font=Sans"));

        let filter = style
            .with_font_file("/fonts/DejaVuSans.ttf")
            .drawtext_filter(Path::new("/tmp/c.txt"));
        assert!(filter.ends_with(":fontfile=/fonts/DejaVuSans.ttf"));
    }

    #[test]
    fn test_max_chars() {
        let style = CaptionStyle::default();
        assert_eq!(style.max_chars(1920), 65);
        assert_eq!(style.max_chars(100), 10);
    }
}
