//! On-disk artifact layout of a project.

use std::path::{Path, PathBuf};

use mvgen_media::assembler::CLIP_EXTENSIONS;
use mvgen_media::list_files_with_extensions;

use crate::error::WorkerResult;

/// Song plan, written by PLAN.
pub const SONG_PLAN_FILE: &str = "song_plan.json";
/// Rendered video, written by ASSEMBLE.
pub const FINAL_VIDEO_FILE: &str = "final_video.mp4";
/// Three-line metadata record, written by METADATA.
pub const METADATA_FILE: &str = "video_metadata.txt";
/// Publication report, written once by REPORT.
pub const REPORT_FILE: &str = "publication_report.json";

pub const LYRICS_EXTENSIONS: &[&str] = &["txt"];
pub const SONG_EXTENSIONS: &[&str] = &["mp3"];

/// Directories holding a project's artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    pub lyrics_dir: PathBuf,
    pub songs_dir: PathBuf,
    pub clips_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl ArtifactLayout {
    pub fn new(
        lyrics_dir: impl Into<PathBuf>,
        songs_dir: impl Into<PathBuf>,
        clips_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            lyrics_dir: lyrics_dir.into(),
            songs_dir: songs_dir.into(),
            clips_dir: clips_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    /// `lyrics/`, `songs/`, `clips/` and `output/` under `root`.
    pub fn under(root: &Path) -> Self {
        Self::new(
            root.join("lyrics"),
            root.join("songs"),
            root.join("clips"),
            root.join("output"),
        )
    }

    pub fn song_plan_path(&self) -> PathBuf {
        self.output_dir.join(SONG_PLAN_FILE)
    }

    pub fn final_video_path(&self) -> PathBuf {
        self.output_dir.join(FINAL_VIDEO_FILE)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.output_dir.join(METADATA_FILE)
    }

    pub fn report_path(&self) -> PathBuf {
        self.output_dir.join(REPORT_FILE)
    }

    pub fn lyrics_path(&self, file_name: &str) -> PathBuf {
        self.lyrics_dir.join(file_name)
    }

    /// Lyrics artifacts in natural order.
    pub fn list_lyrics(&self) -> WorkerResult<Vec<PathBuf>> {
        Ok(list_files_with_extensions(&self.lyrics_dir, LYRICS_EXTENSIONS)?)
    }

    /// Synthesized songs in natural order.
    pub fn list_songs(&self) -> WorkerResult<Vec<PathBuf>> {
        Ok(list_files_with_extensions(&self.songs_dir, SONG_EXTENSIONS)?)
    }

    /// Source clips in natural order.
    pub fn list_clips(&self) -> WorkerResult<Vec<PathBuf>> {
        Ok(list_files_with_extensions(&self.clips_dir, CLIP_EXTENSIONS)?)
    }

    /// Create the directories stages write into.
    pub async fn ensure_dirs(&self) -> WorkerResult<()> {
        for dir in [&self.lyrics_dir, &self.songs_dir, &self.output_dir] {
            tokio::fs::create_dir_all(dir).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_output_paths() {
        let layout = ArtifactLayout::under(Path::new("/p"));
        assert_eq!(layout.song_plan_path(), PathBuf::from("/p/output/song_plan.json"));
        assert_eq!(layout.final_video_path(), PathBuf::from("/p/output/final_video.mp4"));
        assert_eq!(layout.metadata_path(), PathBuf::from("/p/output/video_metadata.txt"));
        assert_eq!(
            layout.report_path(),
            PathBuf::from("/p/output/publication_report.json")
        );
    }

    #[test]
    fn test_listings_filter_and_sort() {
        let dir = TempDir::new().unwrap();
        let layout = ArtifactLayout::under(dir.path());
        std::fs::create_dir_all(&layout.songs_dir).unwrap();
        for name in ["10_a.mp3", "2_a.mp3", "1_b.mp3", "notes.txt", "1_b.wav"] {
            std::fs::write(layout.songs_dir.join(name), b"x").unwrap();
        }

        let names: Vec<String> = layout
            .list_songs()
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["1_b.mp3", "2_a.mp3", "10_a.mp3"]);

        // missing directories list as empty
        assert!(layout.list_clips().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ensure_dirs_skips_clips() {
        let dir = TempDir::new().unwrap();
        let layout = ArtifactLayout::under(dir.path());
        layout.ensure_dirs().await.unwrap();
        assert!(layout.lyrics_dir.is_dir());
        assert!(layout.output_dir.is_dir());
        assert!(!layout.clips_dir.exists());
    }
}
