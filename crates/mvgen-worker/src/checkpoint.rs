//! Checkpoint scanning and resume routing.
//!
//! A run's position is reconstructed from artifacts alone: the scanner
//! counts what is on disk and [`route`] maps that snapshot to the stage a
//! resumed run starts at.

use serde::Serialize;

use mvgen_models::Stage;

use crate::error::{WorkerError, WorkerResult};
use crate::layout::ArtifactLayout;

/// What a project directory holds right now.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckpointSnapshot {
    pub lyrics_files: usize,
    pub song_files: usize,
    pub clip_files: usize,
    pub metadata_exists: bool,
    pub final_video_exists: bool,
    pub report_exists: bool,
}

impl CheckpointSnapshot {
    pub fn has_lyrics(&self) -> bool {
        self.lyrics_files > 0
    }

    pub fn has_songs(&self) -> bool {
        self.song_files > 0
    }

    /// Nothing a fresh run would overwrite.
    pub fn is_fresh(&self) -> bool {
        !self.has_lyrics() && !self.has_songs() && !self.final_video_exists && !self.report_exists
    }
}

/// Reads a [`CheckpointSnapshot`] off the filesystem.
#[derive(Debug, Clone)]
pub struct ArtifactScanner {
    layout: ArtifactLayout,
}

impl ArtifactScanner {
    pub fn new(layout: ArtifactLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    /// Fresh snapshot; never cached.
    pub fn scan(&self) -> WorkerResult<CheckpointSnapshot> {
        Ok(CheckpointSnapshot {
            lyrics_files: self.layout.list_lyrics()?.len(),
            song_files: self.layout.list_songs()?.len(),
            clip_files: self.layout.list_clips()?.len(),
            metadata_exists: self.layout.metadata_path().is_file(),
            final_video_exists: self.layout.final_video_path().is_file(),
            report_exists: self.layout.report_path().is_file(),
        })
    }
}

/// Stage a resumed run starts at, first matching rule wins.
pub fn route(snapshot: &CheckpointSnapshot) -> WorkerResult<Stage> {
    if snapshot.report_exists {
        return Err(WorkerError::AlreadyComplete);
    }
    if snapshot.final_video_exists && snapshot.metadata_exists {
        return Ok(Stage::Publish);
    }
    if snapshot.final_video_exists {
        return Ok(Stage::Metadata);
    }
    if snapshot.has_lyrics() && snapshot.has_songs() {
        if snapshot.clip_files == 0 {
            return Err(WorkerError::MissingClips);
        }
        return Ok(Stage::Assemble);
    }
    if snapshot.has_lyrics() {
        return Ok(Stage::Synth);
    }
    Err(WorkerError::NotEnoughProgress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"x").unwrap();
    }

    fn project() -> (TempDir, ArtifactScanner) {
        let dir = TempDir::new().unwrap();
        let scanner = ArtifactScanner::new(ArtifactLayout::under(dir.path()));
        (dir, scanner)
    }

    fn with_lyrics_and_songs(scanner: &ArtifactScanner) {
        let layout = scanner.layout();
        touch(&layout.lyrics_dir.join("1_Alpha.txt"));
        touch(&layout.lyrics_dir.join("2_Beta.txt"));
        touch(&layout.songs_dir.join("1_Alpha.mp3"));
    }

    fn three_songs(scanner: &ArtifactScanner, with_audio: bool, clips: usize) {
        let layout = scanner.layout();
        for (i, title) in ["Alpha", "Beta", "Gamma"].iter().enumerate() {
            touch(&layout.lyrics_dir.join(format!("{}_{}.txt", i + 1, title)));
            if with_audio {
                touch(&layout.songs_dir.join(format!("{}_{}.mp3", i + 1, title)));
            }
        }
        for i in 0..clips {
            touch(&layout.clips_dir.join(format!("clip{}.mp4", i + 1)));
        }
    }

    #[test]
    fn test_three_lyrics_no_songs_resume_at_synth() {
        let (_dir, scanner) = project();
        three_songs(&scanner, false, 0);

        let snapshot = scanner.scan().unwrap();
        assert_eq!(snapshot.lyrics_files, 3);
        assert_eq!(snapshot.song_files, 0);
        assert_eq!(route(&snapshot).unwrap(), Stage::Synth);
    }

    #[test]
    fn test_three_lyrics_three_songs_one_clip_resume_at_assemble() {
        let (_dir, scanner) = project();
        three_songs(&scanner, true, 1);

        let snapshot = scanner.scan().unwrap();
        assert_eq!((snapshot.lyrics_files, snapshot.song_files, snapshot.clip_files), (3, 3, 1));
        assert_eq!(route(&snapshot).unwrap(), Stage::Assemble);
    }

    #[test]
    fn test_three_lyrics_three_songs_no_clips_is_missing_clips() {
        let (_dir, scanner) = project();
        three_songs(&scanner, true, 0);

        let snapshot = scanner.scan().unwrap();
        assert_eq!(snapshot.clip_files, 0);
        let err = route(&snapshot).unwrap_err();
        assert!(matches!(err, WorkerError::MissingClips));
    }

    #[test]
    fn test_report_means_already_complete() {
        let (_dir, scanner) = project();
        with_lyrics_and_songs(&scanner);
        touch(&scanner.layout().final_video_path());
        touch(&scanner.layout().metadata_path());
        touch(&scanner.layout().report_path());

        let err = route(&scanner.scan().unwrap()).unwrap_err();
        assert!(matches!(err, WorkerError::AlreadyComplete));
    }

    #[test]
    fn test_video_and_metadata_resume_at_publish() {
        let (_dir, scanner) = project();
        touch(&scanner.layout().final_video_path());
        touch(&scanner.layout().metadata_path());

        assert_eq!(route(&scanner.scan().unwrap()).unwrap(), Stage::Publish);
    }

    #[test]
    fn test_video_only_resumes_at_metadata() {
        let (_dir, scanner) = project();
        with_lyrics_and_songs(&scanner);
        touch(&scanner.layout().final_video_path());

        assert_eq!(route(&scanner.scan().unwrap()).unwrap(), Stage::Metadata);
    }

    #[test]
    fn test_lyrics_and_songs_resume_at_assemble() {
        let (_dir, scanner) = project();
        with_lyrics_and_songs(&scanner);
        touch(&scanner.layout().clips_dir.join("1_city.MOV"));

        let snapshot = scanner.scan().unwrap();
        assert_eq!(snapshot.clip_files, 1);
        assert_eq!(route(&snapshot).unwrap(), Stage::Assemble);
    }

    #[test]
    fn test_assemble_requires_clips() {
        let (_dir, scanner) = project();
        with_lyrics_and_songs(&scanner);
        // wrong extension does not count as a clip
        touch(&scanner.layout().clips_dir.join("notes.txt"));

        let err = route(&scanner.scan().unwrap()).unwrap_err();
        assert!(matches!(err, WorkerError::MissingClips));
    }

    #[test]
    fn test_lyrics_only_resume_at_synth() {
        let (_dir, scanner) = project();
        touch(&scanner.layout().lyrics_dir.join("1_Alpha.txt"));

        assert_eq!(route(&scanner.scan().unwrap()).unwrap(), Stage::Synth);
    }

    #[test]
    fn test_empty_project_cannot_resume() {
        let (_dir, scanner) = project();
        let snapshot = scanner.scan().unwrap();
        assert!(snapshot.is_fresh());

        let err = route(&snapshot).unwrap_err();
        assert!(matches!(err, WorkerError::NotEnoughProgress));

        // songs without lyrics are not enough either
        touch(&scanner.layout().songs_dir.join("1_Alpha.mp3"));
        let err = route(&scanner.scan().unwrap()).unwrap_err();
        assert!(err.is_resume_rejection());
    }

    #[test]
    fn test_scan_is_idempotent() {
        let (_dir, scanner) = project();
        with_lyrics_and_songs(&scanner);
        touch(&scanner.layout().clips_dir.join("a.mp4"));

        let first = scanner.scan().unwrap();
        let second = scanner.scan().unwrap();
        assert_eq!(first, second);
        assert_eq!(route(&first).unwrap(), route(&second).unwrap());
    }

    #[test]
    fn test_partial_files_are_ignored() {
        let (_dir, scanner) = project();
        touch(&scanner.layout().lyrics_dir.join(".1_Alpha.partial-1a2b3c4d.txt"));

        let snapshot = scanner.scan().unwrap();
        assert_eq!(snapshot.lyrics_files, 0);
    }
}
