//! End-to-end assembly against real FFmpeg binaries.
//!
//! Skipped when `ffmpeg` or `ffprobe` is not on PATH.

use std::path::{Path, PathBuf};
use std::process::Command;

use mvgen_media::{
    check_ffmpeg, check_ffprobe, probe_media, reconcile_lyrics, AssemblerConfig, CaptionStyle,
    MediaAssembler,
};
use mvgen_models::EncodingProfile;
use tempfile::TempDir;

const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/Library/Fonts/Arial.ttf",
];

fn ffmpeg_available() -> bool {
    check_ffmpeg().is_ok() && check_ffprobe().is_ok()
}

fn has_encoder(name: &str) -> bool {
    Command::new("ffmpeg")
        .args(["-hide_banner", "-encoders"])
        .output()
        .map(|o| String::from_utf8_lossy(&o.stdout).contains(name))
        .unwrap_or(false)
}

fn has_filter(name: &str) -> bool {
    Command::new("ffmpeg")
        .args(["-hide_banner", "-filters"])
        .output()
        .map(|o| String::from_utf8_lossy(&o.stdout).contains(name))
        .unwrap_or(false)
}

fn caption_font() -> Option<PathBuf> {
    if !has_filter("drawtext") {
        return None;
    }
    FONT_CANDIDATES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}

fn ffmpeg(args: &[&str]) {
    let status = Command::new("ffmpeg")
        .args(["-y", "-v", "error"])
        .args(args)
        .status()
        .expect("ffmpeg runs");
    assert!(status.success(), "ffmpeg {:?} failed", args);
}

fn make_tone(path: &Path, secs: u32, freq: u32) {
    let src = format!("sine=frequency={}:duration={}:sample_rate=44100", freq, secs);
    ffmpeg(&["-f", "lavfi", "-i", &src, "-ac", "2", path.to_str().unwrap()]);
}

fn make_clip(path: &Path, secs: u32, size: &str) {
    let src = format!("testsrc=size={}:rate=25:duration={}", size, secs);
    ffmpeg(&[
        "-f",
        "lavfi",
        "-i",
        &src,
        "-pix_fmt",
        "yuv420p",
        "-c:v",
        "libx264",
        "-preset",
        "ultrafast",
        path.to_str().unwrap(),
    ]);
}

fn small_profile() -> EncodingProfile {
    let mut profile = EncodingProfile::default().with_size(320, 180).with_threads(2);
    profile.preset = "ultrafast".to_string();
    profile.video_bitrate = "300k".to_string();
    profile
}

struct Fixture {
    dir: TempDir,
    audio: Vec<PathBuf>,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let songs = dir.path().join("songs");
    let clips = dir.path().join("clips");
    std::fs::create_dir_all(&songs).unwrap();
    std::fs::create_dir_all(&clips).unwrap();

    let audio = vec![songs.join("1_First.wav"), songs.join("2_Second.wav")];
    make_tone(&audio[0], 30, 440);
    make_tone(&audio[1], 45, 660);

    make_clip(&clips.join("2_city.mp4"), 4, "640x360");
    make_clip(&clips.join("10_sea.MOV"), 3, "480x480");

    Fixture { dir, audio }
}

fn assembler(fixture: &Fixture, style: CaptionStyle) -> MediaAssembler {
    let root = fixture.dir.path();
    MediaAssembler::new(
        AssemblerConfig::new(
            root.join("clips"),
            root.join("output").join("final_video.mp4"),
            root.join("work"),
        )
        .with_profile(small_profile())
        .with_caption_style(style.with_font_size(18))
        .with_timeout(600),
    )
}

#[tokio::test]
async fn test_render_matches_soundtrack_length() {
    if !ffmpeg_available() || !has_encoder("libx264") {
        eprintln!("skipping: ffmpeg/ffprobe with libx264 not available");
        return;
    }

    let fixture = fixture();
    let font = caption_font();
    let subtitles = font.is_some();
    let style = match &font {
        Some(f) => CaptionStyle::default().with_font_file(f),
        None => CaptionStyle::default(),
    };

    let lyrics = vec![
        "[Verse]\nfirst line\nsecond line".to_string(),
        "[Chorus]\nla la\n\nla la".to_string(),
    ];
    let reconciled = reconcile_lyrics(&lyrics, fixture.audio.len(), subtitles);

    let out = assembler(&fixture, style)
        .assemble_with_progress(&fixture.audio, &reconciled.texts, reconciled.subtitles, |_| {})
        .await
        .unwrap();

    assert!(out.path.exists());
    assert!((out.total_duration - 75.0).abs() < 0.05);
    if subtitles {
        assert_eq!(out.caption_count, 6);
        assert_eq!(out.captions_rendered, 5);
    }

    let info = probe_media(&out.path).await.unwrap();
    let video = info.video.expect("video stream");
    assert_eq!((video.width, video.height), (320, 180));
    let audio_duration = info.audio_duration.expect("audio stream");
    assert!(
        (audio_duration - 75.0).abs() < 0.05,
        "audio duration {}",
        audio_duration
    );

    // the job directory is gone and no partial output is left behind
    let work_entries = std::fs::read_dir(fixture.dir.path().join("work")).unwrap().count();
    assert_eq!(work_entries, 0);
    let outputs: Vec<_> = std::fs::read_dir(fixture.dir.path().join("output"))
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(outputs, vec!["final_video.mp4"]);
}

#[tokio::test]
async fn test_failed_render_cleans_up() {
    if !ffmpeg_available() || !has_encoder("libx264") {
        eprintln!("skipping: ffmpeg/ffprobe not available");
        return;
    }

    let fixture = fixture();
    // not a media file: probing fails before anything is rendered
    let bogus = fixture.dir.path().join("songs").join("3_Broken.mp3");
    std::fs::write(&bogus, b"not audio").unwrap();

    let mut audio = fixture.audio.clone();
    audio.push(bogus);

    let result = assembler(&fixture, CaptionStyle::default())
        .assemble(&audio, &[], false)
        .await;
    assert!(result.is_err());

    let work_entries = std::fs::read_dir(fixture.dir.path().join("work")).unwrap().count();
    assert_eq!(work_entries, 0);
    assert!(!fixture.dir.path().join("output").join("final_video.mp4").exists());
}
