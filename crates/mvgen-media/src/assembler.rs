//! Music video assembly.
//!
//! The assembler renders one video from an ordered list of audio tracks and
//! the clips found in a directory:
//!
//! 1. the audio tracks are concatenated into a single PCM soundtrack whose
//!    duration is the sum of the probed track durations;
//! 2. the clips are normalized to the output profile and joined, with
//!    crossfades where both neighbors are long enough, into a base loop;
//! 3. the base loop is repeated `ceil(total / base)` times through the concat
//!    demuxer and trimmed to exactly the soundtrack duration;
//! 4. optional per-line captions are overlaid with short alpha fades;
//! 5. the composite is encoded at the fixed profile into a temp file next to
//!    the output and renamed into place.
//!
//! All intermediates live in a per-job temporary directory that is removed
//! whether the render succeeds or fails.

use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tracing::{info, warn};

use mvgen_models::EncodingProfile;

use crate::captions::{dedupe_cues, schedule_captions, CaptionCue, CaptionRenderer, CaptionSet, CaptionStyle, CAPTION_FADE_SECS};
use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::{clip_chain, composite_graph, OverlayCue, BASE_LABEL, VIDEO_OUT_LABEL};
use crate::fs_utils::{list_files_with_extensions, move_file, partial_path, write_atomic};
use crate::probe::probe_duration;
use crate::timeline::{total_duration, LoopPlan};

/// Accepted source clip extensions (case-insensitive).
pub const CLIP_EXTENSIONS: &[&str] = &["mp4", "mov"];

/// Default crossfade between adjacent clips.
pub const DEFAULT_TRANSITION_SECS: f64 = 1.0;

/// FFmpeg input index of the first caption image in the composite.
const FIRST_CAPTION_INPUT: usize = 2;

/// Assembler settings.
#[derive(Debug, Clone)]
pub struct AssemblerConfig {
    /// Directory holding the source clips
    pub clips_dir: PathBuf,
    /// Canonical path of the rendered video
    pub output_path: PathBuf,
    /// Parent directory for per-job temporary directories
    pub work_dir: PathBuf,
    /// Crossfade length between clips; 0 disables crossfades
    pub transition_secs: f64,
    /// Final encode profile
    pub profile: EncodingProfile,
    pub caption_style: CaptionStyle,
    /// Per-FFmpeg-invocation timeout
    pub timeout_secs: Option<u64>,
}

impl AssemblerConfig {
    pub fn new(
        clips_dir: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            clips_dir: clips_dir.into(),
            output_path: output_path.into(),
            work_dir: work_dir.into(),
            transition_secs: DEFAULT_TRANSITION_SECS,
            profile: EncodingProfile::default(),
            caption_style: CaptionStyle::default(),
            timeout_secs: None,
        }
    }

    pub fn with_transition(mut self, secs: f64) -> Self {
        self.transition_secs = secs.max(0.0);
        self
    }

    pub fn with_profile(mut self, profile: EncodingProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_caption_style(mut self, style: CaptionStyle) -> Self {
        self.caption_style = style;
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}

/// Timing of one assembly, computed from probed durations.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyPlan {
    pub track_durations: Vec<f64>,
    /// Sum of the track durations
    pub total_duration: f64,
    pub loop_plan: LoopPlan,
    /// Caption cues in timeline order; empty when subtitles are off
    pub cues: Vec<CaptionCue>,
    /// Distinct caption texts referenced by the cues
    pub captions: CaptionSet,
}

impl AssemblyPlan {
    pub fn new(
        track_durations: Vec<f64>,
        base_duration: f64,
        texts: &[String],
        subtitles: bool,
    ) -> MediaResult<Self> {
        let total = total_duration(&track_durations);
        let loop_plan = LoopPlan::new(total, base_duration)?;
        let cues = if subtitles {
            schedule_captions(&track_durations, texts)
        } else {
            Vec::new()
        };
        let captions = dedupe_cues(&cues);

        Ok(Self {
            track_durations,
            total_duration: total,
            loop_plan,
            cues,
            captions,
        })
    }

    /// Overlay cues with caption images numbered from `first_input`.
    pub fn overlays(&self, first_input: usize) -> Vec<OverlayCue> {
        self.cues
            .iter()
            .zip(&self.captions.cue_sources)
            .map(|(cue, source)| OverlayCue {
                input: first_input + source,
                start: cue.start,
                end: cue.end(),
            })
            .collect()
    }
}

/// Result of a successful assembly.
#[derive(Debug, Clone)]
pub struct AssemblyOutput {
    pub path: PathBuf,
    pub total_duration: f64,
    pub loops: u32,
    pub caption_count: usize,
    pub captions_rendered: usize,
}

/// Renders music videos from audio tracks and source clips.
pub struct MediaAssembler {
    config: AssemblerConfig,
    runner: FfmpegRunner,
}

impl MediaAssembler {
    pub fn new(config: AssemblerConfig) -> Self {
        let mut runner = FfmpegRunner::new();
        if let Some(secs) = config.timeout_secs {
            runner = runner.with_timeout(secs);
        }
        Self { config, runner }
    }

    /// Kill any running FFmpeg child when the signal flips to `true`.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.runner = self.runner.with_cancel(cancel_rx);
        self
    }

    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    /// Source clips in natural order.
    pub fn list_clips(&self) -> MediaResult<Vec<PathBuf>> {
        list_files_with_extensions(&self.config.clips_dir, CLIP_EXTENSIONS)
    }

    /// Assemble and return the rendered video path.
    pub async fn assemble(
        &self,
        audio_paths: &[PathBuf],
        lyrics_texts: &[String],
        subtitles: bool,
    ) -> MediaResult<PathBuf> {
        self.assemble_with_progress(audio_paths, lyrics_texts, subtitles, |_| {})
            .await
            .map(|out| out.path)
    }

    /// Assemble, reporting the final encode's percentage through
    /// `on_progress`.
    ///
    /// With `subtitles` set there must be exactly one lyrics text per audio
    /// track; reconcile the lists first.
    pub async fn assemble_with_progress<F>(
        &self,
        audio_paths: &[PathBuf],
        lyrics_texts: &[String],
        subtitles: bool,
        on_progress: F,
    ) -> MediaResult<AssemblyOutput>
    where
        F: Fn(u8) + Send + Sync + 'static,
    {
        let clips = self.list_clips()?;
        if clips.is_empty() {
            return Err(MediaError::NoClips(self.config.clips_dir.clone()));
        }
        if audio_paths.is_empty() {
            return Err(MediaError::NoAudio);
        }
        if subtitles && lyrics_texts.len() != audio_paths.len() {
            return Err(MediaError::invalid_input(format!(
                "{} lyrics texts for {} audio tracks",
                lyrics_texts.len(),
                audio_paths.len()
            )));
        }

        tokio::fs::create_dir_all(&self.config.work_dir).await?;
        let job_dir = tempfile::Builder::new()
            .prefix("mvgen-assemble-")
            .tempdir_in(&self.config.work_dir)?;

        info!(
            audio_tracks = audio_paths.len(),
            clips = clips.len(),
            subtitles,
            "Assembling music video in {}",
            job_dir.path().display()
        );

        let result = self
            .render(job_dir.path(), &clips, audio_paths, lyrics_texts, subtitles, on_progress)
            .await;

        let job_path = job_dir.path().to_path_buf();
        if let Err(e) = job_dir.close() {
            warn!("Failed to remove assembly directory {}: {}", job_path.display(), e);
        }

        result
    }

    async fn render<F>(
        &self,
        job: &Path,
        clips: &[PathBuf],
        audio_paths: &[PathBuf],
        lyrics_texts: &[String],
        subtitles: bool,
        on_progress: F,
    ) -> MediaResult<AssemblyOutput>
    where
        F: Fn(u8) + Send + Sync + 'static,
    {
        let profile = &self.config.profile;

        let mut track_durations = Vec::with_capacity(audio_paths.len());
        for path in audio_paths {
            track_durations.push(probe_duration(path).await?);
        }

        let soundtrack = job.join("soundtrack.wav");
        self.concat_audio(job, audio_paths, &soundtrack).await?;

        let base = job.join("base.mp4");
        self.render_base(job, clips, &base).await?;
        let base_duration = probe_duration(&base).await?;

        let plan = AssemblyPlan::new(track_durations, base_duration, lyrics_texts, subtitles)?;
        info!(
            total_duration = plan.total_duration,
            base_duration,
            loops = plan.loop_plan.loops,
            captions = plan.cues.len(),
            "Assembly plan ready"
        );

        let loop_list = job.join("loop.txt");
        write_atomic(&loop_list, plan.loop_plan.concat_list(&base)).await?;

        let mut images = Vec::with_capacity(plan.captions.texts.len());
        if !plan.captions.texts.is_empty() {
            let captions_dir = job.join("captions");
            tokio::fs::create_dir_all(&captions_dir).await?;
            let mut renderer = CaptionRenderer::new(
                self.runner.clone(),
                captions_dir,
                self.config.caption_style.clone(),
                profile.width,
                profile.height,
            );
            for text in &plan.captions.texts {
                images.push(renderer.render(text).await?);
            }
        }

        let graph = composite_graph(
            plan.total_duration,
            &plan.overlays(FIRST_CAPTION_INPUT),
            CAPTION_FADE_SECS,
            profile.fps,
            &profile.pixel_format,
        );
        let script = job.join("composite.txt");
        write_atomic(&script, graph).await?;

        let output = &self.config.output_path;
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let partial = partial_path(output);

        let cmd = self.composite_command(
            &partial,
            &loop_list,
            &soundtrack,
            &images,
            &script,
            plan.total_duration,
        );

        let total = plan.total_duration;
        let encoded = self
            .runner
            .run_with_progress(&cmd, move |p| on_progress(p.percent(total)))
            .await;

        if let Err(e) = encoded {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e);
        }
        if let Err(e) = move_file(&partial, output).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e);
        }

        info!(
            "Rendered {} ({:.2}s, {} loops, {} captions)",
            output.display(),
            plan.total_duration,
            plan.loop_plan.loops,
            plan.cues.len()
        );

        Ok(AssemblyOutput {
            path: output.clone(),
            total_duration: plan.total_duration,
            loops: plan.loop_plan.loops,
            caption_count: plan.cues.len(),
            captions_rendered: images.len(),
        })
    }

    /// Final encode: looped base, soundtrack, then one still image per
    /// distinct caption line.
    fn composite_command(
        &self,
        partial: &Path,
        loop_list: &Path,
        soundtrack: &Path,
        images: &[PathBuf],
        script: &Path,
        total_duration: f64,
    ) -> FfmpegCommand {
        let profile = &self.config.profile;
        let mut cmd = FfmpegCommand::with_output(partial)
            .concat_list_input(loop_list)
            .input(soundtrack);
        for image in images {
            cmd = cmd.input(image);
        }
        cmd.filter_complex_script(script)
            .map(VIDEO_OUT_LABEL)
            .map("1:a")
            .video_codec(profile.video_codec.as_str())
            .preset(profile.preset.as_str())
            .video_bitrate(profile.video_bitrate.as_str())
            .audio_codec(profile.audio_codec.as_str())
            .audio_bitrate(profile.audio_bitrate.as_str())
            .frame_rate(profile.fps)
            .pixel_format(profile.pixel_format.as_str())
            .threads(profile.threads)
            .faststart()
            .duration(total_duration)
    }

    /// Concatenate the tracks into one 48 kHz stereo PCM soundtrack.
    async fn concat_audio(&self, job: &Path, audio_paths: &[PathBuf], out: &Path) -> MediaResult<()> {
        let mut graph = String::new();
        let mut cmd = FfmpegCommand::with_output(out);
        for (i, path) in audio_paths.iter().enumerate() {
            cmd = cmd.input(path);
            graph.push_str(&format!(
                "[{}:a]aresample=48000,aformat=sample_fmts=s16:channel_layouts=stereo[a{}];",
                i, i
            ));
        }
        for i in 0..audio_paths.len() {
            graph.push_str(&format!("[a{}]", i));
        }
        graph.push_str(&format!("concat=n={}:v=0:a=1[aout]", audio_paths.len()));

        let script = job.join("soundtrack.txt");
        write_atomic(&script, graph).await?;

        let cmd = cmd
            .filter_complex_script(&script)
            .map("[aout]")
            .audio_codec("pcm_s16le");
        self.runner.run(&cmd).await
    }

    /// Normalize and join the clips into the base loop.
    async fn render_base(&self, job: &Path, clips: &[PathBuf], out: &Path) -> MediaResult<()> {
        let profile = &self.config.profile;

        let mut durations = Vec::with_capacity(clips.len());
        for clip in clips {
            durations.push(probe_duration(clip).await?);
        }

        let chain = clip_chain(&durations, self.config.transition_secs, &profile.normalize_filter());
        info!(
            clips = clips.len(),
            crossfades = chain.crossfades,
            "Building base loop of about {:.2}s",
            chain.duration
        );

        let script = job.join("base.txt");
        write_atomic(&script, &chain.graph).await?;

        let mut cmd = FfmpegCommand::with_output(out);
        for clip in clips {
            cmd = cmd.input(clip);
        }
        let cmd = cmd
            .filter_complex_script(&script)
            .map(BASE_LABEL)
            .no_audio()
            .video_codec(profile.video_codec.as_str())
            .preset("veryfast")
            .crf(18)
            .frame_rate(profile.fps)
            .pixel_format(profile.pixel_format.as_str())
            .threads(profile.threads);
        self.runner.run(&cmd).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn two_tracks() -> Vec<String> {
        vec![
            "[Verse]\nline one\nline two\n\nline three".to_string(),
            "[Chorus]\nla la\nla la\noh".to_string(),
        ]
    }

    #[test]
    fn test_plan_two_tracks() {
        let plan = AssemblyPlan::new(vec![30.0, 45.0], 11.0, &two_tracks(), true).unwrap();

        assert!((plan.total_duration - 75.0).abs() < 0.05);
        assert_eq!(plan.loop_plan.loops, 7);
        assert_eq!(plan.loop_plan.trimmed_duration(), plan.total_duration);

        // every non-empty line gets a cue
        assert_eq!(plan.cues.len(), 8);
        assert_eq!(plan.captions.texts.len(), 7);

        for track in 0..2 {
            let cues: Vec<_> = plan.cues.iter().filter(|c| c.track == track).collect();
            let sum: f64 = cues.iter().map(|c| c.duration).sum();
            assert!((sum - plan.track_durations[track]).abs() < 1e-9);
            for pair in cues.windows(2) {
                assert!(pair[0].end() <= pair[1].start + 1e-9);
            }
        }
        assert_eq!(plan.cues[4].start, 30.0);
    }

    #[test]
    fn test_plan_overlays_share_images() {
        let plan = AssemblyPlan::new(vec![30.0, 45.0], 11.0, &two_tracks(), true).unwrap();
        let overlays = plan.overlays(FIRST_CAPTION_INPUT);
        assert_eq!(overlays.len(), 8);
        assert_eq!(overlays[0].input, 2);
        // both "la la" cues point at the same image
        assert_eq!(overlays[5].input, overlays[6].input);
    }

    #[test]
    fn test_plan_without_subtitles() {
        let plan = AssemblyPlan::new(vec![30.0, 45.0], 80.0, &[], false).unwrap();
        assert!(plan.cues.is_empty());
        assert_eq!(plan.loop_plan.loops, 1);
        assert!(plan.overlays(FIRST_CAPTION_INPUT).is_empty());
    }

    #[test]
    fn test_caption_images_are_single_frames() {
        let dir = TempDir::new().unwrap();
        let assembler = MediaAssembler::new(AssemblerConfig::new(
            dir.path().join("clips"),
            dir.path().join("final_video.mp4"),
            dir.path().join("work"),
        ));
        let images: Vec<PathBuf> = (0..3)
            .map(|i| dir.path().join(format!("caption_{}.png", i)))
            .collect();

        let args = assembler
            .composite_command(
                &dir.path().join("partial.mp4"),
                &dir.path().join("loop.txt"),
                &dir.path().join("soundtrack.wav"),
                &images,
                &dir.path().join("composite.txt"),
                1680.0,
            )
            .build_args();

        assert!(!args.iter().any(|a| a == "-loop"));
        // the only duration limit is the output's
        assert_eq!(args.iter().filter(|a| *a == "-t").count(), 1);
        assert_eq!(args.iter().filter(|a| *a == "-i").count(), 5);
        let first_image = args
            .iter()
            .position(|a| a.ends_with("caption_0.png"))
            .unwrap();
        assert_eq!(args[first_image - 1], "-i");
        assert_ne!(args[first_image - 2], "1680.000");
    }

    #[tokio::test]
    async fn test_missing_clips_is_fatal() {
        let dir = TempDir::new().unwrap();
        let config = AssemblerConfig::new(
            dir.path().join("clips"),
            dir.path().join("out").join("final_video.mp4"),
            dir.path().join("work"),
        );
        let assembler = MediaAssembler::new(config);

        let err = assembler
            .assemble(&[dir.path().join("1_a.mp3")], &[], false)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::NoClips(_)));
        assert!(err.is_missing_resource());
    }

    #[tokio::test]
    async fn test_empty_audio_is_fatal() {
        let dir = TempDir::new().unwrap();
        let clips = dir.path().join("clips");
        std::fs::create_dir_all(&clips).unwrap();
        std::fs::write(clips.join("1.mp4"), b"x").unwrap();

        let assembler = MediaAssembler::new(AssemblerConfig::new(
            &clips,
            dir.path().join("final_video.mp4"),
            dir.path().join("work"),
        ));
        let err = assembler.assemble(&[], &[], false).await.unwrap_err();
        assert!(matches!(err, MediaError::NoAudio));
    }

    #[tokio::test]
    async fn test_unreconciled_lyrics_rejected() {
        let dir = TempDir::new().unwrap();
        let clips = dir.path().join("clips");
        std::fs::create_dir_all(&clips).unwrap();
        std::fs::write(clips.join("1.MOV"), b"x").unwrap();

        let assembler = MediaAssembler::new(AssemblerConfig::new(
            &clips,
            dir.path().join("final_video.mp4"),
            dir.path().join("work"),
        ));
        let audio = vec![dir.path().join("1.mp3"), dir.path().join("2.mp3")];
        let err = assembler
            .assemble(&audio, &["only one".to_string()], true)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::InvalidInput(_)));
        // nothing was created under the work dir
        assert!(!dir.path().join("work").exists());
    }
}
