#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper and music video assembly.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with multiple inputs
//! - Progress parsing from `-progress pipe:2`
//! - FFprobe duration and stream probing
//! - Timeline math for looping clips under a concatenated soundtrack
//! - Caption scheduling, rendering and overlay filter graphs
//! - Atomic artifact writes and naturally ordered directory listings
//! - The `MediaAssembler` that ties it all together

pub mod assembler;
pub mod captions;
pub mod command;
pub mod error;
pub mod filters;
pub mod fs_utils;
pub mod probe;
pub mod progress;
pub mod reconcile;
pub mod timeline;

pub use assembler::{AssemblerConfig, AssemblyOutput, AssemblyPlan, MediaAssembler};
pub use captions::{CaptionCue, CaptionStyle};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use fs_utils::{list_files_with_extensions, move_file, write_atomic};
pub use probe::{probe_duration, probe_media, MediaInfo};
pub use progress::{FfmpegProgress, ProgressCallback};
pub use reconcile::{reconcile_lyrics, Reconciled};
pub use timeline::LoopPlan;
