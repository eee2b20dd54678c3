//! Shared data models for the mvgen pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Run configuration, stages and progress records
//! - Song plans and lyrics artifacts
//! - Video metadata and the final publication report
//! - Natural filename ordering used for every artifact listing
//! - The fixed output encoding profile

pub mod encoding;
pub mod error;
pub mod lyrics;
pub mod metadata;
pub mod natural;
pub mod plan;
pub mod report;
pub mod run;

// Re-export common types
pub use encoding::EncodingProfile;
pub use error::{ModelError, ModelResult};
pub use lyrics::{sanitize_title, Gender, LyricsRecord};
pub use metadata::VideoMetadata;
pub use natural::{natural_cmp, sort_naturally, sort_paths_naturally};
pub use plan::{PlanEntry, SongPlanItem, TitleRegistry};
pub use report::PublicationReport;
pub use run::{ProgressUpdate, RunConfig, RunId, RunState, RunStatus, Stage};
