//! Timeline math for looping the clip base under the soundtrack.

use std::path::Path;

use crate::error::{MediaError, MediaResult};

/// Tolerance for float noise when a total is an exact multiple of the base.
const LOOP_EPSILON: f64 = 1e-9;

/// Sum of track durations in seconds.
pub fn total_duration(durations: &[f64]) -> f64 {
    durations.iter().sum()
}

/// `ceil(total / base)`, at least one.
pub fn loops_needed(total: f64, base: f64) -> u32 {
    ((total / base) - LOOP_EPSILON).ceil().max(1.0) as u32
}

/// How the base loop is replicated and trimmed to the soundtrack length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopPlan {
    /// Duration of one pass over the clips
    pub base_duration: f64,
    /// Soundtrack duration the video is trimmed to
    pub total_duration: f64,
    /// Number of base passes concatenated before trimming
    pub loops: u32,
}

impl LoopPlan {
    pub fn new(total_duration: f64, base_duration: f64) -> MediaResult<Self> {
        if !(base_duration.is_finite() && base_duration > 0.0) {
            return Err(MediaError::invalid_media(format!(
                "base loop duration must be positive, got {}",
                base_duration
            )));
        }
        if !(total_duration.is_finite() && total_duration > 0.0) {
            return Err(MediaError::invalid_media(format!(
                "soundtrack duration must be positive, got {}",
                total_duration
            )));
        }

        Ok(Self {
            base_duration,
            total_duration,
            loops: loops_needed(total_duration, base_duration),
        })
    }

    /// Length of the replicated stream before trimming.
    pub fn replicated_duration(&self) -> f64 {
        self.base_duration * self.loops as f64
    }

    /// Length after trimming: exactly the soundtrack duration.
    pub fn trimmed_duration(&self) -> f64 {
        self.total_duration
    }

    /// Concat-demuxer list repeating `base` once per loop.
    pub fn concat_list(&self, base: &Path) -> String {
        let entry = concat_list_entry(base);
        let mut list = String::new();
        for _ in 0..self.loops {
            list.push_str(&entry);
        }
        list
    }
}

/// One `file '...'` line for the concat demuxer.
pub fn concat_list_entry(path: &Path) -> String {
    let escaped = path.to_string_lossy().replace('\'', "'\\''");
    format!("file '{}'\n", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_duration_is_sum() {
        let total = total_duration(&[30.0, 45.0]);
        assert!((total - 75.0).abs() < 0.05);
        assert_eq!(total_duration(&[]), 0.0);
    }

    #[test]
    fn test_loops_needed() {
        assert_eq!(loops_needed(75.0, 25.0), 3);
        assert_eq!(loops_needed(76.0, 25.0), 4);
        assert_eq!(loops_needed(10.0, 30.0), 1);
        assert_eq!(loops_needed(0.1 + 0.2, 0.1), 3);
    }

    #[test]
    fn test_loop_plan_covers_and_trims() {
        for (total, base) in [(75.0, 11.0), (3600.0, 57.3), (5.0, 5.0), (2.5, 9.0)] {
            let plan = LoopPlan::new(total, base).unwrap();
            assert!(plan.replicated_duration() >= total - 1e-6);
            assert!(plan.replicated_duration() - base < total);
            assert_eq!(plan.trimmed_duration(), total);
        }
    }

    #[test]
    fn test_loop_plan_rejects_empty_base() {
        assert!(LoopPlan::new(10.0, 0.0).is_err());
        assert!(LoopPlan::new(0.0, 5.0).is_err());
    }

    #[test]
    fn test_concat_list() {
        let plan = LoopPlan::new(50.0, 20.0).unwrap();
        let list = plan.concat_list(Path::new("/tmp/job/base.mp4"));
        assert_eq!(list.lines().count(), 3);
        assert!(list.starts_with("file '/tmp/job/base.mp4'\n"));
        assert_eq!(
            concat_list_entry(Path::new("/a/it's.mp3")),
            "file '/a/it'\\''s.mp3'\n"
        );
    }
}
