//! Run progress reporting.
//!
//! The orchestrator is the only writer; observers hold receivers and read
//! the latest `{stage, percent, detail}` record. Percent never decreases.

use std::sync::Arc;
use tokio::sync::watch;

use mvgen_models::{ProgressUpdate, Stage};

/// Boxed percentage callback handed to long-running renders.
pub type RenderCallback = Box<dyn Fn(u8) + Send + Sync>;

/// Single-writer progress sink of one run.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    tx: Arc<watch::Sender<ProgressUpdate>>,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ProgressUpdate::queued());
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> watch::Receiver<ProgressUpdate> {
        self.tx.subscribe()
    }

    pub fn latest(&self) -> ProgressUpdate {
        self.tx.borrow().clone()
    }

    /// Publish an update, keeping the highest percent seen so far.
    pub fn report(&self, update: ProgressUpdate) {
        self.tx.send_modify(|current| {
            let percent = update.percent.max(current.percent);
            *current = ProgressUpdate {
                percent,
                ..update
            };
        });
    }

    /// Enter `stage`, the `completed`-th of `total` active stages.
    pub fn stage(&self, stage: Stage, completed: usize, total: usize) -> StageProgress {
        let percent = ProgressUpdate::percent_for(completed, total);
        let progress = StageProgress {
            reporter: self.clone(),
            stage,
            percent,
        };
        progress.detail(format!("{} started", stage));
        progress
    }

    pub fn done(&self) {
        self.report(ProgressUpdate::new(Stage::Done, 100, "done"));
    }

    /// Terminal failure; the percent reached so far is kept.
    pub fn fail(&self, detail: impl Into<String>) {
        let percent = self.tx.borrow().percent;
        self.report(ProgressUpdate::new(Stage::Failure, percent, detail));
    }
}

/// Progress handle of one stage. Sub-steps repeat the stage's percent.
#[derive(Debug, Clone)]
pub struct StageProgress {
    reporter: ProgressReporter,
    stage: Stage,
    percent: u8,
}

impl StageProgress {
    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    pub fn detail(&self, detail: impl Into<String>) {
        self.reporter
            .report(ProgressUpdate::new(self.stage, self.percent, detail));
    }

    /// Callback publishing "rendering NN%" details, skipping repeats.
    pub fn render_callback(&self) -> RenderCallback {
        let progress = self.clone();
        let last = std::sync::atomic::AtomicU8::new(u8::MAX);
        Box::new(move |pct: u8| {
            if last.swap(pct, std::sync::atomic::Ordering::Relaxed) != pct {
                progress.detail(format!("rendering {}%", pct));
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_update_is_queued() {
        let reporter = ProgressReporter::new();
        assert_eq!(reporter.latest(), ProgressUpdate::queued());
    }

    #[test]
    fn test_stage_percent() {
        let reporter = ProgressReporter::new();
        let progress = reporter.stage(Stage::Synth, 3, 7);
        assert_eq!(progress.percent(), 43);

        let latest = reporter.latest();
        assert_eq!(latest.stage, Stage::Synth);
        assert_eq!(latest.detail, "synth started");
    }

    #[test]
    fn test_percent_never_decreases() {
        let reporter = ProgressReporter::new();
        reporter.stage(Stage::Assemble, 4, 7);
        reporter.report(ProgressUpdate::new(Stage::Metadata, 10, "late update"));

        let latest = reporter.latest();
        assert_eq!(latest.stage, Stage::Metadata);
        assert_eq!(latest.percent, 57);
    }

    #[test]
    fn test_render_callback_details() {
        let reporter = ProgressReporter::new();
        let progress = reporter.stage(Stage::Assemble, 4, 8);
        let callback = progress.render_callback();

        callback(12);
        assert_eq!(reporter.latest().detail, "rendering 12%");
        assert_eq!(reporter.latest().percent, 50);
    }

    #[tokio::test]
    async fn test_subscribers_see_done() {
        let reporter = ProgressReporter::new();
        let mut rx = reporter.subscribe();

        reporter.stage(Stage::Report, 7, 8);
        reporter.done();

        rx.changed().await.unwrap();
        let update = rx.borrow_and_update().clone();
        assert_eq!(update.stage, Stage::Done);
        assert_eq!(update.percent, 100);
    }

    #[test]
    fn test_fail_keeps_percent() {
        let reporter = ProgressReporter::new();
        reporter.stage(Stage::Synth, 3, 7);
        reporter.fail("no audio");

        let latest = reporter.latest();
        assert_eq!(latest.stage, Stage::Failure);
        assert_eq!(latest.percent, 43);
        assert_eq!(latest.detail, "no audio");
    }
}
