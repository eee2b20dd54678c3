//! Run registry: the `start` / `resume` / `status` surface.
//!
//! Each run executes in its own tokio task. Once it reaches DONE or FAILURE
//! the registry keeps only its final progress record and terminal state, and
//! only for the most recent finished runs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use metrics::counter;
use tokio::sync::{watch, RwLock};
use tracing::{info, info_span, Instrument};

use mvgen_models::{ProgressUpdate, RunConfig, RunId, RunState, RunStatus, Stage};

use crate::checkpoint::{route, ArtifactScanner};
use crate::context::RunContext;
use crate::error::{WorkerError, WorkerResult};
use crate::orchestrator::PipelineOrchestrator;
use crate::progress::ProgressReporter;

/// Finished runs whose status stays queryable.
pub const DEFAULT_FINISHED_RETENTION: usize = 32;

type RunMap = HashMap<RunId, Arc<RunHandle>>;

struct RunHandle {
    progress: ProgressReporter,
    cancel: watch::Sender<bool>,
    state: watch::Sender<RunState>,
    started_at: DateTime<Utc>,
    finished_at: Mutex<Option<DateTime<Utc>>>,
}

impl RunHandle {
    fn new() -> Self {
        let (cancel, _) = watch::channel(false);
        let (state, _) = watch::channel(RunState::Running);
        Self {
            progress: ProgressReporter::new(),
            cancel,
            state,
            started_at: Utc::now(),
            finished_at: Mutex::new(None),
        }
    }

    fn finish(&self, state: RunState) {
        if let Ok(mut finished) = self.finished_at.lock() {
            *finished = Some(Utc::now());
        }
        self.state.send_replace(state);
    }

    fn is_active(&self) -> bool {
        !self.state.borrow().is_terminal()
    }

    fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at.lock().ok().and_then(|f| *f)
    }

    fn status(&self, run_id: &RunId) -> RunStatus {
        RunStatus {
            run_id: run_id.clone(),
            state: *self.state.borrow(),
            progress: self.progress.latest(),
            started_at: self.started_at,
            finished_at: self.finished_at(),
        }
    }
}

/// Starts, resumes and tracks pipeline runs of one project.
#[derive(Clone)]
pub struct RunRegistry {
    orchestrator: PipelineOrchestrator,
    scanner: ArtifactScanner,
    runs: Arc<RwLock<RunMap>>,
    retention: usize,
}

impl RunRegistry {
    pub fn new(orchestrator: PipelineOrchestrator) -> Self {
        let scanner = ArtifactScanner::new(orchestrator.layout().clone());
        Self {
            orchestrator,
            scanner,
            runs: Arc::new(RwLock::new(HashMap::new())),
            retention: DEFAULT_FINISHED_RETENTION,
        }
    }

    /// Keep the status of at most `retention` finished runs (minimum 1).
    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention.max(1);
        self
    }

    /// Start a fresh run at PLAN.
    ///
    /// Refused when the project already holds lyrics, songs or a rendered
    /// video; those runs must be resumed instead.
    pub async fn start(&self, config: RunConfig) -> WorkerResult<RunId> {
        config.validate()?;
        let (run_id, handle) = self.reserve().await?;

        let snapshot = match self.scanner.scan() {
            Ok(snapshot) => snapshot,
            Err(e) => return Err(self.release(&run_id, e).await),
        };
        if !snapshot.is_fresh() {
            let e = WorkerError::config_error("project already has pipeline artifacts; use resume");
            return Err(self.release(&run_id, e).await);
        }

        let ctx = RunContext::new(run_id.clone(), config);
        self.launch(ctx, Stage::Plan, handle);
        Ok(run_id)
    }

    /// Resume from the artifacts on disk.
    ///
    /// Routing rejections (already complete, missing clips, not enough
    /// progress) are returned directly and no run is created.
    pub async fn resume(&self, config: RunConfig) -> WorkerResult<RunId> {
        config.validate()?;
        let (run_id, handle) = self.reserve().await?;

        let prepared = async {
            let snapshot = self.scanner.scan()?;
            let stage = route(&snapshot)?;
            info!(?snapshot, "Resuming at {}", stage);
            let ctx =
                RunContext::rehydrate(run_id.clone(), config, self.scanner.layout()).await?;
            Ok::<_, WorkerError>((ctx, stage))
        }
        .await;

        match prepared {
            Ok((ctx, stage)) => {
                self.launch(ctx, stage, handle);
                Ok(run_id)
            }
            Err(e) => Err(self.release(&run_id, e).await),
        }
    }

    pub async fn status(&self, run_id: &RunId) -> WorkerResult<RunStatus> {
        let handle = self.handle(run_id).await?;
        Ok(handle.status(run_id))
    }

    /// Request cancellation; honored before the next stage starts.
    pub async fn cancel(&self, run_id: &RunId) -> WorkerResult<()> {
        let handle = self.handle(run_id).await?;
        handle.cancel.send_replace(true);
        info!(run_id = %run_id, "Cancellation requested");
        Ok(())
    }

    /// Wait until the run reaches a terminal state.
    pub async fn wait(&self, run_id: &RunId) -> WorkerResult<RunStatus> {
        let handle = self.handle(run_id).await?;
        let mut rx = handle.state.subscribe();
        // the sender lives in the handle, so the channel cannot close here
        let _ = rx.wait_for(|state| state.is_terminal()).await;
        Ok(handle.status(run_id))
    }

    pub async fn subscribe(&self, run_id: &RunId) -> WorkerResult<watch::Receiver<ProgressUpdate>> {
        Ok(self.handle(run_id).await?.progress.subscribe())
    }

    async fn handle(&self, run_id: &RunId) -> WorkerResult<Arc<RunHandle>> {
        self.runs
            .read()
            .await
            .get(run_id)
            .cloned()
            .ok_or_else(|| WorkerError::RunNotFound(run_id.to_string()))
    }

    /// Register a new running handle, unless another run is active. The
    /// check and the insert happen under one write lock.
    async fn reserve(&self) -> WorkerResult<(RunId, Arc<RunHandle>)> {
        let mut runs = self.runs.write().await;
        if runs.values().any(|h| h.is_active()) {
            return Err(WorkerError::config_error(
                "another run is active on this project",
            ));
        }
        let run_id = RunId::new();
        let handle = Arc::new(RunHandle::new());
        runs.insert(run_id.clone(), Arc::clone(&handle));
        Ok((run_id, handle))
    }

    /// Drop a reservation whose run never started, passing `error` through.
    async fn release(&self, run_id: &RunId, error: WorkerError) -> WorkerError {
        self.runs.write().await.remove(run_id);
        error
    }

    fn launch(&self, ctx: RunContext, start: Stage, handle: Arc<RunHandle>) {
        let run_id = ctx.run_id.clone();
        let orchestrator = self.orchestrator.clone();
        let runs = Arc::clone(&self.runs);
        let retention = self.retention;
        let cancel_rx = handle.cancel.subscribe();
        let span = info_span!("run", run_id = %run_id, start = %start);

        tokio::spawn(
            async move {
                info!("Run started at {}", start);
                let result = orchestrator.run(ctx, start, &handle.progress, cancel_rx).await;

                let (state, outcome) = match &result {
                    Ok(_) => (RunState::Done, "done"),
                    Err(WorkerError::Cancelled) => (RunState::Failed, "cancelled"),
                    Err(_) => (RunState::Failed, "failed"),
                };
                counter!("mvgen_runs_total", "outcome" => outcome).increment(1);

                // this run is about to become one of the retained finished runs
                prune_finished(&mut *runs.write().await, &run_id, retention - 1);
                handle.finish(state);
                info!("Run finished: {}", state.as_str());
            }
            .instrument(span),
        );
    }
}

/// Remove the oldest finished runs other than `keep_id` until at most
/// `keep` remain.
fn prune_finished(runs: &mut RunMap, keep_id: &RunId, keep: usize) {
    let mut finished: Vec<(RunId, Option<DateTime<Utc>>)> = runs
        .iter()
        .filter(|(id, h)| *id != keep_id && !h.is_active())
        .map(|(id, h)| (id.clone(), h.finished_at()))
        .collect();
    if finished.len() <= keep {
        return;
    }
    finished.sort_by_key(|(_, at)| *at);
    let excess = finished.len() - keep;
    for (id, _) in finished.into_iter().take(excess) {
        runs.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finished_handle(state: RunState) -> Arc<RunHandle> {
        let handle = Arc::new(RunHandle::new());
        handle.finish(state);
        handle
    }

    #[test]
    fn test_prune_keeps_newest_finished_and_active_runs() {
        let mut runs = RunMap::new();
        let oldest = RunId::from_string("oldest");
        let older = RunId::from_string("older");
        let newest = RunId::from_string("newest");
        let active = RunId::from_string("active");
        let current = RunId::from_string("current");

        runs.insert(oldest.clone(), finished_handle(RunState::Failed));
        std::thread::sleep(std::time::Duration::from_millis(2));
        runs.insert(older.clone(), finished_handle(RunState::Done));
        std::thread::sleep(std::time::Duration::from_millis(2));
        runs.insert(newest.clone(), finished_handle(RunState::Done));
        runs.insert(active.clone(), Arc::new(RunHandle::new()));
        runs.insert(current.clone(), Arc::new(RunHandle::new()));

        prune_finished(&mut runs, &current, 1);

        assert!(runs.contains_key(&newest));
        assert!(runs.contains_key(&active));
        assert!(runs.contains_key(&current));
        assert!(!runs.contains_key(&oldest));
        assert!(!runs.contains_key(&older));
    }

    #[test]
    fn test_prune_noop_under_limit() {
        let mut runs = RunMap::new();
        let done = RunId::from_string("done");
        runs.insert(done.clone(), finished_handle(RunState::Done));

        prune_finished(&mut runs, &RunId::from_string("current"), 1);
        assert!(runs.contains_key(&done));
    }
}
