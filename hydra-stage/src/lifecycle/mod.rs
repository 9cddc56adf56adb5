//! Worker lifecycle for a single stage instance.
//!
//! This module provides:
//! - [`LifecycleController`], which owns the one worker task of a stage
//! - [`StopToken`] for cooperative stopping between documents
//! - [`TerminationHandler`], which turns a process signal into a graceful
//!   shutdown that lets the in-flight document finish
//! - [`run_destroy_hook`] for best-effort stage cleanup

mod cleanup;
mod stop;
mod termination;


pub use cleanup::{run_destroy_hook, CleanupOutcome};
pub use stop::StopToken;
pub use termination::{shutdown_signal, TerminationHandler};

use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::WorkerConfig;
use crate::document::Document;
use crate::errors::LifecycleError;
use crate::identity::StageIdentity;
use crate::observability::SpanTimer;
use crate::pipeline::RemotePipeline;
use crate::stages::Stage;

/// State of the worker task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Not started yet.
    Created,
    /// Fetching and processing documents.
    Running,
    /// Stop requested; the current document is still being finished.
    StopRequested,
    /// The worker loop has exited.
    Stopped,
}

/// Counters for documents handled by the worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStats {
    /// Documents processed successfully.
    pub processed: u64,
    /// Documents whose processing failed.
    pub failed: u64,
}

/// Owns the single worker task of a stage and its shutdown discipline.
pub struct LifecycleController {
    identity: StageIdentity,
    stage: Arc<dyn Stage>,
    pipeline: Arc<dyn RemotePipeline>,
    config: WorkerConfig,
    stop: StopToken,
    state: watch::Sender<WorkerState>,
    worker: Mutex<Option<JoinHandle<()>>>,
    destroyed: AtomicBool,
    processed: AtomicU64,
    failed: AtomicU64,
}

impl LifecycleController {
    /// Creates a controller in the `Created` state.
    #[must_use]
    pub fn new(
        identity: StageIdentity,
        stage: Arc<dyn Stage>,
        pipeline: Arc<dyn RemotePipeline>,
        config: WorkerConfig,
    ) -> Arc<Self> {
        let (state, _) = watch::channel(WorkerState::Created);
        Arc::new(Self {
            identity,
            stage,
            pipeline,
            config,
            stop: StopToken::new(),
            state,
            worker: Mutex::new(None),
            destroyed: AtomicBool::new(false),
            processed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        })
    }

    /// The identity of the stage this controller runs.
    #[must_use]
    pub fn identity(&self) -> &StageIdentity {
        &self.identity
    }

    /// Starts the worker and registers the process-signal termination handler.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::AlreadyStarted`] unless the controller is in
    /// the `Created` state.
    pub fn start(self: &Arc<Self>) -> Result<TerminationHandler, LifecycleError> {
        self.start_with_signal(shutdown_signal())
    }

    /// Starts the worker with `signal` as the termination trigger.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::AlreadyStarted`] unless the controller is in
    /// the `Created` state.
    pub fn start_with_signal<S>(self: &Arc<Self>, signal: S) -> Result<TerminationHandler, LifecycleError>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let mut previous = WorkerState::Created;
        let started = self.state.send_if_modified(|state| {
            previous = *state;
            if *state == WorkerState::Created {
                *state = WorkerState::Running;
                true
            } else {
                false
            }
        });

        if !started {
            return Err(LifecycleError::AlreadyStarted {
                stage: self.identity.name().to_string(),
                state: previous,
            });
        }

        let worker = Arc::clone(self);
        let handle = tokio::spawn(async move { worker.run_worker().await });
        *self.worker.lock() = Some(handle);

        info!(stage = %self.identity, "Started stage");
        Ok(TerminationHandler::install(Arc::clone(self), signal))
    }

    /// Requests the worker to stop after the current document.
    ///
    /// Idempotent; only has an effect while the worker is `Running`.
    pub fn request_stop(&self) {
        self.request_stop_because("stop requested");
    }

    fn request_stop_because(&self, reason: &str) {
        let transitioned = self.state.send_if_modified(|state| {
            if *state == WorkerState::Running {
                *state = WorkerState::StopRequested;
                true
            } else {
                false
            }
        });

        if transitioned {
            self.stop.stop(reason);
            info!(stage = %self.identity.name(), reason, "Stop requested");
        }
    }

    /// Whether the worker is running and has not been asked to stop.
    #[must_use]
    pub fn is_running(&self) -> bool {
        *self.state.borrow() == WorkerState::Running
    }

    /// The current worker state.
    #[must_use]
    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// Subscribes to worker state changes.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    /// Document counters so far.
    #[must_use]
    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            processed: self.processed.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }

    /// Stops the worker, waits for it, and runs the stage cleanup hook.
    ///
    /// Waits without a timeout for the in-flight document to finish. Safe to
    /// call more than once: the worker is joined once and the cleanup hook runs
    /// once. Returns the cleanup outcome from the call that ran the hook and
    /// `None` from every other call.
    pub async fn shutdown(&self) -> Option<CleanupOutcome> {
        info!(stage = %self.identity.name(), "Shutting down stage");
        self.request_stop_because("termination signal");

        // never started: nothing to join
        self.state.send_if_modified(|state| {
            if *state == WorkerState::Created {
                *state = WorkerState::Stopped;
                true
            } else {
                false
            }
        });

        let mut changes = self.state.subscribe();
        if changes.wait_for(|state| *state == WorkerState::Stopped).await.is_err() {
            warn!(stage = %self.identity.name(), "Worker state channel closed before stop");
        }

        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(stage = %self.identity.name(), error = %e, "Worker task ended abnormally");
            }
        }

        if self.destroyed.swap(true, Ordering::SeqCst) {
            debug!(stage = %self.identity.name(), "Cleanup hook already ran");
            return None;
        }

        let outcome = run_destroy_hook(self.identity.name(), self.stage.as_ref());
        info!(
            stage = %self.identity.name(),
            processed = self.processed.load(Ordering::SeqCst),
            failed = self.failed.load(Ordering::SeqCst),
            "Stage shutdown complete"
        );
        Some(outcome)
    }

    async fn run_worker(self: Arc<Self>) {
        let _stopped = MarkStoppedOnExit(&self.state);
        let query = self.stage.base().document_query();
        let hold = self.config.hold_interval();

        debug!(stage = %self.identity.name(), ?query, "Worker loop started");

        while !self.stop.is_stopped() {
            match self.pipeline.fetch_document(&query).await {
                Ok(Some(document)) => self.process_document(document).await,
                Ok(None) => self.hold(hold).await,
                Err(e) => {
                    warn!(stage = %self.identity.name(), error = %e, "Failed to fetch document");
                    self.hold(hold).await;
                }
            }
        }

        info!(
            stage = %self.identity.name(),
            reason = ?self.stop.reason(),
            "Worker loop exited"
        );
    }

    async fn hold(&self, interval: Duration) {
        tokio::select! {
            () = tokio::time::sleep(interval) => {}
            () = self.stop.stopped() => {}
        }
    }

    async fn process_document(&self, mut document: Document) {
        let timer = SpanTimer::start();
        let outcome = AssertUnwindSafe(self.stage.process(&mut document))
            .catch_unwind()
            .await;

        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(panic) => Some(format!(
                "stage panicked: {}",
                cleanup::panic_message(panic.as_ref())
            )),
        };
        let duration_ms = timer.finish();

        match failure {
            None => {
                self.processed.fetch_add(1, Ordering::SeqCst);
                debug!(
                    stage = %self.identity.name(),
                    document_id = %document.display_id(),
                    duration_ms,
                    "Processed document"
                );
                if let Err(e) = self.pipeline.submit(&document).await {
                    warn!(
                        stage = %self.identity.name(),
                        document_id = %document.display_id(),
                        error = %e,
                        "Failed to submit processed document"
                    );
                }
            }
            Some(reason) => {
                self.failed.fetch_add(1, Ordering::SeqCst);
                warn!(
                    stage = %self.identity.name(),
                    document_id = %document.display_id(),
                    duration_ms,
                    error = %reason,
                    "Failed to process document"
                );
                if let Err(e) = self.pipeline.mark_failed(&document, &reason).await {
                    warn!(
                        stage = %self.identity.name(),
                        document_id = %document.display_id(),
                        error = %e,
                        "Failed to report document failure"
                    );
                }
            }
        }
    }
}

impl std::fmt::Debug for LifecycleController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleController")
            .field("identity", &self.identity)
            .field("state", &self.state())
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

/// Publishes `Stopped` when the worker future ends, including by panic.
struct MarkStoppedOnExit<'a>(&'a watch::Sender<WorkerState>);

impl Drop for MarkStoppedOnExit<'_> {
    fn drop(&mut self) {
        self.0.send_replace(WorkerState::Stopped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{InMemoryPipeline, RecordingStage};

    fn controller(stage: Arc<dyn Stage>, pipeline: Arc<InMemoryPipeline>) -> Arc<LifecycleController> {
        LifecycleController::new(
            StageIdentity::with_defaults("test-stage"),
            stage,
            pipeline,
            WorkerConfig::default().with_hold_interval(Duration::from_millis(10)),
        )
    }

    #[tokio::test]
    async fn test_initial_state() {
        let ctrl = controller(Arc::new(RecordingStage::new()), Arc::new(InMemoryPipeline::new()));
        assert_eq!(ctrl.state(), WorkerState::Created);
        assert!(!ctrl.is_running());
        assert_eq!(ctrl.stats(), WorkerStats::default());
    }

    #[tokio::test]
    async fn test_request_stop_before_start_is_noop() {
        let ctrl = controller(Arc::new(RecordingStage::new()), Arc::new(InMemoryPipeline::new()));
        ctrl.request_stop();
        assert_eq!(ctrl.state(), WorkerState::Created);
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let ctrl = controller(Arc::new(RecordingStage::new()), Arc::new(InMemoryPipeline::new()));
        let _handler = ctrl.start_with_signal(std::future::pending()).unwrap();
        assert!(ctrl.is_running());

        let err = ctrl.start_with_signal(std::future::pending()).unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::AlreadyStarted {
                state: WorkerState::Running,
                ..
            }
        ));

        ctrl.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_without_start_runs_cleanup() {
        let stage = Arc::new(RecordingStage::new());
        let ctrl = controller(stage.clone(), Arc::new(InMemoryPipeline::new()));

        let outcome = ctrl.shutdown().await;
        assert_eq!(outcome, Some(CleanupOutcome::Completed));
        assert_eq!(ctrl.state(), WorkerState::Stopped);
        assert_eq!(stage.destroy_count(), 1);
        assert!(ctrl.start_with_signal(std::future::pending()).is_err());
    }
}
