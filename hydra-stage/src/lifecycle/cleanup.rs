//! Best-effort execution of a stage's cleanup hook.

use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{error, warn};

use crate::stages::Stage;

/// Outcome of running a cleanup hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupOutcome {
    /// The hook returned `Ok`.
    Completed,
    /// The hook returned an error.
    Failed(String),
    /// The hook panicked.
    Panicked(String),
}

impl CleanupOutcome {
    /// Whether the hook completed cleanly.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Runs `stage.on_destroy()`, logging and swallowing any failure.
pub fn run_destroy_hook(stage_name: &str, stage: &dyn Stage) -> CleanupOutcome {
    match catch_unwind(AssertUnwindSafe(|| stage.on_destroy())) {
        Ok(Ok(())) => CleanupOutcome::Completed,
        Ok(Err(e)) => {
            warn!(stage = %stage_name, error = %format!("{e:#}"), "Stage cleanup hook failed");
            CleanupOutcome::Failed(format!("{e:#}"))
        }
        Err(panic) => {
            let msg = panic_message(panic.as_ref());
            error!(stage = %stage_name, panic = %msg, "Stage cleanup hook panicked");
            CleanupOutcome::Panicked(msg)
        }
    }
}

/// Extracts a printable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}
