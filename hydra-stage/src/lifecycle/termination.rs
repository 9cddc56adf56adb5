//! Termination handling: turning a process signal into a graceful shutdown.

use std::future::Future;
use std::sync::Arc;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::{CleanupOutcome, LifecycleController};
use crate::errors::LifecycleError;

/// Dormant task that shuts the stage down when its signal fires.
///
/// It watches the worker through the controller but never owns it.
#[derive(Debug)]
pub struct TerminationHandler {
    handle: JoinHandle<Option<CleanupOutcome>>,
}

impl TerminationHandler {
    pub(super) fn install<S>(controller: Arc<LifecycleController>, signal: S) -> Self
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            signal.await;
            info!(stage = %controller.identity().name(), "Termination signal received");
            controller.shutdown().await
        });

        Self { handle }
    }

    /// Whether shutdown has completed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits until the signal has fired and shutdown has completed.
    ///
    /// Returns the cleanup outcome if this handler ran the cleanup hook.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Join`] if the handler task panicked or was
    /// aborted.
    pub async fn wait(self) -> Result<Option<CleanupOutcome>, LifecycleError> {
        self.handle.await.map_err(|e| LifecycleError::Join {
            reason: e.to_string(),
        })
    }
}

/// Completes on Ctrl+C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C");
        },
        () = terminate => {
            info!("Received SIGTERM");
        },
    }
}
