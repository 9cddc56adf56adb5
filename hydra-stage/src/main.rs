//! # Hydra Stage Process
//!
//! ```text
//! hydra-stage <stageName> [coordinatorHost] [coordinatorPort]
//! hydra-stage DEV_MODE <stageName> [coordinatorHost] [coordinatorPort] <json...>
//! ```
//!
//! Exits 0 after a signal-driven shutdown and 1 on any fatal bootstrap error.

use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

use hydra_stage::bootstrap::{bootstrap, run};
use hydra_stage::config::{LaunchArgs, RuntimeSettings};
use hydra_stage::errors::StageRuntimeError;
use hydra_stage::observability::init_tracing;
use hydra_stage::pipeline::HttpCoordinator;
use hydra_stage::stages::StageRegistry;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    match run_stage().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Stage terminated with a fatal error");
            eprintln!("hydra-stage: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run_stage() -> Result<(), StageRuntimeError> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let launch = LaunchArgs::parse(&args)?;

    let settings = RuntimeSettings::from_env();
    let coordinator = HttpCoordinator::new(settings.coordinator.clone())?;
    let registry = StageRegistry::with_builtins();

    let prepared = bootstrap(launch, &coordinator, &registry).await?;
    let pipeline = coordinator.pipeline(&prepared.identity)?;

    info!(stage = %prepared.identity, "Worker running, waiting for termination signal");
    match run(prepared, Arc::new(pipeline), settings.worker).await? {
        Some(outcome) if !outcome.is_completed() => {
            warn!(?outcome, "Stage cleanup did not complete cleanly");
        }
        _ => {}
    }

    Ok(())
}
