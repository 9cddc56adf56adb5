//! # Hydra Stage
//!
//! Runtime for a single stage of a coordinator-driven document pipeline.
//!
//! A stage process is launched with a stage name and the coordinator's
//! address. It then:
//!
//! - **Resolves its configuration**: fetched from the coordinator, or given
//!   inline on the command line in dev mode
//! - **Instantiates and binds the stage**: the `stageClass` entry selects a
//!   registered implementation, the other entries set its parameters
//! - **Runs one worker**: fetch a document, process it, report the result
//! - **Shuts down gracefully**: on SIGINT/SIGTERM the in-flight document is
//!   finished before the stage's cleanup hook runs
//!
//! The built-in [`SetStaticFieldStage`](stages::SetStaticFieldStage) merges
//! fixed field values into each document under a collision policy.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hydra_stage::prelude::*;
//!
//! let launch = LaunchArgs::parse(&["DEV_MODE", "tagger", "localhost", "12001",
//!     r#"{"stageClass":"SetStaticFieldStage","fieldValueMap":{"source":"web"}}"#])?;
//! let prepared = bootstrap(launch, &coordinator, &StageRegistry::with_builtins()).await?;
//! run(prepared, pipeline, WorkerConfig::default()).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod bootstrap;
pub mod config;
pub mod document;
pub mod errors;
pub mod identity;
pub mod lifecycle;
pub mod merge;
pub mod observability;
pub mod params;
pub mod pipeline;
pub mod stages;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::bootstrap::{bootstrap, prepare_stage, run, PreparedStage};
    pub use crate::config::{
        ConfigurationMap, CoordinatorConfig, LaunchArgs, LaunchMode, RetryConfig,
        RuntimeSettings, WorkerConfig,
    };
    pub use crate::document::Document;
    pub use crate::errors::{
        BindError, BootstrapError, InitError, LifecycleError, PipelineError,
        ProcessError, StageRuntimeError,
    };
    pub use crate::identity::StageIdentity;
    pub use crate::lifecycle::{
        CleanupOutcome, LifecycleController, StopToken, TerminationHandler,
        WorkerState,
    };
    pub use crate::merge::OverwritePolicy;
    pub use crate::observability::init_tracing;
    pub use crate::params::{bind_parameters, Configurable};
    pub use crate::pipeline::{ConfigurationSource, DocumentQuery, RemotePipeline};
    pub use crate::stages::{SetStaticFieldStage, Stage, StageBase, StageRegistry};

    #[cfg(feature = "http")]
    pub use crate::pipeline::{HttpCoordinator, HttpRemotePipeline};
}
