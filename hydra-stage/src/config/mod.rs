//! Launch argument parsing, configuration resolution, and runtime settings.

mod args;
mod resolver;
mod settings;

pub use args::{LaunchArgs, LaunchMode, DEV_MODE_MARKER};
pub use resolver::{resolve, stage_class, ResolvedConfiguration};
pub use settings::{CoordinatorConfig, RetryConfig, RuntimeSettings, WorkerConfig};

/// Configuration produced for a stage: JSON values keyed by parameter name.
///
/// Key order is the order the coordinator (or the command line) supplied.
pub type ConfigurationMap = serde_json::Map<String, serde_json::Value>;

/// Configuration key naming the stage implementation to instantiate.
pub const STAGE_CLASS_KEY: &str = "stageClass";
