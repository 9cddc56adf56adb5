//! Error types for the stage runtime.
//!
//! Each concern gets its own error type so callers can tell a fatal bootstrap
//! failure apart from a per-document processing failure. [`StageRuntimeError`]
//! aggregates them for code that does not care which layer failed.

use thiserror::Error;

use crate::lifecycle::WorkerState;

/// The main error type for stage runtime operations.
#[derive(Debug, Error)]
pub enum StageRuntimeError {
    /// The stage could not be bootstrapped.
    #[error("{0}")]
    Bootstrap(#[from] BootstrapError),

    /// A document could not be processed.
    #[error("{0}")]
    Process(#[from] ProcessError),

    /// Communication with the coordinator failed.
    #[error("{0}")]
    Pipeline(#[from] PipelineError),

    /// The worker lifecycle was misused.
    #[error("{0}")]
    Lifecycle(#[from] LifecycleError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fatal errors raised while turning launch arguments into a running stage.
///
/// None of these are retried; the binary reports them and exits non-zero.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// No stage name was given on the command line.
    #[error("No stage name was specified")]
    MissingStageName,

    /// The coordinator port argument is not a valid port number.
    #[error("Invalid coordinator port '{value}'")]
    InvalidPort {
        /// The rejected argument.
        value: String,
    },

    /// The configuration payload was not a JSON object.
    #[error("Malformed stage configuration: {reason}")]
    MalformedConfiguration {
        /// What was wrong with the payload.
        reason: String,
    },

    /// The configuration could not be fetched from the coordinator.
    #[error("Communication failure when reading properties: {0}")]
    ConfigurationFetch(#[source] PipelineError),

    /// The configuration does not name a stage implementation.
    #[error("No class specified in the '{key}' property")]
    MissingStageClass {
        /// The configuration key that was expected.
        key: &'static str,
    },

    /// The named stage implementation is not registered.
    #[error("Could not find the stage class '{class}'")]
    UnknownStageClass {
        /// The requested class identifier.
        class: String,
    },

    /// The stage constructor failed.
    #[error("Could not instantiate the stage class '{class}': {source}")]
    Instantiation {
        /// The requested class identifier.
        class: String,
        /// The constructor's error.
        #[source]
        source: anyhow::Error,
    },

    /// Configuration could not be bound onto the stage.
    #[error("{0}")]
    Bind(#[from] BindError),

    /// The stage rejected its configuration during `init`.
    #[error("Failed to read arguments: {0}")]
    Init(#[from] InitError),
}

impl BootstrapError {
    /// Creates a malformed configuration error.
    #[must_use]
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedConfiguration {
            reason: reason.into(),
        }
    }
}

/// Errors raised by the parameter binder.
#[derive(Debug, Error)]
pub enum BindError {
    /// The configured value does not fit the declared attribute type.
    #[error("Type mismatch binding parameter '{parameter}' on {layer}: {source}")]
    TypeMismatch {
        /// The layer that declares the parameter.
        layer: &'static str,
        /// The parameter name.
        parameter: String,
        /// The underlying deserialization error.
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised by `Stage::init`.
#[derive(Debug, Clone, Error)]
pub enum InitError {
    /// A parameter the stage cannot work without was not configured.
    #[error("Required argument '{parameter}' is missing")]
    RequiredArgumentMissing {
        /// The missing parameter.
        parameter: String,
    },

    /// The configuration is present but unusable.
    #[error("Invalid argument '{parameter}': {reason}")]
    InvalidArgument {
        /// The offending parameter.
        parameter: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl InitError {
    /// Creates a required argument missing error.
    #[must_use]
    pub fn missing(parameter: impl Into<String>) -> Self {
        Self::RequiredArgumentMissing {
            parameter: parameter.into(),
        }
    }
}

/// Errors scoped to the processing of a single document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessError {
    /// A field already exists and the collision policy forbids touching it.
    #[error("Field '{field}' already exists in the document")]
    FieldCollision {
        /// The colliding field.
        field: String,
    },

    /// Any other processing failure.
    #[error("Processing failed: {reason}")]
    Failed {
        /// The failure reason.
        reason: String,
    },
}

impl ProcessError {
    /// Creates a generic processing failure.
    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}

/// Errors surfaced by the coordinator collaborators.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The request never produced a response.
    #[error("Transport error: {reason}")]
    Transport {
        /// The transport failure.
        reason: String,
    },

    /// The coordinator answered with an unexpected status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// The HTTP status code.
        status: u16,
        /// The response body, if readable.
        body: String,
    },

    /// The coordinator answered with something that could not be decoded.
    #[error("Malformed response: {reason}")]
    MalformedResponse {
        /// What could not be decoded.
        reason: String,
    },

    /// The coordinator endpoint could not be built.
    #[error("Invalid coordinator endpoint: {reason}")]
    InvalidEndpoint {
        /// Why the endpoint is invalid.
        reason: String,
    },
}

impl PipelineError {
    /// Creates a transport error.
    #[must_use]
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    /// Creates a malformed response error.
    #[must_use]
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            reason: reason.into(),
        }
    }

    /// Whether retrying the same request could succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::MalformedResponse { .. } | Self::InvalidEndpoint { .. } => false,
        }
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::malformed(err.to_string())
        } else {
            Self::transport(err.to_string())
        }
    }
}

/// Errors raised by the lifecycle controller.
#[derive(Debug, Clone, Error)]
pub enum LifecycleError {
    /// `start` was called on a controller that is not in the `Created` state.
    #[error("Worker for stage '{stage}' cannot start from state {state:?}")]
    AlreadyStarted {
        /// The stage name.
        stage: String,
        /// The state the controller was in.
        state: WorkerState,
    },

    /// A lifecycle task ended abnormally.
    #[error("Lifecycle task failed: {reason}")]
    Join {
        /// The join failure.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_error_messages() {
        let err = BootstrapError::MissingStageClass { key: "stageClass" };
        assert_eq!(
            err.to_string(),
            "No class specified in the 'stageClass' property"
        );

        let err = BootstrapError::InvalidPort {
            value: "http".to_string(),
        };
        assert!(err.to_string().contains("'http'"));
    }

    #[test]
    fn test_init_error_converts_into_bootstrap() {
        let err: BootstrapError = InitError::missing("fieldValueMap").into();
        assert!(matches!(err, BootstrapError::Init(_)));
        assert!(err.to_string().contains("fieldValueMap"));
    }

    #[test]
    fn test_field_collision_names_field() {
        let err = ProcessError::FieldCollision {
            field: "title".to_string(),
        };
        assert_eq!(err.to_string(), "Field 'title' already exists in the document");
    }

    #[test]
    fn test_pipeline_error_transience() {
        assert!(PipelineError::transport("connection refused").is_transient());
        assert!(PipelineError::Status {
            status: 503,
            body: String::new()
        }
        .is_transient());
        assert!(!PipelineError::Status {
            status: 400,
            body: String::new()
        }
        .is_transient());
        assert!(!PipelineError::malformed("not json").is_transient());
    }

    #[test]
    fn test_runtime_error_wraps_layers() {
        let err: StageRuntimeError = ProcessError::failed("boom").into();
        assert!(matches!(err, StageRuntimeError::Process(_)));
        assert_eq!(err.to_string(), "Processing failed: boom");
    }
}
