//! Stage bootstrap: from launch arguments to a running worker.
//!
//! The sequence is resolve configuration, instantiate the stage class, bind
//! parameters, run `init`, then hand the stage to a [`LifecycleController`].
//! Every failure before the worker starts is a fatal [`BootstrapError`].

use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{resolve, stage_class, ConfigurationMap, LaunchArgs, WorkerConfig};
use crate::errors::{BootstrapError, StageRuntimeError};
use crate::identity::StageIdentity;
use crate::lifecycle::{CleanupOutcome, LifecycleController};
use crate::params::bind_parameters;
use crate::pipeline::{ConfigurationSource, RemotePipeline};
use crate::stages::{Stage, StageRegistry};

/// A configured stage ready to be started.
#[derive(Debug)]
pub struct PreparedStage {
    /// Who the stage is.
    pub identity: StageIdentity,
    /// The bound and initialised stage.
    pub stage: Arc<dyn Stage>,
}

/// Instantiates, binds and initialises the stage named by `configuration`.
///
/// # Errors
///
/// Fails when the stage class is missing or unknown, construction fails, a
/// parameter has the wrong shape, or `init` rejects the configuration.
pub fn prepare_stage(
    registry: &StageRegistry,
    configuration: &ConfigurationMap,
) -> Result<Arc<dyn Stage>, BootstrapError> {
    let class = stage_class(configuration)?;
    let mut stage = registry.instantiate(class)?;

    let bound = bind_parameters(stage.as_mut(), configuration)?;
    debug!(class, bound, "Bound stage parameters");

    stage.init()?;
    info!(class, "Initialized stage");

    Ok(Arc::from(stage))
}

/// Resolves the configuration for `launch` and prepares the stage.
///
/// # Errors
///
/// Any [`BootstrapError`] from resolution or [`prepare_stage`].
pub async fn bootstrap(
    launch: LaunchArgs,
    source: &dyn ConfigurationSource,
    registry: &StageRegistry,
) -> Result<PreparedStage, BootstrapError> {
    let resolved = resolve(launch, source).await?;
    let stage = prepare_stage(registry, &resolved.configuration)?;

    Ok(PreparedStage {
        identity: resolved.identity,
        stage,
    })
}

/// Runs a prepared stage until the process is asked to terminate.
///
/// # Errors
///
/// Returns [`StageRuntimeError::Lifecycle`] if the termination handler task
/// could not be joined.
pub async fn run(
    prepared: PreparedStage,
    pipeline: Arc<dyn RemotePipeline>,
    worker: WorkerConfig,
) -> Result<Option<CleanupOutcome>, StageRuntimeError> {
    let controller = LifecycleController::new(prepared.identity, prepared.stage, pipeline, worker);
    let handler = controller.start()?;
    let outcome = handler.wait().await?;

    info!(stage = %controller.identity().name(), stats = ?controller.stats(), "Stage exited");
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{BindError, InitError};
    use crate::stages::SetStaticFieldStage;
    use crate::testing::{InMemoryPipeline, PanickingCleanupStage, RecordingStage};
    use serde_json::{json, Value};

    fn object(value: Value) -> ConfigurationMap {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn registry() -> StageRegistry {
        let registry = StageRegistry::with_builtins();
        registry.register_stage("RecordingStage", RecordingStage::new);
        registry.register_stage("PanickingCleanupStage", PanickingCleanupStage::new);
        registry
    }

    #[test]
    fn test_prepare_set_static_field_stage() {
        let config = object(json!({
            "stageClass": "SetStaticFieldStage",
            "fieldValueMap": {"source": "crawler"},
            "overwritePolicy": "OVERWRITE",
            "queryOptions": ["exists:url"]
        }));

        let stage = prepare_stage(&registry(), &config).unwrap();
        assert_eq!(stage.base().query_options(), ["exists:url".to_string()]);
    }

    #[test]
    fn test_qualified_class_name_is_accepted() {
        let config = object(json!({
            "stageClass": SetStaticFieldStage::QUALIFIED_CLASS_NAME,
            "fieldValueMap": {}
        }));
        assert!(prepare_stage(&registry(), &config).is_ok());
    }

    #[test]
    fn test_unknown_class() {
        let config = object(json!({"stageClass": "com.example.Missing"}));
        let err = prepare_stage(&registry(), &config).unwrap_err();
        assert!(matches!(err, BootstrapError::UnknownStageClass { class } if class == "com.example.Missing"));
    }

    #[test]
    fn test_type_mismatch_is_fatal() {
        let config = object(json!({"stageClass": "RecordingStage", "label": ["not", "a", "string"]}));
        let err = prepare_stage(&registry(), &config).unwrap_err();
        assert!(matches!(
            err,
            BootstrapError::Bind(BindError::TypeMismatch { ref parameter, .. }) if parameter == "label"
        ));
    }

    #[test]
    fn test_missing_required_parameter_fails_init() {
        let config = object(json!({"stageClass": "SetStaticFieldStage"}));
        let err = prepare_stage(&registry(), &config).unwrap_err();
        assert!(matches!(
            err,
            BootstrapError::Init(InitError::RequiredArgumentMissing { ref parameter }) if parameter == "fieldValueMap"
        ));

        let config = object(json!({"stageClass": "PanickingCleanupStage"}));
        assert!(matches!(
            prepare_stage(&registry(), &config),
            Err(BootstrapError::Init(_))
        ));
    }

    #[test]
    fn test_dev_mode_bootstrap_skips_coordinator() {
        let source = InMemoryPipeline::new();
        let launch = LaunchArgs::parse(&[
            "DEV_MODE",
            "recorder",
            "10.0.0.1",
            "1",
            "{\"stageClass\":",
            "\"RecordingStage\"}",
        ])
        .unwrap();

        let prepared = tokio_test::block_on(bootstrap(launch, &source, &registry())).unwrap();
        assert_eq!(prepared.identity.name(), "recorder");
        assert_eq!(source.configuration_requests(), 0);
    }

    #[tokio::test]
    async fn test_remote_bootstrap_uses_fetched_configuration() {
        let source = InMemoryPipeline::with_configuration(object(json!({
            "stageClass": "RecordingStage",
            "queryOptions": ["touched:fetcher"]
        })));
        let launch = LaunchArgs::parse(&["recorder"]).unwrap();

        let prepared = bootstrap(launch, &source, &registry()).await.unwrap();
        assert_eq!(source.configuration_requests(), 1);
        assert_eq!(
            prepared.stage.base().query_options(),
            ["touched:fetcher".to_string()]
        );
    }

    #[tokio::test]
    async fn test_missing_stage_class_after_fetch() {
        let source = InMemoryPipeline::with_configuration(object(json!({"fieldValueMap": {}})));
        let launch = LaunchArgs::parse(&["recorder"]).unwrap();

        let err = bootstrap(launch, &source, &registry()).await.unwrap_err();
        assert!(matches!(err, BootstrapError::MissingStageClass { .. }));
    }
}
