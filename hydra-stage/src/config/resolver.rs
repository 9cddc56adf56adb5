//! Turning launch arguments into a stage configuration.

use serde_json::Value;
use tracing::{debug, info};

use super::{ConfigurationMap, LaunchArgs, LaunchMode, STAGE_CLASS_KEY};
use crate::errors::BootstrapError;
use crate::identity::StageIdentity;
use crate::pipeline::ConfigurationSource;

/// Identity plus the configuration map it resolved to.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfiguration {
    /// The stage identity from the launch arguments.
    pub identity: StageIdentity,
    /// Parameter name to value, including the stage class entry.
    pub configuration: ConfigurationMap,
}

impl ResolvedConfiguration {
    /// The implementation class named in the configuration.
    ///
    /// # Errors
    ///
    /// See [`stage_class`].
    pub fn stage_class(&self) -> Result<&str, BootstrapError> {
        stage_class(&self.configuration)
    }
}

/// Resolves the configuration for `launch`.
///
/// Dev mode uses the inline map and never calls `source`. Otherwise the
/// coordinator is asked once for the properties of the named stage.
///
/// # Errors
///
/// Returns [`BootstrapError::ConfigurationFetch`] when the coordinator cannot
/// be reached or answers with something other than a JSON object.
pub async fn resolve(
    launch: LaunchArgs,
    source: &dyn ConfigurationSource,
) -> Result<ResolvedConfiguration, BootstrapError> {
    let LaunchArgs { identity, mode } = launch;

    let configuration = match mode {
        LaunchMode::Dev(configuration) => {
            info!(stage = %identity.name(), "Using inline dev-mode configuration");
            configuration
        }
        LaunchMode::Remote => {
            debug!(stage = %identity, "Fetching stage configuration");
            let configuration = source
                .fetch_configuration(&identity)
                .await
                .map_err(BootstrapError::ConfigurationFetch)?;
            info!(
                stage = %identity.name(),
                parameters = configuration.len(),
                "Fetched stage configuration"
            );
            configuration
        }
    };

    Ok(ResolvedConfiguration {
        identity,
        configuration,
    })
}

/// Reads the stage class entry from `configuration`.
///
/// # Errors
///
/// Returns [`BootstrapError::MissingStageClass`] when the entry is absent or
/// not a string.
pub fn stage_class(configuration: &ConfigurationMap) -> Result<&str, BootstrapError> {
    match configuration.get(STAGE_CLASS_KEY) {
        Some(Value::String(class)) if !class.is_empty() => Ok(class),
        _ => Err(BootstrapError::MissingStageClass {
            key: STAGE_CLASS_KEY,
        }),
    }
}
