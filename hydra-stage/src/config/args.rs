//! Positional launch arguments.
//!
//! ```text
//! <stageName> [host] [port]
//! DEV_MODE <stageName> [host] [port] <json...>
//! ```

use tracing::debug;

use super::ConfigurationMap;
use crate::errors::BootstrapError;
use crate::identity::{StageIdentity, DEFAULT_HOST, DEFAULT_PORT};

/// First argument that switches the stage into dev mode.
pub const DEV_MODE_MARKER: &str = "DEV_MODE";

const STAGE_NAME_INDEX: usize = 0;
const HOST_INDEX: usize = 1;
const PORT_INDEX: usize = 2;
const DEV_MODE_CONFIG_INDEX: usize = 4;

/// Where the stage configuration comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum LaunchMode {
    /// Fetch the configuration from the coordinator.
    Remote,
    /// Use the configuration given inline on the command line.
    Dev(ConfigurationMap),
}

/// Parsed launch arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchArgs {
    /// Who this stage is and where its coordinator lives.
    pub identity: StageIdentity,
    /// How to obtain the configuration.
    pub mode: LaunchMode,
}

impl LaunchArgs {
    /// Parses the process arguments, excluding the program name.
    ///
    /// Never touches the network.
    ///
    /// # Errors
    ///
    /// Fails when the stage name is missing, the port is not a number, or the
    /// dev-mode payload is not a JSON object.
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<Self, BootstrapError> {
        let args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
        debug!(?args, "Parsing stage launch arguments");

        let dev_mode = args.first() == Some(&DEV_MODE_MARKER);
        let offset = usize::from(dev_mode);
        let positional = |index: usize| args.get(index + offset).copied();

        let name = positional(STAGE_NAME_INDEX).ok_or(BootstrapError::MissingStageName)?;
        let host = positional(HOST_INDEX).unwrap_or(DEFAULT_HOST);
        let port = match positional(PORT_INDEX) {
            Some(raw) => raw.parse::<u16>().map_err(|_| BootstrapError::InvalidPort {
                value: raw.to_string(),
            })?,
            None => DEFAULT_PORT,
        };

        let mode = if dev_mode {
            let tokens = args.get(DEV_MODE_CONFIG_INDEX..).unwrap_or_default();
            LaunchMode::Dev(parse_inline_configuration(tokens)?)
        } else {
            LaunchMode::Remote
        };

        Ok(Self {
            identity: StageIdentity::new(name, host, port),
            mode,
        })
    }

    /// Whether the configuration was supplied inline.
    #[must_use]
    pub const fn is_dev_mode(&self) -> bool {
        matches!(self.mode, LaunchMode::Dev(_))
    }
}

fn parse_inline_configuration(tokens: &[&str]) -> Result<ConfigurationMap, BootstrapError> {
    if tokens.is_empty() {
        return Err(BootstrapError::malformed(
            "dev mode requires a JSON configuration after host and port",
        ));
    }

    let json = tokens.join(" ");
    match serde_json::from_str(&json) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(other) => Err(BootstrapError::malformed(format!(
            "expected a JSON object, got {other}"
        ))),
        Err(e) => Err(BootstrapError::malformed(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normal_mode_with_defaults() {
        let args = LaunchArgs::parse(&["tagger"]).unwrap();
        assert_eq!(args.identity, StageIdentity::with_defaults("tagger"));
        assert_eq!(args.mode, LaunchMode::Remote);
        assert!(!args.is_dev_mode());
    }

    #[test]
    fn test_normal_mode_with_address() {
        let args = LaunchArgs::parse(&["tagger", "coordinator", "9000"]).unwrap();
        assert_eq!(args.identity, StageIdentity::new("tagger", "coordinator", 9000));
    }

    #[test]
    fn test_missing_stage_name() {
        let empty: [&str; 0] = [];
        assert!(matches!(
            LaunchArgs::parse(&empty),
            Err(BootstrapError::MissingStageName)
        ));
        assert!(matches!(
            LaunchArgs::parse(&[DEV_MODE_MARKER]),
            Err(BootstrapError::MissingStageName)
        ));
    }

    #[test]
    fn test_invalid_port() {
        let err = LaunchArgs::parse(&["tagger", "localhost", "not-a-port"]).unwrap_err();
        assert!(matches!(err, BootstrapError::InvalidPort { value } if value == "not-a-port"));
    }

    #[test]
    fn test_dev_mode_joins_json_tokens() {
        let args = LaunchArgs::parse(&[
            "DEV_MODE",
            "static",
            "localhost",
            "12001",
            "{\"stageClass\":",
            "\"SetStaticFieldStage\",",
            "\"fieldValueMap\":",
            "{\"a\":",
            "\"b c\"}}",
        ])
        .unwrap();

        assert_eq!(args.identity, StageIdentity::new("static", "localhost", 12001));
        let LaunchMode::Dev(config) = args.mode else {
            panic!("expected dev mode");
        };
        assert_eq!(config.get("stageClass"), Some(&json!("SetStaticFieldStage")));
        assert_eq!(config.get("fieldValueMap"), Some(&json!({"a": "b c"})));
    }

    #[test]
    fn test_dev_mode_rejects_bad_payloads() {
        for tail in [vec![], vec!["{broken"], vec!["[1,", "2]"]] {
            let mut args = vec!["DEV_MODE", "static", "localhost", "12001"];
            args.extend(tail);
            assert!(matches!(
                LaunchArgs::parse(&args),
                Err(BootstrapError::MalformedConfiguration { .. })
            ));
        }
    }
}
