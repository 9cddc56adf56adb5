//! Stage identity resolved at launch.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default coordinator host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default coordinator port.
pub const DEFAULT_PORT: u16 = 12001;

/// Identifies a stage and the coordinator it reports to.
///
/// Created once at process start and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageIdentity {
    name: String,
    host: String,
    port: u16,
}

impl StageIdentity {
    /// Creates an identity for `name` talking to `host:port`.
    #[must_use]
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
        }
    }

    /// Creates an identity using the default coordinator address.
    #[must_use]
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, DEFAULT_HOST, DEFAULT_PORT)
    }

    /// The stage name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The coordinator host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The coordinator port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Base URL of the coordinator API.
    #[must_use]
    pub fn coordinator_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl fmt::Display for StageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.name, self.host, self.port)
    }
}
