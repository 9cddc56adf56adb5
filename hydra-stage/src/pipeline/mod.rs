//! Interfaces to the coordinator.
//!
//! The stage runtime only ever talks to the coordinator through these traits,
//! so the worker loop and bootstrap can be exercised without a network.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ConfigurationMap;
use crate::document::Document;
use crate::errors::PipelineError;
use crate::identity::StageIdentity;

#[cfg(feature = "http")]
mod http;

#[cfg(feature = "http")]
pub use http::{HttpCoordinator, HttpRemotePipeline};

/// Selects which documents a stage receives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentQuery {
    /// Query strings understood by the coordinator.
    #[serde(rename = "query", default)]
    pub options: Vec<String>,
}

impl DocumentQuery {
    /// Creates a query from a stage's query options.
    #[must_use]
    pub fn new(options: Vec<String>) -> Self {
        Self { options }
    }
}

/// Source of a stage's registered configuration.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConfigurationSource: Send + Sync {
    /// Fetches the configuration registered for `identity`.
    async fn fetch_configuration(
        &self,
        identity: &StageIdentity,
    ) -> Result<ConfigurationMap, PipelineError>;
}

/// Document exchange with the coordinator.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemotePipeline: Send + Sync {
    /// Checks out the next document matching `query`, if any.
    async fn fetch_document(&self, query: &DocumentQuery) -> Result<Option<Document>, PipelineError>;

    /// Returns a successfully processed document.
    async fn submit(&self, document: &Document) -> Result<(), PipelineError>;

    /// Reports that processing `document` failed.
    async fn mark_failed(&self, document: &Document, reason: &str) -> Result<(), PipelineError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_wire_format() {
        let query = DocumentQuery::new(vec!["touched:tagger".to_string()]);
        assert_eq!(
            serde_json::to_value(&query).unwrap(),
            json!({"query": ["touched:tagger"]})
        );
        assert_eq!(DocumentQuery::default().options.len(), 0);
    }
}
