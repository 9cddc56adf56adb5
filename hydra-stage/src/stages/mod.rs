//! Stage trait and built-in stages.
//!
//! Stages are the unit of work a stage process runs: one call to
//! [`Stage::process`] per document handed out by the coordinator.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Debug;

use crate::document::Document;
use crate::errors::{InitError, ProcessError};
use crate::params::{decode_into, Configurable};
use crate::pipeline::DocumentQuery;

mod registry;
mod set_static_field;

pub use registry::{StageFactory, StageRegistry};
pub use set_static_field::SetStaticFieldStage;

/// Trait for pipeline stages.
///
/// Implementors expose their configurable attributes through [`Configurable`]
/// and embed a [`StageBase`] as their outermost ancestor layer.
#[async_trait]
pub trait Stage: Configurable + Send + Sync + Debug {
    /// The shared base attributes.
    fn base(&self) -> &StageBase;

    /// Validates the bound configuration before the worker starts.
    ///
    /// Called once, after parameters are bound.
    fn init(&mut self) -> Result<(), InitError> {
        Ok(())
    }

    /// Processes one document in place.
    ///
    /// # Arguments
    ///
    /// * `document` - The document checked out from the coordinator
    ///
    /// # Returns
    ///
    /// An error scoped to this document; the worker keeps running either way.
    async fn process(&self, document: &mut Document) -> Result<(), ProcessError>;

    /// Releases stage resources when the process shuts down.
    ///
    /// Runs after the last `process` call has returned. Errors are logged and
    /// otherwise ignored.
    fn on_destroy(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Configurable attributes shared by every stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageBase {
    query_options: Vec<String>,
}

impl StageBase {
    /// Creates an empty base.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Query strings narrowing which documents this stage receives.
    #[must_use]
    pub fn query_options(&self) -> &[String] {
        &self.query_options
    }

    /// The document query built from the query options.
    #[must_use]
    pub fn document_query(&self) -> DocumentQuery {
        DocumentQuery::new(self.query_options.clone())
    }
}

impl Configurable for StageBase {
    fn layer_name(&self) -> &'static str {
        "StageBase"
    }

    fn declared_parameters(&self) -> &'static [&'static str] {
        &["queryOptions"]
    }

    fn set_parameter(&mut self, name: &str, value: &Value) -> Result<(), serde_json::Error> {
        match name {
            "queryOptions" => decode_into(&mut self.query_options, value),
            _ => Ok(()),
        }
    }
}

/// A stage that returns every document unchanged.
#[derive(Debug, Default)]
pub struct NoOpStage {
    base: StageBase,
}

impl NoOpStage {
    /// Creates a new no-op stage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Configurable for NoOpStage {
    fn layer_name(&self) -> &'static str {
        "NoOpStage"
    }

    fn declared_parameters(&self) -> &'static [&'static str] {
        &[]
    }

    fn set_parameter(&mut self, _name: &str, _value: &Value) -> Result<(), serde_json::Error> {
        Ok(())
    }

    fn parent(&mut self) -> Option<&mut dyn Configurable> {
        Some(&mut self.base)
    }
}

#[async_trait]
impl Stage for NoOpStage {
    fn base(&self) -> &StageBase {
        &self.base
    }

    async fn process(&self, _document: &mut Document) -> Result<(), ProcessError> {
        Ok(())
    }
}
