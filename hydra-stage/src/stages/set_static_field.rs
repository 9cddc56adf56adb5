//! Stage that writes a fixed set of field values into every document.

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{Stage, StageBase};
use crate::document::Document;
use crate::errors::{InitError, ProcessError};
use crate::merge::{self, OverwritePolicy};
use crate::params::{decode_into, Configurable};

/// Merges `fieldValueMap` into each document under `overwritePolicy`.
#[derive(Debug, Default)]
pub struct SetStaticFieldStage {
    field_value_map: Option<Map<String, Value>>,
    overwrite_policy: OverwritePolicy,
    base: StageBase,
}

impl SetStaticFieldStage {
    /// Registry identifier.
    pub const CLASS_NAME: &'static str = "SetStaticFieldStage";

    /// Fully qualified alias accepted for existing coordinator configurations.
    pub const QUALIFIED_CLASS_NAME: &'static str = "com.findwise.hydra.stage.SetStaticFieldStage";

    /// Creates an unconfigured stage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The configured collision policy.
    #[must_use]
    pub const fn overwrite_policy(&self) -> OverwritePolicy {
        self.overwrite_policy
    }
}

impl Configurable for SetStaticFieldStage {
    fn layer_name(&self) -> &'static str {
        Self::CLASS_NAME
    }

    fn declared_parameters(&self) -> &'static [&'static str] {
        &["fieldValueMap", "overwritePolicy"]
    }

    fn set_parameter(&mut self, name: &str, value: &Value) -> Result<(), serde_json::Error> {
        match name {
            "fieldValueMap" => decode_into(&mut self.field_value_map, value),
            "overwritePolicy" => decode_into(&mut self.overwrite_policy, value),
            _ => Ok(()),
        }
    }

    fn parent(&mut self) -> Option<&mut dyn Configurable> {
        Some(&mut self.base)
    }
}

#[async_trait]
impl Stage for SetStaticFieldStage {
    fn base(&self) -> &StageBase {
        &self.base
    }

    fn init(&mut self) -> Result<(), InitError> {
        if self.field_value_map.is_none() {
            return Err(InitError::missing("fieldValueMap"));
        }
        Ok(())
    }

    async fn process(&self, document: &mut Document) -> Result<(), ProcessError> {
        let Some(field_values) = &self.field_value_map else {
            return Err(ProcessError::failed("stage used before init"));
        };
        merge::apply(document, field_values, self.overwrite_policy)
    }
}
