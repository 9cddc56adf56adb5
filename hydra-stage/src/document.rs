//! Documents exchanged with the coordinator.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A unit of work: an optional identifier plus a map of content fields.
///
/// Field values are arbitrary JSON, typically a scalar or a list of scalars.
/// Field order is preserved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Coordinator-assigned identifier.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Content fields.
    #[serde(default)]
    pub contents: Map<String, Value>,
}

impl Document {
    /// Creates an empty document without an identifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty document with the given identifier.
    #[must_use]
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            contents: Map::new(),
        }
    }

    /// Gets a content field.
    #[must_use]
    pub fn content_field(&self, field: &str) -> Option<&Value> {
        self.contents.get(field)
    }

    /// Gets a content field mutably.
    pub fn content_field_mut(&mut self, field: &str) -> Option<&mut Value> {
        self.contents.get_mut(field)
    }

    /// Sets a content field, returning the previous value.
    pub fn put_content_field(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.contents.insert(field.into(), value.into())
    }

    /// Checks whether a content field exists.
    #[must_use]
    pub fn has_content_field(&self, field: &str) -> bool {
        self.contents.contains_key(field)
    }

    /// Removes a content field, returning its value.
    pub fn remove_content_field(&mut self, field: &str) -> Option<Value> {
        self.contents.shift_remove(field)
    }

    /// Returns the content field names in order.
    pub fn content_fields(&self) -> impl Iterator<Item = &str> {
        self.contents.keys().map(String::as_str)
    }

    /// Identifier for log output.
    #[must_use]
    pub fn display_id(&self) -> &str {
        self.id.as_deref().unwrap_or("<unsaved>")
    }
}
