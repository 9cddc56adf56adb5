//! Policy-driven merging of static field values into documents.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::document::Document;
use crate::errors::ProcessError;

/// How a new value interacts with a field that already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum OverwritePolicy {
    /// Turn the existing value into a list and append the new value.
    Add,
    /// Replace the existing value.
    Overwrite,
    /// Keep the existing value.
    #[default]
    Skip,
    /// Fail the document.
    Throw,
}

impl OverwritePolicy {
    /// Returns the wire name of the policy.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::Overwrite => "OVERWRITE",
            Self::Skip => "SKIP",
            Self::Throw => "THROW",
        }
    }
}

impl fmt::Display for OverwritePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OverwritePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ADD" => Ok(Self::Add),
            "OVERWRITE" => Ok(Self::Overwrite),
            "SKIP" => Ok(Self::Skip),
            "THROW" => Ok(Self::Throw),
            other => Err(format!("unknown overwrite policy '{other}'")),
        }
    }
}

impl TryFrom<String> for OverwritePolicy {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Applies `field_values` to the document contents under `policy`.
///
/// Fields are applied in map order. Under [`OverwritePolicy::Throw`] every
/// collision is checked before anything is written, so an error leaves the
/// document unchanged.
///
/// # Errors
///
/// Returns [`ProcessError::FieldCollision`] naming the first colliding field
/// when the policy is `Throw`.
pub fn apply(
    document: &mut Document,
    field_values: &Map<String, Value>,
    policy: OverwritePolicy,
) -> Result<(), ProcessError> {
    if policy == OverwritePolicy::Throw {
        if let Some(field) = field_values
            .keys()
            .find(|field| document.has_content_field(field))
        {
            return Err(ProcessError::FieldCollision {
                field: field.clone(),
            });
        }
    }

    for (field, value) in field_values {
        let Some(existing) = document.content_field_mut(field) else {
            document.put_content_field(field.clone(), value.clone());
            continue;
        };

        match policy {
            OverwritePolicy::Add => append(existing, value.clone()),
            OverwritePolicy::Overwrite => *existing = value.clone(),
            // Throw collisions were rejected before the loop
            OverwritePolicy::Skip | OverwritePolicy::Throw => {}
        }
    }

    Ok(())
}

fn append(existing: &mut Value, value: Value) {
    match existing {
        Value::Array(items) => items.push(value),
        scalar => {
            let first = scalar.take();
            *scalar = Value::Array(vec![first, value]);
        }
    }
}
