//! Binding of configuration values onto stage attributes.
//!
//! A stage exposes its configurable attributes through [`Configurable`]: every
//! layer (the concrete stage, then the shared [`StageBase`](crate::stages::StageBase)
//! it embeds) declares which parameter names it accepts and how to set them.
//! [`bind_parameters`] walks that chain, most-derived layer first.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::config::ConfigurationMap;
use crate::errors::BindError;

/// A layer of configurable attributes.
pub trait Configurable {
    /// Name of this layer, used in error messages.
    fn layer_name(&self) -> &'static str;

    /// Parameter names declared by this layer only.
    fn declared_parameters(&self) -> &'static [&'static str];

    /// Sets a declared parameter from its configured value.
    ///
    /// Only called with names from [`Configurable::declared_parameters`].
    fn set_parameter(&mut self, name: &str, value: &Value) -> Result<(), serde_json::Error>;

    /// The ancestor layer, if any.
    fn parent(&mut self) -> Option<&mut dyn Configurable> {
        None
    }
}

/// Deserializes `value` into `slot` without any coercion beyond serde's own.
pub fn decode_into<T: DeserializeOwned>(slot: &mut T, value: &Value) -> Result<(), serde_json::Error> {
    *slot = T::deserialize(value)?;
    Ok(())
}

/// Binds every declared parameter found in `configuration` onto `target` and
/// its ancestors.
///
/// Keys no layer declares are ignored. Returns the number of attributes set.
///
/// # Errors
///
/// Returns [`BindError::TypeMismatch`] when a value does not fit the declared
/// attribute type.
pub fn bind_parameters<C: Configurable + ?Sized>(
    target: &mut C,
    configuration: &ConfigurationMap,
) -> Result<usize, BindError> {
    let bound = bind_layer(target, configuration)?;

    if bound < configuration.len() {
        debug!(
            bound,
            total = configuration.len(),
            "Some configuration keys matched no stage parameter"
        );
    }

    Ok(bound)
}

fn bind_layer<C: Configurable + ?Sized>(
    layer: &mut C,
    configuration: &ConfigurationMap,
) -> Result<usize, BindError> {
    let layer_name = layer.layer_name();
    let mut bound = 0;

    for &name in layer.declared_parameters() {
        let Some(value) = configuration.get(name) else {
            continue;
        };

        layer
            .set_parameter(name, value)
            .map_err(|source| BindError::TypeMismatch {
                layer: layer_name,
                parameter: name.to_string(),
                source,
            })?;

        debug!(layer = layer_name, parameter = name, "Bound stage parameter");
        bound += 1;
    }

    match layer.parent() {
        Some(parent) => Ok(bound + bind_layer(parent, configuration)?),
        None => Ok(bound),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Default)]
    struct BaseLayer {
        query_options: Vec<String>,
    }

    impl Configurable for BaseLayer {
        fn layer_name(&self) -> &'static str {
            "BaseLayer"
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

    #[derive(Debug, Default)]
    struct MiddleLayer {
        retries: u32,
        base: BaseLayer,
    }

    impl Configurable for MiddleLayer {
        fn layer_name(&self) -> &'static str {
            "MiddleLayer"
        }

        fn declared_parameters(&self) -> &'static [&'static str] {
            &["retries"]
        }

        fn set_parameter(&mut self, name: &str, value: &Value) -> Result<(), serde_json::Error> {
            match name {
                "retries" => decode_into(&mut self.retries, value),
                _ => Ok(()),
            }
        }

        fn parent(&mut self) -> Option<&mut dyn Configurable> {
            Some(&mut self.base)
        }
    }

    #[derive(Debug, Default)]
    struct LeafStage {
        label: String,
        // deliberately not declared
        secret: String,
        middle: MiddleLayer,
    }

    impl Configurable for LeafStage {
        fn layer_name(&self) -> &'static str {
            "LeafStage"
        }

        fn declared_parameters(&self) -> &'static [&'static str] {
            &["label"]
        }

        fn set_parameter(&mut self, name: &str, value: &Value) -> Result<(), serde_json::Error> {
            match name {
                "label" => decode_into(&mut self.label, value),
                _ => Ok(()),
            }
        }

        fn parent(&mut self) -> Option<&mut dyn Configurable> {
            Some(&mut self.middle)
        }
    }

    fn config(value: Value) -> ConfigurationMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("test configuration must be an object"),
        }
    }

    #[test]
    fn test_binds_every_layer() {
        let mut stage = LeafStage::default();
        let bound = bind_parameters(
            &mut stage,
            &config(json!({
                "label": "leaf",
                "retries": 3,
                "queryOptions": ["touched:tagger"],
            })),
        )
        .unwrap();

        assert_eq!(bound, 3);
        assert_eq!(stage.label, "leaf");
        assert_eq!(stage.middle.retries, 3);
        assert_eq!(stage.middle.base.query_options, vec!["touched:tagger".to_string()]);
    }

    #[test]
    fn test_undeclared_attribute_is_never_set() {
        let mut stage = LeafStage::default();
        let bound = bind_parameters(&mut stage, &config(json!({"secret": "leaked"}))).unwrap();

        assert_eq!(bound, 0);
        assert!(stage.secret.is_empty());
    }

    #[test]
    fn test_unmatched_keys_ignored() {
        let mut stage = LeafStage::default();
        let bound = bind_parameters(
            &mut stage,
            &config(json!({"stageClass": "LeafStage", "unknown": {"nested": true}})),
        )
        .unwrap();
        assert_eq!(bound, 0);
    }

    #[test]
    fn test_type_mismatch_reports_layer() {
        let mut stage = LeafStage::default();
        let err = bind_parameters(&mut stage, &config(json!({"retries": "three"}))).unwrap_err();

        let BindError::TypeMismatch { layer, parameter, .. } = err;
        assert_eq!(layer, "MiddleLayer");
        assert_eq!(parameter, "retries");
    }

    #[test]
    fn test_no_coercion_from_number_to_string() {
        let mut stage = LeafStage::default();
        assert!(bind_parameters(&mut stage, &config(json!({"label": 7}))).is_err());
    }
}
