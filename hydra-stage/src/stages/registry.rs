//! Registry of stage implementations addressable by class identifier.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::{NoOpStage, SetStaticFieldStage, Stage};
use crate::errors::BootstrapError;

/// Constructor for a stage implementation.
pub type StageFactory = Arc<dyn Fn() -> anyhow::Result<Box<dyn Stage>> + Send + Sync>;

/// In-memory registry mapping stage class identifiers to constructors.
#[derive(Default)]
pub struct StageRegistry {
    factories: RwLock<HashMap<String, StageFactory>>,
}

impl StageRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry containing the built-in stages.
    #[must_use]
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register_stage(SetStaticFieldStage::CLASS_NAME, SetStaticFieldStage::new);
        registry.register_stage(SetStaticFieldStage::QUALIFIED_CLASS_NAME, SetStaticFieldStage::new);
        registry.register_stage("NoOpStage", NoOpStage::new);
        registry
    }

    /// Registers a fallible constructor, replacing any previous one.
    pub fn register<F>(&self, class: impl Into<String>, factory: F)
    where
        F: Fn() -> anyhow::Result<Box<dyn Stage>> + Send + Sync + 'static,
    {
        self.factories.write().insert(class.into(), Arc::new(factory));
    }

    /// Registers an infallible constructor.
    pub fn register_stage<S, F>(&self, class: impl Into<String>, constructor: F)
    where
        S: Stage + 'static,
        F: Fn() -> S + Send + Sync + 'static,
    {
        self.register(class, move || Ok(Box::new(constructor()) as Box<dyn Stage>));
    }

    /// Whether `class` is registered.
    #[must_use]
    pub fn contains(&self, class: &str) -> bool {
        self.factories.read().contains_key(class)
    }

    /// Lists registered class identifiers, sorted.
    #[must_use]
    pub fn classes(&self) -> Vec<String> {
        let mut classes: Vec<_> = self.factories.read().keys().cloned().collect();
        classes.sort();
        classes
    }

    /// Instantiates the stage registered as `class`.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError::UnknownStageClass`] if nothing is registered
    /// under `class`, or [`BootstrapError::Instantiation`] if the constructor
    /// fails.
    pub fn instantiate(&self, class: &str) -> Result<Box<dyn Stage>, BootstrapError> {
        // clone out so the constructor runs without holding the lock
        let factory = self
            .factories
            .read()
            .get(class)
            .cloned()
            .ok_or_else(|| BootstrapError::UnknownStageClass {
                class: class.to_string(),
            })?;

        factory().map_err(|source| BootstrapError::Instantiation {
            class: class.to_string(),
            source,
        })
    }
}

impl std::fmt::Debug for StageRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageRegistry")
            .field("classes", &self.classes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_registered() {
        let registry = StageRegistry::with_builtins();
        assert!(registry.contains("SetStaticFieldStage"));
        assert!(registry.contains("com.findwise.hydra.stage.SetStaticFieldStage"));
        assert!(registry.contains("NoOpStage"));
    }

    #[test]
    fn test_instantiate_known_class() {
        let registry = StageRegistry::with_builtins();
        let stage = registry.instantiate("SetStaticFieldStage").unwrap();
        assert_eq!(stage.layer_name(), "SetStaticFieldStage");
    }

    #[test]
    fn test_unknown_class() {
        let registry = StageRegistry::new();
        let err = registry.instantiate("com.example.Missing").unwrap_err();
        assert!(matches!(err, BootstrapError::UnknownStageClass { class } if class == "com.example.Missing"));
    }

    #[test]
    fn test_failing_constructor() {
        let registry = StageRegistry::new();
        registry.register("Broken", || Err(anyhow::anyhow!("missing model file")));

        let err = registry.instantiate("Broken").unwrap_err();
        assert!(matches!(err, BootstrapError::Instantiation { .. }));
        assert!(err.to_string().contains("missing model file"));
    }

    #[test]
    fn test_classes_sorted() {
        let registry = StageRegistry::new();
        registry.register_stage("b", NoOpStage::new);
        registry.register_stage("a", NoOpStage::new);
        assert_eq!(registry.classes(), vec!["a".to_string(), "b".to_string()]);
    }
}
