//! Mock stages for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

use crate::document::Document;
use crate::errors::{InitError, ProcessError};
use crate::params::{decode_into, Configurable};
use crate::stages::{Stage, StageBase};

/// A stage that records every document and cleanup call.
#[derive(Debug, Default)]
pub struct RecordingStage {
    base: StageBase,
    label: Option<String>,
    fail_on: Option<String>,
    destroy_error: Option<String>,
    processed: Mutex<Vec<String>>,
    destroy_count: AtomicUsize,
}

impl RecordingStage {
    /// Creates a new recording stage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `on_destroy` return an error with `message`.
    #[must_use]
    pub fn with_destroy_error(mut self, message: impl Into<String>) -> Self {
        self.destroy_error = Some(message.into());
        self
    }

    /// Makes `process` fail for the document with `id`.
    #[must_use]
    pub fn failing_on(mut self, id: impl Into<String>) -> Self {
        self.fail_on = Some(id.into());
        self
    }

    /// The bound `label` parameter.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Ids of documents passed to `process`, in order.
    #[must_use]
    pub fn processed_ids(&self) -> Vec<String> {
        self.processed.lock().clone()
    }

    /// Number of times `on_destroy` ran.
    #[must_use]
    pub fn destroy_count(&self) -> usize {
        self.destroy_count.load(Ordering::SeqCst)
    }
}

impl Configurable for RecordingStage {
    fn layer_name(&self) -> &'static str {
        "RecordingStage"
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
        Some(&mut self.base)
    }
}

#[async_trait]
impl Stage for RecordingStage {
    fn base(&self) -> &StageBase {
        &self.base
    }

    async fn process(&self, document: &mut Document) -> Result<(), ProcessError> {
        let id = document.display_id().to_string();
        self.processed.lock().push(id.clone());

        if self.fail_on.as_deref() == Some(id.as_str()) {
            return Err(ProcessError::failed(format!("refusing document {id}")));
        }
        document.put_content_field("recorded", true);
        Ok(())
    }

    fn on_destroy(&self) -> anyhow::Result<()> {
        self.destroy_count.fetch_add(1, Ordering::SeqCst);
        match &self.destroy_error {
            Some(message) => Err(anyhow::anyhow!("{message}")),
            None => Ok(()),
        }
    }
}

/// A stage that takes a fixed time per document.
#[derive(Debug)]
pub struct SlowStage {
    base: StageBase,
    delay: Duration,
    started: Notify,
    started_count: AtomicUsize,
    finished_count: AtomicUsize,
    destroy_count: AtomicUsize,
}

impl SlowStage {
    /// Creates a stage that sleeps for `delay` on every document.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            base: StageBase::new(),
            delay,
            started: Notify::new(),
            started_count: AtomicUsize::new(0),
            finished_count: AtomicUsize::new(0),
            destroy_count: AtomicUsize::new(0),
        }
    }

    /// Waits until a `process` call has begun.
    pub async fn wait_started(&self) {
        self.started.notified().await;
    }

    /// Number of `process` calls that began.
    #[must_use]
    pub fn started_count(&self) -> usize {
        self.started_count.load(Ordering::SeqCst)
    }

    /// Number of `process` calls that ran to completion.
    #[must_use]
    pub fn finished_count(&self) -> usize {
        self.finished_count.load(Ordering::SeqCst)
    }

    /// Number of times `on_destroy` ran.
    #[must_use]
    pub fn destroy_count(&self) -> usize {
        self.destroy_count.load(Ordering::SeqCst)
    }
}

impl Configurable for SlowStage {
    fn layer_name(&self) -> &'static str {
        "SlowStage"
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
impl Stage for SlowStage {
    fn base(&self) -> &StageBase {
        &self.base
    }

    async fn process(&self, document: &mut Document) -> Result<(), ProcessError> {
        self.started_count.fetch_add(1, Ordering::SeqCst);
        // notify_one keeps a permit if nobody is waiting yet
        self.started.notify_one();

        tokio::time::sleep(self.delay).await;

        document.put_content_field("slow", true);
        self.finished_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn on_destroy(&self) -> anyhow::Result<()> {
        self.destroy_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

type ProcessFn = dyn Fn(&mut Document) -> Result<(), ProcessError> + Send + Sync;

/// A stage driven by a closure.
pub struct FnStage {
    base: StageBase,
    func: Box<ProcessFn>,
}

impl FnStage {
    /// Creates a stage that calls `func` for every document.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&mut Document) -> Result<(), ProcessError> + Send + Sync + 'static,
    {
        Self {
            base: StageBase::new(),
            func: Box::new(func),
        }
    }
}

impl std::fmt::Debug for FnStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage").finish_non_exhaustive()
    }
}

impl Configurable for FnStage {
    fn layer_name(&self) -> &'static str {
        "FnStage"
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
impl Stage for FnStage {
    fn base(&self) -> &StageBase {
        &self.base
    }

    async fn process(&self, document: &mut Document) -> Result<(), ProcessError> {
        (self.func)(document)
    }
}

/// A stage whose cleanup hook panics.
#[derive(Debug, Default)]
pub struct PanickingCleanupStage {
    base: StageBase,
    required: Option<String>,
}

impl PanickingCleanupStage {
    /// Creates a new panicking stage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Configurable for PanickingCleanupStage {
    fn layer_name(&self) -> &'static str {
        "PanickingCleanupStage"
    }

    fn declared_parameters(&self) -> &'static [&'static str] {
        &["required"]
    }

    fn set_parameter(&mut self, name: &str, value: &Value) -> Result<(), serde_json::Error> {
        match name {
            "required" => decode_into(&mut self.required, value),
            _ => Ok(()),
        }
    }

    fn parent(&mut self) -> Option<&mut dyn Configurable> {
        Some(&mut self.base)
    }
}

#[async_trait]
impl Stage for PanickingCleanupStage {
    fn base(&self) -> &StageBase {
        &self.base
    }

    fn init(&mut self) -> Result<(), InitError> {
        if self.required.is_none() {
            return Err(InitError::missing("required"));
        }
        Ok(())
    }

    async fn process(&self, _document: &mut Document) -> Result<(), ProcessError> {
        Ok(())
    }

    fn on_destroy(&self) -> anyhow::Result<()> {
        panic!("cleanup exploded");
    }
}
