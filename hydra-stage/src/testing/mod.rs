//! Testing utilities for stage implementations.
//!
//! This module provides:
//! - An in-memory coordinator standing in for the HTTP one
//! - Stages that record, delay, fail, or panic on demand

mod mocks;
mod pipeline;

pub use mocks::{FnStage, PanickingCleanupStage, RecordingStage, SlowStage};
pub use pipeline::InMemoryPipeline;
