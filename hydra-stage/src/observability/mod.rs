//! Observability utilities: subscriber setup and timing helpers.

mod logging;
mod timing;

pub use logging::{init_tracing, LogFormat, LOG_FORMAT_ENV};
pub use timing::SpanTimer;
