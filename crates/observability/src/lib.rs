//! Tracing/logging setup and the failure sink handed to background listeners.

/// Initialize process-wide tracing from `RUST_LOG` (default `info`).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Failure records reported by listeners.
pub mod sink;

/// Tracing configuration (filters, layers).
pub mod tracing;

pub use sink::{FailureSink, HandlerFailure, InMemoryFailureSink, TracingFailureSink};
