use std::sync::Mutex;

use chrono::{DateTime, Utc};

/// Structured record of a background handler that gave up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerFailure {
    /// Name of the listener that failed.
    pub listener: &'static str,
    /// Event type being handled.
    pub event_type: &'static str,
    /// Identifier of the thing the listener was acting on (asset id, box id, ...).
    pub subject: String,
    pub error: String,
    pub at: DateTime<Utc>,
}

impl HandlerFailure {
    pub fn new(
        listener: &'static str,
        event_type: &'static str,
        subject: impl ToString,
        error: impl ToString,
    ) -> Self {
        Self {
            listener,
            event_type,
            subject: subject.to_string(),
            error: error.to_string(),
            at: Utc::now(),
        }
    }
}

/// Observability collaborator injected into every listener.
///
/// Recording must never fail or panic: the caller has nowhere to send the error.
pub trait FailureSink: Send + Sync {
    fn record(&self, failure: HandlerFailure);
}

/// Sink that writes failures to the tracing pipeline.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingFailureSink;

impl FailureSink for TracingFailureSink {
    fn record(&self, failure: HandlerFailure) {
        ::tracing::error!(
            listener = failure.listener,
            event_type = failure.event_type,
            subject = %failure.subject,
            error = %failure.error,
            "background handler failed"
        );
    }
}

/// Sink that keeps failures in memory (tests/dev) and also traces them.
#[derive(Debug, Default)]
pub struct InMemoryFailureSink {
    failures: Mutex<Vec<HandlerFailure>>,
}

impl InMemoryFailureSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failures(&self) -> Vec<HandlerFailure> {
        match self.failures.lock() {
            Ok(f) => f.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.failures().is_empty()
    }
}

impl FailureSink for InMemoryFailureSink {
    fn record(&self, failure: HandlerFailure) {
        TracingFailureSink.record(failure.clone());
        match self.failures.lock() {
            Ok(mut f) => f.push(failure),
            Err(poisoned) => poisoned.into_inner().push(failure),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_sink_keeps_records_in_order() {
        let sink = InMemoryFailureSink::new();
        sink.record(HandlerFailure::new("a", "x.y", "id-1", "first"));
        sink.record(HandlerFailure::new("b", "x.z", "id-2", "second"));

        let errors: Vec<_> = sink.failures().into_iter().map(|f| f.error).collect();
        assert_eq!(errors, vec!["first", "second"]);
    }
}
