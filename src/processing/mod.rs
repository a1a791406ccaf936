//! # Message Processing
//!
//! The pluggable processing seam of the relay. A `Processor` is the unit of
//! work invoked once per received message; the host application registers
//! factories for its processors in a `ProcessorRegistry` at startup, keyed
//! by the identifier strings listener configurations refer to. Resolution is
//! an explicit map lookup.
//!
//! `FailedMessageReplayProcessor` is the one processor this crate ships: it
//! re-runs deliveries that previously exhausted their retry budget.

pub mod context;
pub mod registry;
pub mod replay;

use async_trait::async_trait;
use thiserror::Error;

use crate::messaging::MessageProperty;

pub use context::ExecutionContext;
pub use registry::{ProcessorFactory, ProcessorRegistry};
pub use replay::{FailedMessageReference, FailedMessageReplayProcessor};

/// Processing outcome for a single delivery. Returned by processors and
/// consumed by the consumer's retry/failed-log decision table; it never
/// propagates past the consumer.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ProcessingFailure {
    /// Short failure description persisted as the failed-log error message
    pub message: String,
    /// Optional longer detail (stack, cause chain) persisted alongside
    pub detail: Option<String>,
}

impl ProcessingFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(message: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: Some(detail.into()),
        }
    }
}

/// Unit of processing logic bound to a listener. Implementations are supplied
/// by the owning service and invoked concurrently up to the consumer's
/// worker-slot limit, so they must be `Send + Sync` and internally
/// thread-safe.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Human-readable processor name for spans and delivery logs
    fn name(&self) -> &str;

    /// Handle one delivered message body with its property view
    async fn process(
        &self,
        body: &str,
        property: &MessageProperty,
    ) -> Result<(), ProcessingFailure>;
}

impl std::fmt::Debug for dyn Processor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor").field("name", &self.name()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processing_failure_display() {
        let failure = ProcessingFailure::new("downstream returned 503");
        assert_eq!(failure.to_string(), "downstream returned 503");
        assert!(failure.detail.is_none());

        let failure = ProcessingFailure::with_detail("boom", "at line 42");
        assert_eq!(failure.detail.as_deref(), Some("at line 42"));
    }
}
