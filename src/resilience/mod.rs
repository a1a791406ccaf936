//! # Resilience Module
//!
//! Bounded-retry policy for broker connection failures. Message-processing
//! failures never come through here; they are handled by the consumer's
//! retry/failed-log decision table. This module only covers the transport:
//! receive-loop errors back off exponentially, and setup operations retry a
//! bounded number of times before the error path takes over.

pub mod retry;

pub use retry::RetryPolicy;
