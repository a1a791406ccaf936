//! # Delivery-Outcome Log
//!
//! Durable record of delivery outcomes. Consumers append success rows
//! best-effort after every completed delivery and failed rows when a message
//! exhausts its retry budget. The replay processor reads failed rows back
//! through `FailedMessageService` and flips their status after a replay
//! attempt.
//!
//! Both traits are object-safe so tests can substitute recording fakes.

pub mod postgres;
pub mod types;

use async_trait::async_trait;

use crate::error::RelayResult;

pub use postgres::PostgresDeliveryLog;
pub use types::{
    DeliveryStatus, FailedDeliveryLog, NewFailedDeliveryLog, NewSuccessDeliveryLog,
    SuccessDeliveryLog,
};

/// Append-only persistence for delivery outcomes, consumed by consumers.
/// Success writes are best-effort; a failed-row write that errors makes the
/// consumer fall back to abandoning the message.
#[async_trait]
pub trait DeliveryLogRepository: Send + Sync {
    /// Record a successful delivery
    async fn append_success(&self, log: NewSuccessDeliveryLog) -> RelayResult<()>;

    /// Record a delivery that exhausted its retry budget; returns the row id
    async fn append_failure(&self, log: NewFailedDeliveryLog) -> RelayResult<i64>;
}

/// Query/update surface over failed-delivery rows, consumed by the replay
/// processor
#[async_trait]
pub trait FailedMessageService: Send + Sync {
    /// Fetch failed rows by id; missing ids are simply absent from the result
    async fn find_by_ids(&self, ids: &[i64]) -> RelayResult<Vec<FailedDeliveryLog>>;

    /// Set the status of one failed row
    async fn update_status(&self, id: i64, status: DeliveryStatus) -> RelayResult<()>;

    /// Replace the error message on one failed row
    async fn update_error_message(&self, id: i64, error_message: &str) -> RelayResult<()>;
}
