//! # Broker Channel Abstraction
//!
//! Peek-lock receive semantics behind a trait so consumers stay agnostic of
//! the physical broker. Production uses the pgmq-backed channel; tests use
//! recording fakes.
//!
//! Semantics expected of implementations:
//! - `receive` acquires a lock on each returned message for `lock_seconds`;
//!   the broker increments the delivery count at read time.
//! - `complete` acknowledges and removes a message; it will never be
//!   redelivered.
//! - `abandon` releases the lock early, making the message immediately
//!   eligible for redelivery with its incremented delivery count intact.

use std::sync::Arc;

use super::envelope::{MessageEnvelope, WirePayload};
use super::errors::MessagingResult;

/// Manual-acknowledgment channel to a peek-lock broker
#[async_trait::async_trait]
pub trait BrokerChannel: Send + Sync {
    /// Create the backing queue if it does not exist
    async fn ensure_queue(&self, queue_name: &str) -> MessagingResult<()>;

    /// Enqueue a payload, returning the broker message id
    async fn send(&self, queue_name: &str, payload: &WirePayload) -> MessagingResult<i64>;

    /// Read up to `batch_size` messages, locking each for `lock_seconds`
    async fn receive(
        &self,
        queue_name: &str,
        lock_seconds: i32,
        batch_size: i32,
    ) -> MessagingResult<Vec<MessageEnvelope>>;

    /// Acknowledge a message so it is never redelivered
    async fn complete(&self, queue_name: &str, ack_token: i64) -> MessagingResult<()>;

    /// Release the lock so the broker redelivers the message
    async fn abandon(&self, queue_name: &str, ack_token: i64) -> MessagingResult<()>;
}

/// Opens channels from connection descriptors. Listener registration goes
/// through this seam so consumers against different namespaces can share
/// pooled connections, and so tests can hand out fake channels.
#[async_trait::async_trait]
pub trait ChannelFactory: Send + Sync {
    /// Open (or reuse) a channel for the given connection descriptor
    async fn open_channel(&self, connection: &str) -> MessagingResult<Arc<dyn BrokerChannel>>;
}
