//! # Messaging Module
//!
//! Peek-lock messaging over PostgreSQL message queues (pgmq). Defines the
//! wire envelope types, the manual-acknowledgment broker channel trait, and
//! the production pgmq-backed channel.

pub mod broker;
pub mod envelope;
pub mod errors;
pub mod pgmq_channel;

pub use broker::{BrokerChannel, ChannelFactory};
pub use envelope::{MessageEnvelope, MessageProperty, WirePayload};
pub use errors::{MessagingError, MessagingResult};
pub use pgmq_channel::{PgmqChannel, PgmqChannelFactory};
