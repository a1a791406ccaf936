#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Relay Core Rust
//!
//! Reliable-delivery core for services consuming a peek-lock message broker.
//!
//! ## Overview
//!
//! Relay Core owns the subscriber side of a message relay: it registers
//! listeners for broker entities, runs concurrent peek-lock receive loops,
//! and applies a bounded-retry policy to every delivery. Messages that keep
//! failing are diverted to a durable failed-delivery log instead of being
//! lost, and the replay processor later re-drives them through their
//! original processor.
//!
//! ## Architecture
//!
//! The delivery pipeline is explicit at every stage:
//!
//! 1. The [`listener`] registry resolves entities through the [`directory`],
//!    decides primary/secondary namespace registration, and starts consumers.
//! 2. Each consumer receives messages over a [`messaging`] broker channel
//!    under a visibility-timeout lock and hands the body to a processor
//!    resolved from the [`processing`] registry.
//! 3. Processing outcomes drive the state machine: complete on success,
//!    abandon for retry, or divert to the [`delivery_log`] once the
//!    delivery count reaches the listener's retry threshold.
//! 4. The replay processor consumes replay triggers, loads the logged
//!    failure, and re-invokes the original processor with the preserved
//!    payload and metadata.
//!
//! ## Module Organization
//!
//! - [`listener`] - Listener registry, queue/topic consumers, delivery state machine
//! - [`messaging`] - Broker channel abstraction, pgmq channel, message envelopes
//! - [`processing`] - Processor trait, registration map, failed-message replay
//! - [`delivery_log`] - Durable success/failure delivery logs
//! - [`directory`] - Messaging-entity directory with namespace connections
//! - [`config`] - YAML configuration with environment overrides
//! - [`resilience`] - Connection retry with exponential backoff
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging for delivery diagnostics
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use relay_core::config::ConfigManager;
//! use relay_core::delivery_log::PostgresDeliveryLog;
//! use relay_core::directory::PostgresEntityDirectory;
//! use relay_core::listener::ListenerRegistry;
//! use relay_core::messaging::PgmqChannelFactory;
//! use relay_core::processing::ProcessorRegistry;
//!
//! # async fn example(pool: sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let config = Arc::new(manager.config().clone());
//!
//! let processors = ProcessorRegistry::new();
//! // processors.register("order_processor", |_context| ...)?;
//!
//! let registry = ListenerRegistry::new(
//!     config,
//!     Arc::new(PostgresEntityDirectory::new(pool.clone())),
//!     processors,
//!     Arc::new(PgmqChannelFactory::new()),
//!     Arc::new(PostgresDeliveryLog::new(pool)),
//! );
//!
//! let report = registry.start_listeners(None).await;
//! println!("started {} listeners", report.started);
//! # Ok(())
//! # }
//! ```
//!
//! ## Delivery Guarantees
//!
//! At-least-once. Completion is acknowledged only after the processor
//! returns, so a crash between processing and completion redelivers. The
//! failed-delivery log is the safety net past the retry threshold: the
//! message is recorded before it is completed away from the broker.

pub mod config;
pub mod constants;
pub mod delivery_log;
pub mod directory;
pub mod error;
pub mod listener;
pub mod logging;
pub mod messaging;
pub mod processing;
pub mod resilience;

pub use config::{
    BrokerConfig, ConfigManager, ConnectionRetryConfig, FailoverConfig, ListenerConfig,
    RelayConfig,
};
pub use delivery_log::{
    DeliveryLogRepository, DeliveryStatus, FailedDeliveryLog, FailedMessageService,
    NewFailedDeliveryLog, NewSuccessDeliveryLog, PostgresDeliveryLog, SuccessDeliveryLog,
};
pub use directory::{
    EntityDirectory, EntityStatus, MessagingEntity, NamespaceKind, PostgresEntityDirectory,
};
pub use error::{RegistryError, RelayError, RelayResult};
pub use listener::{
    ConsumerStatsSnapshot, EntityConsumer, ListenerKey, ListenerRegistry, RegistryStats,
    StartReport,
};
pub use messaging::{
    BrokerChannel, ChannelFactory, MessageEnvelope, MessageProperty, PgmqChannel,
    PgmqChannelFactory, WirePayload,
};
pub use processing::{
    ExecutionContext, FailedMessageReplayProcessor, ProcessingFailure, Processor,
    ProcessorRegistry,
};
pub use resilience::RetryPolicy;
