//! # Entity Consumer
//!
//! One consumer binds a listener configuration, a resolved entity, and a
//! namespace to an active receive loop. The loop polls the broker channel,
//! dispatches deliveries concurrently up to the worker-slot limit, and runs
//! the delivery/retry/failure decision table for each message:
//!
//! - processing succeeded: complete, then best-effort success log
//! - processing failed at the retry threshold: failed-delivery log, then
//!   complete (abandon if the log write itself fails)
//! - processing failed below the threshold: abandon for redelivery
//!
//! The retry budget is the broker's delivery count; the consumer keeps no
//! per-message state across redeliveries. Connection errors back off
//! exponentially and never halt the loop.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Mutex, Notify, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::ListenerKey;
use crate::config::{BrokerConfig, ListenerConfig};
use crate::delivery_log::{DeliveryLogRepository, NewFailedDeliveryLog, NewSuccessDeliveryLog};
use crate::error::{RegistryError, RegistryResult};
use crate::logging::{log_delivery_operation, log_error};
use crate::messaging::{BrokerChannel, MessageEnvelope};
use crate::processing::{ProcessingFailure, Processor};
use crate::resilience::RetryPolicy;

/// Per-consumer delivery counters
#[derive(Debug, Default)]
pub struct ConsumerStats {
    /// Deliveries handed to the processor
    pub received: AtomicU64,
    /// Deliveries completed after successful processing
    pub succeeded: AtomicU64,
    /// Deliveries diverted to the failed-delivery log
    pub failed_logged: AtomicU64,
    /// Deliveries abandoned for redelivery
    pub abandoned: AtomicU64,
    /// Receive-channel failures
    pub connection_errors: AtomicU64,
}

impl ConsumerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ConsumerStatsSnapshot {
        ConsumerStatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed_logged: self.failed_logged.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
            connection_errors: self.connection_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of a consumer's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConsumerStatsSnapshot {
    pub received: u64,
    pub succeeded: u64,
    pub failed_logged: u64,
    pub abandoned: u64,
    pub connection_errors: u64,
}

/// One live consumer: a receive loop plus the per-message state machine
pub struct EntityConsumer {
    id: Uuid,
    key: ListenerKey,
    config: ListenerConfig,
    broker: BrokerConfig,
    entity_path: String,
    queue_name: String,
    lock_seconds: i32,
    channel: Arc<dyn BrokerChannel>,
    processor: Arc<dyn Processor>,
    delivery_log: Arc<dyn DeliveryLogRepository>,
    retry_policy: RetryPolicy,
    worker_slots: Arc<Semaphore>,
    stats: Arc<ConsumerStats>,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for EntityConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityConsumer")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("entity_path", &self.entity_path)
            .field("queue_name", &self.queue_name)
            .field("lock_seconds", &self.lock_seconds)
            .finish_non_exhaustive()
    }
}

impl EntityConsumer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        key: ListenerKey,
        config: ListenerConfig,
        broker: BrokerConfig,
        channel: Arc<dyn BrokerChannel>,
        processor: Arc<dyn Processor>,
        delivery_log: Arc<dyn DeliveryLogRepository>,
        retry_policy: RetryPolicy,
        lock_seconds: i32,
    ) -> Self {
        let entity_path = key.entity_path();
        let queue_name = super::physical_queue_name(&key.entity_name, &key.subscription_name);
        let slots = config.worker_slots.max(1);

        Self {
            id: Uuid::new_v4(),
            key,
            config,
            broker,
            entity_path,
            queue_name,
            lock_seconds,
            channel,
            processor,
            delivery_log,
            retry_policy,
            worker_slots: Arc::new(Semaphore::new(slots)),
            stats: Arc::new(ConsumerStats::new()),
            running: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(Notify::new()),
            handle: Mutex::new(None),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn key(&self) -> &ListenerKey {
        &self.key
    }

    pub fn entity_path(&self) -> &str {
        &self.entity_path
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    pub fn lock_seconds(&self) -> i32 {
        self.lock_seconds
    }

    pub fn processor_name(&self) -> &str {
        self.processor.name()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> ConsumerStatsSnapshot {
        self.stats.snapshot()
    }

    /// Start the receive loop in a background task
    #[instrument(skip(self), fields(consumer_id = %self.id, entity_path = %self.entity_path, namespace = %self.key.namespace))]
    pub async fn start(self: Arc<Self>) -> RegistryResult<()> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(RegistryError::Conflict {
                key: self.key.to_string(),
                reason: "consumer is already running".to_string(),
            });
        }

        info!(
            processor = %self.processor.name(),
            queue = %self.queue_name,
            worker_slots = self.config.worker_slots,
            retry_threshold = self.config.retry_threshold,
            lock_seconds = self.lock_seconds,
            "🚀 Starting consumer"
        );

        let consumer = self.clone();
        let handle = tokio::spawn(async move {
            consumer.receive_loop().await;
        });
        *self.handle.lock().await = Some(handle);

        Ok(())
    }

    /// Request shutdown and wait up to `grace` for in-flight deliveries
    #[instrument(skip(self), fields(consumer_id = %self.id, entity_path = %self.entity_path))]
    pub async fn stop(&self, grace: Duration) -> RegistryResult<()> {
        if !self.running.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        info!("🛑 Stopping consumer");
        self.shutdown.notify_waiters();

        let handle = self.handle.lock().await.take();
        if let Some(handle) = handle {
            match tokio::time::timeout(grace, handle).await {
                Ok(Ok(())) => {
                    info!("✅ Consumer stopped");
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "Consumer task ended with join error");
                }
                Err(_) => {
                    warn!(
                        grace_seconds = grace.as_secs(),
                        "Consumer did not stop within grace period"
                    );
                    return Err(RegistryError::StopTimeout {
                        key: self.key.to_string(),
                        grace_seconds: grace.as_secs(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Sleep that a shutdown request interrupts; returns true on shutdown
    async fn wait_or_shutdown(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(delay) => false,
            _ = self.shutdown.notified() => true,
        }
    }

    async fn receive_loop(self: Arc<Self>) {
        let poll_interval = self.broker.poll_interval();
        let batch_size = self.broker.batch_size;
        let mut connection_failures: u32 = 0;

        while self.running.load(Ordering::Acquire) {
            match self
                .channel
                .receive(&self.queue_name, self.lock_seconds, batch_size)
                .await
            {
                Ok(envelopes) => {
                    connection_failures = 0;
                    if envelopes.is_empty() {
                        if self.wait_or_shutdown(poll_interval).await {
                            break;
                        }
                        continue;
                    }

                    debug!(
                        count = envelopes.len(),
                        entity_path = %self.entity_path,
                        "📥 Received delivery batch"
                    );
                    self.clone().dispatch_batch(envelopes).await;
                }
                Err(e) => {
                    connection_failures = connection_failures.saturating_add(1);
                    self.stats.connection_errors.fetch_add(1, Ordering::Relaxed);

                    let delay = self.retry_policy.delay_for_attempt(connection_failures);
                    if connection_failures == self.retry_policy.max_attempts() {
                        // Escalate once per outage; the loop keeps retrying at
                        // the capped delay
                        log_error(
                            "entity_consumer",
                            "receive",
                            &e.to_string(),
                            Some(&format!(
                                "entity_path={}, client_id={}, attempts={}",
                                self.entity_path, self.id, connection_failures
                            )),
                        );
                    } else {
                        warn!(
                            entity_path = %self.entity_path,
                            client_id = %self.id,
                            attempt = connection_failures,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "🔄 Receive failed, backing off"
                        );
                    }

                    if self.wait_or_shutdown(delay).await {
                        break;
                    }
                }
            }
        }

        // Let in-flight deliveries finish their current outcome before the
        // loop reports stopped
        let permits = self.config.worker_slots.max(1) as u32;
        let _ = self.worker_slots.acquire_many(permits).await;

        info!(
            consumer_id = %self.id,
            entity_path = %self.entity_path,
            "🛑 Receive loop ended"
        );
    }

    /// Fan deliveries out to worker tasks, bounded by the worker-slot
    /// semaphore
    async fn dispatch_batch(self: Arc<Self>, envelopes: Vec<MessageEnvelope>) {
        for envelope in envelopes {
            if !self.running.load(Ordering::Acquire) {
                // Undispatched messages reappear once their lock expires
                break;
            }

            let permit = match self.worker_slots.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            let consumer = self.clone();
            tokio::spawn(async move {
                consumer.handle_delivery(envelope).await;
                drop(permit);
            });
        }
    }

    /// Per-message decision table
    #[instrument(skip(self, envelope), fields(
        processor = %self.processor.name(),
        entity_path = %self.entity_path,
        message_id = %envelope.payload.message_id,
        delivery_count = envelope.delivery_count,
        correlation_id = envelope.payload.correlation_id.as_deref().unwrap_or(""),
    ))]
    async fn handle_delivery(&self, envelope: MessageEnvelope) {
        self.stats.received.fetch_add(1, Ordering::Relaxed);
        let property = envelope.property();

        match self.processor.process(envelope.body(), &property).await {
            Ok(()) => self.complete_delivery(&envelope).await,
            Err(failure) => self.handle_processing_failure(&envelope, failure).await,
        }
    }

    async fn complete_delivery(&self, envelope: &MessageEnvelope) {
        match self
            .channel
            .complete(&self.queue_name, envelope.ack_token)
            .await
        {
            Ok(()) => {
                self.stats.succeeded.fetch_add(1, Ordering::Relaxed);
                log_delivery_operation(
                    "complete",
                    &self.entity_path,
                    Some(&envelope.payload.message_id),
                    Some(envelope.delivery_count),
                    "succeeded",
                    None,
                );
            }
            Err(e) => {
                // Lock expiry will redeliver; at-least-once holds
                warn!(
                    ack_token = envelope.ack_token,
                    error = %e,
                    "Complete failed after successful processing"
                );
            }
        }

        let log = NewSuccessDeliveryLog::from_envelope(envelope, &self.config.entity_name);
        if let Err(e) = self.delivery_log.append_success(log).await {
            warn!(
                message_id = %envelope.payload.message_id,
                error = %e,
                "Success log write failed"
            );
        }
    }

    async fn handle_processing_failure(
        &self,
        envelope: &MessageEnvelope,
        failure: ProcessingFailure,
    ) {
        let delivery_count = envelope.delivery_count;
        let threshold = self.config.retry_threshold;

        // Divert only on the exact last allowed attempt. A delivery count
        // past the threshold keeps abandoning until the broker's own
        // dead-letter policy intervenes.
        if delivery_count == threshold {
            let log = NewFailedDeliveryLog::from_envelope(
                envelope,
                &self.config.entity_name,
                &self.config.subscription_name,
                &failure.message,
                failure.detail.as_deref(),
            );

            match self.delivery_log.append_failure(log).await {
                Ok(failed_log_id) => {
                    self.stats.failed_logged.fetch_add(1, Ordering::Relaxed);
                    log_delivery_operation(
                        "failed_log",
                        &self.entity_path,
                        Some(&envelope.payload.message_id),
                        Some(delivery_count),
                        "diverted",
                        Some(&format!("failed_log_id={failed_log_id}")),
                    );

                    if let Err(e) = self
                        .channel
                        .complete(&self.queue_name, envelope.ack_token)
                        .await
                    {
                        warn!(
                            ack_token = envelope.ack_token,
                            failed_log_id = failed_log_id,
                            error = %e,
                            "Complete failed after failed-log write"
                        );
                    }
                }
                Err(e) => {
                    warn!(
                        message_id = %envelope.payload.message_id,
                        error = %e,
                        "💥 Failed-log write failed, abandoning for redelivery"
                    );
                    self.abandon_delivery(envelope, "failed_log_write_error")
                        .await;
                }
            }
        } else {
            debug!(
                delivery_count = delivery_count,
                retry_threshold = threshold,
                error = %failure,
                "🔄 Processing failed, releasing for redelivery"
            );
            self.abandon_delivery(envelope, "retry").await;
        }
    }

    async fn abandon_delivery(&self, envelope: &MessageEnvelope, reason: &str) {
        match self
            .channel
            .abandon(&self.queue_name, envelope.ack_token)
            .await
        {
            Ok(()) => {
                self.stats.abandoned.fetch_add(1, Ordering::Relaxed);
                log_delivery_operation(
                    "abandon",
                    &self.entity_path,
                    Some(&envelope.payload.message_id),
                    Some(envelope.delivery_count),
                    reason,
                    None,
                );
            }
            Err(e) => {
                warn!(
                    ack_token = envelope.ack_token,
                    error = %e,
                    "Abandon failed; lock expiry will redeliver"
                );
            }
        }
    }
}
