//! # PostgreSQL Message Queue Channel (pgmq-rs)
//!
//! Production [`BrokerChannel`] backed by the pgmq-rs crate. Peek-lock
//! mapping: `read_batch` with a visibility timeout acquires the lock,
//! `delete` completes, and resetting the visibility timeout to now abandons,
//! leaving the message immediately visible with its incremented read count.

use chrono::Utc;
use dashmap::DashMap;
use pgmq::{types::Message, PGMQueue};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::broker::{BrokerChannel, ChannelFactory};
use super::envelope::{MessageEnvelope, WirePayload};
use super::errors::{MessagingError, MessagingResult};

/// pgmq-rs based broker channel
#[derive(Debug, Clone)]
pub struct PgmqChannel {
    pgmq: PGMQueue,
}

impl PgmqChannel {
    /// Create a new channel using a connection string
    pub async fn new(database_url: &str) -> MessagingResult<Self> {
        info!("🚀 Connecting to pgmq using pgmq-rs crate");

        let pgmq = PGMQueue::new(database_url.to_string()).await?;

        info!("✅ Connected to pgmq using pgmq-rs");
        Ok(Self { pgmq })
    }

    /// Create a new channel using an existing connection pool
    pub async fn new_with_pool(pool: sqlx::PgPool) -> Self {
        info!("🚀 Creating pgmq channel with shared connection pool");

        let pgmq = PGMQueue::new_with_pool(pool).await;

        info!("✅ pgmq channel created with shared pool");
        Self { pgmq }
    }

    /// Get reference to the underlying connection pool for advanced operations
    pub fn pool(&self) -> &sqlx::PgPool {
        &self.pgmq.connection
    }

    /// Purge queue (delete all messages)
    pub async fn purge_queue(&self, queue_name: &str) -> MessagingResult<u64> {
        warn!("🧹 Purging queue: {}", queue_name);

        let purged_count = self.pgmq.purge(queue_name).await.map_err(|e| {
            MessagingError::queue_operation(queue_name, "purge", e.to_string())
        })?;

        warn!(
            "🗑️ Purged {} messages from queue: {}",
            purged_count, queue_name
        );
        Ok(purged_count)
    }

    /// Drop queue completely
    pub async fn drop_queue(&self, queue_name: &str) -> MessagingResult<()> {
        warn!("💥 Dropping queue: {}", queue_name);

        self.pgmq.destroy(queue_name).await.map_err(|e| {
            MessagingError::queue_operation(queue_name, "destroy", e.to_string())
        })?;

        warn!("🗑️ Queue dropped: {}", queue_name);
        Ok(())
    }
}

/// Convert a pgmq read into an inbound envelope. Payloads that do not match
/// the wire format still flow through: the raw JSON becomes the body so a
/// processor can decide what to do with it.
fn envelope_from_queue_message(queue_message: Message<serde_json::Value>) -> MessageEnvelope {
    let payload = match WirePayload::from_json(queue_message.message.clone()) {
        Ok(payload) => payload,
        Err(e) => {
            debug!(
                msg_id = queue_message.msg_id,
                error = %e,
                "Message is not in wire format, passing raw body through"
            );
            WirePayload {
                message_id: queue_message.msg_id.to_string(),
                correlation_id: None,
                label: None,
                publisher: None,
                metadata: std::collections::HashMap::new(),
                body: queue_message.message.to_string(),
            }
        }
    };

    MessageEnvelope {
        ack_token: queue_message.msg_id,
        delivery_count: queue_message.read_ct,
        enqueued_at: queue_message.enqueued_at,
        payload,
    }
}

#[async_trait::async_trait]
impl BrokerChannel for PgmqChannel {
    async fn ensure_queue(&self, queue_name: &str) -> MessagingResult<()> {
        debug!("📋 Creating queue: {}", queue_name);

        self.pgmq.create(queue_name).await.map_err(|e| {
            MessagingError::queue_operation(queue_name, "create", e.to_string())
        })?;

        info!("✅ Queue ready: {}", queue_name);
        Ok(())
    }

    async fn send(&self, queue_name: &str, payload: &WirePayload) -> MessagingResult<i64> {
        debug!(
            "📤 Sending message {} to queue: {}",
            payload.message_id, queue_name
        );

        let serialized = payload.to_json()?;
        let message_id = self.pgmq.send(queue_name, &serialized).await.map_err(|e| {
            MessagingError::queue_operation(queue_name, "send", e.to_string())
        })?;

        debug!(
            "✅ Message sent to queue: {} with id: {}",
            queue_name, message_id
        );
        Ok(message_id)
    }

    async fn receive(
        &self,
        queue_name: &str,
        lock_seconds: i32,
        batch_size: i32,
    ) -> MessagingResult<Vec<MessageEnvelope>> {
        debug!(
            "📥 Reading messages from queue: {} (batch: {}, lock: {}s)",
            queue_name, batch_size, lock_seconds
        );

        let messages = self
            .pgmq
            .read_batch::<serde_json::Value>(queue_name, Some(lock_seconds), batch_size)
            .await
            .map_err(|e| MessagingError::queue_operation(queue_name, "read_batch", e.to_string()))?
            .unwrap_or_default();

        debug!(
            "📨 Read {} messages from queue: {}",
            messages.len(),
            queue_name
        );

        Ok(messages
            .into_iter()
            .map(envelope_from_queue_message)
            .collect())
    }

    async fn complete(&self, queue_name: &str, ack_token: i64) -> MessagingResult<()> {
        debug!(
            "🗑️ Completing message {} on queue: {}",
            ack_token, queue_name
        );

        self.pgmq.delete(queue_name, ack_token).await.map_err(|e| {
            MessagingError::queue_operation(queue_name, "delete", e.to_string())
        })?;

        debug!("✅ Message completed: {}", ack_token);
        Ok(())
    }

    async fn abandon(&self, queue_name: &str, ack_token: i64) -> MessagingResult<()> {
        debug!(
            "🔄 Abandoning message {} on queue: {}",
            ack_token, queue_name
        );

        // Setting the visibility time to now releases the lock; the read
        // count stays incremented so the retry budget advances.
        self.pgmq
            .set_vt::<serde_json::Value>(queue_name, ack_token, Utc::now())
            .await
            .map_err(|e| MessagingError::queue_operation(queue_name, "set_vt", e.to_string()))?;

        debug!("✅ Message abandoned for redelivery: {}", ack_token);
        Ok(())
    }
}

/// Channel factory that pools one pgmq connection per distinct descriptor.
/// Listeners registered against the same connection string share a pool;
/// primary and secondary namespaces with different descriptors get their own.
#[derive(Debug, Default)]
pub struct PgmqChannelFactory {
    channels: DashMap<String, PgmqChannel>,
}

impl PgmqChannelFactory {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Seed the factory with a pre-built channel for a descriptor; used when
    /// the host already holds a pool for that database
    pub fn with_channel(self, connection: &str, channel: PgmqChannel) -> Self {
        self.channels.insert(connection.to_string(), channel);
        self
    }
}

#[async_trait::async_trait]
impl ChannelFactory for PgmqChannelFactory {
    async fn open_channel(&self, connection: &str) -> MessagingResult<Arc<dyn BrokerChannel>> {
        if let Some(existing) = self.channels.get(connection) {
            debug!("📋 Reusing pooled pgmq channel");
            return Ok(Arc::new(existing.clone()));
        }

        let channel = PgmqChannel::new(connection).await?;
        self.channels
            .insert(connection.to_string(), channel.clone());
        Ok(Arc::new(channel))
    }
}
