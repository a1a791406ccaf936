//! # Queue Listener Construction
//!
//! Point-to-point listeners. A queue listener binds straight to the entity's
//! backing queue with no subscription segment, and each namespace gets
//! exactly one consumer instance.

use std::sync::Arc;

use tracing::info;

use super::consumer::EntityConsumer;
use super::ListenerKey;
use crate::config::{BrokerConfig, ListenerConfig};
use crate::delivery_log::DeliveryLogRepository;
use crate::directory::{MessagingEntity, NamespaceKind};
use crate::error::{RegistryError, RegistryResult};
use crate::messaging::ChannelFactory;
use crate::processing::Processor;
use crate::resilience::RetryPolicy;

/// Builds consumers for queue listeners
pub struct QueueConsumer {
    broker: BrokerConfig,
    retry_policy: RetryPolicy,
    delivery_log: Arc<dyn DeliveryLogRepository>,
    channel_factory: Arc<dyn ChannelFactory>,
}

impl QueueConsumer {
    pub fn new(
        broker: BrokerConfig,
        retry_policy: RetryPolicy,
        delivery_log: Arc<dyn DeliveryLogRepository>,
        channel_factory: Arc<dyn ChannelFactory>,
    ) -> Self {
        Self {
            broker,
            retry_policy,
            delivery_log,
            channel_factory,
        }
    }

    /// Build a consumer for a queue listener against one namespace. The
    /// returned consumer is constructed but not started.
    pub async fn add_listener(
        &self,
        config: &ListenerConfig,
        entity: &MessagingEntity,
        processor: Arc<dyn Processor>,
        namespace: NamespaceKind,
    ) -> RegistryResult<Arc<EntityConsumer>> {
        if !config.is_queue() {
            return Err(RegistryError::invalid_listener(format!(
                "listener for '{}' carries subscription '{}'; queue listeners take none",
                config.entity_name, config.subscription_name
            )));
        }

        let key = ListenerKey::new(&config.entity_name, &config.subscription_name, namespace);
        let channel =
            super::open_channel(self.channel_factory.as_ref(), &self.retry_policy, entity, &key)
                .await?;

        let queue_name = super::physical_queue_name(&key.entity_name, &key.subscription_name);
        super::prepare_queue(
            channel.as_ref(),
            &self.retry_policy,
            &queue_name,
            "queue_consumer",
        )
        .await;

        let consumer = Arc::new(EntityConsumer::new(
            key,
            config.clone(),
            self.broker.clone(),
            channel,
            processor,
            self.delivery_log.clone(),
            self.retry_policy.clone(),
            self.broker.visibility_timeout_seconds,
        ));

        info!(
            entity_path = %consumer.entity_path(),
            namespace = %namespace,
            processor = %consumer.processor_name(),
            "📨 Queue listener prepared"
        );

        Ok(consumer)
    }
}
