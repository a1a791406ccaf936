//! # Topic Listener Construction
//!
//! Publish-subscribe listeners. A topic listener binds to one named
//! subscription on the topic; the subscription's fan-out queue is what the
//! consumer actually reads. Topic consumers hold a longer peek lock than
//! queue consumers, and a listener may run several independent instances
//! against the same subscription.

use std::sync::Arc;

use tracing::info;

use super::consumer::EntityConsumer;
use super::ListenerKey;
use crate::config::{BrokerConfig, ListenerConfig};
use crate::constants::channel::TOPIC_LOCK_SECONDS;
use crate::delivery_log::DeliveryLogRepository;
use crate::directory::{MessagingEntity, NamespaceKind};
use crate::error::{RegistryError, RegistryResult};
use crate::messaging::ChannelFactory;
use crate::processing::Processor;
use crate::resilience::RetryPolicy;

/// Builds consumers for topic-subscription listeners
pub struct TopicConsumer {
    broker: BrokerConfig,
    retry_policy: RetryPolicy,
    delivery_log: Arc<dyn DeliveryLogRepository>,
    channel_factory: Arc<dyn ChannelFactory>,
}

impl TopicConsumer {
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

    /// Build one consumer instance for a topic listener against one
    /// namespace. The registry calls this once per configured instance; the
    /// returned consumer is constructed but not started.
    pub async fn add_listener(
        &self,
        config: &ListenerConfig,
        entity: &MessagingEntity,
        processor: Arc<dyn Processor>,
        namespace: NamespaceKind,
    ) -> RegistryResult<Arc<EntityConsumer>> {
        if !config.is_topic() {
            return Err(RegistryError::invalid_listener(format!(
                "listener for '{}' names no subscription; topic listeners require one",
                config.entity_name
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
            "topic_consumer",
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
            TOPIC_LOCK_SECONDS,
        ));

        info!(
            entity_path = %consumer.entity_path(),
            namespace = %namespace,
            processor = %consumer.processor_name(),
            instances = config.instance_count,
            "📨 Topic listener prepared"
        );

        Ok(consumer)
    }
}
