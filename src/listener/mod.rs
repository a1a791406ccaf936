//! # Listener Registry and Consumers
//!
//! The orchestration root of the relay. The registry reads listener
//! configurations, resolves entities from the directory, decides
//! primary-only versus primary+secondary registration, and creates consumers
//! through the queue/topic specializations. Each consumer owns one receive
//! loop and the delivery/retry/failure state machine for every message it
//! reads.
//!
//! ## Registration keys
//!
//! Live consumers are tracked under a 3-tuple key: entity name, subscription
//! name (empty for queues), and namespace. At most one registration entry
//! exists per key; a topic entry holds `instance_count` independent consumer
//! instances behind that one key.

pub mod consumer;
pub mod queue;
pub mod registry;
pub mod topic;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::constants::identity::SUBSCRIPTIONS_SEGMENT;
use crate::directory::{MessagingEntity, NamespaceKind};
use crate::error::{RegistryError, RegistryResult};
use crate::logging::log_error;
use crate::messaging::{BrokerChannel, ChannelFactory};
use crate::resilience::RetryPolicy;

pub use consumer::{ConsumerStats, ConsumerStatsSnapshot, EntityConsumer};
pub use queue::QueueConsumer;
pub use registry::{ListenerRegistry, RegistryStats, StartReport};
pub use topic::TopicConsumer;

/// Key for one live registration entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListenerKey {
    pub entity_name: String,
    /// Empty for queue listeners
    pub subscription_name: String,
    pub namespace: NamespaceKind,
}

impl ListenerKey {
    pub fn new(
        entity_name: impl Into<String>,
        subscription_name: impl Into<String>,
        namespace: NamespaceKind,
    ) -> Self {
        Self {
            entity_name: entity_name.into(),
            subscription_name: subscription_name.into(),
            namespace,
        }
    }

    pub fn primary(
        entity_name: impl Into<String>,
        subscription_name: impl Into<String>,
    ) -> Self {
        Self::new(entity_name, subscription_name, NamespaceKind::Primary)
    }

    pub fn secondary(
        entity_name: impl Into<String>,
        subscription_name: impl Into<String>,
    ) -> Self {
        Self::new(entity_name, subscription_name, NamespaceKind::Secondary)
    }

    pub fn is_queue(&self) -> bool {
        self.subscription_name.is_empty()
    }

    /// Canonical entity path used in logs and error context
    pub fn entity_path(&self) -> String {
        entity_path(&self.entity_name, &self.subscription_name)
    }
}

impl std::fmt::Display for ListenerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.entity_path(), self.namespace)
    }
}

/// Canonical path for a listener binding: the queue name for queues,
/// `topic/Subscriptions/subscription` for topic subscriptions
pub fn entity_path(entity_name: &str, subscription_name: &str) -> String {
    if subscription_name.is_empty() {
        entity_name.to_string()
    } else {
        format!("{entity_name}/{SUBSCRIPTIONS_SEGMENT}/{subscription_name}")
    }
}

/// Physical broker queue backing a listener binding. Queues map straight to
/// their entity name; each topic subscription gets its own fan-out queue.
pub fn physical_queue_name(entity_name: &str, subscription_name: &str) -> String {
    if subscription_name.is_empty() {
        entity_name.to_string()
    } else {
        format!("{entity_name}_{subscription_name}")
    }
}

/// Open (or reuse) a broker channel for the key's namespace, with bounded
/// connection retry. The entity must carry a connection for that namespace.
pub(crate) async fn open_channel(
    factory: &dyn ChannelFactory,
    retry_policy: &RetryPolicy,
    entity: &MessagingEntity,
    key: &ListenerKey,
) -> RegistryResult<Arc<dyn BrokerChannel>> {
    let connection = entity.connection_for(key.namespace).ok_or_else(|| {
        RegistryError::invalid_listener(format!(
            "entity '{}' has no {} connection",
            key.entity_name, key.namespace
        ))
    })?;

    retry_policy
        .execute_with_retry("open_channel", || factory.open_channel(connection))
        .await
        .map_err(|e| RegistryError::ChannelSetup {
            key: key.to_string(),
            reason: e.to_string(),
        })
}

/// Best-effort queue provisioning before a consumer starts. A final failure
/// is logged and the consumer still starts; its receive loop surfaces a
/// missing queue through connection-error backoff.
pub(crate) async fn prepare_queue(
    channel: &dyn BrokerChannel,
    retry_policy: &RetryPolicy,
    queue_name: &str,
    component: &str,
) {
    if let Err(e) = retry_policy
        .execute_with_retry("ensure_queue", || channel.ensure_queue(queue_name))
        .await
    {
        log_error(
            component,
            "ensure_queue",
            &e.to_string(),
            Some(&format!("queue={queue_name}")),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_path_for_queue_and_topic() {
        assert_eq!(entity_path("orders", ""), "orders");
        assert_eq!(
            entity_path("Topic1", "fulfillment"),
            "Topic1/Subscriptions/fulfillment"
        );
    }

    #[test]
    fn test_physical_queue_name() {
        assert_eq!(physical_queue_name("orders", ""), "orders");
        assert_eq!(
            physical_queue_name("Topic1", "fulfillment"),
            "Topic1_fulfillment"
        );
    }

    #[test]
    fn test_listener_key_display() {
        let key = ListenerKey::primary("orders", "");
        assert_eq!(key.to_string(), "orders@primary");
        assert!(key.is_queue());

        let key = ListenerKey::secondary("Topic1", "fulfillment");
        assert_eq!(key.to_string(), "Topic1/Subscriptions/fulfillment@secondary");
        assert!(!key.is_queue());
    }

    #[test]
    fn test_keys_differ_by_namespace() {
        let primary = ListenerKey::primary("orders", "");
        let secondary = ListenerKey::secondary("orders", "");
        assert_ne!(primary, secondary);
    }
}
