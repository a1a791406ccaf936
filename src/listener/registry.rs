//! # Listener Registry
//!
//! Owns every live consumer in the process. Registration resolves the
//! entity from the directory, decides primary-only versus
//! primary+secondary namespaces from the failover flag, builds consumers
//! through the queue/topic specializations, claims the registration keys,
//! and starts the receive loops. Stopping reverses it with a bounded grace
//! period per consumer.
//!
//! Three start surfaces cover the deployment shapes:
//! - `start_listeners` walks the configured listener definitions
//! - `start_all_entity_listeners` discovers active entities from the
//!   directory and stamps each one from the first configured listener
//! - `start_entity_listener` lazily starts a single binding, cheap to call
//!   repeatedly because a live registration short-circuits before any
//!   directory lookup

use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::consumer::{ConsumerStatsSnapshot, EntityConsumer};
use super::queue::QueueConsumer;
use super::topic::TopicConsumer;
use super::ListenerKey;
use crate::config::{ListenerConfig, RelayConfig};
use crate::constants::identity::REPLAY_PROCESSOR_ID;
use crate::constants::limits::STOP_GRACE_PERIOD_SECONDS;
use crate::delivery_log::{DeliveryLogRepository, FailedMessageService};
use crate::directory::{EntityDirectory, MessagingEntity, NamespaceKind};
use crate::error::{RegistryError, RegistryResult};
use crate::logging::{log_error, log_listener_operation};
use crate::messaging::ChannelFactory;
use crate::processing::{
    ExecutionContext, FailedMessageReplayProcessor, Processor, ProcessorRegistry,
};
use crate::resilience::RetryPolicy;

/// Outcome counts for a bulk start call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StartReport {
    pub started: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Aggregate view over every live consumer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    /// Live registration entries (one per key)
    pub listeners: usize,
    /// Consumer instances across all entries
    pub consumers: usize,
    pub totals: ConsumerStatsSnapshot,
}

/// Process-wide registry of live listeners
pub struct ListenerRegistry {
    config: Arc<RelayConfig>,
    directory: Arc<dyn EntityDirectory>,
    processors: ProcessorRegistry,
    queue_consumer: QueueConsumer,
    topic_consumer: TopicConsumer,
    live: DashMap<ListenerKey, Vec<Arc<EntityConsumer>>>,
}

impl ListenerRegistry {
    pub fn new(
        config: Arc<RelayConfig>,
        directory: Arc<dyn EntityDirectory>,
        processors: ProcessorRegistry,
        channel_factory: Arc<dyn ChannelFactory>,
        delivery_log: Arc<dyn DeliveryLogRepository>,
    ) -> Self {
        let retry_policy = RetryPolicy::from_config(&config.connection_retry, &config.broker);
        let queue_consumer = QueueConsumer::new(
            config.broker.clone(),
            retry_policy.clone(),
            delivery_log.clone(),
            channel_factory.clone(),
        );
        let topic_consumer = TopicConsumer::new(
            config.broker.clone(),
            retry_policy,
            delivery_log,
            channel_factory,
        );

        Self {
            config,
            directory,
            processors,
            queue_consumer,
            topic_consumer,
            live: DashMap::new(),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// The processor registry used to resolve listener processor ids.
    /// Clones share state, so processors registered through this handle are
    /// visible to later starts.
    pub fn processors(&self) -> &ProcessorRegistry {
        &self.processors
    }

    /// Build the failed-message replay processor and register it under its
    /// well-known identifier, so replay trigger entities bind to it like any
    /// other listener.
    pub fn register_replay_processor(
        &self,
        failed_messages: Arc<dyn FailedMessageService>,
        context: Option<ExecutionContext>,
    ) -> RegistryResult<Arc<FailedMessageReplayProcessor>> {
        let mut replay = FailedMessageReplayProcessor::new(
            self.config.clone(),
            self.processors.clone(),
            failed_messages,
        );
        if let Some(context) = context {
            replay = replay.with_context(context);
        }

        let replay = Arc::new(replay);
        self.processors
            .register_processor(REPLAY_PROCESSOR_ID, replay.clone())?;
        Ok(replay)
    }

    /// Register and start consumers for one listener definition. Resolves
    /// the entity from the directory and registers against the primary
    /// namespace, plus the secondary when failover is enabled and the entity
    /// carries a distinct secondary connection.
    #[instrument(skip(self, config, processor), fields(
        entity_name = %config.entity_name,
        subscription = %config.subscription_name,
        owner = %config.owner,
    ))]
    pub async fn register_entity_listener(
        &self,
        config: &ListenerConfig,
        processor: Arc<dyn Processor>,
    ) -> RegistryResult<Vec<Arc<EntityConsumer>>> {
        let primary_key = ListenerKey::primary(&config.entity_name, &config.subscription_name);
        if self.live.contains_key(&primary_key) {
            return Err(RegistryError::Conflict {
                key: primary_key.to_string(),
                reason: "listener is already registered".to_string(),
            });
        }

        let entity = match self
            .directory
            .get_entity(&config.entity_name, &config.owner)
            .await
        {
            Ok(Some(entity)) => entity,
            Ok(None) => {
                return Err(RegistryError::entity_not_found(
                    &config.entity_name,
                    &config.owner,
                ))
            }
            Err(e) => {
                return Err(RegistryError::DirectoryLookupFailed {
                    entity_name: config.entity_name.clone(),
                    reason: e.to_string(),
                })
            }
        };

        if !entity.is_active() {
            warn!(status = %entity.status, "Registering listener against an inactive entity");
        }

        let mut namespaces = vec![NamespaceKind::Primary];
        if self.config.failover.enabled && entity.has_distinct_secondary() {
            namespaces.push(NamespaceKind::Secondary);
        }

        // Build everything before claiming keys so a conflict leaves nothing
        // half-registered
        let mut built: Vec<(ListenerKey, Vec<Arc<EntityConsumer>>)> = Vec::new();
        for namespace in namespaces {
            let consumers = self
                .build_consumers(config, &entity, processor.clone(), namespace)
                .await?;
            let key = ListenerKey::new(&config.entity_name, &config.subscription_name, namespace);
            built.push((key, consumers));
        }

        let mut claimed: Vec<ListenerKey> = Vec::new();
        let mut conflict: Option<ListenerKey> = None;
        for (key, consumers) in &built {
            match self.live.entry(key.clone()) {
                Entry::Occupied(_) => {
                    conflict = Some(key.clone());
                    break;
                }
                Entry::Vacant(entry) => {
                    entry.insert(consumers.clone());
                    claimed.push(key.clone());
                }
            }
        }
        if let Some(key) = conflict {
            for key in &claimed {
                self.live.remove(key);
            }
            return Err(RegistryError::Conflict {
                key: key.to_string(),
                reason: "listener is already registered".to_string(),
            });
        }

        let mut registered = Vec::new();
        for (key, consumers) in built {
            for consumer in &consumers {
                if let Err(e) = consumer.clone().start().await {
                    log_error(
                        "listener_registry",
                        "start_consumer",
                        &e.to_string(),
                        Some(&format!("key={key}")),
                    );
                }
            }
            registered.extend(consumers);
        }

        log_listener_operation(
            "register",
            Some(&config.entity_name),
            Some(&config.subscription_name),
            None,
            "registered",
            Some(&format!(
                "processor={}, consumers={}, failover={}",
                config.processor_id,
                registered.len(),
                self.config.failover.enabled
            )),
        );

        Ok(registered)
    }

    async fn build_consumers(
        &self,
        config: &ListenerConfig,
        entity: &MessagingEntity,
        processor: Arc<dyn Processor>,
        namespace: NamespaceKind,
    ) -> RegistryResult<Vec<Arc<EntityConsumer>>> {
        if config.is_topic() {
            let instances = config.instance_count.max(1);
            let mut consumers = Vec::with_capacity(instances);
            for _ in 0..instances {
                let consumer = self
                    .topic_consumer
                    .add_listener(config, entity, processor.clone(), namespace)
                    .await?;
                consumers.push(consumer);
            }
            Ok(consumers)
        } else {
            let consumer = self
                .queue_consumer
                .add_listener(config, entity, processor, namespace)
                .await?;
            Ok(vec![consumer])
        }
    }

    async fn start_one(
        &self,
        listener: &ListenerConfig,
        context: Option<&ExecutionContext>,
    ) -> RegistryResult<Vec<Arc<EntityConsumer>>> {
        let processor = self.processors.resolve(&listener.processor_id, context)?;
        self.register_entity_listener(listener, processor).await
    }

    /// Start every enabled listener definition from the configuration.
    /// Individual failures are logged and counted; one broken listener never
    /// blocks the rest.
    #[instrument(skip(self, context))]
    pub async fn start_listeners(&self, context: Option<&ExecutionContext>) -> StartReport {
        let mut report = StartReport::default();

        info!(
            listeners = self.config.listeners.len(),
            "🚀 Starting configured listeners"
        );

        for listener in &self.config.listeners {
            if !listener.enabled {
                info!(
                    entity_name = %listener.entity_name,
                    subscription = %listener.subscription_name,
                    "Listener disabled, skipping"
                );
                report.skipped += 1;
                continue;
            }

            match self.start_one(listener, context).await {
                Ok(consumers) => {
                    report.started += 1;
                    debug!(
                        entity_name = %listener.entity_name,
                        consumers = consumers.len(),
                        "Listener started"
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    log_error(
                        "listener_registry",
                        "start_listener",
                        &e.to_string(),
                        Some(&format!(
                            "entity={}, subscription={}",
                            listener.entity_name, listener.subscription_name
                        )),
                    );
                }
            }
        }

        info!(
            started = report.started,
            skipped = report.skipped,
            failed = report.failed,
            "✅ Listener startup complete"
        );
        report
    }

    /// Discover active entities from the directory and start a listener for
    /// each, using the first configured listener definition as the template.
    /// Inactive and already-registered entities are skipped.
    #[instrument(skip(self, context))]
    pub async fn start_all_entity_listeners(
        &self,
        context: Option<&ExecutionContext>,
    ) -> RegistryResult<StartReport> {
        let template = self.config.listeners.first().ok_or_else(|| {
            RegistryError::invalid_listener(
                "no listener configuration available to use as a template",
            )
        })?;

        let entities = match self.directory.get_all_entities().await {
            Ok(entities) => entities,
            Err(e) => {
                return Err(RegistryError::DirectoryLookupFailed {
                    entity_name: "*".to_string(),
                    reason: e.to_string(),
                })
            }
        };

        info!(
            entities = entities.len(),
            template = %template.entity_name,
            "🚀 Starting listeners for directory entities"
        );

        let mut report = StartReport::default();
        for entity in entities {
            if !entity.is_active() {
                debug!(entity_name = %entity.entity_name, "Entity inactive, skipping");
                report.skipped += 1;
                continue;
            }

            let key =
                ListenerKey::primary(&entity.entity_name, &template.subscription_name);
            if self.live.contains_key(&key) {
                debug!(key = %key, "Listener already live, skipping");
                report.skipped += 1;
                continue;
            }

            let mut listener = template.clone();
            listener.entity_name = entity.entity_name.clone();
            listener.owner = entity.owner.clone();

            match self.start_one(&listener, context).await {
                Ok(_) => report.started += 1,
                Err(e) => {
                    report.failed += 1;
                    log_error(
                        "listener_registry",
                        "start_entity",
                        &e.to_string(),
                        Some(&format!("entity={}", entity.entity_name)),
                    );
                }
            }
        }

        info!(
            started = report.started,
            skipped = report.skipped,
            failed = report.failed,
            "✅ Directory listener startup complete"
        );
        Ok(report)
    }

    /// Lazily start the listener for one binding. Returns false without any
    /// directory traffic when the binding is already live; otherwise the
    /// matching enabled listener definition is started and true returned.
    pub async fn start_entity_listener(
        &self,
        context: Option<&ExecutionContext>,
        entity_name: &str,
        subscription_name: &str,
    ) -> RegistryResult<bool> {
        let key = ListenerKey::primary(entity_name, subscription_name);
        if self.live.contains_key(&key) {
            debug!(key = %key, "Listener already live");
            return Ok(false);
        }

        let listener = self
            .config
            .find_enabled_listener(subscription_name, entity_name)
            .ok_or_else(|| {
                RegistryError::invalid_listener(format!(
                    "no enabled listener configured for entity '{entity_name}' \
                     subscription '{subscription_name}'"
                ))
            })?;

        self.start_one(listener, context).await?;
        Ok(true)
    }

    /// Stop and deregister every consumer for one binding, both namespaces.
    /// Returns the number of consumers stopped; stop failures are logged,
    /// never propagated.
    #[instrument(skip(self))]
    pub async fn stop_listener(&self, entity_name: &str, subscription_name: &str) -> usize {
        let grace = Duration::from_secs(STOP_GRACE_PERIOD_SECONDS);
        let mut stopped = 0;

        for namespace in [NamespaceKind::Primary, NamespaceKind::Secondary] {
            let key = ListenerKey::new(entity_name, subscription_name, namespace);
            if let Some((key, consumers)) = self.live.remove(&key) {
                let stops = consumers.iter().map(|consumer| consumer.stop(grace));
                for result in join_all(stops).await {
                    if let Err(e) = result {
                        warn!(key = %key, error = %e, "Consumer stop failed");
                    }
                }
                stopped += consumers.len();
            }
        }

        if stopped > 0 {
            info!(
                entity_path = %super::entity_path(entity_name, subscription_name),
                consumers = stopped,
                "🛑 Listener stopped"
            );
        }
        stopped
    }

    /// Stop every live listener. Returns the number of consumers stopped.
    pub async fn stop_listeners(&self) -> usize {
        let mut bindings: Vec<(String, String)> = self
            .live
            .iter()
            .map(|entry| {
                let key = entry.key();
                (key.entity_name.clone(), key.subscription_name.clone())
            })
            .collect();
        bindings.sort();
        bindings.dedup();

        let mut stopped = 0;
        for (entity_name, subscription_name) in bindings {
            stopped += self.stop_listener(&entity_name, &subscription_name).await;
        }

        info!(consumers = stopped, "🛑 All listeners stopped");
        stopped
    }

    /// Keys of every live registration entry, in stable order
    pub fn active_entity_listeners(&self) -> Vec<ListenerKey> {
        let mut keys: Vec<ListenerKey> =
            self.live.iter().map(|entry| entry.key().clone()).collect();
        keys.sort_by_key(|key| key.to_string());
        keys
    }

    /// Consumer instances across every live entry
    pub fn active_consumer_count(&self) -> usize {
        self.live.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn stats(&self) -> RegistryStats {
        let mut totals = ConsumerStatsSnapshot::default();
        let mut consumers = 0;

        for entry in self.live.iter() {
            for consumer in entry.value() {
                let snapshot = consumer.stats();
                totals.received += snapshot.received;
                totals.succeeded += snapshot.succeeded;
                totals.failed_logged += snapshot.failed_logged;
                totals.abandoned += snapshot.abandoned;
                totals.connection_errors += snapshot.connection_errors;
                consumers += 1;
            }
        }

        RegistryStats {
            listeners: self.live.len(),
            consumers,
            totals,
        }
    }
}
