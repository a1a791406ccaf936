//! Builders for configurations, entities, and failed-delivery rows shared
//! across the integration suites. Tuned for fast polling and zero-delay
//! connection retry so the async tests finish quickly.

#![allow(dead_code)] // Not every test binary uses every builder

use chrono::Utc;
use relay_core::config::{
    BrokerConfig, ConnectionRetryConfig, DatabaseConfig, FailoverConfig, ListenerConfig,
    RelayConfig,
};
use relay_core::delivery_log::{DeliveryStatus, FailedDeliveryLog};
use relay_core::directory::MessagingEntity;
use relay_core::messaging::{MessageEnvelope, WirePayload};

pub fn fast_broker_config() -> BrokerConfig {
    BrokerConfig {
        poll_interval_ms: 10,
        visibility_timeout_seconds: 30,
        batch_size: 10,
        command_timeout_seconds: 1,
    }
}

pub fn fast_retry_config() -> ConnectionRetryConfig {
    ConnectionRetryConfig {
        max_attempts: 2,
        base_delay_seconds: 0,
        backoff_multiplier: 2.0,
    }
}

pub fn queue_listener(entity_name: &str, processor_id: &str) -> ListenerConfig {
    ListenerConfig {
        entity_name: entity_name.to_string(),
        owner: "test-suite".to_string(),
        subscription_name: String::new(),
        processor_id: processor_id.to_string(),
        worker_slots: 2,
        retry_threshold: 5,
        instance_count: 1,
        enabled: true,
    }
}

pub fn topic_listener(
    entity_name: &str,
    subscription_name: &str,
    processor_id: &str,
    instance_count: usize,
) -> ListenerConfig {
    ListenerConfig {
        entity_name: entity_name.to_string(),
        owner: "test-suite".to_string(),
        subscription_name: subscription_name.to_string(),
        processor_id: processor_id.to_string(),
        worker_slots: 2,
        retry_threshold: 5,
        instance_count,
        enabled: true,
    }
}

pub fn relay_config(listeners: Vec<ListenerConfig>) -> RelayConfig {
    RelayConfig {
        environment: "test".to_string(),
        database: DatabaseConfig::default(),
        broker: fast_broker_config(),
        connection_retry: fast_retry_config(),
        failover: FailoverConfig { enabled: false },
        listeners,
    }
}

pub fn relay_config_with_failover(listeners: Vec<ListenerConfig>) -> RelayConfig {
    let mut config = relay_config(listeners);
    config.failover.enabled = true;
    config
}

pub fn active_entity(entity_name: &str) -> MessagingEntity {
    MessagingEntity::new(entity_name, "test-suite", "postgres://broker-primary")
}

pub fn entity_with_secondary(entity_name: &str) -> MessagingEntity {
    active_entity(entity_name).with_secondary_connection("postgres://broker-secondary")
}

pub fn entity_with_identical_secondary(entity_name: &str) -> MessagingEntity {
    active_entity(entity_name).with_secondary_connection("postgres://broker-primary")
}

pub fn envelope(body: &str, delivery_count: i32, ack_token: i64) -> MessageEnvelope {
    MessageEnvelope {
        ack_token,
        delivery_count,
        enqueued_at: Utc::now(),
        payload: WirePayload::new(body),
    }
}

/// A persisted failed-delivery row as the replay processor would load it
pub fn failed_row(
    id: i64,
    entity_name: &str,
    subscription_name: &str,
    payload: &str,
) -> FailedDeliveryLog {
    let now = Utc::now().naive_utc();
    FailedDeliveryLog {
        id,
        message_id: format!("msg-{id}"),
        correlation_id: Some(format!("corr-{id}")),
        publisher: Some("test-publisher".to_string()),
        metadata: serde_json::json!({"tenant": "acme"}),
        payload: payload.to_string(),
        entity_name: entity_name.to_string(),
        subscription_name: subscription_name.to_string(),
        status: DeliveryStatus::Failed,
        error_message: Some("original processing failure".to_string()),
        error_detail: None,
        received_at: now,
        failed_at: now,
        created_at: now,
    }
}
