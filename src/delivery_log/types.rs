//! Delivery-outcome log records.
//!
//! Two append-only variants: a success log written best-effort after every
//! completed delivery, and a failed-delivery log written when a message
//! exhausts its retry budget. Failed rows are durable and feed the replay
//! processor; a row whose status has flipped to `succeeded` is never
//! replayed again.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::messaging::MessageEnvelope;

/// Outcome recorded on a failed-delivery row. `Failed` on insert; flipped to
/// `Succeeded` by a later successful replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text")]
pub enum DeliveryStatus {
    #[sqlx(rename = "failed")]
    Failed,
    #[sqlx(rename = "succeeded")]
    Succeeded,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Failed => "failed",
            DeliveryStatus::Succeeded => "succeeded",
        }
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Persisted success log row. Maps to `relay_success_delivery_logs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SuccessDeliveryLog {
    pub id: i64,
    pub message_id: String,
    pub correlation_id: Option<String>,
    pub publisher: Option<String>,
    pub metadata: serde_json::Value,
    pub payload: String,
    pub entity_name: String,
    pub received_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

/// Success log entry as the consumer creates it, before persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSuccessDeliveryLog {
    pub message_id: String,
    pub correlation_id: Option<String>,
    pub publisher: Option<String>,
    pub metadata: serde_json::Value,
    pub payload: String,
    pub entity_name: String,
    pub received_at: NaiveDateTime,
}

impl NewSuccessDeliveryLog {
    /// Build a success log entry from a delivered envelope
    pub fn from_envelope(envelope: &MessageEnvelope, entity_name: &str) -> Self {
        Self {
            message_id: envelope.payload.message_id.clone(),
            correlation_id: envelope.payload.correlation_id.clone(),
            publisher: envelope.payload.publisher.clone(),
            metadata: envelope.property().metadata,
            payload: envelope.payload.body.clone(),
            entity_name: entity_name.to_string(),
            received_at: chrono::Utc::now().naive_utc(),
        }
    }
}

/// Persisted failed-delivery row. Maps to `relay_failed_delivery_logs`.
///
/// Carries everything the replay processor needs to re-run the original
/// delivery: the original payload and entity, plus the subscription name so
/// the matching listener configuration can be resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct FailedDeliveryLog {
    pub id: i64,
    pub message_id: String,
    pub correlation_id: Option<String>,
    pub publisher: Option<String>,
    pub metadata: serde_json::Value,
    pub payload: String,
    pub entity_name: String,
    pub subscription_name: String,
    pub status: DeliveryStatus,
    pub error_message: Option<String>,
    pub error_detail: Option<String>,
    pub received_at: NaiveDateTime,
    pub failed_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

/// Failed-delivery entry as the consumer creates it, before persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFailedDeliveryLog {
    pub message_id: String,
    pub correlation_id: Option<String>,
    pub publisher: Option<String>,
    pub metadata: serde_json::Value,
    pub payload: String,
    pub entity_name: String,
    pub subscription_name: String,
    pub status: DeliveryStatus,
    pub error_message: Option<String>,
    pub error_detail: Option<String>,
    pub received_at: NaiveDateTime,
    pub failed_at: NaiveDateTime,
}

impl NewFailedDeliveryLog {
    /// Build a failed-delivery entry from an envelope whose processing
    /// exhausted the retry budget
    pub fn from_envelope(
        envelope: &MessageEnvelope,
        entity_name: &str,
        subscription_name: &str,
        error_message: &str,
        error_detail: Option<&str>,
    ) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            message_id: envelope.payload.message_id.clone(),
            correlation_id: envelope.payload.correlation_id.clone(),
            publisher: envelope.payload.publisher.clone(),
            metadata: envelope.property().metadata,
            payload: envelope.payload.body.clone(),
            entity_name: entity_name.to_string(),
            subscription_name: subscription_name.to_string(),
            status: DeliveryStatus::Failed,
            error_message: Some(error_message.to_string()),
            error_detail: error_detail.map(|d| d.to_string()),
            received_at: now,
            failed_at: now,
        }
    }
}
