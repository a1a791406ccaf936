//! # Message Envelope Structures
//!
//! Wire format for messages moving through broker queues and the inbound
//! view handed to processors. The wire payload is what publishers store;
//! the envelope adds the broker-maintained delivery state from the read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json;
use std::collections::HashMap;
use uuid::Uuid;

/// Application-level payload stored in the broker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WirePayload {
    /// Application message identifier
    pub message_id: String,
    /// Correlation identifier propagated across hops
    pub correlation_id: Option<String>,
    /// Message label describing the payload kind
    pub label: Option<String>,
    /// Publishing service name
    pub publisher: Option<String>,
    /// Additional context data carried with the message
    pub metadata: HashMap<String, serde_json::Value>,
    /// Message body text as the processor will see it
    pub body: String,
}

impl WirePayload {
    /// Create a new payload with a generated message id
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            correlation_id: Some(Uuid::new_v4().to_string()),
            label: None,
            publisher: None,
            metadata: HashMap::new(),
            body: body.into(),
        }
    }

    /// Set the message label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the publishing service name
    pub fn with_publisher(mut self, publisher: impl Into<String>) -> Self {
        self.publisher = Some(publisher.into());
        self
    }

    /// Set the correlation identifier
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Add a metadata entry
    pub fn with_metadata_entry(
        mut self,
        key: impl Into<String>,
        value: serde_json::Value,
    ) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Convert to JSON for queue storage
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Create from JSON read off a queue
    pub fn from_json(json: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(json)
    }
}

/// Inbound unit of work: the wire payload plus the broker-maintained
/// delivery state captured at read time
#[derive(Debug, Clone)]
pub struct MessageEnvelope {
    /// Acknowledgment token for complete/abandon against the source queue
    pub ack_token: i64,
    /// Broker-maintained count of deliveries of this message
    pub delivery_count: i32,
    /// When the broker first accepted the message
    pub enqueued_at: DateTime<Utc>,
    /// Decoded application payload
    pub payload: WirePayload,
}

impl MessageEnvelope {
    /// Message body text as handed to processors
    pub fn body(&self) -> &str {
        &self.payload.body
    }

    /// Build the property view handed to processors alongside the body
    pub fn property(&self) -> MessageProperty {
        let mut metadata = serde_json::Map::new();
        metadata.insert(
            "enqueued_at".to_string(),
            serde_json::Value::String(self.enqueued_at.to_rfc3339()),
        );
        metadata.insert(
            "sequence_number".to_string(),
            serde_json::Value::from(self.ack_token),
        );
        metadata.insert(
            "delivery_count".to_string(),
            serde_json::Value::from(self.delivery_count),
        );
        if let Some(publisher) = &self.payload.publisher {
            metadata.insert(
                "publisher".to_string(),
                serde_json::Value::String(publisher.clone()),
            );
        }
        for (key, value) in &self.payload.metadata {
            metadata.insert(key.clone(), value.clone());
        }

        MessageProperty {
            message_id: self.payload.message_id.clone(),
            correlation_id: self.payload.correlation_id.clone(),
            label: self.payload.label.clone(),
            metadata: serde_json::Value::Object(metadata),
        }
    }
}

/// Read-only property view a processor receives with each body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageProperty {
    pub message_id: String,
    pub correlation_id: Option<String>,
    pub label: Option<String>,
    /// Serialized metadata including enqueue/delivery sequence data
    pub metadata: serde_json::Value,
}

impl MessageProperty {
    /// Serialized metadata for persistence in delivery logs
    pub fn metadata_json(&self) -> String {
        self.metadata.to_string()
    }
}
