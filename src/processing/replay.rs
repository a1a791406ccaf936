//! # Failed-Message Replay Processor
//!
//! Re-runs deliveries that previously exhausted their retry budget. Replay is
//! triggered by a message whose body wraps a reference to a failed-delivery
//! row; the processor looks the row up, short-circuits if a prior replay
//! already succeeded, resolves the row's original processor through the
//! registry, and re-invokes it with the original payload.
//!
//! The trigger message itself must never loop through the retry machinery,
//! so every failure of the replay attempt is swallowed: the row is marked
//! `failed`, a warning is emitted, a counter is incremented, and the trigger
//! completes normally. Only a malformed trigger or a row that cannot be
//! located returns a processing failure (the trigger then follows the normal
//! retry path like any other message).

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use super::context::ExecutionContext;
use super::registry::ProcessorRegistry;
use super::{ProcessingFailure, Processor};
use crate::config::RelayConfig;
use crate::constants::identity::REPLAY_PROCESSOR_ID;
use crate::delivery_log::{DeliveryStatus, FailedDeliveryLog, FailedMessageService};
use crate::messaging::MessageProperty;

/// Inner message of a replay trigger: points at one failed-delivery row and
/// carries a copy of the original payload as enqueued by the operator tooling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedMessageReference {
    pub id: i64,
    #[serde(default)]
    pub entity_name: String,
    #[serde(default)]
    pub subscription_name: String,
    #[serde(default)]
    pub payload: Option<String>,
}

impl FailedMessageReference {
    /// Build a reference from a persisted failed-delivery row
    pub fn from_log(log: &FailedDeliveryLog) -> Self {
        Self {
            id: log.id,
            entity_name: log.entity_name.clone(),
            subscription_name: log.subscription_name.clone(),
            payload: Some(log.payload.clone()),
        }
    }

    /// Serialize the wrapped trigger body the replay processor expects
    pub fn trigger_body(&self) -> Result<String, serde_json::Error> {
        let wrapper = serde_json::json!({ "message": self });
        serde_json::to_string(&wrapper)
    }
}

/// Outer wrapper of a replay trigger body
#[derive(Debug, Deserialize)]
struct ReplayTrigger {
    message: Option<serde_json::Value>,
}

/// Processor that replays failed deliveries through their original
/// processors. Registered under [`REPLAY_PROCESSOR_ID`].
pub struct FailedMessageReplayProcessor {
    config: Arc<RelayConfig>,
    registry: ProcessorRegistry,
    failed_messages: Arc<dyn FailedMessageService>,
    context: Option<ExecutionContext>,
    swallowed_failures: AtomicU64,
}

impl FailedMessageReplayProcessor {
    pub fn new(
        config: Arc<RelayConfig>,
        registry: ProcessorRegistry,
        failed_messages: Arc<dyn FailedMessageService>,
    ) -> Self {
        Self {
            config,
            registry,
            failed_messages,
            context: None,
            swallowed_failures: AtomicU64::new(0),
        }
    }

    /// Thread the start-time execution context through to resolved factories
    pub fn with_context(mut self, context: ExecutionContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Number of replay attempts that failed and were swallowed. Systemic
    /// replay failures show up here long before anyone reads the logs.
    pub fn swallowed_failure_count(&self) -> u64 {
        self.swallowed_failures.load(Ordering::Relaxed)
    }

    fn note_swallowed(&self, failed_log_id: i64, reason: &str) {
        self.swallowed_failures.fetch_add(1, Ordering::Relaxed);
        warn!(
            failed_log_id = failed_log_id,
            reason = %reason,
            swallowed_total = self.swallowed_failure_count(),
            "💥 Replay failure swallowed"
        );
    }

    /// Record a failed replay attempt on the row; update errors are logged
    /// and swallowed like everything else on this path
    async fn mark_failed(&self, failed_log_id: i64, error_message: &str) {
        if let Err(e) = self
            .failed_messages
            .update_error_message(failed_log_id, error_message)
            .await
        {
            warn!(
                failed_log_id = failed_log_id,
                error = %e,
                "Failed to update replay error message"
            );
        }
        if let Err(e) = self
            .failed_messages
            .update_status(failed_log_id, DeliveryStatus::Failed)
            .await
        {
            warn!(
                failed_log_id = failed_log_id,
                error = %e,
                "Failed to update replay status"
            );
        }
        self.note_swallowed(failed_log_id, error_message);
    }

    fn decode_reference(&self, body: &str) -> Result<FailedMessageReference, ProcessingFailure> {
        let trigger: ReplayTrigger = serde_json::from_str(body).map_err(|e| {
            ProcessingFailure::with_detail("replay trigger body is not valid JSON", e.to_string())
        })?;

        let inner = trigger.message.ok_or_else(|| {
            ProcessingFailure::new("replay trigger has no inner message")
        })?;

        let reference: FailedMessageReference = serde_json::from_value(inner).map_err(|e| {
            ProcessingFailure::with_detail(
                "replay trigger inner message is not a failed-delivery reference",
                e.to_string(),
            )
        })?;

        let payload_present = reference
            .payload
            .as_deref()
            .map(|p| !p.is_empty())
            .unwrap_or(false);
        if !payload_present {
            return Err(ProcessingFailure::new(
                "failed-delivery reference carries no payload",
            ));
        }

        Ok(reference)
    }

    async fn load_row(
        &self,
        reference: &FailedMessageReference,
    ) -> Result<FailedDeliveryLog, ProcessingFailure> {
        let mut rows = self
            .failed_messages
            .find_by_ids(&[reference.id])
            .await
            .map_err(|e| {
                ProcessingFailure::with_detail(
                    format!("failed-delivery lookup errored for id {}", reference.id),
                    e.to_string(),
                )
            })?;

        if rows.len() != 1 {
            return Err(ProcessingFailure::new(format!(
                "expected exactly one failed-delivery row for id {}, found {}",
                reference.id,
                rows.len()
            )));
        }

        rows.pop().ok_or_else(|| {
            ProcessingFailure::new(format!(
                "failed-delivery row vanished for id {}",
                reference.id
            ))
        })
    }
}

#[async_trait::async_trait]
impl Processor for FailedMessageReplayProcessor {
    fn name(&self) -> &str {
        REPLAY_PROCESSOR_ID
    }

    async fn process(
        &self,
        body: &str,
        property: &MessageProperty,
    ) -> Result<(), ProcessingFailure> {
        let reference = match self.decode_reference(body) {
            Ok(reference) => reference,
            Err(e) => {
                warn!(
                    trigger_message_id = %property.message_id,
                    error = %e,
                    "Replay trigger rejected"
                );
                return Err(e);
            }
        };

        let row = match self.load_row(&reference).await {
            Ok(row) => row,
            Err(e) => {
                warn!(
                    trigger_message_id = %property.message_id,
                    failed_log_id = reference.id,
                    error = %e,
                    "Replay row lookup failed"
                );
                return Err(e);
            }
        };

        // A row a previous replay already flipped to succeeded is never
        // replayed again.
        if row.status == DeliveryStatus::Succeeded {
            info!(
                failed_log_id = row.id,
                entity_name = %row.entity_name,
                "✅ Replay skipped: delivery already succeeded"
            );
            return Ok(());
        }

        let Some(listener) = self
            .config
            .find_enabled_listener(&row.subscription_name, &row.entity_name)
        else {
            info!(
                failed_log_id = row.id,
                entity_name = %row.entity_name,
                subscription_name = %row.subscription_name,
                "🧹 Replay ignored: no enabled listener for this delivery"
            );
            return Ok(());
        };

        let processor = match self
            .registry
            .resolve(&listener.processor_id, self.context.as_ref())
        {
            Ok(processor) => processor,
            Err(e) => {
                self.mark_failed(row.id, &e.to_string()).await;
                return Ok(());
            }
        };

        let replay_property = MessageProperty {
            message_id: row.message_id.clone(),
            correlation_id: row.correlation_id.clone(),
            label: None,
            metadata: row.metadata.clone(),
        };

        info!(
            failed_log_id = row.id,
            entity_name = %row.entity_name,
            processor = %processor.name(),
            "🔄 Replaying failed delivery"
        );

        match processor.process(&row.payload, &replay_property).await {
            Ok(()) => {
                match self
                    .failed_messages
                    .update_status(row.id, DeliveryStatus::Succeeded)
                    .await
                {
                    Ok(()) => {
                        info!(
                            failed_log_id = row.id,
                            entity_name = %row.entity_name,
                            "✅ Replay succeeded"
                        );
                    }
                    Err(e) => {
                        self.note_swallowed(
                            row.id,
                            &format!("replay succeeded but status update failed: {e}"),
                        );
                    }
                }
            }
            Err(failure) => {
                self.mark_failed(row.id, &failure.message).await;
            }
        }

        Ok(())
    }
}
