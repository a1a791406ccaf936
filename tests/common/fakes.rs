//! Recording fakes for the broker channel, entity directory, delivery logs,
//! and processors.
//!
//! Each fake records its calls behind a mutex so assertions can inspect
//! exactly what the code under test did, and exposes failure toggles to
//! exercise the degraded paths without a live broker or database.

#![allow(dead_code)] // Not every test binary uses every fake

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use relay_core::delivery_log::{
    DeliveryLogRepository, DeliveryStatus, FailedDeliveryLog, FailedMessageService,
    NewFailedDeliveryLog, NewSuccessDeliveryLog,
};
use relay_core::directory::{EntityDirectory, MessagingEntity};
use relay_core::error::{RelayError, RelayResult};
use relay_core::messaging::{
    BrokerChannel, ChannelFactory, MessageEnvelope, MessageProperty, MessagingError,
    MessagingResult, WirePayload,
};
use relay_core::processing::{ProcessingFailure, Processor};

/// In-memory peek-lock broker. Messages enqueued per queue are handed out by
/// `receive`; complete/abandon calls are recorded, not acted on, so tests
/// assert the exact acknowledgment decisions the consumer made.
#[derive(Debug, Default)]
pub struct FakeBrokerChannel {
    pending: Mutex<HashMap<String, VecDeque<MessageEnvelope>>>,
    pub completed: Mutex<Vec<(String, i64)>>,
    pub abandoned: Mutex<Vec<(String, i64)>>,
    pub sent: Mutex<Vec<(String, WirePayload)>>,
    pub ensured_queues: Mutex<Vec<String>>,
    next_token: AtomicI64,
    fail_receive: AtomicBool,
    fail_complete: AtomicBool,
    fail_ensure: AtomicBool,
}

impl FakeBrokerChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an envelope for the next receive against `queue_name`
    pub fn enqueue(&self, queue_name: &str, envelope: MessageEnvelope) {
        self.pending
            .lock()
            .unwrap()
            .entry(queue_name.to_string())
            .or_default()
            .push_back(envelope);
    }

    /// Queue a payload with an assigned ack token and delivery count,
    /// returning the token
    pub fn enqueue_payload(
        &self,
        queue_name: &str,
        payload: WirePayload,
        delivery_count: i32,
    ) -> i64 {
        let ack_token = self.next_token.fetch_add(1, Ordering::Relaxed) + 1;
        self.enqueue(
            queue_name,
            MessageEnvelope {
                ack_token,
                delivery_count,
                enqueued_at: Utc::now(),
                payload,
            },
        );
        ack_token
    }

    pub fn set_fail_receive(&self, fail: bool) {
        self.fail_receive.store(fail, Ordering::Relaxed);
    }

    pub fn set_fail_complete(&self, fail: bool) {
        self.fail_complete.store(fail, Ordering::Relaxed);
    }

    pub fn set_fail_ensure(&self, fail: bool) {
        self.fail_ensure.store(fail, Ordering::Relaxed);
    }

    pub fn completed_tokens(&self, queue_name: &str) -> Vec<i64> {
        self.completed
            .lock()
            .unwrap()
            .iter()
            .filter(|(queue, _)| queue == queue_name)
            .map(|(_, token)| *token)
            .collect()
    }

    pub fn abandoned_tokens(&self, queue_name: &str) -> Vec<i64> {
        self.abandoned
            .lock()
            .unwrap()
            .iter()
            .filter(|(queue, _)| queue == queue_name)
            .map(|(_, token)| *token)
            .collect()
    }
}

#[async_trait]
impl BrokerChannel for FakeBrokerChannel {
    async fn ensure_queue(&self, queue_name: &str) -> MessagingResult<()> {
        if self.fail_ensure.load(Ordering::Relaxed) {
            return Err(MessagingError::queue_operation(
                queue_name,
                "create",
                "induced ensure failure",
            ));
        }
        self.ensured_queues
            .lock()
            .unwrap()
            .push(queue_name.to_string());
        Ok(())
    }

    async fn send(&self, queue_name: &str, payload: &WirePayload) -> MessagingResult<i64> {
        self.sent
            .lock()
            .unwrap()
            .push((queue_name.to_string(), payload.clone()));
        Ok(self.next_token.fetch_add(1, Ordering::Relaxed) + 1)
    }

    async fn receive(
        &self,
        queue_name: &str,
        _lock_seconds: i32,
        batch_size: i32,
    ) -> MessagingResult<Vec<MessageEnvelope>> {
        if self.fail_receive.load(Ordering::Relaxed) {
            return Err(MessagingError::database_connection("induced receive failure"));
        }

        let mut pending = self.pending.lock().unwrap();
        let queue = pending.entry(queue_name.to_string()).or_default();
        let mut batch = Vec::new();
        while batch.len() < batch_size as usize {
            match queue.pop_front() {
                Some(envelope) => batch.push(envelope),
                None => break,
            }
        }
        Ok(batch)
    }

    async fn complete(&self, queue_name: &str, ack_token: i64) -> MessagingResult<()> {
        if self.fail_complete.load(Ordering::Relaxed) {
            return Err(MessagingError::queue_operation(
                queue_name,
                "delete",
                "induced complete failure",
            ));
        }
        self.completed
            .lock()
            .unwrap()
            .push((queue_name.to_string(), ack_token));
        Ok(())
    }

    async fn abandon(&self, queue_name: &str, ack_token: i64) -> MessagingResult<()> {
        self.abandoned
            .lock()
            .unwrap()
            .push((queue_name.to_string(), ack_token));
        Ok(())
    }
}

/// Factory handing every caller the same shared fake channel, recording the
/// connection descriptors it was asked to open
#[derive(Debug)]
pub struct FakeChannelFactory {
    channel: Arc<FakeBrokerChannel>,
    pub opened_connections: Mutex<Vec<String>>,
    fail_open: AtomicBool,
}

impl FakeChannelFactory {
    pub fn new(channel: Arc<FakeBrokerChannel>) -> Self {
        Self {
            channel,
            opened_connections: Mutex::new(Vec::new()),
            fail_open: AtomicBool::new(false),
        }
    }

    pub fn set_fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::Relaxed);
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened_connections.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChannelFactory for FakeChannelFactory {
    async fn open_channel(&self, connection: &str) -> MessagingResult<Arc<dyn BrokerChannel>> {
        if self.fail_open.load(Ordering::Relaxed) {
            return Err(MessagingError::database_connection("induced open failure"));
        }
        self.opened_connections
            .lock()
            .unwrap()
            .push(connection.to_string());
        Ok(self.channel.clone())
    }
}

/// In-memory entity directory counting every lookup, so tests can assert
/// when the registry avoids directory traffic entirely
#[derive(Debug, Default)]
pub struct FakeEntityDirectory {
    entities: Mutex<HashMap<(String, String), MessagingEntity>>,
    lookups: AtomicU64,
    fail_lookups: AtomicBool,
}

impl FakeEntityDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, entity: MessagingEntity) {
        self.entities.lock().unwrap().insert(
            (entity.entity_name.clone(), entity.owner.clone()),
            entity,
        );
    }

    pub fn lookup_count(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }

    pub fn set_fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::Relaxed);
    }
}

#[async_trait]
impl EntityDirectory for FakeEntityDirectory {
    async fn get_entity(
        &self,
        entity_name: &str,
        owner: &str,
    ) -> RelayResult<Option<MessagingEntity>> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        if self.fail_lookups.load(Ordering::Relaxed) {
            return Err(RelayError::DatabaseError(
                "induced directory failure".to_string(),
            ));
        }
        Ok(self
            .entities
            .lock()
            .unwrap()
            .get(&(entity_name.to_string(), owner.to_string()))
            .cloned())
    }

    async fn get_all_entities(&self) -> RelayResult<Vec<MessagingEntity>> {
        let mut entities: Vec<MessagingEntity> =
            self.entities.lock().unwrap().values().cloned().collect();
        entities.sort_by(|a, b| a.entity_name.cmp(&b.entity_name));
        Ok(entities)
    }
}

/// Delivery-log repository recording appended entries, with write-failure
/// toggles for the degraded consumer paths
#[derive(Debug, Default)]
pub struct FakeDeliveryLog {
    pub successes: Mutex<Vec<NewSuccessDeliveryLog>>,
    pub failures: Mutex<Vec<NewFailedDeliveryLog>>,
    next_id: AtomicI64,
    fail_success_writes: AtomicBool,
    fail_failure_writes: AtomicBool,
}

impl FakeDeliveryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_success_writes(&self, fail: bool) {
        self.fail_success_writes.store(fail, Ordering::Relaxed);
    }

    pub fn set_fail_failure_writes(&self, fail: bool) {
        self.fail_failure_writes.store(fail, Ordering::Relaxed);
    }

    pub fn success_count(&self) -> usize {
        self.successes.lock().unwrap().len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.lock().unwrap().len()
    }
}

#[async_trait]
impl DeliveryLogRepository for FakeDeliveryLog {
    async fn append_success(&self, log: NewSuccessDeliveryLog) -> RelayResult<()> {
        if self.fail_success_writes.load(Ordering::Relaxed) {
            return Err(RelayError::DatabaseError(
                "induced success-log failure".to_string(),
            ));
        }
        self.successes.lock().unwrap().push(log);
        Ok(())
    }

    async fn append_failure(&self, log: NewFailedDeliveryLog) -> RelayResult<i64> {
        if self.fail_failure_writes.load(Ordering::Relaxed) {
            return Err(RelayError::DatabaseError(
                "induced failed-log failure".to_string(),
            ));
        }
        self.failures.lock().unwrap().push(log);
        Ok(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// Failed-message store for replay tests: seeded rows plus recorded status
/// and error-message updates
#[derive(Debug, Default)]
pub struct FakeFailedMessageService {
    rows: Mutex<HashMap<i64, FailedDeliveryLog>>,
    pub status_updates: Mutex<Vec<(i64, DeliveryStatus)>>,
    pub error_updates: Mutex<Vec<(i64, String)>>,
    fail_updates: AtomicBool,
}

impl FakeFailedMessageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, row: FailedDeliveryLog) {
        self.rows.lock().unwrap().insert(row.id, row);
    }

    pub fn set_fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::Relaxed);
    }

    pub fn recorded_statuses(&self) -> Vec<(i64, DeliveryStatus)> {
        self.status_updates.lock().unwrap().clone()
    }

    pub fn recorded_errors(&self) -> Vec<(i64, String)> {
        self.error_updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl FailedMessageService for FakeFailedMessageService {
    async fn find_by_ids(&self, ids: &[i64]) -> RelayResult<Vec<FailedDeliveryLog>> {
        let rows = self.rows.lock().unwrap();
        Ok(ids.iter().filter_map(|id| rows.get(id).cloned()).collect())
    }

    async fn update_status(&self, id: i64, status: DeliveryStatus) -> RelayResult<()> {
        if self.fail_updates.load(Ordering::Relaxed) {
            return Err(RelayError::DatabaseError(
                "induced status-update failure".to_string(),
            ));
        }
        self.status_updates.lock().unwrap().push((id, status));
        if let Some(row) = self.rows.lock().unwrap().get_mut(&id) {
            row.status = status;
        }
        Ok(())
    }

    async fn update_error_message(&self, id: i64, error_message: &str) -> RelayResult<()> {
        if self.fail_updates.load(Ordering::Relaxed) {
            return Err(RelayError::DatabaseError(
                "induced error-update failure".to_string(),
            ));
        }
        self.error_updates
            .lock()
            .unwrap()
            .push((id, error_message.to_string()));
        if let Some(row) = self.rows.lock().unwrap().get_mut(&id) {
            row.error_message = Some(error_message.to_string());
        }
        Ok(())
    }
}

/// Processor recording every invocation and succeeding
#[derive(Debug, Default)]
pub struct CountingProcessor {
    pub calls: AtomicU64,
    pub bodies: Mutex<Vec<String>>,
    pub message_ids: Mutex<Vec<String>>,
}

impl CountingProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn recorded_bodies(&self) -> Vec<String> {
        self.bodies.lock().unwrap().clone()
    }

    pub fn recorded_message_ids(&self) -> Vec<String> {
        self.message_ids.lock().unwrap().clone()
    }
}

#[async_trait]
impl Processor for CountingProcessor {
    fn name(&self) -> &str {
        "counting_processor"
    }

    async fn process(
        &self,
        body: &str,
        property: &MessageProperty,
    ) -> Result<(), ProcessingFailure> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.bodies.lock().unwrap().push(body.to_string());
        self.message_ids
            .lock()
            .unwrap()
            .push(property.message_id.clone());
        Ok(())
    }
}

/// Processor that rejects every message
#[derive(Debug, Default)]
pub struct FailingProcessor {
    pub calls: AtomicU64,
}

impl FailingProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Processor for FailingProcessor {
    fn name(&self) -> &str {
        "failing_processor"
    }

    async fn process(
        &self,
        _body: &str,
        _property: &MessageProperty,
    ) -> Result<(), ProcessingFailure> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Err(ProcessingFailure::with_detail(
            "order handler rejected the message",
            "induced test failure",
        ))
    }
}

/// Processor that fails its first `failures` invocations, then succeeds
#[derive(Debug)]
pub struct FlakyProcessor {
    remaining_failures: AtomicU64,
    pub calls: AtomicU64,
}

impl FlakyProcessor {
    pub fn failing_times(failures: u64) -> Self {
        Self {
            remaining_failures: AtomicU64::new(failures),
            calls: AtomicU64::new(0),
        }
    }

    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Processor for FlakyProcessor {
    fn name(&self) -> &str {
        "flaky_processor"
    }

    async fn process(
        &self,
        _body: &str,
        _property: &MessageProperty,
    ) -> Result<(), ProcessingFailure> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let remaining = self.remaining_failures.load(Ordering::Relaxed);
        if remaining > 0 {
            self.remaining_failures.store(remaining - 1, Ordering::Relaxed);
            return Err(ProcessingFailure::new("transient downstream failure"));
        }
        Ok(())
    }
}

/// Poll until `condition` holds or the timeout lapses. Returns the final
/// evaluation so the caller's assertion names what never happened.
pub async fn wait_for(condition: impl Fn() -> bool, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
