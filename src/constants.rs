//! # System Constants
//!
//! Operational defaults and fixed identifiers for the reliable-delivery
//! subsystem: receive-channel tuning, retry/backoff bounds, and the
//! well-known processor identifiers shipped with the crate.

/// Receive-channel defaults applied when a listener configuration leaves a
/// field unset.
pub mod channel {
    /// Concurrent in-flight deliveries per consumer when the listener does
    /// not configure worker slots.
    pub const DEFAULT_WORKER_SLOTS: usize = 4;

    /// Visibility timeout (the peek-lock window) for queue reads, seconds.
    pub const DEFAULT_QUEUE_LOCK_SECONDS: i32 = 30;

    /// Visibility timeout for topic-subscription reads, seconds. Topic
    /// consumers hold the lock longer so long-running processing does not
    /// lose it mid-flight.
    pub const TOPIC_LOCK_SECONDS: i32 = 300;

    /// Maximum messages pulled per receive round trip.
    pub const DEFAULT_BATCH_SIZE: i32 = 10;

    /// Idle delay between empty receive polls, milliseconds.
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 250;

    /// Consumer instances per namespace when the listener does not
    /// configure an instance count.
    pub const DEFAULT_INSTANCE_COUNT: usize = 1;
}

/// Retry and shutdown bounds.
pub mod limits {
    /// Delivery count at which a failing message is diverted to the
    /// failed-delivery log instead of being abandoned again.
    pub const DEFAULT_RETRY_THRESHOLD: i32 = 5;

    /// First connection-retry delay, seconds. Subsequent delays double.
    pub const CONNECTION_RETRY_BASE_SECONDS: u64 = 1;

    /// Connection-retry delays never exceed the configured command
    /// timeout; this is the default when none is configured, seconds.
    pub const DEFAULT_COMMAND_TIMEOUT_SECONDS: u64 = 60;

    /// Connection-retry attempts before the failure is surfaced to the
    /// error path.
    pub const DEFAULT_MAX_CONNECTION_ATTEMPTS: u32 = 5;

    /// Grace period granted to in-flight deliveries when a listener is
    /// stopped, seconds.
    pub const STOP_GRACE_PERIOD_SECONDS: u64 = 60;
}

/// Well-known identifiers.
pub mod identity {
    /// Processor identifier under which the failed-message replay
    /// processor registers itself.
    pub const REPLAY_PROCESSOR_ID: &str = "failed_message_replay";

    /// Path segment separating a topic from its subscription in canonical
    /// entity paths (`topic/Subscriptions/subscription`).
    pub const SUBSCRIPTIONS_SEGMENT: &str = "Subscriptions";

    /// Version marker embedded in outbound envelope metadata.
    pub const RELAY_CORE_VERSION: &str = "0.1.0";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_lock_outlasts_queue_lock() {
        assert!(channel::TOPIC_LOCK_SECONDS > channel::DEFAULT_QUEUE_LOCK_SECONDS);
    }

    #[test]
    fn connection_backoff_stays_under_command_timeout() {
        let mut delay = limits::CONNECTION_RETRY_BASE_SECONDS;
        for _ in 0..limits::DEFAULT_MAX_CONNECTION_ATTEMPTS {
            delay = (delay * 2).min(limits::DEFAULT_COMMAND_TIMEOUT_SECONDS);
        }
        assert!(delay <= limits::DEFAULT_COMMAND_TIMEOUT_SECONDS);
    }
}
