//! Error types for the relay core.
//!

use thiserror::Error;

/// Top-level error for the relay core
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RelayError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Messaging error: {0}")]
    MessagingError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Registry error: {0}")]
    RegistryError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Timeout error: {0}")]
    Timeout(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for RelayError {
    fn from(error: serde_json::Error) -> Self {
        RelayError::ValidationError(format!("JSON serialization error: {error}"))
    }
}

impl From<sqlx::Error> for RelayError {
    fn from(err: sqlx::Error) -> Self {
        RelayError::DatabaseError(err.to_string())
    }
}

impl From<crate::messaging::MessagingError> for RelayError {
    fn from(error: crate::messaging::MessagingError) -> Self {
        RelayError::MessagingError(error.to_string())
    }
}

impl From<crate::config::ConfigurationError> for RelayError {
    fn from(error: crate::config::ConfigurationError) -> Self {
        RelayError::ConfigurationError(error.to_string())
    }
}

pub type RelayResult<T> = anyhow::Result<T, RelayError>;
pub type RegistryResult<T> = anyhow::Result<T, RegistryError>;

/// Listener-registration error types
///
/// Fatal to the specific registration call, never to the registry as a
/// whole; bulk start operations log these and continue.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// Listener configuration failed validation
    #[error("Invalid listener configuration: {reason}")]
    InvalidListener { reason: String },

    /// Entity could not be resolved from the directory
    #[error("Entity not found in directory for name {entity_name}, owner {owner}")]
    EntityNotFound { entity_name: String, owner: String },

    /// Processor identifier resolved to no registered factory
    #[error("Processor not registered for identifier {identifier}")]
    ProcessorNotFound { identifier: String },

    /// Processor registration rejected
    #[error("Invalid processor registration: {reason}")]
    InvalidProcessor { reason: String },

    /// Registration conflict on a live consumer key
    #[error("Registration conflict: {key}, reason: {reason}")]
    Conflict { key: String, reason: String },

    /// Directory lookup failed
    #[error("Directory lookup failed for {entity_name}: {reason}")]
    DirectoryLookupFailed { entity_name: String, reason: String },

    /// Broker channel could not be opened for a registration
    #[error("Channel setup failed for {key}: {reason}")]
    ChannelSetup { key: String, reason: String },

    /// Consumer failed to stop within the grace period
    #[error("Stop timed out for {key} after {grace_seconds}s")]
    StopTimeout { key: String, grace_seconds: u64 },
}

impl RegistryError {
    /// Create an invalid-listener error
    pub fn invalid_listener<R: Into<String>>(reason: R) -> Self {
        Self::InvalidListener {
            reason: reason.into(),
        }
    }

    /// Create an entity-not-found error
    pub fn entity_not_found<E: Into<String>, O: Into<String>>(entity_name: E, owner: O) -> Self {
        Self::EntityNotFound {
            entity_name: entity_name.into(),
            owner: owner.into(),
        }
    }

    /// Create a processor-not-found error
    pub fn processor_not_found<I: Into<String>>(identifier: I) -> Self {
        Self::ProcessorNotFound {
            identifier: identifier.into(),
        }
    }

    /// Create an invalid-processor error
    pub fn invalid_processor<R: Into<String>>(reason: R) -> Self {
        Self::InvalidProcessor {
            reason: reason.into(),
        }
    }
}

impl From<RegistryError> for RelayError {
    fn from(err: RegistryError) -> Self {
        RelayError::RegistryError(err.to_string())
    }
}
