//! Messaging entity records and the directory lookup trait.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::RelayResult;

/// Namespace a consumer binds to. Every listener registers against `Primary`;
/// a second registration against `Secondary` happens only when failover is
/// enabled and the entity carries a distinct secondary connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamespaceKind {
    Primary,
    Secondary,
}

impl NamespaceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NamespaceKind::Primary => "primary",
            NamespaceKind::Secondary => "secondary",
        }
    }
}

impl std::fmt::Display for NamespaceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle status of a directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text")]
pub enum EntityStatus {
    #[sqlx(rename = "active")]
    Active,
    #[sqlx(rename = "inactive")]
    Inactive,
}

impl EntityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityStatus::Active => "active",
            EntityStatus::Inactive => "inactive",
        }
    }
}

impl std::fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EntityStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(EntityStatus::Active),
            "inactive" => Ok(EntityStatus::Inactive),
            _ => Err(format!("Invalid entity status: {s}")),
        }
    }
}

/// A broker resource (queue or topic) plus ownership metadata.
/// Maps to the `relay_messaging_entities` table.
///
/// # Example
///
/// ```rust
/// use relay_core::directory::{MessagingEntity, NamespaceKind};
///
/// let entity = MessagingEntity::new("order-events", "fulfillment", "postgres://primary/relay");
/// assert_eq!(entity.connection_for(NamespaceKind::Primary), Some("postgres://primary/relay"));
/// assert_eq!(entity.connection_for(NamespaceKind::Secondary), None);
/// assert!(!entity.has_distinct_secondary());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct MessagingEntity {
    pub entity_name: String,
    pub owner: String,
    pub primary_connection: String,
    pub secondary_connection: Option<String>,
    pub status: EntityStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl MessagingEntity {
    /// Create an active entity with a primary connection only
    pub fn new(entity_name: &str, owner: &str, primary_connection: &str) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            entity_name: entity_name.to_string(),
            owner: owner.to_string(),
            primary_connection: primary_connection.to_string(),
            secondary_connection: None,
            status: EntityStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    /// Attach a secondary (failover) connection descriptor
    pub fn with_secondary_connection(mut self, secondary_connection: &str) -> Self {
        self.secondary_connection = Some(secondary_connection.to_string());
        self
    }

    /// Mark the entity inactive
    pub fn with_status(mut self, status: EntityStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == EntityStatus::Active
    }

    /// Connection descriptor for the requested namespace. `Secondary` yields
    /// `None` when the entity has no failover endpoint.
    pub fn connection_for(&self, namespace: NamespaceKind) -> Option<&str> {
        match namespace {
            NamespaceKind::Primary => Some(self.primary_connection.as_str()),
            NamespaceKind::Secondary => self.secondary_connection.as_deref(),
        }
    }

    /// True when a secondary connection exists and differs from the primary.
    /// Identical descriptors mean there is nothing to fail over to, so the
    /// registry skips the secondary registration entirely.
    pub fn has_distinct_secondary(&self) -> bool {
        match &self.secondary_connection {
            Some(secondary) => secondary != &self.primary_connection,
            None => false,
        }
    }
}

/// Lookup interface for the entity directory. Consumed read-only by the
/// listener registry; backed by PostgreSQL in production and a fake in tests.
#[async_trait]
pub trait EntityDirectory: Send + Sync {
    /// Resolve one entity by name and owner
    async fn get_entity(
        &self,
        entity_name: &str,
        owner: &str,
    ) -> RelayResult<Option<MessagingEntity>>;

    /// All entities known to the directory, active and inactive
    async fn get_all_entities(&self) -> RelayResult<Vec<MessagingEntity>>;
}
