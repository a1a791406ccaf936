//! # Messaging Entity Directory
//!
//! Read-side lookup of broker resources. A `MessagingEntity` maps a logical
//! entity name + owner to the connection descriptors a listener binds to:
//! always a primary, optionally a secondary used for failover registration.
//!
//! The directory is a pure read dependency for the listener registry. The
//! production implementation is PostgreSQL-backed (`PostgresEntityDirectory`);
//! tests substitute an in-memory fake behind the `EntityDirectory` trait.

pub mod entity;
pub mod postgres;

pub use entity::{EntityDirectory, EntityStatus, MessagingEntity, NamespaceKind};
pub use postgres::PostgresEntityDirectory;
