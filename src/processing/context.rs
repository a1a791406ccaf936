//! Execution context handed to processor factories.

use sqlx::PgPool;
use std::collections::HashMap;

/// Host-supplied dependencies made available to processor factories at
/// resolution time. Cheap to clone; the pool and value map are shared
/// handles.
///
/// Start operations thread an optional context through to every factory they
/// invoke, so processors that need a database pool or host-specific settings
/// can pick them up without global state.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    environment: String,
    pool: Option<PgPool>,
    values: HashMap<String, serde_json::Value>,
}

impl ExecutionContext {
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            pool: None,
            values: HashMap::new(),
        }
    }

    /// Attach a database pool for factories that build database-backed
    /// processors
    pub fn with_pool(mut self, pool: PgPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Attach an arbitrary host value
    pub fn with_value(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.values.insert(key.into(), value);
        self
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn pool(&self) -> Option<&PgPool> {
        self.pool.as_ref()
    }

    pub fn value(&self, key: &str) -> Option<&serde_json::Value> {
        self.values.get(key)
    }
}
