//! # Processor Registry
//!
//! Thread-safe registration map from processor identifier strings to
//! processor factories. Populated once by the host application at startup;
//! resolved by the listener registry on every start call and by the replay
//! processor when re-running a failed delivery.
//!
//! Factories receive the optional `ExecutionContext` supplied to the start
//! operation, so a factory can build processors that depend on host
//! resources without the registry knowing about them.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::context::ExecutionContext;
use super::Processor;
use crate::error::{RegistryError, RegistryResult};

/// Factory producing a processor instance, given the start-time context
pub type ProcessorFactory =
    Arc<dyn Fn(Option<&ExecutionContext>) -> Arc<dyn Processor> + Send + Sync>;

/// Identifier → factory map behind a shared lock. Clones share the map.
#[derive(Clone, Default)]
pub struct ProcessorRegistry {
    factories: Arc<RwLock<HashMap<String, ProcessorFactory>>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self {
            factories: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a factory under an identifier. Re-registering an identifier
    /// replaces the previous factory and logs a warning.
    pub fn register<F>(&self, identifier: &str, factory: F) -> RegistryResult<()>
    where
        F: Fn(Option<&ExecutionContext>) -> Arc<dyn Processor> + Send + Sync + 'static,
    {
        if identifier.trim().is_empty() {
            return Err(RegistryError::invalid_processor(
                "processor identifier must not be empty",
            ));
        }

        let mut factories = self.factories.write();
        if factories
            .insert(identifier.to_string(), Arc::new(factory))
            .is_some()
        {
            warn!(identifier = %identifier, "🔧 Replaced existing processor factory");
        } else {
            info!(identifier = %identifier, "🔧 Registered processor factory");
        }
        Ok(())
    }

    /// Register a pre-built processor; useful for stateless processors and
    /// tests
    pub fn register_processor(
        &self,
        identifier: &str,
        processor: Arc<dyn Processor>,
    ) -> RegistryResult<()> {
        self.register(identifier, move |_context| processor.clone())
    }

    /// Resolve an identifier to a processor instance by invoking its factory
    /// with the supplied context
    pub fn resolve(
        &self,
        identifier: &str,
        context: Option<&ExecutionContext>,
    ) -> RegistryResult<Arc<dyn Processor>> {
        let factories = self.factories.read();
        let factory = factories
            .get(identifier)
            .ok_or_else(|| RegistryError::processor_not_found(identifier))?;

        debug!(identifier = %identifier, "🔧 Resolved processor factory");
        Ok(factory(context))
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.factories.read().contains_key(identifier)
    }

    /// Registered identifiers, for diagnostics
    pub fn registered_identifiers(&self) -> Vec<String> {
        let mut identifiers: Vec<String> = self.factories.read().keys().cloned().collect();
        identifiers.sort();
        identifiers
    }

    pub fn len(&self) -> usize {
        self.factories.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.read().is_empty()
    }

    /// Remove all registrations; test support
    pub fn clear(&self) {
        self.factories.write().clear();
    }
}

impl std::fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorRegistry")
            .field("registered", &self.registered_identifiers())
            .finish()
    }
}
