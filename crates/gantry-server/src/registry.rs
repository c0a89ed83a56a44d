//! The service catalog.
//!
//! Registration happens at startup and is append-only; once the server
//! accepts traffic the catalog is only read. Lookup is O(1) by name;
//! enumeration preserves registration order for the documentation
//! collaborator.

use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use gantry_core::params::ParamSource;
use gantry_core::service::{Handler, Service};

/// Registration failures.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Name/display name empty or handler missing.
    #[error("invalid service descriptor: {0}")]
    InvalidDescriptor(String),
    /// A service with this name already exists.
    #[error("service already registered: {0}")]
    AlreadyRegistered(String),
}

/// A descriptor frozen into the catalog.
#[derive(Debug)]
pub struct RegisteredService {
    /// The descriptor as registered (handler removed into `handler`).
    pub service: Service,
    /// The erased handler.
    pub handler: Handler,
    /// Shared source hints, cloned into every dispatch.
    pub hints: Arc<HashMap<String, ParamSource>>,
}

/// Name → descriptor catalog with stable enumeration order.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: DashMap<String, Arc<RegisteredService>>,
    order: RwLock<Vec<String>>,
}

impl ServiceRegistry {
    /// Empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and append a descriptor.
    pub fn register(&self, mut service: Service) -> Result<(), RegistryError> {
        if service.name.is_empty() {
            return Err(RegistryError::InvalidDescriptor("name is required".to_string()));
        }
        if service.display_name.is_empty() {
            return Err(RegistryError::InvalidDescriptor(
                "display_name is required".to_string(),
            ));
        }
        let handler = service
            .handler
            .take()
            .ok_or_else(|| RegistryError::InvalidDescriptor("handler is required".to_string()))?;

        let name = service.name.clone();
        let hints = Arc::new(service.param_sources.clone());
        let entry = Arc::new(RegisteredService {
            service,
            handler,
            hints,
        });

        // Entry API keeps duplicate detection and insertion atomic.
        match self.services.entry(name.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(RegistryError::AlreadyRegistered(name));
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&entry));
            }
        }
        self.order.write().push(name.clone());

        info!(
            service = %name,
            display_name = %entry.service.display_name,
            group = %entry.service.group,
            skip_auth = entry.service.skip_auth,
            return_raw = entry.service.return_raw,
            "service registered"
        );
        Ok(())
    }

    /// Lookup by name.
    pub fn get(&self, name: &str) -> Option<Arc<RegisteredService>> {
        self.services.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Enumerate in registration order.
    pub fn iter_ordered(&self) -> Vec<Arc<RegisteredService>> {
        self.order
            .read()
            .iter()
            .filter_map(|name| self.get(name))
            .collect()
    }

    /// Number of registered services.
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
