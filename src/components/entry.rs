use std::fmt;
use std::sync::Arc;

use super::{ProviderRef, ServiceRef};

/// Registered provider plus its derived display name.
///
/// Immutable once created. `priority` is the effective load priority, which for an
/// aggregated child never exceeds its parent's.
#[derive(Clone)]
pub struct ProviderEntry {
    provider: ProviderRef,
    name: Arc<str>,
    priority: i32,
}

impl ProviderEntry {
    pub(crate) fn with_priority(provider: ProviderRef, priority: i32) -> Self {
        let name = Arc::from(provider.name());
        Self {
            provider,
            name,
            priority,
        }
    }

    /// The wrapped provider.
    pub fn provider(&self) -> &ProviderRef {
        &self.provider
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_arc(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    /// Effective load priority.
    pub fn priority(&self) -> i32 {
        self.priority
    }
}

impl fmt::Debug for ProviderEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderEntry")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .finish()
    }
}

/// Registered service plus its derived display name.
#[derive(Clone)]
pub struct ServiceEntry {
    service: ServiceRef,
    name: Arc<str>,
    priority: i32,
}

impl ServiceEntry {
    pub(crate) fn new(service: ServiceRef) -> Self {
        let name = Arc::from(service.name());
        let priority = service.priority();
        Self {
            service,
            name,
            priority,
        }
    }

    /// The wrapped service.
    pub fn service(&self) -> &ServiceRef {
        &self.service
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_arc(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    /// Load priority.
    pub fn priority(&self) -> i32 {
        self.priority
    }
}

impl fmt::Debug for ServiceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceEntry")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .finish()
    }
}
