//! Request interceptors applied by [`ApiClient`](super::ApiClient)

use reqwest::Request;
use std::sync::{Arc, PoisonError, RwLock, Weak};
use tracing::trace;

/// Hook run on every outgoing API request just before it is sent
pub trait RequestInterceptor: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Adjust the request in place
    fn intercept(&self, request: &mut Request);
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    entries: Vec<(u64, Arc<dyn RequestInterceptor>)>,
}

/// Ordered set of interceptors shared by clones of a client
#[derive(Clone, Default)]
pub struct InterceptorChain {
    registry: Arc<RwLock<Registry>>,
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an interceptor; it stays active until the registration is dropped
    #[must_use = "dropping the registration removes the interceptor immediately"]
    pub fn register(&self, interceptor: Arc<dyn RequestInterceptor>) -> InterceptorRegistration {
        let mut registry = self
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        registry.next_id += 1;
        let id = registry.next_id;
        trace!(interceptor = interceptor.name(), id, "Registered request interceptor");
        registry.entries.push((id, interceptor));

        InterceptorRegistration {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Run every registered interceptor in registration order
    pub fn apply(&self, request: &mut Request) {
        // Snapshot so an interceptor may touch the chain without deadlocking
        let interceptors: Vec<_> = self
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .iter()
            .map(|(_, interceptor)| interceptor.clone())
            .collect();

        for interceptor in interceptors {
            interceptor.intercept(request);
        }
    }

    pub fn len(&self) -> usize {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Keeps an interceptor registered; dropping it deregisters
pub struct InterceptorRegistration {
    id: u64,
    registry: Weak<RwLock<Registry>>,
}

impl InterceptorRegistration {
    pub const fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for InterceptorRegistration {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            let mut registry = registry.write().unwrap_or_else(PoisonError::into_inner);
            registry.entries.retain(|(id, _)| *id != self.id);
            trace!(id = self.id, "Deregistered request interceptor");
        }
    }
}

impl std::fmt::Debug for InterceptorRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorRegistration")
            .field("id", &self.id)
            .finish()
    }
}
