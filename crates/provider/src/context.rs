//! Provider context
//!
//! Everything a lifecycle call needs from its environment: the API client,
//! the provider configuration and a cancellation token. Owned by the
//! orchestrator and passed in explicitly; cloning is cheap and shares the
//! in-flight registry.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use gcompute_common::{Error, OperationKind, Result, Scope};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::client::{CollectionClient, ComputeApi};
use crate::config::ProviderConfig;
use crate::resources::ResourceHandler;
use crate::waiter::{OperationWaiter, WaitConfig};

#[derive(Clone)]
pub struct ProviderContext {
    api: Arc<dyn ComputeApi>,
    config: Arc<ProviderConfig>,
    cancel: CancellationToken,
    in_flight: Arc<DashMap<String, OperationKind>>,
}

impl ProviderContext {
    pub fn new(api: Arc<dyn ComputeApi>, config: ProviderConfig) -> Self {
        Self {
            api,
            config: Arc::new(config),
            cancel: CancellationToken::new(),
            in_flight: Arc::new(DashMap::new()),
        }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Scope a resource type's entities live in
    pub fn scope_for(&self, handler: &dyn ResourceHandler) -> Scope {
        self.config.scope_for(handler.scope_kind())
    }

    pub fn client_for(&self, handler: &dyn ResourceHandler) -> CollectionClient {
        CollectionClient::new(self.api.clone(), handler.collection(), self.scope_for(handler))
    }

    /// Waiter honouring this context's cancellation
    pub fn waiter(&self, config: WaitConfig) -> OperationWaiter<'_> {
        OperationWaiter::new(self.api.as_ref(), config).with_cancellation(self.cancel.child_token())
    }

    /// Abort every wait started from this context or its clones
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Register a mutating call on `key`. Fails if one is already running;
    /// the registration ends when the guard is dropped.
    pub fn begin_mutation(&self, key: &str, kind: OperationKind) -> Result<InFlightGuard> {
        match self.in_flight.entry(key.to_string()) {
            Entry::Occupied(existing) => {
                debug!(resource = key, running = %existing.get(), rejected = %kind, "Mutation already in flight");
                Err(Error::ConcurrentMutation {
                    resource: key.to_string(),
                })
            }
            Entry::Vacant(slot) => {
                slot.insert(kind);
                Ok(InFlightGuard {
                    registry: self.in_flight.clone(),
                    key: key.to_string(),
                })
            }
        }
    }

    /// Number of mutating calls currently running
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }
}

/// Marks one instance as being mutated until dropped
#[must_use]
pub struct InFlightGuard {
    registry: Arc<DashMap<String, OperationKind>>,
    key: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.registry.remove(&self.key);
    }
}
