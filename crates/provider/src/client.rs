//! Client for the compute API
//!
//! [`ComputeApi`] is the provider's outbound seam: scoped mutating calls that
//! return an operation, scoped reads, and operation status queries. A real
//! deployment plugs an HTTP transport in behind it; tests and the CLI use
//! [`crate::sim::SimulatedCompute`].

use async_trait::async_trait;
use gcompute_common::{ApiError, Operation, Scope};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Outbound calls against the cloud provider
#[async_trait]
pub trait ComputeApi: Send + Sync {
    /// Insert a new entity into `collection`
    async fn insert(&self, collection: &str, scope: &Scope, body: Value) -> Result<Operation, ApiError>;

    /// Replace the mutable fields of an existing entity
    async fn patch(
        &self,
        collection: &str,
        scope: &Scope,
        name: &str,
        body: Value,
    ) -> Result<Operation, ApiError>;

    /// Delete an entity
    async fn delete(&self, collection: &str, scope: &Scope, name: &str) -> Result<Operation, ApiError>;

    /// Fetch the current representation of an entity
    async fn get(&self, collection: &str, scope: &Scope, name: &str) -> Result<Value, ApiError>;

    /// Query the status of an operation
    async fn get_operation(&self, scope: &Scope, name: &str) -> Result<Operation, ApiError>;
}

/// Client bound to one collection within one scope
#[derive(Clone)]
pub struct CollectionClient {
    api: Arc<dyn ComputeApi>,
    collection: &'static str,
    scope: Scope,
}

impl CollectionClient {
    pub fn new(api: Arc<dyn ComputeApi>, collection: &'static str, scope: Scope) -> Self {
        Self { api, collection, scope }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn collection(&self) -> &'static str {
        self.collection
    }

    pub async fn insert(&self, body: Value) -> Result<Operation, ApiError> {
        debug!(collection = self.collection, scope = %self.scope, request = %body, "insert request");
        self.api.insert(self.collection, &self.scope, body).await
    }

    pub async fn patch(&self, name: &str, body: Value) -> Result<Operation, ApiError> {
        debug!(collection = self.collection, scope = %self.scope, name, request = %body, "patch request");
        self.api.patch(self.collection, &self.scope, name, body).await
    }

    pub async fn delete(&self, name: &str) -> Result<Operation, ApiError> {
        debug!(collection = self.collection, scope = %self.scope, name, "delete request");
        self.api.delete(self.collection, &self.scope, name).await
    }

    pub async fn get(&self, name: &str) -> Result<Value, ApiError> {
        self.api.get(self.collection, &self.scope, name).await
    }
}
