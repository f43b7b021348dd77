//! Resource Implementations
//!
//! Each resource type supplies its schema, the collection and scope it lives
//! in, and the mapping between configuration and provider payloads. The
//! lifecycle layer drives all of them through [`ResourceHandler`].

pub mod disk;
pub mod health_check;
pub mod target_pool;

use std::fmt;
use std::str::FromStr;

use gcompute_common::{Attributes, Error, Result, Scope, ScopeKind};
use serde_json::Value;

use crate::schema::ResourceDescriptor;

/// Base URL of the compute API, used to build canonical references
pub const COMPUTE_BASE_URL: &str = "https://www.googleapis.com/compute/v1";

/// Canonical URL of an entity
pub fn resource_url(project: &str, scope: &Scope, collection: &str, name: &str) -> String {
    format!(
        "{}/projects/{}/{}/{}/{}",
        COMPUTE_BASE_URL,
        project,
        scope.path_segment(),
        collection,
        name
    )
}

/// Where a request is addressed
#[derive(Debug, Clone, Copy)]
pub struct Location<'a> {
    pub project: &'a str,
    pub scope: &'a Scope,
}

/// Capabilities every resource type provides to the lifecycle layer
pub trait ResourceHandler: Send + Sync {
    fn descriptor(&self) -> &ResourceDescriptor;

    /// Provider collection, e.g. `httpHealthChecks`
    fn collection(&self) -> &'static str;

    fn scope_kind(&self) -> ScopeKind;

    fn type_name(&self) -> &'static str {
        self.descriptor().type_name
    }

    /// Configuration (defaults applied) to provider request payload
    fn build_request(&self, config: &Attributes, _location: &Location<'_>) -> Result<Value> {
        Ok(self.descriptor().to_request(config))
    }

    /// Provider response payload to state attributes, computed ones included
    fn populate_state(&self, remote: &Value) -> Result<Attributes> {
        Ok(self.descriptor().from_response(remote))
    }
}

/// Closed set of supported resource types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    HttpHealthCheck,
    HttpsHealthCheck,
    TargetPool,
    Disk,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::HttpHealthCheck,
        ResourceKind::HttpsHealthCheck,
        ResourceKind::TargetPool,
        ResourceKind::Disk,
    ];

    pub fn handler(self) -> &'static dyn ResourceHandler {
        match self {
            ResourceKind::HttpHealthCheck => &health_check::HttpHealthCheckResource,
            ResourceKind::HttpsHealthCheck => &health_check::HttpsHealthCheckResource,
            ResourceKind::TargetPool => &target_pool::TargetPoolResource,
            ResourceKind::Disk => &disk::DiskResource,
        }
    }

    pub fn type_name(self) -> &'static str {
        self.handler().type_name()
    }

    /// Look a resource type up by its registered name
    pub fn from_type_name(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.type_name() == name)
            .ok_or_else(|| Error::UnknownResourceType(name.to_string()))
    }
}

impl FromStr for ResourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_type_name(s)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}
