//! Core types for gcompute
//!
//! Operations, their addressing scope, and the poll state the waiter observes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Addressing domain a resource type lives in.
///
/// Resource definitions declare a `ScopeKind`; the provider context turns it
/// into a concrete [`Scope`] using its configured region and zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    Global,
    Regional,
    Zonal,
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeKind::Global => write!(f, "global"),
            ScopeKind::Regional => write!(f, "regional"),
            ScopeKind::Zonal => write!(f, "zonal"),
        }
    }
}

/// Concrete scope of an operation or entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "location", rename_all = "snake_case")]
pub enum Scope {
    Global,
    Regional(String),
    Zonal(String),
}

impl Scope {
    /// URL path segment selecting the endpoint variant
    pub fn path_segment(&self) -> String {
        match self {
            Scope::Global => "global".to_string(),
            Scope::Regional(region) => format!("regions/{}", region),
            Scope::Zonal(zone) => format!("zones/{}", zone),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path_segment())
    }
}

/// Kind of mutating call that produced an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Insert,
    Patch,
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Insert => write!(f, "insert"),
            OperationKind::Patch => write!(f, "patch"),
            OperationKind::Delete => write!(f, "delete"),
        }
    }
}

/// Provider-side status of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationStatus {
    Pending,
    Running,
    Done,
}

impl OperationStatus {
    /// `Done` is the only state with no further transition
    pub fn is_terminal(&self) -> bool {
        matches!(self, OperationStatus::Done)
    }
}

impl Default for OperationStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationStatus::Pending => write!(f, "PENDING"),
            OperationStatus::Running => write!(f, "RUNNING"),
            OperationStatus::Done => write!(f, "DONE"),
        }
    }
}

/// One entry of a failed operation's error list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationErrorItem {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl fmt::Display for OperationErrorItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Error payload embedded in a settled operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationErrorPayload {
    #[serde(default)]
    pub errors: Vec<OperationErrorItem>,
}

/// Poll state of an operation as returned by the provider.
///
/// Once `status` is `Done` the value is final. `error` is only meaningful
/// at that point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub status: OperationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationErrorPayload>,
}

impl Operation {
    pub fn new(name: impl Into<String>, status: OperationStatus) -> Self {
        Self {
            name: name.into(),
            status,
            operation_type: None,
            target_link: None,
            error: None,
        }
    }

    pub fn with_error(mut self, errors: Vec<OperationErrorItem>) -> Self {
        self.error = Some(OperationErrorPayload { errors });
        self
    }

    /// Errors of a settled, failed operation
    pub fn failure(&self) -> Option<&[OperationErrorItem]> {
        if !self.status.is_terminal() {
            return None;
        }
        self.error
            .as_ref()
            .filter(|e| !e.errors.is_empty())
            .map(|e| e.errors.as_slice())
    }
}

/// A pending asynchronous action on a named remote entity.
///
/// Built from the operation a mutating call returns and handed to the
/// waiter, which consumes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationHandle {
    pub name: String,
    pub scope: Scope,
    pub target: String,
    pub kind: OperationKind,
}

impl OperationHandle {
    pub fn new(operation: &Operation, scope: Scope, target: impl Into<String>, kind: OperationKind) -> Self {
        Self {
            name: operation.name.clone(),
            scope,
            target: target.into(),
            kind,
        }
    }
}

impl fmt::Display for OperationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({}, {})", self.kind, self.target, self.name, self.scope)
    }
}

/// Lifecycle phase of one resource instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourcePhase {
    Absent,
    Creating,
    Present,
    Updating,
    Deleting,
}

impl ResourcePhase {
    /// Settled phases are the only ones a mutating call may start from
    pub fn is_settled(&self) -> bool {
        matches!(self, ResourcePhase::Absent | ResourcePhase::Present)
    }

    /// Phase entered while `kind` is in flight
    pub fn in_flight(kind: OperationKind) -> Self {
        match kind {
            OperationKind::Insert => ResourcePhase::Creating,
            OperationKind::Patch => ResourcePhase::Updating,
            OperationKind::Delete => ResourcePhase::Deleting,
        }
    }

    /// Phase a call of `kind` must start from
    pub fn required_for(kind: OperationKind) -> Self {
        match kind {
            OperationKind::Insert => ResourcePhase::Absent,
            OperationKind::Patch | OperationKind::Delete => ResourcePhase::Present,
        }
    }
}

impl Default for ResourcePhase {
    fn default() -> Self {
        Self::Absent
    }
}

impl fmt::Display for ResourcePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourcePhase::Absent => write!(f, "absent"),
            ResourcePhase::Creating => write!(f, "creating"),
            ResourcePhase::Present => write!(f, "present"),
            ResourcePhase::Updating => write!(f, "updating"),
            ResourcePhase::Deleting => write!(f, "deleting"),
        }
    }
}
