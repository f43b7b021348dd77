//! Error/result translation
//!
//! Maps raw provider outcomes onto the lifecycle error taxonomy, and
//! lifecycle errors onto diagnostics for the orchestrator.

use gcompute_common::{ApiError, Error, Operation, OperationHandle, OperationKind, Result};
use serde::Serialize;
use serde_json::Value;

use crate::waiter::WaitError;

/// A mutating call that failed before any operation existed
pub fn submission(kind: OperationKind, resource: &str, source: ApiError) -> Error {
    Error::Submission {
        kind,
        resource: resource.to_string(),
        source,
    }
}

/// Resolve the outcome of a wait. A settled operation carrying an error
/// payload becomes [`Error::Operation`]; a wait that ended early keeps its
/// cause.
pub fn settle(handle: &OperationHandle, outcome: std::result::Result<Operation, WaitError>) -> Result<Operation> {
    let resource = handle.target.clone();
    let operation = handle.name.clone();
    let kind = handle.kind;

    match outcome {
        Ok(op) => match op.failure() {
            Some(errors) => Err(Error::Operation {
                kind,
                resource,
                operation,
                errors: errors.to_vec(),
            }),
            None => Ok(op),
        },
        Err(WaitError::Timeout {
            last_status, elapsed, ..
        }) => Err(Error::Timeout {
            kind,
            resource,
            operation,
            last_status,
            elapsed,
        }),
        Err(WaitError::Fatal(source)) => Err(Error::Poll {
            kind,
            resource,
            operation,
            source,
        }),
        Err(WaitError::Cancelled) => Err(Error::Cancelled {
            kind,
            resource,
            operation: Some(operation),
        }),
    }
}

/// A read where not-found means the entity is absent
pub fn lookup(resource: &str, result: std::result::Result<Value, ApiError>) -> Result<Option<Value>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(source) => Err(Error::Read {
            resource: resource.to_string(),
            source,
        }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Orchestrator-facing report of one problem
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            summary: summary.into(),
            detail: detail.into(),
            attribute: None,
        }
    }

    pub fn warning(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(summary, detail)
        }
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl From<&Error> for Diagnostic {
    fn from(e: &Error) -> Self {
        let summary = match e {
            Error::Submission { .. } => "Request rejected by the compute API",
            Error::Operation { .. } => "Operation failed",
            Error::Timeout { .. } => "Timed out waiting for operation",
            Error::Poll { .. } => "Lost track of operation",
            Error::Cancelled { operation: Some(_), .. } => "Operation wait cancelled",
            Error::Cancelled { operation: None, .. } => "Change cancelled before submission",
            Error::Read { .. } => "Failed to read resource",
            Error::NotFound { .. } => "Resource not found",
            Error::Validation { .. } => "Invalid resource configuration",
            Error::RequiresReplacement { .. } => "Change requires replacement",
            Error::UnknownResourceType(_) => "Unsupported resource type",
            Error::InvalidStateTransition { .. } => "Resource state needs a refresh",
            Error::ConcurrentMutation { .. } => "Concurrent change to the same resource",
            Error::InvalidConfig(_) => "Invalid provider configuration",
            Error::Serialization(_) | Error::Io(_) | Error::Internal(_) => "Internal provider error",
        };

        let mut detail = e.to_string();
        if e.is_indeterminate() {
            detail.push_str(
                "; the change may still complete remotely, refresh the resource before retrying",
            );
        }

        let diagnostic = Diagnostic::error(summary, detail);
        match e {
            Error::RequiresReplacement { fields, .. } if fields.len() == 1 => diagnostic.with_attribute(fields[0].clone()),
            _ => diagnostic,
        }
    }
}
