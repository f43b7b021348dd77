//! Error types for gcompute

use crate::types::{OperationErrorItem, OperationKind, OperationStatus};
use std::time::Duration;
use thiserror::Error;

/// Result type alias using gcompute Error
pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a single call against the provider API
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("HTTP {code}: {message}")]
    Http { code: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),
}

impl ApiError {
    pub fn http(code: u16, message: impl Into<String>) -> Self {
        ApiError::Http {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::http(404, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        ApiError::Transport(message.into())
    }

    pub fn code(&self) -> Option<u16> {
        match self {
            ApiError::Http { code, .. } => Some(*code),
            ApiError::Transport(_) => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.code() == Some(404)
    }

    /// Network and service-side failures worth another attempt
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Transport(_) => true,
            ApiError::Http { code, .. } => matches!(code, 429 | 500 | 502 | 503 | 504),
        }
    }
}

/// gcompute error types
#[derive(Error, Debug)]
pub enum Error {
    /// The mutating call itself failed; no operation exists
    #[error("error submitting {kind} for {resource}: {source}")]
    Submission {
        kind: OperationKind,
        resource: String,
        #[source]
        source: ApiError,
    },

    /// The operation was accepted but settled with a failure payload
    #[error("{kind} of {resource} failed (operation {operation}): {}", join_errors(.errors))]
    Operation {
        kind: OperationKind,
        resource: String,
        operation: String,
        errors: Vec<OperationErrorItem>,
    },

    /// Polling ran out of budget; the side effect may still be in flight
    #[error(
        "timed out after {}s waiting for {kind} of {resource} (operation {operation}, last status {})",
        .elapsed.as_secs(),
        .last_status.map(|s| s.to_string()).unwrap_or_else(|| "unknown".to_string())
    )]
    Timeout {
        kind: OperationKind,
        resource: String,
        operation: String,
        last_status: Option<OperationStatus>,
        elapsed: Duration,
    },

    /// Status query failed permanently
    #[error("error polling operation {operation} for {kind} of {resource}: {source}")]
    Poll {
        kind: OperationKind,
        resource: String,
        operation: String,
        #[source]
        source: ApiError,
    },

    /// Cancelled before submission (`operation` is `None`) or while waiting
    #[error("{}", cancelled_message(.kind, .resource, .operation.as_deref()))]
    Cancelled {
        kind: OperationKind,
        resource: String,
        operation: Option<String>,
    },

    #[error("error reading {resource}: {source}")]
    Read {
        resource: String,
        #[source]
        source: ApiError,
    },

    #[error("Resource not found: {kind} with id {id}")]
    NotFound { kind: String, id: String },

    #[error("Invalid configuration for {resource_type}: {message}")]
    Validation {
        resource_type: String,
        message: String,
    },

    #[error("{resource} cannot be updated in place; changed fields force replacement: {}", .fields.join(", "))]
    RequiresReplacement { resource: String, fields: Vec<String> },

    #[error("Unknown resource type: {0}")]
    UnknownResourceType(String),

    #[error("Invalid state transition for {resource}: {from} -> {to}")]
    InvalidStateTransition {
        resource: String,
        from: String,
        to: String,
    },

    #[error("{resource} already has a mutating call in flight")]
    ConcurrentMutation { resource: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn validation(resource_type: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation {
            resource_type: resource_type.into(),
            message: message.into(),
        }
    }

    /// Operation was accepted but its outcome is unknown; the remote side
    /// effect may or may not have happened
    pub fn is_indeterminate(&self) -> bool {
        matches!(
            self,
            Error::Timeout { .. } | Error::Cancelled { operation: Some(_), .. } | Error::Poll { .. }
        )
    }

    /// Provider-side failure payload, if the error came from a settled operation
    pub fn operation_errors(&self) -> Option<&[OperationErrorItem]> {
        match self {
            Error::Operation { errors, .. } => Some(errors),
            _ => None,
        }
    }
}

fn cancelled_message(kind: &OperationKind, resource: &str, operation: Option<&str>) -> String {
    match operation {
        Some(operation) => format!("wait for {} of {} cancelled (operation {})", kind, resource, operation),
        None => format!("{} of {} cancelled before submission", kind, resource),
    }
}

fn join_errors(errors: &[OperationErrorItem]) -> String {
    if errors.is_empty() {
        return "no error details".to_string();
    }
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
