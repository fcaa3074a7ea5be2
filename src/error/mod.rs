//! Error types for Ceph REST operations
//!
//! Every failure the client can surface is a [`CephError`]. Only a task that
//! failed without a recognised conflict code is recovered internally (by
//! resubmitting the whole operation); everything else reaches the caller with
//! the status code, remote error code and task name attached.

pub mod handlers;

use crate::engine::task::TaskFailure;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CephError>;

/// Remote error code reported when an RBD image (or snapshot) already exists.
pub const RBD_IMAGE_ALREADY_EXISTS: &str = "17";

/// Remote error code reported when an RBD namespace already exists.
pub const NAMESPACE_ALREADY_EXISTS: &str = "namespace_already_exists";

/// Permanent conflicts decoded from remote error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    ImageAlreadyExists,
    NamespaceAlreadyExists,
}

impl ConflictKind {
    /// Map a remote error code to a conflict, if it is one.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            RBD_IMAGE_ALREADY_EXISTS => Some(ConflictKind::ImageAlreadyExists),
            NAMESPACE_ALREADY_EXISTS => Some(ConflictKind::NamespaceAlreadyExists),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ConflictKind::ImageAlreadyExists => RBD_IMAGE_ALREADY_EXISTS,
            ConflictKind::NamespaceAlreadyExists => NAMESPACE_ALREADY_EXISTS,
        }
    }
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictKind::ImageAlreadyExists => write!(f, "RBD image already exists"),
            ConflictKind::NamespaceAlreadyExists => write!(f, "namespace already exists"),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum CephError {
    /// A required identifying parameter is missing; raised before any request
    #[error("Validation error: {0}")]
    Validation(String),

    /// Connection level failure after the transport retry budget was spent
    #[error("Transport error: {0}")]
    Transport(String),

    /// Login or token problems
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Response body could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid client configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The resource already exists; resubmitting cannot succeed
    #[error("{kind} during {operation} (status {status}, code {code}): {detail}")]
    Conflict {
        kind: ConflictKind,
        status: u16,
        code: String,
        detail: String,
        operation: String,
    },

    /// The background task reported failure without a conflict code
    #[error("Task {operation} failed: {failure}")]
    TaskFailed {
        operation: String,
        failure: TaskFailure,
    },

    /// The bounded resubmission ceiling was hit
    #[error("{operation} gave up after {attempts} attempt(s){}", .last_failure.as_ref().map(|f| format!(", last failure: {}", f)).unwrap_or_default())]
    MaxAttemptsExceeded {
        operation: String,
        attempts: u32,
        last_failure: Option<TaskFailure>,
    },

    /// Polling exhausted its cycle budget without a terminal task state
    #[error("Task {operation} on '{resource_spec}' not finished after {cycles} poll cycle(s)")]
    TaskTimeout {
        operation: String,
        resource_spec: String,
        cycles: u32,
    },

    /// A definitive non-success answer that needs no task inspection
    #[error("{operation} failed with HTTP {status}{}{}", .code.as_ref().map(|c| format!(" (code {})", c)).unwrap_or_default(), .detail.as_ref().map(|d| format!(": {}", d)).unwrap_or_default())]
    Api {
        status: u16,
        code: Option<String>,
        detail: Option<String>,
        operation: String,
    },
}

impl CephError {
    /// HTTP status carried by the failure, when the server produced one
    pub fn status_code(&self) -> Option<u16> {
        match self {
            CephError::Conflict { status, .. } | CephError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, CephError::Conflict { .. })
    }

    /// Whether the operation engine recovers from this kind by resubmitting
    pub fn is_retryable(&self) -> bool {
        matches!(self, CephError::TaskFailed { .. })
    }
}

impl From<reqwest::Error> for CephError {
    fn from(err: reqwest::Error) -> Self {
        CephError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for CephError {
    fn from(err: serde_json::Error) -> Self {
        CephError::Parse(err.to_string())
    }
}

impl From<url::ParseError> for CephError {
    fn from(err: url::ParseError) -> Self {
        CephError::Configuration(err.to_string())
    }
}
