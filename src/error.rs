//! Error types for managed certificate management
//!
//! Provides structured error types for the Compute Engine transport, the
//! long-running operation driver, and the ManagedCertificate cluster surface.

use crate::compute::operation::{CancelReason, OperationFailure};
use std::time::Duration;
use thiserror::Error;

/// Unified error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    // =========================================================================
    // Kubernetes Errors
    // =========================================================================
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Resource not found: {kind}/{name}")]
    ResourceNotFound { kind: String, name: String },

    #[error("Resource already exists: {kind}/{name}")]
    ResourceExists { kind: String, name: String },

    // =========================================================================
    // Compute API Errors
    // =========================================================================
    #[error("Compute API connection error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Compute API error ({status}): {message}")]
    ComputeApi { status: u16, message: String },

    // =========================================================================
    // Operation Outcome Errors
    // =========================================================================
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(OperationFailure),

    #[error("{0}")]
    OperationFailed(OperationFailure),

    #[error("Wait for operation {operation} aborted: {reason}")]
    Cancelled {
        operation: String,
        reason: CancelReason,
    },

    // =========================================================================
    // Parse Errors
    // =========================================================================
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("YAML render error: {0}")]
    YamlParse(#[from] serde_yaml::Error),
}

/// Action to take on error during reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorAction {
    /// Requeue with exponential backoff
    RequeueWithBackoff,
    /// Requeue after specific duration
    RequeueAfter(Duration),
    /// Don't requeue, wait for changes
    NoRequeue,
}

impl Error {
    /// Determine what action to take for this error
    pub fn action(&self) -> ErrorAction {
        match self {
            // Transport failures - retry with backoff
            Error::Http(_) | Error::Kube(_) => ErrorAction::RequeueWithBackoff,

            // Project hit a provider limit - wait for capacity to free up
            Error::QuotaExceeded(_) => ErrorAction::RequeueAfter(Duration::from_secs(600)),

            // The caller gave up waiting; the operation may still finish
            Error::Cancelled { .. } => ErrorAction::RequeueAfter(Duration::from_secs(30)),

            Error::OperationFailed(_) => ErrorAction::RequeueAfter(Duration::from_secs(60)),

            // Configuration/validation errors - don't retry automatically
            Error::Configuration(_) | Error::Validation(_) => ErrorAction::NoRequeue,

            // All other errors - retry with backoff
            _ => ErrorAction::RequeueWithBackoff,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        !matches!(self.action(), ErrorAction::NoRequeue)
    }

    /// Check if the target resource does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::ResourceNotFound { .. } => true,
            Error::ComputeApi { status, .. } => *status == 404,
            Error::Kube(kube::Error::Api(response)) => response.code == 404,
            _ => false,
        }
    }

    /// Check if a terminal operation failed on a project quota
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Error::QuotaExceeded(_))
    }

    /// Check if the wait was aborted by the caller's cancel signal
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }

    pub(crate) fn not_found(kind: &str, name: &str) -> Self {
        Error::ResourceNotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }
}

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, Error>;
