//! Long-running operation driver
//!
//! Mutating Compute Engine calls return an operation handle right away and
//! finish asynchronously. [`OperationWaiter`] polls such a handle at a fixed
//! interval until the provider reports `DONE`, and classifies the terminal
//! state into an [`OperationOutcome`].

use crate::domain::ports::{ComputeApiRef, Operation, OperationErrorEntry, OperationStatus};
use crate::error::{Error, Result};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Error code the provider reports when a project limit is hit
pub const CODE_QUOTA_EXCEEDED: &str = "QUOTA_EXCEEDED";

/// Interval between two operation status fetches
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

// =============================================================================
// Cancel Signal
// =============================================================================

/// Why a wait was aborted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The signal was cancelled explicitly
    Cancelled,
    /// The signal's deadline passed
    DeadlineExceeded,
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelReason::Cancelled => write!(f, "cancelled"),
            CancelReason::DeadlineExceeded => write!(f, "deadline exceeded"),
        }
    }
}

/// Caller-owned signal that aborts a wait early
///
/// Combines an explicit [`CancellationToken`] with an optional deadline.
/// Clones share the same token, so cancelling any clone fires all of them.
/// A signal without a deadline never fires on its own.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CancelSignal {
    /// Create a signal that fires only when cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a signal driven by an existing token
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Create a signal that fires once `timeout` has elapsed
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().deadline(Instant::now() + timeout)
    }

    /// Add a deadline, keeping the earlier one if a deadline is already set
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// Fire the signal
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Underlying cancellation token
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Why the signal has fired, or `None` if it has not
    pub fn reason(&self) -> Option<CancelReason> {
        if self.token.is_cancelled() {
            Some(CancelReason::Cancelled)
        } else if self.deadline.is_some_and(|d| Instant::now() >= d) {
            Some(CancelReason::DeadlineExceeded)
        } else {
            None
        }
    }

    /// Wait until the signal fires
    pub async fn fired(&self) -> CancelReason {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.token.cancelled() => CancelReason::Cancelled,
                _ = tokio::time::sleep_until(deadline) => CancelReason::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                CancelReason::Cancelled
            }
        }
    }
}

// =============================================================================
// Outcome Classification
// =============================================================================

/// Snapshot of an operation that finished with errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationFailure {
    pub name: String,
    pub status: OperationStatus,
    pub http_error_message: Option<String>,
    pub http_error_status_code: Option<i32>,
    pub errors: Vec<OperationErrorEntry>,
}

impl OperationFailure {
    fn from_operation(operation: &Operation) -> Self {
        Self {
            name: operation.name.clone(),
            status: operation.status,
            http_error_message: operation.http_error_message.clone(),
            http_error_status_code: operation.http_error_status_code,
            errors: operation.errors().to_vec(),
        }
    }

    /// Check if any constituent error carries `code`
    pub fn has_code(&self, code: &str) -> bool {
        self.errors.iter().any(|e| e.code == code)
    }
}

impl std::fmt::Display for OperationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let errors = self
            .errors
            .iter()
            .map(|e| format!("({}: {})", e.code, e.message))
            .collect::<Vec<_>>()
            .join(", ");

        write!(
            f,
            "operation {} {}. Status: {} ({}), errors: {}",
            self.name,
            self.status,
            self.http_error_message.as_deref().unwrap_or_default(),
            self.http_error_status_code.unwrap_or_default(),
            errors
        )
    }
}

/// Classified result of a finished operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    Success,
    QuotaExceeded(OperationFailure),
    OtherFailure(OperationFailure),
}

impl OperationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, OperationOutcome::Success)
    }

    /// Turn a failed outcome into the matching error
    pub fn into_result(self) -> Result<()> {
        match self {
            OperationOutcome::Success => Ok(()),
            OperationOutcome::QuotaExceeded(failure) => Err(Error::QuotaExceeded(failure)),
            OperationOutcome::OtherFailure(failure) => Err(Error::OperationFailed(failure)),
        }
    }
}

/// Classify an operation, or `None` while it is still in progress
pub fn classify(operation: &Operation) -> Option<OperationOutcome> {
    if !operation.status.is_terminal() {
        return None;
    }

    if operation.errors().is_empty() {
        return Some(OperationOutcome::Success);
    }

    let failure = OperationFailure::from_operation(operation);
    if failure.has_code(CODE_QUOTA_EXCEEDED) {
        Some(OperationOutcome::QuotaExceeded(failure))
    } else {
        Some(OperationOutcome::OtherFailure(failure))
    }
}

// =============================================================================
// Operation Waiter
// =============================================================================

/// Polls global operations of one project until they finish
///
/// Holds no mutable state; a single waiter can drive any number of
/// operations concurrently.
#[derive(Clone)]
pub struct OperationWaiter {
    api: ComputeApiRef,
    project_id: String,
    poll_interval: Duration,
}

impl OperationWaiter {
    /// Create a waiter polling every [`DEFAULT_POLL_INTERVAL`]
    pub fn new(api: ComputeApiRef, project_id: impl Into<String>) -> Self {
        Self {
            api,
            project_id: project_id.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the poll interval
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Block until `operation_name` is done or `cancel` fires
    ///
    /// A failed status fetch is returned as is, without retrying. When the
    /// signal fires first, [`Error::Cancelled`] is returned and the operation
    /// keeps running on the provider side.
    pub async fn await_completion(
        &self,
        operation_name: &str,
        cancel: &CancelSignal,
    ) -> Result<OperationOutcome> {
        loop {
            info!("Wait for operation {}", operation_name);

            let operation = self
                .api
                .get_global_operation(&self.project_id, operation_name)
                .await
                .inspect_err(|e| warn!("Could not get operation {}: {}", operation_name, e))?;

            if let Some(outcome) = classify(&operation) {
                info!("Operation {} done", operation_name);
                match &outcome {
                    OperationOutcome::Success => {}
                    OperationOutcome::QuotaExceeded(failure) => {
                        warn!("Operation {} hit quota: {}", operation_name, failure)
                    }
                    OperationOutcome::OtherFailure(failure) => {
                        warn!("Operation {} failed: {}", operation_name, failure)
                    }
                }
                return Ok(outcome);
            }

            debug!(
                operation = %operation_name,
                status = %operation.status,
                progress = ?operation.progress,
                "Operation not done yet"
            );

            tokio::select! {
                reason = cancel.fired() => {
                    warn!("Stopped waiting for operation {}: {}", operation_name, reason);
                    return Err(Error::Cancelled {
                        operation: operation_name.to_string(),
                        reason,
                    });
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }
}
