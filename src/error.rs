//! Unified failure type for protected calls.

use std::time::Duration;

use thiserror::Error;

use crate::resilience::circuit_breaker::CircuitState;

/// Every way a protected call can fail.
///
/// `E` is the error type of the caller's own work. At most one cause is
/// reported per call: the innermost layer that failed.
#[derive(Debug, Error)]
pub enum CallError<E> {
    /// The work itself failed.
    #[error("{0}")]
    Failed(E),

    /// The circuit breaker did not admit the call.
    #[error("Circuit breaker '{name}' is {state} and does not permit further calls")]
    CircuitOpen { name: String, state: CircuitState },

    /// The bulkhead had no free slot within its wait budget.
    #[error("Bulkhead '{name}' is full and does not permit further calls")]
    BulkheadFull { name: String },

    /// The time limiter gave up waiting for the work.
    #[error("Call '{name}' timed out after {after:?}")]
    TimedOut { name: String, after: Duration },

    /// The isolated worker was torn down before producing a result.
    #[error("Call '{name}' was interrupted")]
    Interrupted { name: String },
}

/// Discriminant of [`CallError`], for callers that react per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Failed,
    CircuitOpen,
    BulkheadFull,
    TimedOut,
    Interrupted,
}

impl<E> CallError<E> {
    pub fn kind(&self) -> FailureKind {
        match self {
            CallError::Failed(_) => FailureKind::Failed,
            CallError::CircuitOpen { .. } => FailureKind::CircuitOpen,
            CallError::BulkheadFull { .. } => FailureKind::BulkheadFull,
            CallError::TimedOut { .. } => FailureKind::TimedOut,
            CallError::Interrupted { .. } => FailureKind::Interrupted,
        }
    }

    /// True when the work ran and returned an error.
    pub fn is_failed(&self) -> bool {
        matches!(self, CallError::Failed(_))
    }

    /// The work's own error, if that is what failed.
    pub fn into_failed(self) -> Option<E> {
        match self {
            CallError::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// True for failures produced by a policy rather than the work.
    pub fn is_rejection(&self) -> bool {
        !self.is_failed()
    }
}
