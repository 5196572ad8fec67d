//! Timeout enforcement.
//!
//! # Responsibilities
//! - Bound the execution time of one protected call
//! - Cancel the work on expiry, or leave it running detached
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors
//! - The limiter starts timing only when it is polled, so queue time in an
//!   outer bulkhead is not counted

use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;

use crate::config::TimeLimiterProfile;
use crate::resilience::registry::Policy;

/// Why the limiter produced no output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitError {
    /// The deadline passed before the work finished.
    Elapsed { after: Duration },
    /// The detached task was cancelled (runtime shutdown).
    Interrupted,
}

#[derive(Debug)]
pub struct TimeLimiter {
    name: String,
    profile: TimeLimiterProfile,
}

impl Policy for TimeLimiter {
    type Profile = TimeLimiterProfile;

    fn from_profile(name: &str, profile: &TimeLimiterProfile) -> Self {
        Self::new(name, profile.clone())
    }
}

impl TimeLimiter {
    pub fn new(name: impl Into<String>, profile: TimeLimiterProfile) -> Self {
        Self {
            name: name.into(),
            profile,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timeout_duration(&self) -> Duration {
        self.profile.timeout()
    }

    /// Run `work` under the configured deadline.
    ///
    /// With `cancel_running_future` the work is dropped on expiry. Otherwise
    /// it runs on its own task and keeps going after the caller gives up.
    pub async fn execute<F>(&self, work: F) -> Result<F::Output, LimitError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let limit = self.profile.timeout();

        let outcome = if self.profile.cancel_running_future {
            timeout(limit, work).await
        } else {
            match timeout(limit, tokio::spawn(work)).await {
                Ok(Ok(output)) => Ok(output),
                Ok(Err(join_error)) if join_error.is_panic() => {
                    std::panic::resume_unwind(join_error.into_panic())
                }
                Ok(Err(_)) => return Err(LimitError::Interrupted),
                Err(elapsed) => Err(elapsed),
            }
        };

        outcome.map_err(|_| {
            tracing::warn!(name = %self.name, timeout_ms = limit.as_millis() as u64, "Call timed out");
            LimitError::Elapsed { after: limit }
        })
    }
}
