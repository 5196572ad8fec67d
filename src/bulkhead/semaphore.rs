//! Counting-semaphore bulkhead.
//!
//! The call runs on the caller's own task once a permit is held.

use std::future::Future;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::timeout;

use crate::bulkhead::{BulkheadError, BulkheadStats, Counters};
use crate::config::BulkheadProfile;
use crate::resilience::registry::Policy;

#[derive(Debug)]
pub struct SemaphoreBulkhead {
    name: String,
    profile: BulkheadProfile,
    permits: Arc<Semaphore>,
    counters: Arc<Counters>,
}

impl Policy for SemaphoreBulkhead {
    type Profile = BulkheadProfile;

    fn from_profile(name: &str, profile: &BulkheadProfile) -> Self {
        Self::new(name, profile.clone())
    }
}

impl SemaphoreBulkhead {
    /// # Panics
    ///
    /// If `max_concurrent_calls` exceeds [`Semaphore::MAX_PERMITS`];
    /// validated configuration never does.
    pub fn new(name: impl Into<String>, profile: BulkheadProfile) -> Self {
        Self {
            name: name.into(),
            permits: Arc::new(Semaphore::new(profile.max_concurrent_calls)),
            profile,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_concurrent_calls(&self) -> usize {
        self.profile.max_concurrent_calls
    }

    pub fn stats(&self) -> BulkheadStats {
        self.counters.snapshot(self.permits.available_permits())
    }

    /// Take a slot, waiting at most `max_wait`.
    pub async fn acquire(&self) -> Result<SlotGuard, BulkheadError> {
        let max_wait = self.profile.max_wait();
        let permit = if max_wait.is_zero() {
            self.permits.clone().try_acquire_owned().ok()
        } else {
            match timeout(max_wait, self.permits.clone().acquire_owned()).await {
                Ok(Ok(permit)) => Some(permit),
                _ => None,
            }
        };

        match permit {
            Some(permit) => {
                self.counters.admitted.fetch_add(1, Ordering::Relaxed);
                Ok(SlotGuard {
                    _permit: permit,
                    counters: self.counters.clone(),
                })
            }
            None => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    name = %self.name,
                    max_concurrent_calls = self.profile.max_concurrent_calls,
                    "Bulkhead full, call rejected"
                );
                Err(BulkheadError::Full)
            }
        }
    }

    /// Run `work` while holding a slot.
    pub async fn execute<F: Future>(&self, work: F) -> Result<F::Output, BulkheadError> {
        let _slot = self.acquire().await?;
        Ok(work.await)
    }
}

/// An occupied bulkhead slot; dropping it frees the slot.
#[derive(Debug)]
pub struct SlotGuard {
    _permit: OwnedSemaphorePermit,
    counters: Arc<Counters>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.counters.released.fetch_add(1, Ordering::Relaxed);
    }
}
