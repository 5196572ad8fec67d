//! Bounded worker-pool bulkhead.
//!
//! At most `max_thread_pool_size` calls run at once, each on its own Tokio
//! task; up to `queue_capacity` more may wait for a worker. Anything beyond
//! that is rejected immediately.

use std::future::Future;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::bulkhead::{BulkheadError, BulkheadStats, Counters};
use crate::config::BulkheadProfile;
use crate::resilience::registry::Policy;

#[derive(Debug)]
pub struct ThreadPoolBulkhead {
    name: String,
    profile: BulkheadProfile,
    /// Running plus queued calls.
    admission: Arc<Semaphore>,
    workers: Arc<Semaphore>,
    counters: Arc<Counters>,
}

impl Policy for ThreadPoolBulkhead {
    type Profile = BulkheadProfile;

    fn from_profile(name: &str, profile: &BulkheadProfile) -> Self {
        Self::new(name, profile.clone())
    }
}

impl ThreadPoolBulkhead {
    /// # Panics
    ///
    /// If the pool plus its queue exceeds [`Semaphore::MAX_PERMITS`];
    /// validated configuration never does.
    pub fn new(name: impl Into<String>, profile: BulkheadProfile) -> Self {
        let capacity = profile
            .max_thread_pool_size
            .saturating_add(profile.queue_capacity);
        Self {
            name: name.into(),
            admission: Arc::new(Semaphore::new(capacity)),
            workers: Arc::new(Semaphore::new(profile.max_thread_pool_size)),
            profile,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_thread_pool_size(&self) -> usize {
        self.profile.max_thread_pool_size
    }

    pub fn queue_capacity(&self) -> usize {
        self.profile.queue_capacity
    }

    pub fn stats(&self) -> BulkheadStats {
        self.counters.snapshot(self.admission.available_permits())
    }

    /// Run `work` on a pool worker and wait for its output.
    ///
    /// The slot is held by the worker task, so it stays occupied until the
    /// work ends even if the caller stops waiting.
    pub async fn execute<F>(&self, work: F) -> Result<F::Output, BulkheadError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let Ok(admitted) = self.admission.clone().try_acquire_owned() else {
            self.counters.rejected.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                name = %self.name,
                max_thread_pool_size = self.profile.max_thread_pool_size,
                queue_capacity = self.profile.queue_capacity,
                "Thread pool bulkhead full, call rejected"
            );
            return Err(BulkheadError::Full);
        };
        self.counters.admitted.fetch_add(1, Ordering::Relaxed);

        let workers = self.workers.clone();
        let counters = self.counters.clone();
        let handle = tokio::spawn(async move {
            let _release = Release(counters);
            let _admitted = admitted;
            // The worker semaphore is never closed.
            let _worker = workers.acquire_owned().await.ok();
            work.await
        });

        match handle.await {
            Ok(output) => Ok(output),
            Err(join_error) if join_error.is_panic() => {
                std::panic::resume_unwind(join_error.into_panic())
            }
            Err(_) => {
                tracing::warn!(name = %self.name, "Bulkhead worker cancelled");
                Err(BulkheadError::Interrupted)
            }
        }
    }
}

struct Release(Arc<Counters>);

impl Drop for Release {
    fn drop(&mut self) {
        self.0.released.fetch_add(1, Ordering::Relaxed);
    }
}
