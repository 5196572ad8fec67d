//! Bulkhead provider: picks and memoizes the isolation handle for a call.

use std::future::Future;
use std::sync::Arc;

use crate::bulkhead::{BulkheadError, SemaphoreBulkhead, ThreadPoolBulkhead};
use crate::config::{BulkheadProfile, IsolationStrategy};
use crate::factory::compose::{Executable, Layer};
use crate::resilience::registry::Registry;

/// The isolation applied to one protected call.
#[derive(Debug, Clone)]
pub enum Isolation {
    None,
    Semaphore(Arc<SemaphoreBulkhead>),
    ThreadPool(Arc<ThreadPoolBulkhead>),
}

impl Isolation {
    pub fn strategy(&self) -> IsolationStrategy {
        match self {
            Isolation::None => IsolationStrategy::None,
            Isolation::Semaphore(_) => IsolationStrategy::Semaphore,
            Isolation::ThreadPool(_) => IsolationStrategy::ThreadPool,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Isolation::None)
    }

    /// Run `work` inside this isolation context.
    pub async fn execute<F>(&self, work: F) -> Result<F::Output, BulkheadError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        match self {
            Isolation::None => Ok(work.await),
            Isolation::Semaphore(bulkhead) => bulkhead.execute(work).await,
            Isolation::ThreadPool(bulkhead) => bulkhead.execute(work).await,
        }
    }
}

/// Owns the two bulkhead registries and hands out isolation handles.
#[derive(Debug, Clone, Default)]
pub struct BulkheadProvider {
    thread_pools: Arc<Registry<ThreadPoolBulkhead>>,
    semaphores: Arc<Registry<SemaphoreBulkhead>>,
}

impl BulkheadProvider {
    pub fn new(
        thread_pools: Arc<Registry<ThreadPoolBulkhead>>,
        semaphores: Arc<Registry<SemaphoreBulkhead>>,
    ) -> Self {
        Self {
            thread_pools,
            semaphores,
        }
    }

    pub fn thread_pool_registry(&self) -> &Arc<Registry<ThreadPoolBulkhead>> {
        &self.thread_pools
    }

    pub fn semaphore_registry(&self) -> &Arc<Registry<SemaphoreBulkhead>> {
        &self.semaphores
    }

    /// Obtain (or create) the handle for `name` under `strategy`.
    pub fn isolation(&self, name: &str, strategy: IsolationStrategy, profile: &BulkheadProfile) -> Isolation {
        match strategy {
            IsolationStrategy::None => Isolation::None,
            IsolationStrategy::Semaphore => {
                Isolation::Semaphore(self.semaphores.get_or_create(name, profile))
            }
            IsolationStrategy::ThreadPool => {
                Isolation::ThreadPool(self.thread_pools.get_or_create(name, profile))
            }
        }
    }

    /// Wrap `inner` so it runs inside the isolation chosen for `name`.
    ///
    /// The provider holds no configuration, so it does not see the call's
    /// group. Callers pass the strategy and profile already resolved through
    /// call name, then group, then default (see
    /// [`crate::factory::CircuitBreakerFactory::resolve`]). Instances are keyed
    /// by call name alone, so grouped and ungrouped calls share one bulkhead.
    pub fn wrap<T, E>(
        &self,
        name: &str,
        strategy: IsolationStrategy,
        profile: &BulkheadProfile,
        inner: Executable<T, E>,
    ) -> Executable<T, E>
    where
        T: Send + 'static,
        E: Send + 'static,
    {
        match self.isolation(name, strategy, profile) {
            Isolation::None => inner,
            isolation => Layer::Bulkhead(isolation).decorate(Arc::from(name), inner),
        }
    }
}
