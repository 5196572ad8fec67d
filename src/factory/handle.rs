//! The handle callers run protected work through.

use std::future::Future;
use std::sync::Arc;

use crate::bulkhead::Isolation;
use crate::config::IsolationStrategy;
use crate::error::CallError;
use crate::factory::compose::{decorate, executable, Layer};
use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::resilience::time_limiter::TimeLimiter;

/// A named protected call with its resolved policies.
///
/// Cheap to clone and safe to share: every clone and every concurrent `run`
/// goes through the same policy instances.
#[derive(Debug, Clone)]
pub struct ProtectedCall {
    name: Arc<str>,
    group: Option<Arc<str>>,
    circuit_breaker: Arc<CircuitBreaker>,
    time_limiter: Option<Arc<TimeLimiter>>,
    isolation: Isolation,
}

impl ProtectedCall {
    pub(crate) fn new(
        name: &str,
        group: Option<&str>,
        circuit_breaker: Arc<CircuitBreaker>,
        time_limiter: Option<Arc<TimeLimiter>>,
        isolation: Isolation,
    ) -> Self {
        Self {
            name: Arc::from(name),
            group: group.map(Arc::from),
            circuit_breaker,
            time_limiter,
            isolation,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    pub fn circuit_breaker(&self) -> &Arc<CircuitBreaker> {
        &self.circuit_breaker
    }

    pub fn time_limiter(&self) -> Option<&Arc<TimeLimiter>> {
        self.time_limiter.as_ref()
    }

    pub fn isolation(&self) -> &Isolation {
        &self.isolation
    }

    pub fn isolation_strategy(&self) -> IsolationStrategy {
        self.isolation.strategy()
    }

    /// Run `work` under every policy; any failure is returned as is.
    pub async fn run<T, E, F, Fut>(&self, work: F) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let decorated = decorate(&self.name, &self.layers(), executable(work));
        decorated().await
    }

    /// Run `work` under every policy, turning any failure into
    /// `fallback(cause)`.
    ///
    /// The fallback runs at most once. Its own error is returned unchanged.
    pub async fn run_with_fallback<T, E, F, Fut, FB>(&self, work: F, fallback: FB) -> Result<T, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
        FB: FnOnce(CallError<E>) -> Result<T, E>,
    {
        match self.run(work).await {
            Ok(value) => Ok(value),
            Err(cause) => {
                tracing::debug!(name = %self.name, cause = ?cause.kind(), "Protected call failed, using fallback");
                fallback(cause)
            }
        }
    }

    /// Innermost first.
    fn layers(&self) -> Vec<Layer> {
        let mut layers = Vec::with_capacity(3);
        if let Some(limiter) = &self.time_limiter {
            layers.push(Layer::TimeLimiter(limiter.clone()));
        }
        if !self.isolation.is_none() {
            layers.push(Layer::Bulkhead(self.isolation.clone()));
        }
        layers.push(Layer::CircuitBreaker(self.circuit_breaker.clone()));
        layers
    }
}
