//! Shared utilities for integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use resilient_call::{BulkheadProvider, CircuitBreakerFactory, ResilienceConfig};

/// Error returned by failing work in tests.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct Boom(pub &'static str);

/// Factory over fresh registries, no bulkhead provider.
pub fn factory(config: ResilienceConfig) -> CircuitBreakerFactory {
    CircuitBreakerFactory::with_config(Arc::default(), Arc::default(), None, config)
        .expect("valid test config")
}

/// Factory over fresh registries with a bulkhead provider.
pub fn factory_with_bulkheads(config: ResilienceConfig) -> CircuitBreakerFactory {
    CircuitBreakerFactory::with_config(
        Arc::default(),
        Arc::default(),
        Some(BulkheadProvider::default()),
        config,
    )
    .expect("valid test config")
}

/// Counts how often work actually ran.
#[derive(Debug, Clone, Default)]
pub struct Runs(Arc<AtomicUsize>);

#[allow(dead_code)]
impl Runs {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    /// Work that records the run and returns `value`.
    pub fn succeed(
        &self,
        value: &'static str,
    ) -> impl FnOnce() -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<String, Boom>> + Send>>
           + Send
           + 'static {
        let runs = self.0.clone();
        move || {
            Box::pin(async move {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(value.to_string())
            })
        }
    }

    /// Work that records the run and fails.
    pub fn fail(
        &self,
    ) -> impl FnOnce() -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<String, Boom>> + Send>>
           + Send
           + 'static {
        let runs = self.0.clone();
        move || {
            Box::pin(async move {
                runs.fetch_add(1, Ordering::SeqCst);
                Err(Boom("boom"))
            })
        }
    }

    /// Work that records the run and sleeps for `delay` before succeeding.
    pub fn sleep(
        &self,
        delay: Duration,
    ) -> impl FnOnce() -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<String, Boom>> + Send>>
           + Send
           + 'static {
        let runs = self.0.clone();
        move || {
            Box::pin(async move {
                runs.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(delay).await;
                Ok("slow".to_string())
            })
        }
    }
}
