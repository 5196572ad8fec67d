//! Per-call layer composition.
//!
//! A protected call is decorated fresh on every `run`: the caller's work is
//! folded through an ordered list of layers, innermost first.
//!
//! ```text
//! circuit breaker   (admission + outcome recording)
//!   └─ bulkhead     (slot held for the rest of the call)
//!       └─ time limiter (deadline covers only the work)
//!           └─ work
//! ```
//!
//! The first layer to fail decides the cause; outer layers pass it on
//! unchanged, so the innermost failure is what callers see.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::bulkhead::{BulkheadError, Isolation};
use crate::error::CallError;
use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::resilience::time_limiter::{LimitError, TimeLimiter};

/// A decorated, not yet started protected call.
pub type Executable<T, E> = Box<dyn FnOnce() -> BoxFuture<'static, Result<T, CallError<E>>> + Send>;

/// One decoration stage.
#[derive(Debug, Clone)]
pub enum Layer {
    TimeLimiter(Arc<TimeLimiter>),
    Bulkhead(Isolation),
    CircuitBreaker(Arc<CircuitBreaker>),
}

/// Lift the caller's work into an executable whose errors are [`CallError::Failed`].
pub fn executable<T, E, F, Fut>(work: F) -> Executable<T, E>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    Box::new(move || work().map(|r| r.map_err(CallError::Failed)).boxed())
}

/// Fold `layers` (innermost first) around `inner`.
pub fn decorate<T, E>(name: &Arc<str>, layers: &[Layer], inner: Executable<T, E>) -> Executable<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    layers
        .iter()
        .fold(inner, |inner, layer| layer.decorate(name.clone(), inner))
}

impl Layer {
    pub fn decorate<T, E>(&self, name: Arc<str>, inner: Executable<T, E>) -> Executable<T, E>
    where
        T: Send + 'static,
        E: Send + 'static,
    {
        match self {
            Layer::TimeLimiter(limiter) => {
                let limiter = limiter.clone();
                Box::new(move || {
                    async move {
                        match limiter.execute(inner()).await {
                            Ok(outcome) => outcome,
                            Err(LimitError::Elapsed { after }) => Err(CallError::TimedOut {
                                name: name.to_string(),
                                after,
                            }),
                            Err(LimitError::Interrupted) => Err(CallError::Interrupted {
                                name: name.to_string(),
                            }),
                        }
                    }
                    .boxed()
                })
            }
            Layer::Bulkhead(isolation) => {
                let isolation = isolation.clone();
                Box::new(move || {
                    async move {
                        match isolation.execute(inner()).await {
                            Ok(outcome) => outcome,
                            Err(BulkheadError::Full) => Err(CallError::BulkheadFull {
                                name: name.to_string(),
                            }),
                            Err(BulkheadError::Interrupted) => Err(CallError::Interrupted {
                                name: name.to_string(),
                            }),
                        }
                    }
                    .boxed()
                })
            }
            Layer::CircuitBreaker(breaker) => {
                let breaker = breaker.clone();
                Box::new(move || {
                    async move {
                        let permission = breaker.try_acquire_permission().map_err(|rejected| {
                            CallError::CircuitOpen {
                                name: name.to_string(),
                                state: rejected.state,
                            }
                        })?;

                        let started = Instant::now();
                        let outcome = inner().await;
                        match &outcome {
                            Ok(_) => permission.on_success(started.elapsed()),
                            Err(_) => permission.on_error(started.elapsed()),
                        }
                        outcome
                    }
                    .boxed()
                })
            }
        }
    }
}
