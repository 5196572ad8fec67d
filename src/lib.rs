//! Resilient protected calls.
//!
//! Runs arbitrary async work under a circuit breaker, an optional bulkhead
//! and a time limiter, with an optional fallback for any failure.
//!
//! ```text
//!   caller ──create(name, group?)──▶ CircuitBreakerFactory
//!                                      │ config resolver (call → group → default)
//!                                      │ registries (one policy per name)
//!                                      ▼
//!   caller ──run(work[, fallback])──▶ ProtectedCall
//!                                      │ circuit breaker
//!                                      │   └─ bulkhead (semaphore | worker pool)
//!                                      │        └─ time limiter
//!                                      │             └─ work
//!                                      ▼
//!                        value | CallError | fallback(CallError)
//! ```

// Core
pub mod config;
pub mod error;
pub mod factory;

// Policies
pub mod bulkhead;
pub mod resilience;

// Cross-cutting concerns
pub mod observability;

pub use bulkhead::BulkheadProvider;
pub use config::ResilienceConfig;
pub use error::{CallError, FailureKind};
pub use factory::{CircuitBreakerFactory, ProtectedCall};
