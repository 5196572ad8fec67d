//! Resilience policies.
//!
//! # Data Flow
//! ```text
//! Protected call:
//!     → circuit_breaker.rs (admit or fail fast, record outcome)
//!     → time_limiter.rs (enforce the call deadline)
//!     → registry.rs keeps one instance of each per call name
//! ```
//!
//! # Design Decisions
//! - Policies are plain thread-safe values behind `Arc`; each one guards
//!   its own state
//! - Registries are injected, so tests can use isolated instances
//! - Policies only expose admission/execution; composition lives in `factory`

pub mod circuit_breaker;
pub mod registry;
pub mod time_limiter;

pub use circuit_breaker::{CallNotPermitted, CircuitBreaker, CircuitState, Permission, StateTransition};
pub use registry::{Policy, Registry};
pub use time_limiter::{LimitError, TimeLimiter};
