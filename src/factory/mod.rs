//! Protected-call composition subsystem.
//!
//! # Data Flow
//! ```text
//! factory.create(name) / create_in_group(name, group)
//!     → config::resolver (one profile per policy kind)
//!     → registries (get-or-create, memoized by call name)
//!     → ProtectedCall (handle over the shared policy instances)
//!
//! handle.run(work) / run_with_fallback(work, fallback)
//!     → compose.rs (time limiter → bulkhead → circuit breaker)
//!     → decorated executable awaited
//!     → value, or the innermost failure (or fallback(failure))
//! ```
//!
//! # Design Decisions
//! - Circuit breaker outermost: open circuits reject before taking a
//!   bulkhead slot or starting a timer
//! - Time limiter innermost: the deadline bounds execution, not queueing
//! - The engine holds no lock of its own; policies guard their own state

pub mod compose;
pub mod engine;
pub mod handle;

pub use engine::{CircuitBreakerFactory, Customizer, ProfileOverrides};
pub use compose::{Executable, Layer};
pub use handle::ProtectedCall;
