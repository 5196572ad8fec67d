//! Bulkhead (concurrency isolation) subsystem.
//!
//! # Data Flow
//! ```text
//! ProtectedCall::run
//!     → provider.rs (strategy already resolved; memoized handle per call name)
//!     → semaphore.rs   (permit on the caller's task, wait up to max_wait)
//!       or thread_pool.rs (bounded queue admission, work moved to a worker task)
//!     → inner layers run while the slot is held
//!     → slot released on drop: success, failure, panic, cancellation
//! ```
//!
//! # Design Decisions
//! - Rejection is a distinct error, never a silent drop
//! - Slots are RAII guards, so no exit path can leak one
//! - One bulkhead instance per protected-call name, never per group

use std::sync::atomic::{AtomicU64, Ordering};

pub mod provider;
pub mod semaphore;
pub mod thread_pool;

pub use provider::{BulkheadProvider, Isolation};
pub use semaphore::SemaphoreBulkhead;
pub use thread_pool::ThreadPoolBulkhead;

/// Why a bulkhead produced no output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkheadError {
    /// No slot was available within the wait budget.
    Full,
    /// The worker task was cancelled before finishing.
    Interrupted,
}

/// Point-in-time counters for one bulkhead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BulkheadStats {
    /// Calls that may still be admitted right now.
    pub available: usize,
    pub admitted: u64,
    pub rejected: u64,
    /// Slots given back; equals `admitted` once no call is in flight.
    pub released: u64,
}

#[derive(Debug, Default)]
struct Counters {
    admitted: AtomicU64,
    rejected: AtomicU64,
    released: AtomicU64,
}

impl Counters {
    fn snapshot(&self, available: usize) -> BulkheadStats {
        BulkheadStats {
            available,
            admitted: self.admitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
        }
    }
}
