//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (policy creation, state transitions,
//!       rejections, timeouts, fallbacks)
//!     → logging.rs installs the subscriber that renders them
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - The library never installs a subscriber on its own

pub mod logging;

pub use logging::{init_logging, LoggingError};
