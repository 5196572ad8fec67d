//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML/JSON)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ResilienceConfig (validated, immutable)
//!     → swapped into the factory via ArcSwap
//!
//! Per protected call:
//!     resolver.rs picks one profile per policy kind
//!     (call name → group name → default)
//!
//! On reload:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → factory.reload() swaps the snapshot
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Reloads only affect policy instances created afterwards

pub mod loader;
pub mod resolver;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use resolver::{ConfigResolver, IsolationStrategy, ProfileSource, Resolved, ResolvedConfig};
pub use schema::{
    BulkheadKind, BulkheadProfile, CircuitBreakerProfile, ObservabilityConfig, ProfileSet,
    ResilienceConfig, TimeLimiterProfile,
};
pub use validation::{validate_config, ValidationError};
