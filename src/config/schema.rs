//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for protected calls.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the circuit breaker factory.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Never wrap calls in a bulkhead, even when a provider is available.
    pub disable_thread_pool: bool,

    /// Skip the time limiter layer entirely.
    pub disable_time_limiter: bool,

    /// Bulkhead profiles without an explicit strategy use a semaphore
    /// instead of a bounded worker pool.
    pub semaphore_default_bulkhead: bool,

    /// Circuit breaker profiles.
    pub circuit_breaker: ProfileSet<CircuitBreakerProfile>,

    /// Time limiter profiles.
    pub time_limiter: ProfileSet<TimeLimiterProfile>,

    /// Bulkhead profiles.
    pub bulkhead: ProfileSet<BulkheadProfile>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// A default profile plus named overrides for one policy kind.
///
/// Override keys are either protected-call names or group names.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ProfileSet<P> {
    /// Profile used when no named override matches.
    pub default: P,

    /// Named overrides.
    pub instances: HashMap<String, P>,
}

impl<P> ProfileSet<P> {
    /// Look up a named override.
    pub fn get(&self, name: &str) -> Option<&P> {
        self.instances.get(name)
    }

    /// Insert or replace a named override.
    pub fn insert(&mut self, name: impl Into<String>, profile: P) {
        self.instances.insert(name.into(), profile);
    }
}

/// Circuit breaker settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CircuitBreakerProfile {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,

    /// Time spent open before trial calls are admitted, in milliseconds.
    pub wait_in_open_ms: u64,

    /// Successful trial calls required to close the circuit again.
    pub permitted_calls_in_half_open: u32,
}

impl CircuitBreakerProfile {
    pub fn wait_in_open(&self) -> Duration {
        Duration::from_millis(self.wait_in_open_ms)
    }
}

impl Default for CircuitBreakerProfile {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            wait_in_open_ms: 60_000,
            permitted_calls_in_half_open: 3,
        }
    }
}

/// Time limiter settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimeLimiterProfile {
    /// Maximum execution time of the work in milliseconds.
    pub timeout_ms: u64,

    /// Drop the work on expiry. When false the work keeps running
    /// in the background and only the caller stops waiting.
    pub cancel_running_future: bool,
}

impl TimeLimiterProfile {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for TimeLimiterProfile {
    fn default() -> Self {
        Self {
            timeout_ms: 1_000,
            cancel_running_future: true,
        }
    }
}

/// Concrete isolation mechanism for a bulkhead profile.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BulkheadKind {
    Semaphore,
    ThreadPool,
}

/// Bulkhead settings.
///
/// Semaphore bulkheads use `max_concurrent_calls` and `max_wait_ms`;
/// thread-pool bulkheads use `max_thread_pool_size` and `queue_capacity`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct BulkheadProfile {
    /// Isolation mechanism; falls back to the global default when unset.
    pub strategy: Option<BulkheadKind>,

    pub max_concurrent_calls: usize,

    /// How long a semaphore caller may wait for a permit (0 = reject at once).
    pub max_wait_ms: u64,

    pub max_thread_pool_size: usize,

    /// Calls allowed to wait for a free worker.
    pub queue_capacity: usize,
}

impl BulkheadProfile {
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }
}

impl Default for BulkheadProfile {
    fn default() -> Self {
        Self {
            strategy: None,
            max_concurrent_calls: 25,
            max_wait_ms: 0,
            max_thread_pool_size: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            queue_capacity: 100,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}
