//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, capacities > 0)
//! - Keep bulkhead capacities within what a semaphore can hold
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ResilienceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;
use tokio::sync::Semaphore;

use crate::config::schema::{
    BulkheadKind, BulkheadProfile, CircuitBreakerProfile, ProfileSet, ResilienceConfig,
    TimeLimiterProfile,
};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{profile}: {field} must be greater than zero")]
    Zero { profile: String, field: &'static str },

    #[error("{profile}: {field} must not exceed {max}")]
    TooLarge {
        profile: String,
        field: &'static str,
        max: usize,
    },

    #[error("unknown log level '{0}'")]
    LogLevel(String),
}

/// Validate a configuration, collecting every error found.
pub fn validate_config(config: &ResilienceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for_each_profile(&config.circuit_breaker, "circuit_breaker", |path, p| {
        check_circuit_breaker(path, p, &mut errors)
    });
    for_each_profile(&config.time_limiter, "time_limiter", |path, p| {
        check_time_limiter(path, p, &mut errors)
    });
    for_each_profile(&config.bulkhead, "bulkhead", |path, p| {
        check_bulkhead(path, p, &mut errors)
    });

    let level = config.observability.log_level.to_ascii_lowercase();
    if !matches!(level.as_str(), "trace" | "debug" | "info" | "warn" | "error" | "off") {
        errors.push(ValidationError::LogLevel(config.observability.log_level.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn for_each_profile<P>(set: &ProfileSet<P>, kind: &str, mut check: impl FnMut(String, &P)) {
    check(format!("{}.default", kind), &set.default);

    let mut names: Vec<_> = set.instances.keys().collect();
    names.sort();
    for name in names {
        check(format!("{}.instances.{}", kind, name), &set.instances[name]);
    }
}

fn check_circuit_breaker(path: String, p: &CircuitBreakerProfile, errors: &mut Vec<ValidationError>) {
    if p.failure_threshold == 0 {
        errors.push(zero(&path, "failure_threshold"));
    }
    if p.permitted_calls_in_half_open == 0 {
        errors.push(zero(&path, "permitted_calls_in_half_open"));
    }
}

fn check_time_limiter(path: String, p: &TimeLimiterProfile, errors: &mut Vec<ValidationError>) {
    if p.timeout_ms == 0 {
        errors.push(zero(&path, "timeout_ms"));
    }
}

fn check_bulkhead(path: String, p: &BulkheadProfile, errors: &mut Vec<ValidationError>) {
    // Only the settings of the configured mechanism matter; an unset
    // strategy may resolve either way.
    let semaphore = p.strategy != Some(BulkheadKind::ThreadPool);
    let thread_pool = p.strategy != Some(BulkheadKind::Semaphore);

    if semaphore {
        if p.max_concurrent_calls == 0 {
            errors.push(zero(&path, "max_concurrent_calls"));
        } else if p.max_concurrent_calls > Semaphore::MAX_PERMITS {
            errors.push(too_large(&path, "max_concurrent_calls"));
        }
    }

    if thread_pool {
        // Admission holds running plus queued calls in one semaphore.
        let admitted = p.max_thread_pool_size.checked_add(p.queue_capacity);
        if p.max_thread_pool_size == 0 {
            errors.push(zero(&path, "max_thread_pool_size"));
        } else if p.max_thread_pool_size > Semaphore::MAX_PERMITS {
            errors.push(too_large(&path, "max_thread_pool_size"));
        } else if admitted.map_or(true, |total| total > Semaphore::MAX_PERMITS) {
            errors.push(too_large(&path, "max_thread_pool_size + queue_capacity"));
        }
    }
}

fn too_large(path: &str, field: &'static str) -> ValidationError {
    ValidationError::TooLarge {
        profile: path.to_string(),
        field,
        max: Semaphore::MAX_PERMITS,
    }
}

fn zero(path: &str, field: &'static str) -> ValidationError {
    ValidationError::Zero {
        profile: path.to_string(),
        field,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ResilienceConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ResilienceConfig::default();
        config.time_limiter.default.timeout_ms = 0;
        config.circuit_breaker.insert(
            "payments",
            CircuitBreakerProfile {
                failure_threshold: 0,
                ..Default::default()
            },
        );
        config.observability.log_level = "loud".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::Zero {
            profile: "circuit_breaker.instances.payments".into(),
            field: "failure_threshold",
        }));
        assert!(errors.contains(&ValidationError::Zero {
            profile: "time_limiter.default".into(),
            field: "timeout_ms",
        }));
        assert!(errors.contains(&ValidationError::LogLevel("loud".into())));
    }

    #[test]
    fn test_bulkhead_checks_only_selected_mechanism() {
        let mut config = ResilienceConfig::default();
        config.bulkhead.insert(
            "reports",
            BulkheadProfile {
                strategy: Some(BulkheadKind::Semaphore),
                max_thread_pool_size: 0,
                ..Default::default()
            },
        );
        assert!(validate_config(&config).is_ok());

        config.bulkhead.insert(
            "reports",
            BulkheadProfile {
                strategy: Some(BulkheadKind::Semaphore),
                max_concurrent_calls: 0,
                ..Default::default()
            },
        );
        assert_eq!(validate_config(&config).unwrap_err().len(), 1);
    }

    #[test]
    fn test_bulkhead_capacity_upper_bounds() {
        let mut config = ResilienceConfig::default();
        config.bulkhead.default = BulkheadProfile {
            strategy: Some(BulkheadKind::Semaphore),
            max_concurrent_calls: Semaphore::MAX_PERMITS + 1,
            ..Default::default()
        };
        config.bulkhead.insert(
            "pool",
            BulkheadProfile {
                strategy: Some(BulkheadKind::ThreadPool),
                max_thread_pool_size: Semaphore::MAX_PERMITS + 1,
                ..Default::default()
            },
        );
        config.bulkhead.insert(
            "queue",
            BulkheadProfile {
                strategy: Some(BulkheadKind::ThreadPool),
                max_thread_pool_size: 4,
                queue_capacity: usize::MAX,
                ..Default::default()
            },
        );

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                too_large("bulkhead.default", "max_concurrent_calls"),
                too_large("bulkhead.instances.pool", "max_thread_pool_size"),
                too_large("bulkhead.instances.queue", "max_thread_pool_size + queue_capacity"),
            ]
        );

        config.bulkhead.default.max_concurrent_calls = Semaphore::MAX_PERMITS;
        config.bulkhead.insert(
            "pool",
            BulkheadProfile {
                strategy: Some(BulkheadKind::ThreadPool),
                max_thread_pool_size: 1,
                queue_capacity: Semaphore::MAX_PERMITS - 1,
                ..Default::default()
            },
        );
        config.bulkhead.instances.remove("queue");
        assert!(validate_config(&config).is_ok());
    }
}
