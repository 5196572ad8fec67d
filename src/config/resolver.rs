//! Profile resolution for a protected call.
//!
//! For each policy kind independently the lookup order is:
//! call name, then group name, then the kind's default profile.
//! Resolution never fails.

use crate::config::schema::{
    BulkheadKind, BulkheadProfile, CircuitBreakerProfile, ProfileSet, ResilienceConfig,
    TimeLimiterProfile,
};

/// Where a resolved profile came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileSource {
    Call(String),
    Group(String),
    Default,
}

/// A profile together with the key that selected it.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<P> {
    pub source: ProfileSource,
    pub profile: P,
}

/// How (and whether) a call is wrapped in a bulkhead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationStrategy {
    None,
    Semaphore,
    ThreadPool,
}

impl From<BulkheadKind> for IsolationStrategy {
    fn from(kind: BulkheadKind) -> Self {
        match kind {
            BulkheadKind::Semaphore => IsolationStrategy::Semaphore,
            BulkheadKind::ThreadPool => IsolationStrategy::ThreadPool,
        }
    }
}

/// Everything needed to build the policies of one protected call.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub circuit_breaker: Resolved<CircuitBreakerProfile>,
    /// `None` when time limiting is globally disabled.
    pub time_limiter: Option<Resolved<TimeLimiterProfile>>,
    pub bulkhead: Resolved<BulkheadProfile>,
    pub isolation: IsolationStrategy,
}

/// Resolves profiles against one configuration snapshot.
#[derive(Debug, Clone, Copy)]
pub struct ConfigResolver<'a> {
    config: &'a ResilienceConfig,
    bulkhead_available: bool,
}

impl<'a> ConfigResolver<'a> {
    /// `bulkhead_available` is false when no bulkhead provider was supplied.
    pub fn new(config: &'a ResilienceConfig, bulkhead_available: bool) -> Self {
        Self {
            config,
            bulkhead_available,
        }
    }

    pub fn resolve(&self, name: &str, group: Option<&str>) -> ResolvedConfig {
        let bulkhead = lookup(&self.config.bulkhead, name, group);
        let isolation = self.isolation_for(&bulkhead.profile);

        let time_limiter = if self.config.disable_time_limiter {
            None
        } else {
            Some(lookup(&self.config.time_limiter, name, group))
        };

        ResolvedConfig {
            circuit_breaker: lookup(&self.config.circuit_breaker, name, group),
            time_limiter,
            bulkhead,
            isolation,
        }
    }

    fn isolation_for(&self, profile: &BulkheadProfile) -> IsolationStrategy {
        if self.config.disable_thread_pool || !self.bulkhead_available {
            return IsolationStrategy::None;
        }

        match profile.strategy {
            Some(kind) => kind.into(),
            None if self.config.semaphore_default_bulkhead => IsolationStrategy::Semaphore,
            None => IsolationStrategy::ThreadPool,
        }
    }
}

fn lookup<P: Clone>(set: &ProfileSet<P>, name: &str, group: Option<&str>) -> Resolved<P> {
    if let Some(profile) = set.get(name) {
        return Resolved {
            source: ProfileSource::Call(name.to_string()),
            profile: profile.clone(),
        };
    }

    if let Some((group, profile)) = group.and_then(|g| set.get(g).map(|p| (g, p))) {
        return Resolved {
            source: ProfileSource::Group(group.to_string()),
            profile: profile.clone(),
        };
    }

    Resolved {
        source: ProfileSource::Default,
        profile: set.default.clone(),
    }
}
