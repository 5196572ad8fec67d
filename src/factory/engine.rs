//! The circuit breaker factory.
//!
//! # Responsibilities
//! - Resolve the profiles for a protected call (call → group → default)
//! - Obtain or create its circuit breaker, time limiter and bulkhead
//! - Apply per-name customizers to freshly created policies
//! - Hold the live configuration and accept validated reloads
//! - Follow a watched configuration file
//!
//! # Design Decisions
//! - Registries are injected, never global, so tests stay isolated
//! - Handles are built eagerly but run lazily; work is decorated per call
//! - Reconfiguration reaches only policies created after it
//! - A rejected configuration leaves the live one untouched

use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use dashmap::DashMap;
use notify::RecommendedWatcher;

use crate::bulkhead::{BulkheadProvider, Isolation};
use crate::config::watcher::ConfigWatcher;
use crate::config::{
    validate_config, BulkheadProfile, CircuitBreakerProfile, ConfigResolver, ResilienceConfig,
    ResolvedConfig, TimeLimiterProfile, ValidationError,
};
use crate::factory::handle::ProtectedCall;
use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::resilience::registry::Registry;
use crate::resilience::time_limiter::TimeLimiter;

/// Hook run once on a policy when its registry first creates it.
pub type Customizer<P> = Arc<dyn Fn(&P) + Send + Sync>;

/// Profiles to install for a set of names (or as defaults).
/// `None` leaves that kind untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileOverrides {
    pub circuit_breaker: Option<CircuitBreakerProfile>,
    pub time_limiter: Option<TimeLimiterProfile>,
    pub bulkhead: Option<BulkheadProfile>,
}

/// Creates [`ProtectedCall`] handles over shared policy registries.
pub struct CircuitBreakerFactory {
    circuit_breakers: Arc<Registry<CircuitBreaker>>,
    time_limiters: Arc<Registry<TimeLimiter>>,
    bulkhead_provider: Option<BulkheadProvider>,
    config: ArcSwap<ResilienceConfig>,
    circuit_breaker_customizers: DashMap<String, Customizer<CircuitBreaker>>,
    time_limiter_customizers: DashMap<String, Customizer<TimeLimiter>>,
}

impl CircuitBreakerFactory {
    /// Create a factory with the default configuration.
    pub fn new(
        circuit_breakers: Arc<Registry<CircuitBreaker>>,
        time_limiters: Arc<Registry<TimeLimiter>>,
        bulkhead_provider: Option<BulkheadProvider>,
    ) -> Self {
        Self::from_parts(
            circuit_breakers,
            time_limiters,
            bulkhead_provider,
            ResilienceConfig::default(),
        )
    }

    /// Create a factory with `config`, rejecting it if it does not validate.
    pub fn with_config(
        circuit_breakers: Arc<Registry<CircuitBreaker>>,
        time_limiters: Arc<Registry<TimeLimiter>>,
        bulkhead_provider: Option<BulkheadProvider>,
        config: ResilienceConfig,
    ) -> Result<Self, Vec<ValidationError>> {
        validate_config(&config)?;
        Ok(Self::from_parts(
            circuit_breakers,
            time_limiters,
            bulkhead_provider,
            config,
        ))
    }

    fn from_parts(
        circuit_breakers: Arc<Registry<CircuitBreaker>>,
        time_limiters: Arc<Registry<TimeLimiter>>,
        bulkhead_provider: Option<BulkheadProvider>,
        config: ResilienceConfig,
    ) -> Self {
        Self {
            circuit_breakers,
            time_limiters,
            bulkhead_provider,
            config: ArcSwap::from_pointee(config),
            circuit_breaker_customizers: DashMap::new(),
            time_limiter_customizers: DashMap::new(),
        }
    }

    /// Handle for a call with no group.
    pub fn create(&self, name: &str) -> ProtectedCall {
        self.build(name, None)
    }

    /// Handle for a call whose profiles fall back to `group`'s.
    pub fn create_in_group(&self, name: &str, group: &str) -> ProtectedCall {
        self.build(name, Some(group))
    }

    /// Profiles that a `create` for this identity would use right now.
    pub fn resolve(&self, name: &str, group: Option<&str>) -> ResolvedConfig {
        let config = self.config.load();
        ConfigResolver::new(&config, self.bulkhead_provider.is_some()).resolve(name, group)
    }

    fn build(&self, name: &str, group: Option<&str>) -> ProtectedCall {
        let resolved = self.resolve(name, group);

        let circuit_breaker = self.circuit_breakers.get_or_create_with(
            name,
            &resolved.circuit_breaker.profile,
            |breaker| {
                if let Some(customize) = find(&self.circuit_breaker_customizers, name) {
                    customize(breaker);
                }
            },
        );

        let time_limiter = resolved.time_limiter.as_ref().map(|tl| {
            self.time_limiters.get_or_create_with(name, &tl.profile, |limiter| {
                if let Some(customize) = find(&self.time_limiter_customizers, name) {
                    customize(limiter);
                }
            })
        });

        let isolation = match &self.bulkhead_provider {
            Some(provider) => provider.isolation(name, resolved.isolation, &resolved.bulkhead.profile),
            None => Isolation::None,
        };

        tracing::debug!(
            name = %name,
            group = ?group,
            circuit_breaker_profile = ?resolved.circuit_breaker.source,
            isolation = ?isolation.strategy(),
            time_limited = time_limiter.is_some(),
            "Protected call resolved"
        );

        ProtectedCall::new(name, group, circuit_breaker, time_limiter, isolation)
    }

    /// Current configuration snapshot.
    pub fn config(&self) -> Arc<ResilienceConfig> {
        self.config.load_full()
    }

    /// Replace the whole configuration.
    pub fn reload(&self, config: ResilienceConfig) -> Result<(), Vec<ValidationError>> {
        validate_config(&config)?;
        self.config.store(Arc::new(config));
        tracing::info!("Resilience configuration reloaded");
        Ok(())
    }

    /// Reload from `path` whenever the file changes.
    ///
    /// Must be called inside a Tokio runtime. Updates stop when the returned
    /// watcher is dropped or the factory is.
    pub fn watch_config(self: &Arc<Self>, path: &Path) -> Result<RecommendedWatcher, notify::Error> {
        let (watcher, mut updates) = ConfigWatcher::new(path);
        let handle = watcher.run()?;

        let factory = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(config) = updates.recv().await {
                let Some(factory) = factory.upgrade() else {
                    break;
                };
                // The watcher only publishes validated files.
                if let Err(errors) = factory.reload(config) {
                    tracing::warn!(errors = ?errors, "Watched configuration rejected");
                }
            }
        });

        Ok(handle)
    }

    /// Install named profiles for each of `ids` (call or group names).
    pub fn configure(
        &self,
        ids: &[&str],
        overrides: ProfileOverrides,
    ) -> Result<(), Vec<ValidationError>> {
        self.update(|next| {
            for id in ids {
                if let Some(p) = &overrides.circuit_breaker {
                    next.circuit_breaker.insert(*id, p.clone());
                }
                if let Some(p) = &overrides.time_limiter {
                    next.time_limiter.insert(*id, p.clone());
                }
                if let Some(p) = &overrides.bulkhead {
                    next.bulkhead.insert(*id, p.clone());
                }
            }
        })
    }

    /// Replace the default profiles of the given kinds.
    pub fn configure_default(&self, overrides: ProfileOverrides) -> Result<(), Vec<ValidationError>> {
        self.update(|next| {
            if let Some(p) = &overrides.circuit_breaker {
                next.circuit_breaker.default = p.clone();
            }
            if let Some(p) = &overrides.time_limiter {
                next.time_limiter.default = p.clone();
            }
            if let Some(p) = &overrides.bulkhead {
                next.bulkhead.default = p.clone();
            }
        })
    }

    /// Apply `change` to a copy of the live config and swap it in if valid.
    fn update(&self, change: impl Fn(&mut ResilienceConfig)) -> Result<(), Vec<ValidationError>> {
        let mut outcome = Ok(());
        self.config.rcu(|current| {
            let mut next = ResilienceConfig::clone(current);
            change(&mut next);
            match validate_config(&next) {
                Ok(()) => {
                    outcome = Ok(());
                    Arc::new(next)
                }
                Err(errors) => {
                    outcome = Err(errors);
                    Arc::clone(current)
                }
            }
        });

        if let Err(errors) = &outcome {
            tracing::warn!(errors = ?errors, "Configuration change rejected");
        }
        outcome
    }

    /// Run `customizer` on each named circuit breaker when it is first created.
    pub fn add_circuit_breaker_customizer(
        &self,
        customizer: impl Fn(&CircuitBreaker) + Send + Sync + 'static,
        ids: &[&str],
    ) {
        let customizer: Customizer<CircuitBreaker> = Arc::new(customizer);
        for id in ids {
            self.circuit_breaker_customizers
                .insert(id.to_string(), customizer.clone());
        }
    }

    /// Run `customizer` on each named time limiter when it is first created.
    pub fn add_time_limiter_customizer(
        &self,
        customizer: impl Fn(&TimeLimiter) + Send + Sync + 'static,
        ids: &[&str],
    ) {
        let customizer: Customizer<TimeLimiter> = Arc::new(customizer);
        for id in ids {
            self.time_limiter_customizers
                .insert(id.to_string(), customizer.clone());
        }
    }

    pub fn circuit_breaker_registry(&self) -> &Arc<Registry<CircuitBreaker>> {
        &self.circuit_breakers
    }

    pub fn time_limiter_registry(&self) -> &Arc<Registry<TimeLimiter>> {
        &self.time_limiters
    }

    pub fn bulkhead_provider(&self) -> Option<&BulkheadProvider> {
        self.bulkhead_provider.as_ref()
    }
}

impl Default for CircuitBreakerFactory {
    fn default() -> Self {
        Self::new(Arc::default(), Arc::default(), None)
    }
}

impl std::fmt::Debug for CircuitBreakerFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerFactory")
            .field("circuit_breakers", &self.circuit_breakers)
            .field("time_limiters", &self.time_limiters)
            .field("bulkhead_provider", &self.bulkhead_provider.is_some())
            .finish()
    }
}

fn find<P>(customizers: &DashMap<String, Customizer<P>>, name: &str) -> Option<Customizer<P>> {
    customizers.get(name).map(|r| r.value().clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BulkheadKind, IsolationStrategy, ProfileSource};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_same_name_shares_policies() {
        let factory = CircuitBreakerFactory::default();
        let a = factory.create("foo");
        let b = factory.create_in_group("foo", "groupFoo");

        assert!(Arc::ptr_eq(a.circuit_breaker(), b.circuit_breaker()));
        assert!(Arc::ptr_eq(a.time_limiter().unwrap(), b.time_limiter().unwrap()));
        assert_eq!(factory.circuit_breaker_registry().len(), 1);
    }

    #[test]
    fn test_configure_group_profile() {
        let factory = CircuitBreakerFactory::default();
        factory.configure(
            &["groupFoo"],
            ProfileOverrides {
                time_limiter: Some(TimeLimiterProfile {
                    timeout_ms: 42,
                    ..Default::default()
                }),
                ..Default::default()
            },
        )
        .unwrap();

        let resolved = factory.resolve("foo", Some("groupFoo"));
        let tl = resolved.time_limiter.unwrap();
        assert_eq!(tl.source, ProfileSource::Group("groupFoo".into()));

        let call = factory.create_in_group("foo", "groupFoo");
        assert_eq!(call.time_limiter().unwrap().timeout_duration().as_millis(), 42);
    }

    #[test]
    fn test_reconfigure_does_not_touch_existing_instances() {
        let factory = CircuitBreakerFactory::default();
        let before = factory.create("foo");

        factory.configure_default(ProfileOverrides {
            circuit_breaker: Some(CircuitBreakerProfile {
                failure_threshold: 1,
                ..Default::default()
            }),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(before.circuit_breaker().profile().failure_threshold, 5);
        assert_eq!(factory.create("foo").circuit_breaker().profile().failure_threshold, 5);
        assert_eq!(factory.create("bar").circuit_breaker().profile().failure_threshold, 1);
    }

    #[test]
    fn test_customizer_runs_once_per_instance() {
        let factory = CircuitBreakerFactory::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        factory.add_circuit_breaker_customizer(
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
            &["foo"],
        );

        factory.create("foo");
        factory.create("foo");
        factory.create("bar");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_disabled_time_limiter_and_isolation() {
        let factory = CircuitBreakerFactory::with_config(
            Arc::default(),
            Arc::default(),
            Some(BulkheadProvider::default()),
            ResilienceConfig {
                disable_time_limiter: true,
                disable_thread_pool: true,
                ..Default::default()
            },
        )
        .unwrap();

        let call = factory.create("foo");
        assert!(call.time_limiter().is_none());
        assert_eq!(call.isolation_strategy(), IsolationStrategy::None);
        assert!(factory.time_limiter_registry().is_empty());
    }

    #[test]
    fn test_reload_swaps_config() {
        let factory = CircuitBreakerFactory::default();
        factory
            .reload(ResilienceConfig {
                semaphore_default_bulkhead: true,
                ..Default::default()
            })
            .unwrap();
        assert!(factory.config().semaphore_default_bulkhead);
    }

    fn zero_worker_pool() -> BulkheadProfile {
        BulkheadProfile {
            strategy: Some(BulkheadKind::ThreadPool),
            max_thread_pool_size: 0,
            queue_capacity: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_invalid_changes_keep_live_config() {
        let factory = CircuitBreakerFactory::default();
        let before = factory.config();

        let errors = factory
            .configure(
                &["reports"],
                ProfileOverrides {
                    bulkhead: Some(zero_worker_pool()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::Zero {
                profile: "bulkhead.instances.reports".into(),
                field: "max_thread_pool_size",
            }]
        );

        assert!(factory
            .configure_default(ProfileOverrides {
                time_limiter: Some(TimeLimiterProfile {
                    timeout_ms: 0,
                    ..Default::default()
                }),
                ..Default::default()
            })
            .is_err());

        let mut invalid = ResilienceConfig::default();
        invalid.bulkhead.default = zero_worker_pool();
        assert!(factory.reload(invalid.clone()).is_err());
        assert!(
            CircuitBreakerFactory::with_config(Arc::default(), Arc::default(), None, invalid)
                .is_err()
        );

        assert!(Arc::ptr_eq(&before, &factory.config()));
    }

    #[tokio::test]
    async fn test_watch_config_reloads_factory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resilience.toml");
        std::fs::write(&path, "semaphore_default_bulkhead = false\n").unwrap();

        let factory = Arc::new(CircuitBreakerFactory::default());
        let _watcher = factory.watch_config(&path).unwrap();

        std::fs::write(&path, "semaphore_default_bulkhead = true\n").unwrap();

        tokio::time::timeout(Duration::from_secs(10), async {
            while !factory.config().semaphore_default_bulkhead {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("watched change never reached the factory");
    }

    #[test]
    fn test_customizer_listener_sees_first_transition() {
        let factory = CircuitBreakerFactory::default();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        factory.add_circuit_breaker_customizer(
            move |breaker| {
                let sink = sink.clone();
                breaker.on_state_transition(move |t| sink.lock().unwrap().push(t.to));
            },
            &["foo"],
        );

        factory.create("foo").circuit_breaker().transition_to_forced_open();
        assert_eq!(*seen.lock().unwrap(), vec![crate::resilience::CircuitState::ForcedOpen]);
    }

    #[tokio::test]
    async fn test_wrap_with_group_resolved_profile() {
        let factory = CircuitBreakerFactory::new(
            Arc::default(),
            Arc::default(),
            Some(BulkheadProvider::default()),
        );
        factory
            .configure(
                &["batch"],
                ProfileOverrides {
                    bulkhead: Some(BulkheadProfile {
                        strategy: Some(BulkheadKind::Semaphore),
                        max_concurrent_calls: 1,
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            )
            .unwrap();

        let resolved = factory.resolve("job", Some("batch"));
        let provider = factory.bulkhead_provider().unwrap();
        let wrapped = provider.wrap(
            "job",
            resolved.isolation,
            &resolved.bulkhead.profile,
            crate::factory::compose::executable(|| async { Ok::<_, String>(7) }),
        );
        assert_eq!(wrapped().await.unwrap(), 7);

        let bulkhead = provider.semaphore_registry().find("job").unwrap();
        assert_eq!(bulkhead.max_concurrent_calls(), 1);
    }
}
