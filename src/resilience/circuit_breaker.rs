//! Circuit breaker for protected calls.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: callee assumed down, calls fail fast
//! - Half-Open: a limited number of trial calls test recovery
//! - Forced-Open: held open by an operator until reset
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= threshold
//! Open → Half-Open: first admission attempt after the open wait elapses
//! Half-Open → Closed: permitted trial calls all succeed
//! Half-Open → Open: any trial call fails
//! ```
//!
//! # Design Decisions
//! - One breaker per protected-call name (shared by every handle for that name)
//! - Fail fast in Open state (no waiting for the open wait to elapse)
//! - Every call outcome the breaker sees is recorded, rejections from
//!   inner layers included

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::config::CircuitBreakerProfile;
use crate::resilience::registry::Policy;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
    ForcedOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
            CircuitState::ForcedOpen => "FORCED_OPEN",
        };
        f.write_str(s)
    }
}

/// A state change, delivered to listeners after it happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransition {
    pub from: CircuitState,
    pub to: CircuitState,
}

/// The breaker refused admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallNotPermitted {
    pub state: CircuitState,
}

type Listener = Arc<dyn Fn(&StateTransition) + Send + Sync>;

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    half_open_in_flight: u32,
    half_open_successes: u32,
}

/// Consecutive-failure circuit breaker.
pub struct CircuitBreaker {
    name: String,
    profile: CircuitBreakerProfile,
    inner: Mutex<Inner>,
    listeners: Mutex<Vec<Listener>>,
}

impl Policy for CircuitBreaker {
    type Profile = CircuitBreakerProfile;

    fn from_profile(name: &str, profile: &CircuitBreakerProfile) -> Self {
        Self::new(name, profile.clone())
    }
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, profile: CircuitBreakerProfile) -> Self {
        Self {
            name: name.into(),
            profile,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                half_open_in_flight: 0,
                half_open_successes: 0,
            }),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn profile(&self) -> &CircuitBreakerProfile {
        &self.profile
    }

    /// Current state. An expired Open state reports Open until the next
    /// admission attempt moves it to Half-Open.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    /// Register a listener for state transitions.
    pub fn on_state_transition(&self, listener: impl Fn(&StateTransition) + Send + Sync + 'static) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(listener));
    }

    /// Ask for admission of one call.
    ///
    /// The returned permission must be resolved with `on_success` or
    /// `on_error`; dropping it unresolved gives a trial slot back.
    pub fn try_acquire_permission(self: &Arc<Self>) -> Result<Permission, CallNotPermitted> {
        let mut inner = self.lock();
        let mut transition = None;

        if inner.state == CircuitState::Open {
            let elapsed = inner.opened_at.map(|t| t.elapsed()).unwrap_or(Duration::MAX);
            if elapsed >= self.profile.wait_in_open() {
                transition = self.transition(&mut inner, CircuitState::HalfOpen);
            }
        }

        let result = match inner.state {
            CircuitState::Closed => Ok(Permission::new(self.clone(), false)),
            CircuitState::HalfOpen => {
                let used = inner.half_open_in_flight + inner.half_open_successes;
                if used < self.profile.permitted_calls_in_half_open {
                    inner.half_open_in_flight += 1;
                    Ok(Permission::new(self.clone(), true))
                } else {
                    Err(CallNotPermitted { state: inner.state })
                }
            }
            state @ (CircuitState::Open | CircuitState::ForcedOpen) => Err(CallNotPermitted { state }),
        };

        drop(inner);
        self.notify(transition);

        if let Err(rejected) = &result {
            tracing::warn!(name = %self.name, state = %rejected.state, "Circuit breaker rejected call");
        }
        result
    }

    /// Hold the breaker open until [`CircuitBreaker::transition_to_closed`].
    pub fn transition_to_forced_open(&self) {
        let mut inner = self.lock();
        let transition = self.transition(&mut inner, CircuitState::ForcedOpen);
        drop(inner);
        self.notify(transition);
    }

    /// Reset to Closed, clearing all counters.
    pub fn transition_to_closed(&self) {
        let mut inner = self.lock();
        let transition = self.transition(&mut inner, CircuitState::Closed);
        drop(inner);
        self.notify(transition);
    }

    fn record(&self, trial: bool, success: bool, elapsed: Duration) {
        let mut inner = self.lock();
        let mut transition = None;

        match (inner.state, success) {
            (CircuitState::Closed, true) => inner.consecutive_failures = 0,
            (CircuitState::Closed, false) => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.profile.failure_threshold {
                    transition = self.transition(&mut inner, CircuitState::Open);
                }
            }
            (CircuitState::HalfOpen, true) if trial => {
                inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.profile.permitted_calls_in_half_open {
                    transition = self.transition(&mut inner, CircuitState::Closed);
                }
            }
            (CircuitState::HalfOpen, false) if trial => {
                transition = self.transition(&mut inner, CircuitState::Open);
            }
            // Outcome of a call admitted under an earlier state.
            _ => {}
        }

        drop(inner);
        tracing::trace!(name = %self.name, success, elapsed_ms = elapsed.as_millis() as u64, "Call recorded");
        self.notify(transition);
    }

    fn release(&self, trial: bool) {
        if !trial {
            return;
        }
        let mut inner = self.lock();
        if inner.state == CircuitState::HalfOpen {
            inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
        }
    }

    fn transition(&self, inner: &mut Inner, to: CircuitState) -> Option<StateTransition> {
        let from = inner.state;
        inner.state = to;
        inner.half_open_in_flight = 0;
        inner.half_open_successes = 0;
        match to {
            CircuitState::Open | CircuitState::ForcedOpen => inner.opened_at = Some(Instant::now()),
            CircuitState::Closed => {
                inner.opened_at = None;
                inner.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {}
        }

        if from == to {
            return None;
        }
        tracing::info!(name = %self.name, from = %from, to = %to, "Circuit breaker state changed");
        Some(StateTransition { from, to })
    }

    fn notify(&self, transition: Option<StateTransition>) {
        let Some(transition) = transition else {
            return;
        };
        let listeners = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            listener(&transition);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("profile", &self.profile)
            .finish()
    }
}

/// Admission granted by [`CircuitBreaker::try_acquire_permission`].
#[derive(Debug)]
pub struct Permission {
    breaker: Arc<CircuitBreaker>,
    trial: bool,
    resolved: bool,
}

impl Permission {
    fn new(breaker: Arc<CircuitBreaker>, trial: bool) -> Self {
        Self {
            breaker,
            trial,
            resolved: false,
        }
    }

    pub fn on_success(mut self, elapsed: Duration) {
        self.resolved = true;
        self.breaker.record(self.trial, true, elapsed);
    }

    pub fn on_error(mut self, elapsed: Duration) {
        self.resolved = true;
        self.breaker.record(self.trial, false, elapsed);
    }
}

impl Drop for Permission {
    fn drop(&mut self) {
        if !self.resolved {
            self.breaker.release(self.trial);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(failure_threshold: u32, wait_in_open_ms: u64, permitted: u32) -> Arc<CircuitBreaker> {
        Arc::new(CircuitBreaker::new(
            "test",
            CircuitBreakerProfile {
                failure_threshold,
                wait_in_open_ms,
                permitted_calls_in_half_open: permitted,
            },
        ))
    }

    fn fail(cb: &Arc<CircuitBreaker>) {
        cb.try_acquire_permission().unwrap().on_error(Duration::ZERO);
    }

    #[test]
    fn test_opens_after_consecutive_failures() {
        let cb = breaker(3, 60_000, 1);
        fail(&cb);
        fail(&cb);
        cb.try_acquire_permission().unwrap().on_success(Duration::ZERO);
        assert_eq!(cb.consecutive_failures(), 0);

        fail(&cb);
        fail(&cb);
        fail(&cb);
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(
            cb.try_acquire_permission().unwrap_err(),
            CallNotPermitted { state: CircuitState::Open }
        );
    }

    #[test]
    fn test_half_open_closes_after_trial_successes() {
        let cb = breaker(1, 10, 2);
        fail(&cb);
        std::thread::sleep(Duration::from_millis(20));

        let first = cb.try_acquire_permission().unwrap();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        let second = cb.try_acquire_permission().unwrap();
        // Trial budget exhausted while both are in flight.
        assert!(cb.try_acquire_permission().is_err());

        first.on_success(Duration::ZERO);
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        second.on_success(Duration::ZERO);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let cb = breaker(1, 10, 2);
        fail(&cb);
        std::thread::sleep(Duration::from_millis(20));

        fail(&cb);
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn test_dropped_trial_permission_is_returned() {
        let cb = breaker(1, 10, 1);
        fail(&cb);
        std::thread::sleep(Duration::from_millis(20));

        drop(cb.try_acquire_permission().unwrap());
        assert!(cb.try_acquire_permission().is_ok());
    }

    #[test]
    fn test_forced_open_and_listeners() {
        let cb = breaker(5, 10, 1);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        cb.on_state_transition(move |t| sink.lock().unwrap().push(*t));

        cb.transition_to_forced_open();
        std::thread::sleep(Duration::from_millis(20));
        // Forced-open never times out into half-open.
        assert_eq!(
            cb.try_acquire_permission().unwrap_err().state,
            CircuitState::ForcedOpen
        );

        cb.transition_to_closed();
        assert!(cb.try_acquire_permission().is_ok());

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                StateTransition { from: CircuitState::Closed, to: CircuitState::ForcedOpen },
                StateTransition { from: CircuitState::ForcedOpen, to: CircuitState::Closed },
            ]
        );
    }
}
