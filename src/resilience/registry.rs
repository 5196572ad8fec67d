//! Named policy registries.
//!
//! # Responsibilities
//! - Create a policy instance the first time a name is requested
//! - Return the same instance for every later request of that name
//! - Let callers hook into first creation (customizers)
//!
//! # Design Decisions
//! - One registry per policy kind, injected into the factory (no globals)
//! - The profile passed with a request only matters on first creation

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// A policy that can be built from a named profile.
pub trait Policy: Send + Sync + 'static {
    type Profile: Clone + Send + Sync;

    fn from_profile(name: &str, profile: &Self::Profile) -> Self;
}

/// Thread-safe, memoizing store of policy instances keyed by name.
pub struct Registry<P: Policy> {
    entries: DashMap<String, Arc<P>>,
}

impl<P: Policy> Registry<P> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Return the instance for `name`, creating it from `profile` if absent.
    pub fn get_or_create(&self, name: &str, profile: &P::Profile) -> Arc<P> {
        self.get_or_create_with(name, profile, |_| {})
    }

    /// Like [`Registry::get_or_create`], running `on_create` on an instance
    /// this call built.
    ///
    /// `on_create` runs before the instance is published, so no caller can
    /// observe it half-customized. Under a creation race every contender
    /// customizes its own candidate; only the first inserted is kept and the
    /// rest are dropped unseen. No lock is held while `on_create` runs.
    pub fn get_or_create_with(
        &self,
        name: &str,
        profile: &P::Profile,
        on_create: impl FnOnce(&P),
    ) -> Arc<P> {
        if let Some(existing) = self.find(name) {
            return existing;
        }

        let candidate = Arc::new(P::from_profile(name, profile));
        on_create(&candidate);

        match self.entries.entry(name.to_string()) {
            Entry::Occupied(winner) => winner.get().clone(),
            Entry::Vacant(slot) => {
                tracing::debug!(name = %name, kind = std::any::type_name::<P>(), "Policy created");
                slot.insert(candidate.clone());
                candidate
            }
        }
    }

    pub fn find(&self, name: &str) -> Option<Arc<P>> {
        self.entries.get(name).map(|r| r.value().clone())
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.entries.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<P: Policy> Default for Registry<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Policy> std::fmt::Debug for Registry<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("kind", &std::any::type_name::<P>())
            .field("names", &self.names())
            .finish()
    }
}
