//! Explicit per-test handles for hosts that hand out a token per test.

use dashmap::DashMap;
use std::hash::Hash;
use storyline_error::StoryError;
use storyline_recorder::Recorder;

/// Concurrent map from a host-supplied test token to its recorder.
pub struct HandleRegistry<K: Eq + Hash>(DashMap<K, Recorder>);

impl<K: Eq + Hash> Default for HandleRegistry<K> {
    fn default() -> Self {
        Self(DashMap::new())
    }
}

impl<K: Eq + Hash> HandleRegistry<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate `recorder` with `key`, returning any recorder it replaces.
    pub fn bind(&self, key: K, recorder: Recorder) -> Option<Recorder> {
        self.0.insert(key, recorder)
    }

    /// Recorder for `key`, created pending on first use.
    pub fn get_or_create(&self, key: K) -> Recorder {
        self.0.entry(key).or_default().value().clone()
    }

    /// Recorder bound to `handle`.
    pub fn with_explicit_handle(&self, handle: &K) -> Result<Recorder, StoryError> {
        self.0
            .get(handle)
            .map(|r| r.value().clone())
            .ok_or(StoryError::NoActiveStory)
    }

    /// Unbind, typically from the host's test-finished hook.
    pub fn release(&self, handle: &K) -> Option<Recorder> {
        self.0.remove(handle).map(|(_, r)| r)
    }

    /// Recorders that were initialized but never finalized.
    pub fn unfinished(&self) -> Vec<Recorder> {
        self.0
            .iter()
            .filter(|e| e.value().is_initialized() && !e.value().is_finalized())
            .map(|e| e.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyline_schema::story::{Outcome, StoryOptions};

    #[test]
    fn lookup_by_handle() {
        let registry = HandleRegistry::new();
        let rec = Recorder::start("explicit", StoryOptions::new());
        assert!(registry.bind("task-1", rec.clone()).is_none());
        assert!(registry.with_explicit_handle(&"task-1").unwrap().ptr_eq(&rec));
        assert_eq!(
            registry.with_explicit_handle(&"task-2").err(),
            Some(StoryError::NoActiveStory)
        );
    }

    #[test]
    fn get_or_create_is_stable() {
        let registry: HandleRegistry<u64> = HandleRegistry::new();
        let a = registry.get_or_create(7);
        let b = registry.get_or_create(7);
        assert!(a.ptr_eq(&b));
        assert!(!a.is_initialized());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unfinished_skips_pending_and_final() {
        let registry = HandleRegistry::new();
        registry.get_or_create(1);
        let active = registry.get_or_create(2);
        active.init("active", StoryOptions::new()).unwrap();
        let done = registry.get_or_create(3);
        done.init("done", StoryOptions::new()).unwrap();
        done.finalize(Outcome::passed()).unwrap();

        let unfinished = registry.unfinished();
        assert_eq!(unfinished.len(), 1);
        assert!(unfinished[0].ptr_eq(&active));
        assert!(registry.release(&2).is_some());
        assert_eq!(registry.len(), 2);
    }
}
