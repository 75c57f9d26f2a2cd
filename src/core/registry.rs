//! # Registration registry.
//!
//! Remembers, per registered target, the listeners it contributed, so that
//! `unregister` can strip exactly those from the listener lists.
//!
//! ## Architecture
//! ```text
//! register(target)   → build listeners (no lock held)
//!                    → entry(key) ─┬─ Occupied → drop them, nothing to do
//!                                  └─ Vacant   → add to lists, insert record
//! unregister(target) → remove(key) ─► record.listeners ─► swept from every list
//! ```
//!
//! ## Rules
//! - At most one record per target identity.
//! - A record holds the target itself, which keeps object receivers alive.
//! - Records are only inserted once every listener was built and added.
//! - Only crate code runs under a shard lock; user code (declarations,
//!   wrappers, backends) runs before it is taken.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::target::{Target, TargetKey};

/// What one registered target contributed.
pub(crate) struct Registration<L> {
    pub(crate) target: Target,
    pub(crate) listeners: Box<[Arc<L>]>,
}

/// Registration records of one bus, keyed by target identity.
pub(crate) struct Registry<L> {
    records: DashMap<TargetKey, Registration<L>>,
}

impl<L> Registry<L> {
    pub(crate) fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    /// Inserts the record produced by `commit` unless `key` is already
    /// registered; returns the number of listeners recorded, or `None` if
    /// the key was present.
    ///
    /// `commit` runs with the key's shard locked, so of two concurrent
    /// registrations of one target only one commits. It must not call back
    /// into this registry.
    pub(crate) fn insert_with<F>(&self, key: TargetKey, commit: F) -> Option<usize>
    where
        F: FnOnce() -> Registration<L>,
    {
        match self.records.entry(key) {
            Entry::Occupied(_) => None,
            Entry::Vacant(vacant) => {
                let record = commit();
                let count = record.listeners.len();
                vacant.insert(record);
                Some(count)
            }
        }
    }

    pub(crate) fn remove(&self, key: &TargetKey) -> Option<Registration<L>> {
        self.records.remove(key).map(|(_, record)| record)
    }

    pub(crate) fn contains(&self, key: &TargetKey) -> bool {
        self.records.contains_key(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventType;
    use crate::methods::Method;

    struct Ping;
    impl EventType for Ping {}

    #[test]
    fn test_insert_with_builds_once() {
        let registry: Registry<u8> = Registry::new();
        let target = Target::from(Method::from_fn("f", |_: &Ping| {}));
        let record = || Registration {
            target: target.clone(),
            listeners: vec![Arc::new(1), Arc::new(2)].into_boxed_slice(),
        };

        assert_eq!(registry.insert_with(target.key(), record), Some(2));
        assert_eq!(registry.insert_with(target.key(), || panic!("already present")), None);
        assert!(registry.contains(&target.key()));
        assert_eq!(registry.len(), 1);

        let removed = registry.remove(&target.key()).unwrap();
        assert_eq!(removed.listeners.len(), 2);
        assert!(registry.remove(&target.key()).is_none());
    }
}
