//! Target Map
//!
//! The two-level map from objects to property keys to dependency sets.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use super::dep::{Dep, DepSet};
use crate::value::{Object, ObjectId, WeakObject};

/// Per-object entry: a weak link back to the object and its key sets.
struct TargetEntry {
    target: WeakObject,
    keys: HashMap<String, Dep>,
}

/// Object → key → effects.
///
/// Entries are keyed by [`ObjectId`] and hold the object only weakly, so the
/// graph never keeps data alive. Entries for dropped objects cannot be looked
/// up again (nobody can name the object) and are swept every
/// `prune_interval` insertions.
pub(crate) struct DependencyGraph {
    targets: HashMap<ObjectId, TargetEntry>,
    prune_interval: usize,
    inserted_since_prune: usize,
}

impl DependencyGraph {
    pub(crate) fn new(prune_interval: usize) -> Self {
        Self {
            targets: HashMap::new(),
            prune_interval,
            inserted_since_prune: 0,
        }
    }

    /// Locate or create the dependency set for `key` on `target`.
    pub(crate) fn dep_for(&mut self, target: &Object, key: &str) -> Dep {
        if !self.targets.contains_key(&target.id()) {
            self.note_insert();
        }
        let entry = self
            .targets
            .entry(target.id())
            .or_insert_with(|| TargetEntry {
                target: target.downgrade(),
                keys: HashMap::new(),
            });
        Rc::clone(
            entry
                .keys
                .entry(key.to_owned())
                .or_insert_with(|| Rc::new(RefCell::new(DepSet::default()))),
        )
    }

    /// The dependency set for `key` on the object with `id`, if any effect
    /// has ever read it.
    pub(crate) fn get(&self, id: ObjectId, key: &str) -> Option<Dep> {
        self.targets.get(&id)?.keys.get(key).cloned()
    }

    /// Number of effects currently subscribed to `key` on `id`.
    pub(crate) fn dependent_count(&self, id: ObjectId, key: &str) -> usize {
        self.get(id, key).map_or(0, |dep| dep.borrow().len())
    }

    /// Number of objects with entries.
    pub(crate) fn len(&self) -> usize {
        self.targets.len()
    }

    /// Drop entries whose objects are gone. Returns how many were removed.
    pub(crate) fn prune(&mut self) -> usize {
        let before = self.targets.len();
        self.targets.retain(|_, entry| entry.target.is_alive());
        self.inserted_since_prune = 0;
        let removed = before - self.targets.len();
        if removed > 0 {
            debug!(removed, remaining = self.targets.len(), "pruned dependency graph");
        }
        removed
    }

    fn note_insert(&mut self) {
        self.inserted_since_prune += 1;
        if self.prune_interval > 0 && self.inserted_since_prune >= self.prune_interval {
            self.prune();
        }
    }
}

impl std::fmt::Debug for DependencyGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyGraph")
            .field("targets", &self.targets.len())
            .field("prune_interval", &self.prune_interval)
            .finish()
    }
}
