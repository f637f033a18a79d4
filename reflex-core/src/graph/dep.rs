//! Dependency Sets
//!
//! A dependency set holds the effects that read one property of one object.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::reactive::{EffectCore, EffectId};

/// Shared handle to a dependency set.
///
/// The graph owns the set; effects keep only weak links to it so that a set
/// dies with its object's graph entry.
pub(crate) type Dep = Rc<RefCell<DepSet>>;

/// The effects subscribed to a single (object, key) pair.
///
/// Membership is deduplicated by effect id. Iteration follows subscription
/// order, which is the order effects re-run in.
///
/// Effects are held weakly. Whoever created the effect owns it; a dropped
/// effect leaves its sets from its own `Drop`.
#[derive(Default)]
pub(crate) struct DepSet {
    effects: IndexMap<EffectId, Weak<EffectCore>>,
}

impl DepSet {
    pub(crate) fn contains(&self, id: EffectId) -> bool {
        self.effects.contains_key(&id)
    }

    /// Add `effect`, returning `false` if it was already a member.
    pub(crate) fn insert(&mut self, effect: &Rc<EffectCore>) -> bool {
        if self.contains(effect.id()) {
            return false;
        }
        self.effects.insert(effect.id(), Rc::downgrade(effect));
        true
    }

    pub(crate) fn remove(&mut self, id: EffectId) -> bool {
        self.effects.shift_remove(&id).is_some()
    }

    /// Number of live members.
    pub(crate) fn len(&self) -> usize {
        self.effects
            .values()
            .filter(|effect| effect.strong_count() > 0)
            .count()
    }

    /// Copy out the live members so callers can re-run effects, which
    /// mutates this set, without holding a borrow.
    pub(crate) fn snapshot(&self) -> Vec<Rc<EffectCore>> {
        self.effects.values().filter_map(Weak::upgrade).collect()
    }
}

impl std::fmt::Debug for DepSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.effects.keys()).finish()
    }
}
