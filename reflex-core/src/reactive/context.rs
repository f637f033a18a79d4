//! Tracking Context
//!
//! The tracking context records which effect is currently running. This
//! enables automatic dependency tracking: when a reactive property is read,
//! the read is attributed to that effect.
//!
//! # Implementation
//!
//! Each [`Runtime`](crate::Runtime) owns one context: a single slot holding
//! the running effect. Entering an effect saves the previous occupant as the
//! effect's `parent` and installs the effect; leaving restores the parent.
//! The parent links therefore form a chain mirroring the call stack of
//! nested effect runs, which is what the re-entrancy guard walks.
//!
//! Restoration is done by a guard's `Drop`, so the slot is correct again even
//! when an effect's work function panics.

use std::cell::RefCell;
use std::rc::Rc;

use super::effect::EffectCore;

/// Single slot holding the currently running effect.
#[derive(Default)]
pub(crate) struct TrackingContext {
    current: RefCell<Option<Rc<EffectCore>>>,
}

impl TrackingContext {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Make `effect` the running effect until the returned scope is dropped.
    pub(crate) fn enter(&self, effect: &Rc<EffectCore>) -> TrackingScope<'_> {
        let parent = self.current.replace(Some(Rc::clone(effect)));
        effect.set_parent(parent);
        TrackingScope {
            context: self,
            effect: Rc::clone(effect),
        }
    }

    /// Check if an effect is running.
    pub(crate) fn is_active(&self) -> bool {
        self.current.borrow().is_some()
    }

    /// The running effect, if any.
    pub(crate) fn current(&self) -> Option<Rc<EffectCore>> {
        self.current.borrow().clone()
    }
}

/// Guard that restores the previous effect when dropped.
pub(crate) struct TrackingScope<'a> {
    context: &'a TrackingContext,
    effect: Rc<EffectCore>,
}

impl Drop for TrackingScope<'_> {
    fn drop(&mut self) {
        let parent = self.effect.take_parent();
        let popped = self.context.current.replace(parent);

        // Scopes must nest; anything else means a scope leaked.
        debug_assert!(
            popped.as_ref().is_some_and(|e| Rc::ptr_eq(e, &self.effect)),
            "tracking scope mismatch: expected {}, got {:?}",
            self.effect.id(),
            popped.map(|e| e.id()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{EffectOptions, Runtime};

    fn core(runtime: &Runtime) -> Rc<EffectCore> {
        let runner = runtime.effect_with(|| (), EffectOptions::new().lazy(true));
        Rc::clone(runner.effect().core())
    }

    #[test]
    fn context_tracks_effect() {
        let runtime = Runtime::new();
        let context = TrackingContext::new();
        let effect = core(&runtime);

        assert!(!context.is_active());
        assert!(context.current().is_none());

        {
            let _scope = context.enter(&effect);
            assert!(context.is_active());
            assert!(Rc::ptr_eq(&context.current().unwrap(), &effect));
        }

        // Context should be cleaned up after drop
        assert!(!context.is_active());
        assert!(effect.parent().is_none());
    }

    #[test]
    fn nested_scopes_link_parents() {
        let runtime = Runtime::new();
        let context = TrackingContext::new();
        let outer = core(&runtime);
        let inner = core(&runtime);

        {
            let _outer = context.enter(&outer);
            assert!(outer.parent().is_none());

            {
                let _inner = context.enter(&inner);
                assert!(Rc::ptr_eq(&context.current().unwrap(), &inner));
                assert!(Rc::ptr_eq(&inner.parent().unwrap(), &outer));
            }

            // After inner scope drops, outer should be current
            assert!(Rc::ptr_eq(&context.current().unwrap(), &outer));
            assert!(inner.parent().is_none());
        }

        assert!(context.current().is_none());
    }

    #[test]
    fn scope_restores_on_panic() {
        let runtime = Runtime::new();
        let context = TrackingContext::new();
        let effect = core(&runtime);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _scope = context.enter(&effect);
            panic!("work failed");
        }));

        assert!(result.is_err());
        assert!(!context.is_active());
    }
}
