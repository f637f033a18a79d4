//! Watch
//!
//! `watch` pairs an effect with a change callback. The effect's job is only
//! to compute a value and collect dependencies; when a dependency changes,
//! its scheduler recomputes the value and hands the new and previous values
//! to the callback.
//!
//! A source is either a getter closure, which decides exactly what is read,
//! or a reactive handle, which is read in full: every property reachable
//! from it is visited so that a change anywhere underneath fires the watch.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use super::effect::{EffectCore, ReactiveEffect, Scheduler};
use super::proxy::Reactive;
use super::runtime::Runtime;
use crate::value::{ObjectId, Value};

/// Something `watch` can observe.
///
/// Implemented for getter closures and for [`Reactive`] handles.
pub trait WatchSource {
    /// What the getter produces and the callback receives.
    type Output: Clone + 'static;

    /// Turn the source into a getter whose reads are tracked.
    fn into_getter(self) -> Rc<dyn Fn() -> Self::Output>;
}

impl<F, T> WatchSource for F
where
    F: Fn() -> T + 'static,
    T: Clone + 'static,
{
    type Output = T;

    fn into_getter(self) -> Rc<dyn Fn() -> T> {
        Rc::new(self)
    }
}

impl WatchSource for Reactive {
    type Output = Reactive;

    fn into_getter(self) -> Rc<dyn Fn() -> Reactive> {
        Rc::new(move || {
            traverse(&Value::Reactive(self.clone()), &mut HashSet::new());
            self.clone()
        })
    }
}

/// Read every property reachable from `value` through handles.
///
/// `seen` holds the objects already visited, which ends the walk on cycles
/// and shared subtrees. Only handles are descended into; a raw object
/// carries no tracking, so walking it would record nothing.
pub fn traverse(value: &Value, seen: &mut HashSet<ObjectId>) {
    let Value::Reactive(handle) = value else {
        return;
    };
    if !seen.insert(handle.id()) {
        return;
    }
    for key in handle.keys() {
        traverse(&handle.get(&key), seen);
    }
}

/// Returned by [`Runtime::watch`]; owns the watch.
///
/// Dropping the handle ends the watch, as does [`WatchHandle::stop`].
#[must_use = "the watch ends when its handle is dropped"]
pub struct WatchHandle {
    core: Rc<EffectCore>,
}

impl WatchHandle {
    /// Stop watching. Idempotent.
    pub fn stop(&self) {
        self.core.stop();
    }

    /// Whether the watch still fires.
    pub fn is_active(&self) -> bool {
        self.core.is_active()
    }

    /// Number of (object, key) pairs being watched.
    pub fn dependency_count(&self) -> usize {
        self.core.dependency_count()
    }
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("effect", &self.core.id())
            .field("active", &self.is_active())
            .finish()
    }
}

impl Runtime {
    /// Call `callback(&new, &old)` whenever `source` changes, for as long as
    /// the returned handle is kept.
    ///
    /// The source is evaluated once up front to record the initial value;
    /// that evaluation does not call the callback.
    ///
    /// ```rust
    /// use std::cell::RefCell;
    /// use std::rc::Rc;
    /// use reflex_core::{Object, Runtime};
    ///
    /// let runtime = Runtime::new();
    /// let state = runtime.wrap(&Object::from_iter([("n", 1)]));
    /// let log = Rc::new(RefCell::new(Vec::new()));
    ///
    /// let reader = state.clone();
    /// let sink = Rc::clone(&log);
    /// let _watch = runtime.watch(
    ///     move || reader.get("n").as_int().unwrap_or_default(),
    ///     move |new: &i64, old: &i64| sink.borrow_mut().push((*new, *old)),
    /// );
    ///
    /// state.set("n", 2);
    /// state.set("n", 5);
    /// assert_eq!(*log.borrow(), vec![(2, 1), (5, 2)]);
    /// ```
    pub fn watch<S, C>(&self, source: S, callback: C) -> WatchHandle
    where
        S: WatchSource,
        C: Fn(&S::Output, &S::Output) + 'static,
    {
        let getter = source.into_getter();
        let old: Rc<RefCell<Option<S::Output>>> = Rc::new(RefCell::new(None));

        let effect = ReactiveEffect::build(
            self.downgrade(),
            Rc::clone(&getter),
            Some("watch".to_owned()),
            |weak| {
                let weak = weak.clone();
                let old = Rc::clone(&old);
                let scheduler: Scheduler = Rc::new(move || {
                    let Some(core) = weak.upgrade() else {
                        return;
                    };
                    let new = core.run_with(|| getter());
                    // No borrow is held across the callback; it may write to
                    // state that fires this watch again.
                    let previous = old.borrow().clone();
                    if let Some(previous) = previous {
                        callback(&new, &previous);
                    }
                    *old.borrow_mut() = Some(new);
                });
                Some(scheduler)
            },
        );

        *old.borrow_mut() = Some(effect.run());
        WatchHandle {
            core: Rc::clone(effect.core()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Object;
    use serde_json::json;
    use std::cell::Cell;

    fn reactive_from(runtime: &Runtime, json: serde_json::Value) -> Reactive {
        runtime.wrap(&Object::from_json(json).unwrap())
    }

    #[test]
    fn getter_watch_reports_new_and_old() {
        let runtime = Runtime::new();
        let state = reactive_from(&runtime, json!({ "name": "a" }));
        let log = Rc::new(RefCell::new(Vec::new()));

        let reader = state.clone();
        let sink = Rc::clone(&log);
        let _watch = runtime.watch(
            move || reader.get("name").as_str().unwrap_or_default().to_owned(),
            move |new: &String, old: &String| sink.borrow_mut().push(format!("{old}->{new}")),
        );
        assert!(log.borrow().is_empty());

        state.set("name", "b");
        state.set("name", "b");
        state.set("name", "c");
        assert_eq!(*log.borrow(), vec!["a->b", "b->c"]);
    }

    #[test]
    fn reactive_source_watches_deeply() {
        let runtime = Runtime::new();
        let state = reactive_from(&runtime, json!({ "a": { "b": { "c": 1 } }, "d": 2 }));
        let fired = Rc::new(Cell::new(0));

        let count = Rc::clone(&fired);
        let handle = runtime.watch(state.clone(), move |new: &Reactive, old: &Reactive| {
            assert!(new.ptr_eq(old));
            count.set(count.get() + 1);
        });
        // a.b.c and d; keys holding objects are walked, not recorded
        assert_eq!(handle.dependency_count(), 2);

        let nested = state.get("a").as_reactive().unwrap().get("b");
        nested.as_reactive().unwrap().set("c", 10);
        assert_eq!(fired.get(), 1);

        state.set("d", 3);
        assert_eq!(fired.get(), 2);
    }

    #[test]
    fn traverse_terminates_on_cycles() {
        let runtime = Runtime::new();
        let root = Object::new();
        root.set("self", root.clone());
        root.set("x", 1);
        let state = runtime.wrap(&root);

        let fired = Rc::new(Cell::new(0));
        let count = Rc::clone(&fired);
        let handle = runtime.watch(state.clone(), move |_: &Reactive, _: &Reactive| {
            count.set(count.get() + 1);
        });
        assert_eq!(handle.dependency_count(), 1);

        state.set("x", 2);
        assert_eq!(fired.get(), 1);
        root.remove("self");
    }

    #[test]
    fn traverse_ignores_raw_objects_and_primitives() {
        let mut seen = HashSet::new();
        traverse(&Value::from(Object::from_iter([("x", 1)])), &mut seen);
        traverse(&Value::from(3), &mut seen);
        assert!(seen.is_empty());
    }

    #[test]
    fn stopped_watch_is_silent() {
        let runtime = Runtime::new();
        let state = reactive_from(&runtime, json!({ "n": 1 }));
        let fired = Rc::new(Cell::new(0));

        let reader = state.clone();
        let count = Rc::clone(&fired);
        let handle = runtime.watch(
            move || reader.get("n").as_int(),
            move |_: &Option<i64>, _: &Option<i64>| count.set(count.get() + 1),
        );

        state.set("n", 2);
        handle.stop();
        handle.stop();
        state.set("n", 3);
        assert_eq!(fired.get(), 1);
        assert!(!handle.is_active());
    }

    #[test]
    fn dropping_the_handle_ends_the_watch() {
        let runtime = Runtime::new();
        let state = reactive_from(&runtime, json!({ "n": 1 }));
        let fired = Rc::new(Cell::new(0));

        let reader = state.clone();
        let count = Rc::clone(&fired);
        let handle = runtime.watch(
            move || reader.get("n").as_int(),
            move |_: &Option<i64>, _: &Option<i64>| count.set(count.get() + 1),
        );
        state.set("n", 2);
        assert_eq!(fired.get(), 1);

        drop(handle);
        assert_eq!(runtime.dependent_count(&state, "n"), 0);
        state.set("n", 3);
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn watch_follows_branch_changes() {
        let runtime = Runtime::new();
        let state = reactive_from(&runtime, json!({ "flag": true, "a": 1, "b": 2 }));
        let fired = Rc::new(Cell::new(0));

        let reader = state.clone();
        let count = Rc::clone(&fired);
        let _watch = runtime.watch(
            move || {
                if reader.get("flag").is_truthy() {
                    reader.get("a")
                } else {
                    reader.get("b")
                }
            },
            move |_: &Value, _: &Value| count.set(count.get() + 1),
        );

        state.set("b", 20);
        assert_eq!(fired.get(), 0);

        state.set("flag", false);
        assert_eq!(fired.get(), 1);
        state.set("a", 10);
        assert_eq!(fired.get(), 1);
        state.set("b", 30);
        assert_eq!(fired.get(), 2);
    }
}
