//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects reactive handles and
//! effects. It owns the tracking context, the dependency graph and the proxy
//! cache, and implements the two halves of the protocol:
//!
//! - **track**: a read through a handle while an effect is running adds that
//!   effect to the (object, key) dependency set.
//! - **trigger**: a write that changes a value re-runs, or hands to its
//!   scheduler, every effect in the (object, key) set.
//!
//! # Re-entrancy
//!
//! Before re-running an effect, trigger walks the running effect's parent
//! chain. An effect found there is already on the call stack (it is the
//! writer, or one of the effects that started the writer), so it is skipped.
//! This is what stops an effect that reads and writes the same property from
//! recursing into itself.
//!
//! # Threads
//!
//! A runtime and everything created from it is single-threaded. Each thread
//! has its own default runtime, reachable through [`Runtime::current`].

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use super::context::TrackingContext;
use super::effect::{EffectCore, EffectOptions, EffectRunner, ReactiveEffect};
use super::proxy::{ProxyCache, Reactive};
use crate::config::RuntimeConfig;
use crate::graph::DependencyGraph;
use crate::value::{Object, Value};

thread_local! {
    static DEFAULT_RUNTIME: Runtime = Runtime::new();
}

/// Shared state behind a [`Runtime`].
pub(crate) struct RuntimeInner {
    config: RuntimeConfig,
    context: TrackingContext,
    graph: RefCell<DependencyGraph>,
    proxies: RefCell<ProxyCache>,
}

impl RuntimeInner {
    pub(crate) fn context(&self) -> &TrackingContext {
        &self.context
    }

    /// Record that the running effect, if any, read `key` on `target`.
    pub(crate) fn track(&self, target: &Object, key: &str) {
        let Some(effect) = self.context.current() else {
            return;
        };

        let dep = self.graph.borrow_mut().dep_for(target, key);
        if dep.borrow_mut().insert(&effect) {
            effect.add_dep(&dep);
            trace!(effect = %effect.id(), object = %target.id(), key, "tracked");
        }
    }

    /// Re-run every effect that depends on `key` of `target`.
    pub(crate) fn trigger(&self, target: &Object, key: &str, new: &Value, old: &Value) {
        let Some(dep) = self.graph.borrow().get(target.id(), key) else {
            return;
        };
        // Re-running effects re-tracks into this same set.
        let effects = dep.borrow().snapshot();
        if effects.is_empty() {
            return;
        }

        trace!(
            object = %target.id(),
            key,
            new = ?new,
            old = ?old,
            effects = effects.len(),
            "trigger"
        );

        let running = self.context.current();
        for effect in effects {
            if is_on_stack(running.as_ref(), &effect) {
                trace!(effect = %effect.id(), key, "skipping re-entrant effect");
                continue;
            }
            // An earlier effect in this pass may have stopped this one.
            if !effect.is_active() {
                continue;
            }
            effect.schedule();
        }
    }
}

/// Whether `candidate` is `running` or one of its ancestors.
fn is_on_stack(running: Option<&Rc<EffectCore>>, candidate: &Rc<EffectCore>) -> bool {
    let mut cursor = running.cloned();
    while let Some(effect) = cursor {
        if Rc::ptr_eq(&effect, candidate) {
            return true;
        }
        cursor = effect.parent();
    }
    false
}

/// Owner of all tracking state.
///
/// Cloning a `Runtime` yields another handle to the same state. Handles and
/// effects remember the runtime that created them, so once created they can
/// be used without passing the runtime around.
///
/// Runtimes do not see each other. A handle reports its reads to its own
/// runtime, so reading a handle from runtime `A` inside an effect of runtime
/// `B` records nothing and later writes to it will not re-run that effect.
///
/// ```rust
/// use reflex_core::{Object, Runtime};
///
/// let runtime = Runtime::new();
/// let state = runtime.wrap(&Object::from_iter([("x", 1)]));
///
/// let reader = state.clone();
/// let runner = runtime.effect(move || reader.get("x").as_int().unwrap_or_default());
///
/// state.set("x", 2);
/// assert_eq!(runner.effect().run_count(), 2);
/// ```
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    /// Create a runtime with default configuration.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a runtime with the given configuration.
    pub fn with_config(config: RuntimeConfig) -> Self {
        let graph = DependencyGraph::new(config.prune_interval);
        let proxies = ProxyCache::new(config.prune_interval);
        Self {
            inner: Rc::new(RuntimeInner {
                config,
                context: TrackingContext::new(),
                graph: RefCell::new(graph),
                proxies: RefCell::new(proxies),
            }),
        }
    }

    /// This thread's default runtime.
    pub fn current() -> Self {
        DEFAULT_RUNTIME.with(Runtime::clone)
    }

    /// The configuration this runtime was built with.
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Wrap `value` for tracking.
    ///
    /// Objects become handles. Handles and primitives are returned
    /// unchanged.
    pub fn reactive(&self, value: impl Into<Value>) -> Value {
        match value.into() {
            Value::Object(object) => Value::Reactive(self.wrap(&object)),
            other => other,
        }
    }

    /// The handle for `target`, creating it on first use.
    ///
    /// While a handle for `target` is alive, every call returns that same
    /// handle.
    pub fn wrap(&self, target: &Object) -> Reactive {
        if let Some(existing) = self.inner.proxies.borrow().get(target.id()) {
            return existing;
        }
        let handle = Reactive::new(target.clone(), self.clone());
        self.inner.proxies.borrow_mut().insert(&handle);
        handle
    }

    /// Create an effect and run it once.
    pub fn effect<R, F>(&self, work: F) -> EffectRunner<R>
    where
        R: 'static,
        F: Fn() -> R + 'static,
    {
        self.effect_with(work, EffectOptions::default())
    }

    /// Create an effect with options.
    ///
    /// Unless `options` make it lazy, the effect runs once before this
    /// returns to collect its initial dependencies.
    pub fn effect_with<R, F>(&self, work: F, options: EffectOptions) -> EffectRunner<R>
    where
        R: 'static,
        F: Fn() -> R + 'static,
    {
        let EffectOptions {
            scheduler,
            lazy,
            label,
        } = options;
        let work: Rc<dyn Fn() -> R> = Rc::new(work);
        let effect = ReactiveEffect::build(self.downgrade(), work, label, |_| scheduler);
        debug!(
            effect = %effect.id(),
            label = effect.label(),
            lazy,
            scheduled = effect.has_scheduler(),
            "effect created"
        );
        if !lazy {
            let _ = effect.run();
        }
        EffectRunner::new(effect)
    }

    /// Whether an effect is running on this runtime right now.
    pub fn is_tracking(&self) -> bool {
        self.inner.context.is_active()
    }

    /// Number of objects with dependency entries.
    pub fn graph_len(&self) -> usize {
        self.inner.graph.borrow().len()
    }

    /// Number of effects that depend on `key` of `handle`.
    pub fn dependent_count(&self, handle: &Reactive, key: &str) -> usize {
        self.inner
            .graph
            .borrow()
            .dependent_count(handle.raw().id(), key)
    }

    /// Sweep graph and cache entries whose objects are gone. Returns how
    /// many graph entries were removed.
    pub fn prune(&self) -> usize {
        self.inner.proxies.borrow_mut().prune();
        self.inner.graph.borrow_mut().prune()
    }

    /// Whether two runtimes are the same.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of objects with a cached handle, live or not yet swept.
    pub fn cached_handle_count(&self) -> usize {
        self.inner.proxies.borrow().len()
    }

    pub(crate) fn inner(&self) -> &RuntimeInner {
        &self.inner
    }

    pub(crate) fn downgrade(&self) -> Weak<RuntimeInner> {
        Rc::downgrade(&self.inner)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.inner.config)
            .field("graph", &*self.inner.graph.borrow())
            .field("tracking", &self.is_tracking())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn counter() -> (Rc<Cell<usize>>, Rc<Cell<usize>>) {
        let count = Rc::new(Cell::new(0));
        (Rc::clone(&count), count)
    }

    #[test]
    fn reads_outside_effects_are_not_tracked() {
        let runtime = Runtime::new();
        let state = runtime.wrap(&Object::from_iter([("x", 1)]));
        state.get("x");
        assert_eq!(runtime.graph_len(), 0);
        assert_eq!(runtime.dependent_count(&state, "x"), 0);
    }

    #[test]
    fn trigger_reruns_dependents() {
        let runtime = Runtime::new();
        let state = runtime.wrap(&Object::from_iter([("x", 1)]));
        let (runs, count) = counter();

        let reader = state.clone();
        let _runner = runtime.effect(move || {
            reader.get("x");
            count.set(count.get() + 1);
        });
        assert_eq!(runs.get(), 1);

        state.set("x", 2);
        assert_eq!(runs.get(), 2);

        state.set("y", 2);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn scheduler_replaces_rerun() {
        let runtime = Runtime::new();
        let state = runtime.wrap(&Object::from_iter([("x", 1)]));
        let (runs, run_count) = counter();
        let (scheduled, schedule_count) = counter();

        let reader = state.clone();
        let _runner = runtime.effect_with(
            move || {
                reader.get("x");
                run_count.set(run_count.get() + 1);
            },
            EffectOptions::new().scheduler(move || schedule_count.set(schedule_count.get() + 1)),
        );

        state.set("x", 2);
        state.set("x", 3);
        assert_eq!(runs.get(), 1);
        assert_eq!(scheduled.get(), 2);
    }

    #[test]
    fn effects_rerun_in_subscription_order() {
        let runtime = Runtime::new();
        let state = runtime.wrap(&Object::from_iter([("x", 1)]));
        let order = Rc::new(RefCell::new(Vec::new()));

        let _runners: Vec<_> = ["first", "second", "third"]
            .into_iter()
            .map(|name| {
                let reader = state.clone();
                let order = Rc::clone(&order);
                runtime.effect(move || {
                    reader.get("x");
                    order.borrow_mut().push(name);
                })
            })
            .collect();
        order.borrow_mut().clear();

        state.set("x", 2);
        assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn self_write_does_not_recurse() {
        let runtime = Runtime::new();
        let state = runtime.wrap(&Object::from_iter([("count", 0)]));
        let (runs, count) = counter();

        let handle = state.clone();
        let _runner = runtime.effect(move || {
            count.set(count.get() + 1);
            let next = handle.get("count").as_int().unwrap_or_default() + 1;
            handle.set("count", next);
        });

        assert_eq!(runs.get(), 1);
        assert_eq!(state.get("count").as_int(), Some(1));

        state.set("count", 10);
        assert_eq!(runs.get(), 2);
        assert_eq!(state.get("count").as_int(), Some(11));
    }

    #[test]
    fn nested_effect_cannot_retrigger_its_parent() {
        let runtime = Runtime::new();
        let state = runtime.wrap(&Object::from_iter([("a", 0), ("b", 0)]));
        let (outer_runs, outer_count) = counter();
        let (inner_runs, inner_count) = counter();

        let outer_state = state.clone();
        let rt = runtime.clone();
        let _runner = runtime.effect(move || {
            outer_count.set(outer_count.get() + 1);
            outer_state.get("a");
            let inner_state = outer_state.clone();
            let inner_count = Rc::clone(&inner_count);
            // The inner effect writes what the outer one read, while the
            // outer one is still on the stack.
            let _inner = rt.effect(move || {
                inner_count.set(inner_count.get() + 1);
                let a = inner_state.get("a").as_int().unwrap_or_default();
                inner_state.set("a", a + 1);
            });
        });

        assert_eq!(outer_runs.get(), 1);
        assert_eq!(inner_runs.get(), 1);
        assert_eq!(state.get("a").as_int(), Some(1));
        assert!(!runtime.is_tracking());
    }

    #[test]
    fn is_on_stack_walks_parents() {
        let runtime = Runtime::new();
        let lazy = || runtime.effect_with(|| (), EffectOptions::new().lazy(true));
        let (outer, inner, stranger) = (lazy(), lazy(), lazy());
        let outer = Rc::clone(outer.effect().core());
        let inner = Rc::clone(inner.effect().core());
        let stranger = Rc::clone(stranger.effect().core());

        let context = runtime.inner().context();
        let _outer = context.enter(&outer);
        let _inner = context.enter(&inner);
        let running = context.current();

        assert!(is_on_stack(running.as_ref(), &inner));
        assert!(is_on_stack(running.as_ref(), &outer));
        assert!(!is_on_stack(running.as_ref(), &stranger));
        assert!(!is_on_stack(None, &outer));
    }

    #[test]
    fn default_runtime_is_per_thread_singleton() {
        assert!(Runtime::current().ptr_eq(&Runtime::current()));
        assert!(!Runtime::current().ptr_eq(&Runtime::new()));
    }

    #[test]
    fn prune_drops_replaced_nested_objects() {
        let runtime = Runtime::with_config(RuntimeConfig::default().with_prune_interval(0));
        let root = Object::from_json(serde_json::json!({ "child": { "x": 1 } })).unwrap();
        let root = runtime.wrap(&root);
        let (runs, count) = counter();

        let reader = root.clone();
        let _runner = runtime.effect(move || {
            count.set(count.get() + 1);
            reader
                .get("child")
                .as_reactive()
                .map(|child| child.get("x"))
        });
        // Only `child.x` is recorded; reading `child` itself is not.
        assert_eq!(runtime.graph_len(), 1);
        assert_eq!(runtime.dependent_count(&root, "child"), 0);

        // Nothing holds the old child once it is replaced.
        root.set("child", Object::from_iter([("x", 2)]));
        assert_eq!(runs.get(), 1);
        assert_eq!(runtime.prune(), 1);
        assert_eq!(runtime.graph_len(), 0);
    }

    #[test]
    fn graph_does_not_keep_objects_or_runtime_alive() {
        let runtime = Runtime::with_config(RuntimeConfig::default().with_prune_interval(0));
        let object = Object::from_iter([("x", 1)]);
        let weak_object = object.downgrade();
        let state = runtime.wrap(&object);

        let reader = state.clone();
        let runner = runtime.effect(move || reader.get("x"));
        assert_eq!(runtime.graph_len(), 1);

        drop(object);
        drop(state);
        drop(runner);
        assert!(!weak_object.is_alive());
        assert_eq!(runtime.prune(), 1);
        assert_eq!(runtime.graph_len(), 0);

        let weak_runtime = runtime.downgrade();
        drop(runtime);
        assert_eq!(weak_runtime.strong_count(), 0);
    }

    #[test]
    fn handles_from_another_runtime_are_not_tracked() {
        let runtime = Runtime::new();
        let other = Runtime::new();
        let foreign = other.wrap(&Object::from_iter([("x", 1)]));
        let (runs, count) = counter();

        let reader = foreign.clone();
        let runner = runtime.effect(move || {
            count.set(count.get() + 1);
            reader.get("x");
        });
        assert_eq!(runner.effect().dependency_count(), 0);

        foreign.set("x", 2);
        assert_eq!(runs.get(), 1);
    }
}
