//! Effect Implementation
//!
//! An effect is a unit of work that re-runs whenever data it read changes.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies (unless created lazily).
//!
//! 2. Every run first leaves every dependency set the effect joined last
//!    time, then runs the work function with the effect installed in the
//!    tracking context. Whatever the work function reads now is exactly the
//!    new dependency set, so branches that stopped being taken stop
//!    triggering the effect.
//!
//! 3. When a dependency changes, the effect's scheduler is called if it has
//!    one; otherwise the effect re-runs directly.
//!
//! # Stopping
//!
//! [`ReactiveEffect::stop`] leaves all dependency sets and turns tracking off
//! for good. A stopped effect can still be run by hand; it just executes the
//! work function without recording anything.
//!
//! # Ownership
//!
//! Dependency sets hold effects weakly. An effect lives as long as a
//! [`ReactiveEffect`], [`EffectRunner`] or [`WatchHandle`](crate::WatchHandle)
//! for it does; dropping the last one stops it. The graph therefore never
//! keeps an effect, or the handles its closure captured, alive.
//!
//! # Failure
//!
//! If the work function panics, the tracking context is still restored before
//! the panic propagates. Dependencies read before the panic stay recorded and
//! the rest are lost until the next successful run.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;
use tracing::{debug, trace};

use super::runtime::RuntimeInner;
use crate::graph::{Dep, DepSet};

/// Called instead of a direct re-run when an effect's dependencies change.
pub type Scheduler = Rc<dyn Fn()>;

/// Unique identifier for an effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(u64);

impl EffectId {
    /// Generate a new unique effect ID.
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "effect#{}", self.0)
    }
}

/// Options for [`Runtime::effect_with`](crate::Runtime::effect_with).
#[derive(Clone, Default)]
pub struct EffectOptions {
    pub(crate) scheduler: Option<Scheduler>,
    pub(crate) lazy: bool,
    pub(crate) label: Option<String>,
}

impl EffectOptions {
    /// Default options: no scheduler, run immediately, no label.
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `scheduler` instead of re-running when dependencies change.
    pub fn scheduler<S>(mut self, scheduler: S) -> Self
    where
        S: Fn() + 'static,
    {
        self.scheduler = Some(Rc::new(scheduler));
        self
    }

    /// Skip the initial run. The effect tracks nothing until run by hand.
    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    /// Name the effect in log output.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

impl fmt::Debug for EffectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectOptions")
            .field("scheduler", &self.scheduler.is_some())
            .field("lazy", &self.lazy)
            .field("label", &self.label)
            .finish()
    }
}

/// Type-erased state shared by every handle to one effect.
///
/// Dependency sets hold effects as `Rc<EffectCore>`, so this is the part the
/// graph and the tracking context see. The typed work function lives in
/// [`ReactiveEffect`]; `job` is a result-discarding re-run of it.
pub(crate) struct EffectCore {
    id: EffectId,
    label: Option<String>,
    active: Cell<bool>,
    /// The effect that was running when this one started. Only set while
    /// this effect is itself running.
    parent: RefCell<Option<Rc<EffectCore>>>,
    /// Every dependency set this effect is a member of.
    deps: RefCell<SmallVec<[Weak<RefCell<DepSet>>; 4]>>,
    scheduler: Option<Scheduler>,
    job: Box<dyn Fn()>,
    runtime: Weak<RuntimeInner>,
    run_count: Cell<usize>,
}

impl EffectCore {
    pub(crate) fn id(&self) -> EffectId {
        self.id
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.get()
    }

    pub(crate) fn parent(&self) -> Option<Rc<EffectCore>> {
        self.parent.borrow().clone()
    }

    pub(crate) fn set_parent(&self, parent: Option<Rc<EffectCore>>) {
        *self.parent.borrow_mut() = parent;
    }

    pub(crate) fn take_parent(&self) -> Option<Rc<EffectCore>> {
        self.parent.borrow_mut().take()
    }

    /// Record membership in `dep`. The set itself is updated by the caller.
    pub(crate) fn add_dep(&self, dep: &Dep) {
        self.deps.borrow_mut().push(Rc::downgrade(dep));
    }

    /// Number of dependency sets this effect currently belongs to.
    pub(crate) fn dependency_count(&self) -> usize {
        self.deps
            .borrow()
            .iter()
            .filter(|dep| dep.strong_count() > 0)
            .count()
    }

    /// Run `work` with this effect installed as the running effect.
    pub(crate) fn run_with<R>(self: &Rc<Self>, work: impl FnOnce() -> R) -> R {
        self.run_count.set(self.run_count.get() + 1);
        if !self.is_active() {
            return work();
        }
        let Some(runtime) = self.runtime.upgrade() else {
            return work();
        };

        let _scope = runtime.context().enter(self);
        self.cleanup();
        trace!(effect = %self.id, label = self.label.as_deref(), "running effect");
        work()
    }

    /// React to a dependency change.
    pub(crate) fn schedule(&self) {
        match &self.scheduler {
            Some(scheduler) => scheduler(),
            None => (self.job)(),
        }
    }

    pub(crate) fn stop(&self) {
        if self.active.replace(false) {
            self.cleanup();
            debug!(effect = %self.id, label = self.label.as_deref(), "effect stopped");
        }
    }

    /// Leave every dependency set.
    fn cleanup(&self) {
        let deps = std::mem::take(&mut *self.deps.borrow_mut());
        for dep in deps {
            if let Some(dep) = dep.upgrade() {
                dep.borrow_mut().remove(self.id);
            }
        }
    }
}

impl Drop for EffectCore {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl fmt::Debug for EffectCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectCore")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("active", &self.is_active())
            .field("dependency_count", &self.dependency_count())
            .finish()
    }
}

/// A re-runnable unit of work whose reads are tracked.
///
/// Cloning yields another handle to the same effect. The effect stops
/// reacting once every handle to it is dropped.
///
/// # Example
///
/// ```rust
/// use reflex_core::Runtime;
/// use serde_json::json;
///
/// let runtime = Runtime::new();
/// let state = runtime.reactive(json!({ "count": 0 }));
/// let state = state.as_reactive().unwrap().clone();
///
/// let reader = state.clone();
/// let runner = runtime.effect(move || reader.get("count").as_int().unwrap_or_default());
/// assert_eq!(runner.effect().run_count(), 1);
///
/// state.set("count", 5); // re-runs the effect
/// assert_eq!(runner.effect().run_count(), 2);
/// assert_eq!(runner.run(), 5);
/// ```
pub struct ReactiveEffect<R: 'static> {
    core: Rc<EffectCore>,
    work: Rc<dyn Fn() -> R>,
}

impl<R: 'static> ReactiveEffect<R> {
    /// Build an effect without running it.
    ///
    /// `scheduler` receives a weak link to the new effect so it can re-run it
    /// without creating a reference cycle.
    pub(crate) fn build<S>(
        runtime: Weak<RuntimeInner>,
        work: Rc<dyn Fn() -> R>,
        label: Option<String>,
        scheduler: S,
    ) -> Self
    where
        S: FnOnce(&Weak<EffectCore>) -> Option<Scheduler>,
    {
        let core = Rc::new_cyclic(|weak: &Weak<EffectCore>| {
            let job: Box<dyn Fn()> = {
                let weak = weak.clone();
                let work = Rc::clone(&work);
                Box::new(move || {
                    if let Some(core) = weak.upgrade() {
                        let _ = core.run_with(|| work());
                    }
                })
            };
            EffectCore {
                id: EffectId::next(),
                label,
                active: Cell::new(true),
                parent: RefCell::new(None),
                deps: RefCell::new(SmallVec::new()),
                scheduler: scheduler(weak),
                job,
                runtime,
                run_count: Cell::new(0),
            }
        });
        Self { core, work }
    }

    /// Run the work function and return its result.
    ///
    /// While active, the run replaces this effect's dependencies with
    /// whatever the work function reads. Once stopped, it just calls the work
    /// function.
    pub fn run(&self) -> R {
        let work = &self.work;
        self.core.run_with(|| work())
    }

    /// Stop tracking. Idempotent.
    pub fn stop(&self) {
        self.core.stop();
    }

    /// Whether the effect still tracks and reacts.
    pub fn is_active(&self) -> bool {
        self.core.is_active()
    }

    /// Get the effect's unique ID.
    pub fn id(&self) -> EffectId {
        self.core.id
    }

    /// The label given at creation, if any.
    pub fn label(&self) -> Option<&str> {
        self.core.label.as_deref()
    }

    /// Whether dependency changes go through a scheduler.
    pub fn has_scheduler(&self) -> bool {
        self.core.scheduler.is_some()
    }

    /// Number of times the work function has been invoked.
    pub fn run_count(&self) -> usize {
        self.core.run_count.get()
    }

    /// Number of (object, key) pairs the effect currently depends on.
    pub fn dependency_count(&self) -> usize {
        self.core.dependency_count()
    }

    pub(crate) fn core(&self) -> &Rc<EffectCore> {
        &self.core
    }
}

impl<R: 'static> Clone for ReactiveEffect<R> {
    fn clone(&self) -> Self {
        Self {
            core: Rc::clone(&self.core),
            work: Rc::clone(&self.work),
        }
    }
}

impl<R: 'static> fmt::Debug for ReactiveEffect<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveEffect")
            .field("id", &self.core.id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("active", &self.is_active())
            .finish()
    }
}

/// What [`Runtime::effect`](crate::Runtime::effect) hands back: a callable
/// re-run of the effect that also exposes the effect itself.
///
/// The runner owns the effect. Keep it for as long as the effect should
/// react.
#[must_use = "the effect stops reacting when its runner is dropped"]
pub struct EffectRunner<R: 'static> {
    effect: ReactiveEffect<R>,
}

impl<R: 'static> EffectRunner<R> {
    pub(crate) fn new(effect: ReactiveEffect<R>) -> Self {
        Self { effect }
    }

    /// Force a re-run, returning the work function's result.
    pub fn run(&self) -> R {
        self.effect.run()
    }

    /// The effect behind this runner.
    pub fn effect(&self) -> &ReactiveEffect<R> {
        &self.effect
    }

    /// Shorthand for `self.effect().stop()`.
    pub fn stop(&self) {
        self.effect.stop();
    }
}

impl<R: 'static> Clone for EffectRunner<R> {
    fn clone(&self) -> Self {
        Self {
            effect: self.effect.clone(),
        }
    }
}

impl<R: 'static> fmt::Debug for EffectRunner<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EffectRunner").field(&self.effect).finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Runtime;
    use crate::value::Object;

    #[test]
    fn effect_runs_on_creation() {
        let runtime = Runtime::new();
        let runs = Rc::new(Cell::new(0));
        let counter = Rc::clone(&runs);

        let runner = runtime.effect(move || counter.set(counter.get() + 1));

        // Effect should have run once on creation
        assert_eq!(runs.get(), 1);
        assert_eq!(runner.effect().run_count(), 1);
    }

    #[test]
    fn effect_lazy_does_not_run_on_creation() {
        let runtime = Runtime::new();
        let runs = Rc::new(Cell::new(0));
        let counter = Rc::clone(&runs);

        let runner = runtime.effect_with(
            move || counter.set(counter.get() + 1),
            EffectOptions::new().lazy(true),
        );

        assert_eq!(runs.get(), 0);
        assert_eq!(runner.effect().run_count(), 0);

        runner.run();
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn runner_returns_work_result() {
        let runtime = Runtime::new();
        let runner = runtime.effect(|| 21 * 2);
        assert_eq!(runner.run(), 42);
        assert_eq!(runner.effect().run_count(), 2);
    }

    #[test]
    fn stop_is_idempotent() {
        let runtime = Runtime::new();
        let state = runtime.wrap(&Object::from_iter([("x", 1)]));
        let reader = state.clone();
        let runner = runtime.effect(move || reader.get("x"));

        assert!(runner.effect().is_active());
        assert_eq!(runner.effect().dependency_count(), 1);

        runner.stop();
        runner.stop();
        assert!(!runner.effect().is_active());
        assert_eq!(runner.effect().dependency_count(), 0);
        assert_eq!(runtime.dependent_count(&state, "x"), 0);
    }

    #[test]
    fn stopped_effect_runs_without_tracking() {
        let runtime = Runtime::new();
        let state = runtime.wrap(&Object::from_iter([("x", 1)]));
        let reader = state.clone();
        let runner = runtime.effect(move || reader.get("x").as_int());
        runner.stop();

        assert_eq!(runner.run(), Some(1));
        assert_eq!(runner.effect().dependency_count(), 0);
        assert!(!runtime.is_tracking());
    }

    #[test]
    fn reading_twice_records_once() {
        let runtime = Runtime::new();
        let state = runtime.wrap(&Object::from_iter([("x", 1)]));
        let reader = state.clone();
        let runner = runtime.effect(move || {
            reader.get("x");
            reader.get("x");
        });

        assert_eq!(runner.effect().dependency_count(), 1);
        assert_eq!(runtime.dependent_count(&state, "x"), 1);
    }

    #[test]
    fn clone_shares_state() {
        let runtime = Runtime::new();
        let first = runtime.effect(|| ());
        let second = first.clone();

        assert_eq!(first.effect().id(), second.effect().id());

        first.run();
        assert_eq!(second.effect().run_count(), 2);

        first.stop();
        assert!(!second.effect().is_active());
    }

    #[test]
    fn options_carry_label_and_scheduler() {
        let runtime = Runtime::new();
        let runner = runtime.effect_with(
            || (),
            EffectOptions::new().label("render").scheduler(|| {}),
        );
        assert_eq!(runner.effect().label(), Some("render"));
        assert!(runner.effect().has_scheduler());
        assert!(format!("{:?}", EffectOptions::new()).contains("lazy: false"));
    }

    #[test]
    fn effect_ids_are_unique() {
        let runtime = Runtime::new();
        let a = runtime.effect(|| ());
        let b = runtime.effect(|| ());
        assert_ne!(a.effect().id(), b.effect().id());
        assert_eq!(a.effect().id().to_string(), format!("effect#{}", a.effect().id().raw()));
    }
}
