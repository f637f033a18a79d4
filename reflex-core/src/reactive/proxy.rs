//! Reactive Handles
//!
//! A [`Reactive`] is a tracked view of an [`Object`]. Reading a property
//! through it records a dependency for the running effect; writing a
//! property through it re-runs the effects that read that property.
//!
//! # Deep reactivity
//!
//! Nested objects are wrapped lazily: reading a property whose value is an
//! object returns a handle for that object, created (or fetched from the
//! cache) on the spot. Nothing below the top level is wrapped up front.
//! Only reads of non-object values are tracked.
//!
//! # Identity
//!
//! The runtime caches one handle per object, so wrapping the same object
//! twice yields the same handle. Writes store raw objects, never handles, so
//! handles do not nest.

use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use super::runtime::Runtime;
use crate::value::{Object, ObjectId, Receiver, Value};

/// Reserved property name that reads as `true` on every handle.
pub const IS_REACTIVE_KEY: &str = "__v_isReactive";

/// Whether `value` is a reactive handle.
///
/// Probes the reserved marker property, the same check a consumer holding
/// only a [`Value`] can make.
pub fn is_reactive(value: &Value) -> bool {
    match value {
        Value::Reactive(handle) => handle.get(IS_REACTIVE_KEY).is_truthy(),
        _ => false,
    }
}

struct HandleInner {
    target: Object,
    runtime: Runtime,
}

/// A tracked handle over an [`Object`].
///
/// Cloning yields another reference to the same handle.
#[derive(Clone)]
pub struct Reactive(Rc<HandleInner>);

impl Reactive {
    pub(crate) fn new(target: Object, runtime: Runtime) -> Self {
        Self(Rc::new(HandleInner { target, runtime }))
    }

    /// Read `key`, recording the read for the running effect.
    ///
    /// Object values come back wrapped, and reading one records nothing:
    /// replacing a nested object does not re-run effects that only read
    /// through it. Accessors run with this handle as their receiver, so the
    /// properties they read are tracked too.
    pub fn get(&self, key: &str) -> Value {
        if key == IS_REACTIVE_KEY {
            return Value::Bool(true);
        }

        let target = &self.0.target;
        match target.read_with(key, self) {
            // Not tracked: the nested handle tracks the reads made through it.
            Value::Object(nested) => Value::Reactive(self.0.runtime.wrap(&nested)),
            other => {
                self.0.runtime.inner().track(target, key);
                other
            }
        }
    }

    /// Write `key`, re-running dependents if the stored value changed.
    ///
    /// Handles are unwrapped before storing. Accessor setters run with this
    /// handle as their receiver.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        let target = &self.0.target;
        let old = target.get(key);
        target.write_with(key, value.into().into_raw(), self);

        // Compare against what the object holds now, not what was passed in:
        // a setter may transform the value or ignore it.
        let new = target.get(key);
        if !old.strict_eq(&new) {
            self.0.runtime.inner().trigger(target, key, &new, &old);
        }
    }

    /// Whether `key` is present. Counts as a read of `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        let target = &self.0.target;
        self.0.runtime.inner().track(target, key);
        target.contains_key(key)
    }

    /// Property names in insertion order. Not tracked.
    pub fn keys(&self) -> Vec<String> {
        self.0.target.keys()
    }

    /// The wrapped object. Reads and writes through it are not tracked.
    pub fn raw(&self) -> &Object {
        &self.0.target
    }

    /// Identity of the wrapped object.
    pub fn id(&self) -> ObjectId {
        self.0.target.id()
    }

    /// The runtime this handle reports reads and writes to.
    pub fn runtime(&self) -> &Runtime {
        &self.0.runtime
    }

    /// Whether two handles are the same handle.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn downgrade(&self) -> Weak<HandleInner> {
        Rc::downgrade(&self.0)
    }
}

impl PartialEq for Reactive {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Receiver for Reactive {
    fn get(&self, key: &str) -> Value {
        Reactive::get(self, key)
    }

    fn set(&self, key: &str, value: Value) {
        Reactive::set(self, key, value);
    }
}

impl fmt::Debug for Reactive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Reactive").field(&self.0.target).finish()
    }
}

/// Object → live handle, held weakly on both sides.
pub(crate) struct ProxyCache {
    handles: HashMap<ObjectId, Weak<HandleInner>>,
    prune_interval: usize,
    inserted_since_prune: usize,
}

impl ProxyCache {
    pub(crate) fn new(prune_interval: usize) -> Self {
        Self {
            handles: HashMap::new(),
            prune_interval,
            inserted_since_prune: 0,
        }
    }

    /// The live handle for `id`, if one exists.
    pub(crate) fn get(&self, id: ObjectId) -> Option<Reactive> {
        self.handles.get(&id)?.upgrade().map(Reactive)
    }

    pub(crate) fn insert(&mut self, handle: &Reactive) {
        self.inserted_since_prune += 1;
        if self.prune_interval > 0 && self.inserted_since_prune >= self.prune_interval {
            self.prune();
        }
        self.handles.insert(handle.id(), handle.downgrade());
    }

    pub(crate) fn prune(&mut self) {
        self.handles.retain(|_, handle| handle.strong_count() > 0);
        self.inserted_since_prune = 0;
    }

    pub(crate) fn len(&self) -> usize {
        self.handles.len()
    }
}
