//! Plain objects.
//!
//! An [`Object`] is a shared, identity-bearing property table. Cloning an
//! `Object` clones the reference, not the data, so two clones observe each
//! other's writes. Properties keep insertion order, which is the order
//! [`Object::keys`] and deep traversal visit them in.
//!
//! Objects know nothing about tracking. Reads and writes made through an
//! `Object` directly are invisible to effects; wrap the object with
//! [`Runtime::wrap`](crate::Runtime::wrap) to get a tracked handle.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use super::Value;
use crate::error::{ReflexError, Result};

/// Stable identity of an [`Object`].
///
/// Ids are never reused, so side tables keyed by `ObjectId` cannot confuse a
/// dropped object with a newer one allocated at the same address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object#{}", self.0)
    }
}

/// The `this` an accessor runs against.
///
/// When an accessor is reached through a reactive handle the receiver is the
/// handle, so every property the accessor reads is tracked. Reached through a
/// plain [`Object`], the receiver is the object and nothing is tracked.
pub trait Receiver {
    /// Read a property through this receiver.
    fn get(&self, key: &str) -> Value;

    /// Write a property through this receiver.
    fn set(&self, key: &str, value: Value);
}

type Getter = Rc<dyn Fn(&dyn Receiver) -> Value>;
type Setter = Rc<dyn Fn(&dyn Receiver, Value)>;

/// A computed property: a getter and an optional setter.
///
/// ```rust
/// use reflex_core::{Accessor, Object, Value};
///
/// let person = Object::new();
/// person.set("name", "jw");
/// person.define_accessor(
///     "alias",
///     Accessor::new(|this| {
///         let name = this.get("name");
///         Value::from(format!("**{}**", name.as_str().unwrap_or_default()))
///     }),
/// );
/// assert_eq!(person.get("alias").as_str(), Some("**jw**"));
/// ```
#[derive(Clone)]
pub struct Accessor {
    get: Getter,
    set: Option<Setter>,
}

impl Accessor {
    /// Create a read-only accessor. Writes to it are ignored.
    pub fn new<G>(get: G) -> Self
    where
        G: Fn(&dyn Receiver) -> Value + 'static,
    {
        Self {
            get: Rc::new(get),
            set: None,
        }
    }

    /// Attach a setter.
    pub fn with_setter<S>(mut self, set: S) -> Self
    where
        S: Fn(&dyn Receiver, Value) + 'static,
    {
        self.set = Some(Rc::new(set));
        self
    }

    /// Whether writes through this accessor do anything.
    pub fn is_writable(&self) -> bool {
        self.set.is_some()
    }
}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accessor")
            .field("writable", &self.is_writable())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
enum Property {
    Data(Value),
    Accessor(Accessor),
}

struct ObjectInner {
    id: ObjectId,
    props: RefCell<IndexMap<String, Property>>,
}

/// A shared, mutable property table with reference identity.
#[derive(Clone)]
pub struct Object(Rc<ObjectInner>);

impl Object {
    /// Create an empty object.
    pub fn new() -> Self {
        Self(Rc::new(ObjectInner {
            id: ObjectId::next(),
            props: RefCell::new(IndexMap::new()),
        }))
    }

    /// Build an object from a JSON object.
    ///
    /// Nested objects become nested [`Object`]s; arrays become objects keyed
    /// by index.
    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        match Value::from_json(json) {
            Value::Object(object) => Ok(object),
            other => Err(ReflexError::NotAnObject(other.kind())),
        }
    }

    /// This object's identity.
    pub fn id(&self) -> ObjectId {
        self.0.id
    }

    /// Whether two references point at the same object.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Read a property. Missing keys read as [`Value::Null`].
    pub fn get(&self, key: &str) -> Value {
        self.read_with(key, self)
    }

    /// Write a property, replacing any data value stored under `key`.
    ///
    /// Writing to an accessor calls its setter, or does nothing if it has none.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        self.write_with(key, value.into(), self);
    }

    /// Install an accessor under `key`, replacing whatever was there.
    pub fn define_accessor(&self, key: &str, accessor: Accessor) {
        self.0
            .props
            .borrow_mut()
            .insert(key.to_owned(), Property::Accessor(accessor));
    }

    /// Remove a property, returning its data value if it had one.
    pub fn remove(&self, key: &str) -> Option<Value> {
        match self.0.props.borrow_mut().shift_remove(key)? {
            Property::Data(value) => Some(value),
            Property::Accessor(_) => None,
        }
    }

    /// Whether `key` is present, as data or accessor.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.props.borrow().contains_key(key)
    }

    /// Property names in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.0.props.borrow().keys().cloned().collect()
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.0.props.borrow().len()
    }

    /// Whether the object has no properties.
    pub fn is_empty(&self) -> bool {
        self.0.props.borrow().is_empty()
    }

    pub(crate) fn downgrade(&self) -> WeakObject {
        WeakObject {
            inner: Rc::downgrade(&self.0),
        }
    }

    /// Read `key`, running accessors against `receiver`.
    ///
    /// The property table is not borrowed while the getter runs, so getters
    /// are free to read this same object.
    pub(crate) fn read_with(&self, key: &str, receiver: &dyn Receiver) -> Value {
        let property = self.0.props.borrow().get(key).cloned();
        match property {
            Some(Property::Data(value)) => value,
            Some(Property::Accessor(accessor)) => (accessor.get)(receiver),
            None => Value::Null,
        }
    }

    /// Write `key`, running accessor setters against `receiver`.
    pub(crate) fn write_with(&self, key: &str, value: Value, receiver: &dyn Receiver) {
        let setter = {
            let mut props = self.0.props.borrow_mut();
            match props.get_mut(key) {
                Some(Property::Accessor(accessor)) => accessor.set.clone(),
                Some(Property::Data(slot)) => {
                    *slot = value;
                    return;
                }
                None => {
                    props.insert(key.to_owned(), Property::Data(value));
                    return;
                }
            }
        };
        if let Some(setter) = setter {
            setter(receiver, value);
        }
    }
}

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

impl Receiver for Object {
    fn get(&self, key: &str) -> Value {
        Object::get(self, key)
    }

    fn set(&self, key: &str, value: Value) {
        Object::set(self, key, value);
    }
}

impl<K, V> FromIterator<(K, V)> for Object
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let object = Object::new();
        {
            let mut props = object.0.props.borrow_mut();
            for (key, value) in iter {
                props.insert(key.into(), Property::Data(value.into()));
            }
        }
        object
    }
}

impl fmt::Debug for Object {
    // Objects may be cyclic, so only the identity and key names are printed.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Object");
        debug.field("id", &self.0.id);
        match self.0.props.try_borrow() {
            Ok(props) => debug.field("keys", &props.keys().collect::<Vec<_>>()),
            Err(_) => debug.field("keys", &"<borrowed>"),
        };
        debug.finish()
    }
}

/// Non-owning reference to an [`Object`], used by side tables.
#[derive(Debug, Clone)]
pub(crate) struct WeakObject {
    inner: Weak<ObjectInner>,
}

impl WeakObject {
    pub(crate) fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}
