//! Reflex Core
//!
//! This crate provides a fine-grained reactive dependency-tracking engine.
//! It implements:
//!
//! - Reactive handles that record property reads and announce writes
//! - Effects that re-run when something they read changes
//! - A dependency graph from (object, property) to effects
//! - `watch`, which feeds old and new values to a callback
//!
//! The engine is synchronous and single-threaded. It knows nothing about
//! rendering; any consumer can hold handles and runners and drive them.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `value`: dynamic values and plain objects
//! - `reactive`: handles, effects, the tracking context and the runtime
//! - `graph`: the object → key → effects map
//!
//! # Example
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! use reflex_core::{effect, reactive};
//! use serde_json::json;
//!
//! let state = reactive(json!({ "x": 1 }));
//! let state = state.as_reactive().unwrap().clone();
//!
//! let seen = Rc::new(Cell::new(0));
//! let (reader, sink) = (state.clone(), Rc::clone(&seen));
//! let runner = effect(move || sink.set(reader.get("x").as_int().unwrap_or_default()));
//! assert_eq!(seen.get(), 1);
//!
//! state.set("x", 2);
//! // Effect automatically ran again
//! assert_eq!(seen.get(), 2);
//!
//! runner.stop();
//! state.set("x", 3);
//! assert_eq!(seen.get(), 2);
//! ```

pub mod config;
pub mod error;
mod graph;
pub mod reactive;
pub mod value;

pub use config::RuntimeConfig;
pub use error::{ReflexError, Result};
pub use reactive::{
    is_reactive, traverse, EffectId, EffectOptions, EffectRunner, Reactive, ReactiveEffect,
    Runtime, Scheduler, WatchHandle, WatchSource, IS_REACTIVE_KEY,
};
pub use value::{Accessor, Object, ObjectId, Receiver, Value};

/// Wrap `value` on this thread's default runtime.
///
/// See [`Runtime::reactive`].
pub fn reactive(value: impl Into<Value>) -> Value {
    Runtime::current().reactive(value)
}

/// Create and run an effect on this thread's default runtime.
///
/// See [`Runtime::effect`].
pub fn effect<R, F>(work: F) -> EffectRunner<R>
where
    R: 'static,
    F: Fn() -> R + 'static,
{
    Runtime::current().effect(work)
}

/// Create an effect with options on this thread's default runtime.
pub fn effect_with<R, F>(work: F, options: EffectOptions) -> EffectRunner<R>
where
    R: 'static,
    F: Fn() -> R + 'static,
{
    Runtime::current().effect_with(work, options)
}

/// Watch `source` on this thread's default runtime.
///
/// See [`Runtime::watch`].
pub fn watch<S, C>(source: S, callback: C) -> WatchHandle
where
    S: WatchSource,
    C: Fn(&S::Output, &S::Output) + 'static,
{
    Runtime::current().watch(source, callback)
}
