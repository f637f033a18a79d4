//! Reactive Primitives
//!
//! This module implements the reactive system: handles, effects and watches.
//!
//! # Concepts
//!
//! ## Handles
//!
//! A [`Reactive`] handle wraps an [`Object`](crate::Object). When a property
//! is read through the handle while an effect is running, the effect is
//! registered as a dependent of that property. When a property is written
//! through the handle and its value changes, all dependents are notified.
//!
//! ## Effects
//!
//! An effect is a computation that re-runs whenever the properties it read
//! change. Each run forgets the previous dependencies and records new ones,
//! so an effect only ever depends on what its latest run actually touched.
//!
//! ## Watches
//!
//! A watch is an effect paired with a callback that receives the new and
//! previous values of its source.
//!
//! # Implementation Notes
//!
//! Dependency detection is automatic: the [`Runtime`] keeps a slot with the
//! running effect, and handles consult it on every read. Dependency sets
//! hold effects weakly; the runner or watch handle returned to the caller
//! owns the effect.

mod context;
mod effect;
mod proxy;
mod runtime;
mod watch;

pub(crate) use effect::EffectCore;
pub use effect::{EffectId, EffectOptions, EffectRunner, ReactiveEffect, Scheduler};
pub use proxy::{is_reactive, Reactive, IS_REACTIVE_KEY};
pub use runtime::Runtime;
pub use watch::{traverse, WatchHandle, WatchSource};
