//! Dependency Graph
//!
//! This module stores which effects read which properties.
//!
//! # Overview
//!
//! The graph is a two-level map:
//!
//! - Outer key: an object, identified by its [`ObjectId`](crate::ObjectId)
//! - Inner key: a property name
//! - Value: the set of effects that read that property during their most
//!   recent run
//!
//! Edges run both ways, and both are weak. A dependency set refers to its
//! effects weakly, and each effect remembers (weakly) every set it joined.
//! That reverse list makes cleanup proportional to the number of properties
//! an effect read, rather than to the size of the graph.
//!
//! # Design Decisions
//!
//! 1. Objects and effects are held weakly. A dropped object's entry becomes
//!    unreachable at once and is swept later, so the graph never extends an
//!    object's life, directly or through an effect that captured it.
//!
//! 2. Dependency sets keep subscription order, so effects re-run in the order
//!    they first read a property.
//!
//! 3. The graph does no scheduling of its own. Deciding what runs, and what is
//!    skipped as re-entrant, belongs to the runtime.

mod dep;
mod target_map;

pub(crate) use dep::{Dep, DepSet};
pub(crate) use target_map::DependencyGraph;
