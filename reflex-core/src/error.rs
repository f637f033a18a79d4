//! Error types.
//!
//! The tracking kernel itself never fails: re-entrant triggers are skipped,
//! double stops are no-ops and wrapping a non-object hands the value back.
//! Errors only arise at the edges, when converting dynamic [`Value`]s into
//! Rust types or JSON.
//!
//! [`Value`]: crate::Value

use thiserror::Error;

use crate::value::ObjectId;

/// Errors produced when moving data in or out of the dynamic value model.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReflexError {
    /// A value had a different kind than the caller asked for.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// The kind the caller asked for.
        expected: &'static str,
        /// The kind that was actually stored.
        found: &'static str,
    },

    /// JSON cannot represent NaN or infinities.
    #[error("cannot encode non-finite number {0} as JSON")]
    NonFiniteNumber(f64),

    /// An object was required but a primitive was supplied.
    #[error("expected an object, found {0}")]
    NotAnObject(&'static str),

    /// JSON is a tree; an object reachable from itself cannot be encoded.
    #[error("cannot encode cyclic {0} as JSON")]
    Cyclic(ObjectId),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReflexError>;
