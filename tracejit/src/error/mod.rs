//! Error types
//!
//! Two independent taxonomies: container errors raised by the persistent
//! trie, and optimizer errors that abort an optimization run. Configuration
//! loading has its own small error type.

use thiserror::Error;

use crate::ir::{OpKind, OpRef};

/// Result type alias for optimizer operations
pub type Result<T> = std::result::Result<T, OptimizeError>;

/// Errors raised by [`crate::trie::PersistentMap`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TrieError {
    #[error("key not found")]
    KeyNotFound,
}

/// Errors that abort an optimization run
///
/// None of these are recoverable: they signal either a contradictory input
/// trace, a misconfigured pipeline, or a defect in a pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptimizeError {
    /// A guard contradicts a value already known to be constant
    #[error("guard {guard} on {op} contradicts known constant {value}")]
    GuardContradiction { op: OpRef, guard: OpKind, value: i64 },

    /// A dispatch table was built without covering every operation kind
    #[error("no handler registered for `{0}` and no default handler supplied")]
    MissingHandler(OpKind),

    /// `getint` was called on a value that is not a constant
    #[error("value is not a constant: {0}")]
    NotConstant(String),

    /// An operation does not have the arguments its handler reads
    #[error("`{kind}` ({op}) needs {expected} argument(s), got {got}")]
    Arity {
        op: OpRef,
        kind: OpKind,
        expected: usize,
        got: usize,
    },

    /// A virtual object reached the output trace without being forced
    #[error("virtual object allocated by {origin} escaped into the output trace")]
    EscapedVirtual { origin: OpRef },
}

impl OptimizeError {
    pub fn not_constant(description: impl Into<String>) -> Self {
        Self::NotConstant(description.into())
    }

    /// Whether this error signals a defect (as opposed to bad configuration)
    pub fn is_invariant_violation(&self) -> bool {
        !matches!(self, Self::MissingHandler(_))
    }
}

/// Errors raised while loading a pipeline configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid pipeline configuration: {0}")]
    Toml(#[from] toml::de::Error),
}
