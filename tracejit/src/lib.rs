//! Trace optimizer library
//!
//! Optimization layer of a tracing JIT: a persistent hash trie backing the
//! value-equivalence map, and a chain of rewrite stages (constant folding,
//! guard propagation, allocation sinking) over recorded traces.

pub mod config;
pub mod error;
pub mod ir;
pub mod optimizer;
pub mod trie;

pub use config::{PassKind, PipelineConfig};
pub use error::{ConfigError, OptimizeError, Result, TrieError};
pub use ir::{OpKind, OpRef, Operand, Operation, Trace, TraceBuilder, Type};
pub use optimizer::{optimize, OptLevel, OptimizationPipeline, OptimizationStats};
pub use trie::PersistentMap;
