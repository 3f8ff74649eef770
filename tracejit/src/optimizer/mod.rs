//! Trace optimizer
//!
//! Operations flow through an ordered chain of stages exactly once, in trace
//! order. Stages share one [`Optimizer`] context holding the
//! value-equivalence map (operand → [`Value`]) and the output trace.
//!
//! Release pipeline:
//!
//! ```text
//! trace ──► constant_fold ──► guard_propagation ──► virtualize ──► output
//! ```

mod dispatch;
mod driver;
mod fold;
mod guard;
mod pipeline;
mod value;
mod virtualize;

pub use dispatch::{DispatchBuilder, DispatchTable};
pub use driver::Optimizer;
pub use fold::{evaluate, ConstantFold, FOLDABLE};
pub use guard::GuardPropagation;
pub use pipeline::{
    forward, Chain, Handler, OptLevel, OptimizationPipeline, OptimizationStage, OptimizationStats,
};
pub use value::{Value, VirtualObject};
pub use virtualize::Virtualize;

use crate::error::Result;
use crate::ir::Trace;

/// Optimize `trace` in place at the given level
pub fn optimize(trace: &mut Trace, level: OptLevel) -> Result<OptimizationStats> {
    OptimizationPipeline::for_level(level).optimize(trace)
}
