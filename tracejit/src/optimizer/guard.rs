//! Guard propagation
//!
//! A guard whose argument is already a known constant is either redundant
//! (elided) or provably failing (the run aborts). A guard that survives
//! tells every later operation what its argument must be.

use log::trace;

use crate::error::{OptimizeError, Result};
use crate::ir::{OpKind, Operation};

use super::dispatch::{DispatchBuilder, DispatchTable};
use super::driver::Optimizer;
use super::pipeline::{forward, Chain, Handler, OptimizationStage};
use super::value::Value;

/// Guard propagation stage
pub struct GuardPropagation {
    table: DispatchTable<Handler>,
}

impl GuardPropagation {
    pub fn new() -> Self {
        Self {
            table: DispatchBuilder::new()
                .register_all(&[OpKind::GuardTrue, OpKind::GuardFalse], propagate_guard as Handler)
                .build_with_default(forward as Handler),
        }
    }
}

impl Default for GuardPropagation {
    fn default() -> Self {
        Self::new()
    }
}

impl OptimizationStage for GuardPropagation {
    fn name(&self) -> &'static str {
        "guard_propagation"
    }

    fn handle(&self, opt: &mut Optimizer, rest: Chain<'_>, op: &Operation) -> Result<()> {
        (self.table.get(op.kind))(opt, rest, op)
    }
}

/// Truth value a passing guard of `kind` implies
fn expected_truth(kind: OpKind) -> bool {
    kind == OpKind::GuardTrue
}

fn propagate_guard(opt: &mut Optimizer, rest: Chain<'_>, op: &Operation) -> Result<()> {
    let arg = op.arg(0)?;
    let expected = expected_truth(op.kind);

    match opt.resolve_value(arg) {
        Value::Constant(value) => {
            if (value != 0) != expected {
                return Err(OptimizeError::GuardContradiction {
                    op: op.id,
                    guard: op.kind,
                    value,
                });
            }
            trace!("elide {op}: {arg} is const {value}");
            opt.stats_mut().guards_elided += 1;
            Ok(())
        }
        Value::Virtual(_) | Value::Opaque(_) => {
            rest.forward(opt, op)?;
            let known = opt.new_constant(i64::from(expected));
            opt.bind(arg, known);
            opt.stats_mut().guards_kept += 1;
            Ok(())
        }
    }
}
