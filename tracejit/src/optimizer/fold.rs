//! Constant folding
//!
//! Arithmetic and comparisons whose arguments are all known constants are
//! evaluated at optimization time; the operation is bound to the result and
//! never reaches the output trace.

use log::trace;

use crate::error::{OptimizeError, Result};
use crate::ir::{OpKind, Operation};

use super::dispatch::{DispatchBuilder, DispatchTable};
use super::driver::Optimizer;
use super::pipeline::{forward, Chain, Handler, OptimizationStage};
use super::value::Value;

/// Kinds this stage knows how to evaluate
pub const FOLDABLE: [OpKind; 5] = [
    OpKind::IntAdd,
    OpKind::IntSub,
    OpKind::IntEq,
    OpKind::IntLt,
    OpKind::IntGt,
];

/// Constant folding stage
pub struct ConstantFold {
    table: DispatchTable<Handler>,
}

impl ConstantFold {
    pub fn new() -> Self {
        Self {
            table: DispatchBuilder::new()
                .register_all(&FOLDABLE, fold_binop as Handler)
                .build_with_default(forward as Handler),
        }
    }
}

impl Default for ConstantFold {
    fn default() -> Self {
        Self::new()
    }
}

impl OptimizationStage for ConstantFold {
    fn name(&self) -> &'static str {
        "constant_fold"
    }

    fn handle(&self, opt: &mut Optimizer, rest: Chain<'_>, op: &Operation) -> Result<()> {
        (self.table.get(op.kind))(opt, rest, op)
    }
}

fn fold_binop(opt: &mut Optimizer, rest: Chain<'_>, op: &Operation) -> Result<()> {
    if op.args.len() != 2 {
        return Err(OptimizeError::Arity {
            op: op.id,
            kind: op.kind,
            expected: 2,
            got: op.args.len(),
        });
    }

    let folded = match opt.resolve_values(&op.args).as_slice() {
        [Value::Constant(lhs), Value::Constant(rhs)] => evaluate(op.kind, *lhs, *rhs),
        _ => None,
    };

    match folded {
        Some(n) => {
            trace!("fold {op} => {n}");
            let value = opt.new_constant(n);
            opt.bind(op.id, value);
            opt.stats_mut().folded += 1;
            Ok(())
        }
        None => rest.forward(opt, op),
    }
}

/// Evaluate `kind` over integer operands.
///
/// Arithmetic wraps on overflow; comparisons yield 1 or 0.
pub fn evaluate(kind: OpKind, lhs: i64, rhs: i64) -> Option<i64> {
    let n = match kind {
        OpKind::IntAdd => lhs.wrapping_add(rhs),
        OpKind::IntSub => lhs.wrapping_sub(rhs),
        OpKind::IntEq => i64::from(lhs == rhs),
        OpKind::IntLt => i64::from(lhs < rhs),
        OpKind::IntGt => i64::from(lhs > rhs),
        _ => return None,
    };
    Some(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{OpRef, Operand, TraceBuilder};
    use crate::optimizer::OptimizationPipeline;

    fn fold_only() -> OptimizationPipeline {
        let mut pipeline = OptimizationPipeline::new();
        pipeline.add_stage(Box::new(ConstantFold::new()));
        pipeline
    }

    #[test]
    fn test_evaluate() {
        assert_eq!(evaluate(OpKind::IntAdd, 3, 4), Some(7));
        assert_eq!(evaluate(OpKind::IntSub, 3, 4), Some(-1));
        assert_eq!(evaluate(OpKind::IntEq, 2, 2), Some(1));
        assert_eq!(evaluate(OpKind::IntLt, 5, 2), Some(0));
        assert_eq!(evaluate(OpKind::IntGt, 5, 2), Some(1));
        assert_eq!(evaluate(OpKind::Call, 1, 1), None);
    }

    #[test]
    fn test_overflow_wraps() {
        assert_eq!(evaluate(OpKind::IntAdd, i64::MAX, 1), Some(i64::MIN));
        assert_eq!(evaluate(OpKind::IntSub, i64::MIN, 1), Some(i64::MAX));
    }

    #[test]
    fn test_fold_feeds_later_operations() {
        let mut b = TraceBuilder::new();
        let x = b.input();
        let a = b.int_add(Operand::Const(2), Operand::Const(3));
        let c = b.int_lt(a, Operand::Const(10));
        let d = b.int_add(x, c);
        b.finish(vec![d]);
        let mut trace = b.build();

        let stats = fold_only().optimize(&mut trace).unwrap();
        assert_eq!(trace.to_string(), "%2 = int_add(i0, 1)\nfinish(%2)");
        assert_eq!(stats.folded, 2);
    }

    #[test]
    fn test_missing_operand_is_reported() {
        let mut b = TraceBuilder::new();
        b.op(OpKind::IntAdd, vec![Operand::Const(1)]);
        let mut trace = b.build();

        let err = fold_only().optimize(&mut trace).unwrap_err();
        assert!(matches!(err, OptimizeError::Arity { op: OpRef(0), expected: 2, got: 1, .. }));
        // untouched on failure
        assert_eq!(trace.len(), 1);
    }

    #[test]
    fn test_extra_operand_is_reported() {
        let mut b = TraceBuilder::new();
        let x = b.input();
        let sum = b.op(OpKind::IntAdd, vec![Operand::Const(1), Operand::Const(2), x]);
        b.finish(vec![sum]);
        let mut trace = b.build();

        let err = fold_only().optimize(&mut trace).unwrap_err();
        assert_eq!(
            err,
            OptimizeError::Arity {
                op: OpRef(0),
                kind: OpKind::IntAdd,
                expected: 2,
                got: 3,
            }
        );
        assert_eq!(trace.len(), 2);
    }
}
