//! Optimizer driver state
//!
//! [`Optimizer`] is the context every stage works against during one run:
//! the value-equivalence map, the output trace under construction, and the
//! run statistics.

use log::trace;

use crate::error::{OptimizeError, Result};
use crate::ir::{OpKind, OpRef, Operand, Operation, Trace, Type};
use crate::trie::PersistentMap;

use super::pipeline::OptimizationStats;
use super::value::Value;

/// Per-run optimizer context
pub struct Optimizer {
    /// Operand → resolved value; always terminal, never another bound operand
    values: PersistentMap<Operand, Value>,
    output: Vec<Operation>,
    next_id: u32,
    stats: OptimizationStats,
}

impl Optimizer {
    /// Create a context whose synthesized operations start at `next_id`
    pub fn new(next_id: u32) -> Self {
        Self {
            values: PersistentMap::new(),
            output: Vec::new(),
            next_id,
            stats: OptimizationStats::new(),
        }
    }

    /// Create a context for `trace`, avoiding every id the trace uses
    pub fn for_trace(trace: &Trace) -> Self {
        Self::new(trace.next_free_id())
    }

    /// Current value of `operand`; unbound operands are opaque
    pub fn resolve_value(&self, operand: Operand) -> Value {
        match operand {
            Operand::Const(n) => Value::Constant(n),
            _ => self
                .values
                .find(&operand)
                .cloned()
                .unwrap_or(Value::Opaque(operand)),
        }
    }

    pub fn resolve_values(&self, operands: &[Operand]) -> Vec<Value> {
        operands.iter().map(|&operand| self.resolve_value(operand)).collect()
    }

    /// Make `operand` resolve to `value` from now on.
    ///
    /// An opaque value naming another operand is resolved first, so lookups
    /// never need more than one hop.
    pub fn bind(&mut self, operand: impl Into<Operand>, value: Value) {
        let operand = operand.into();
        let value = match value {
            Value::Opaque(target) if target != operand => self.resolve_value(target),
            value => value,
        };
        trace!("bind {operand} -> {value}");
        self.values = self.values.set(operand, value);
    }

    pub fn new_constant(&self, n: i64) -> Value {
        Value::Constant(n)
    }

    /// Append a fresh operation directly to the output trace
    pub fn append_operation(
        &mut self,
        kind: OpKind,
        args: Vec<Operand>,
        ty: Option<Type>,
    ) -> Operation {
        let op = self.create_operation(kind, args, ty);
        self.output.push(op.clone());
        op
    }

    /// Allocate a fresh operation without emitting it
    pub(crate) fn create_operation(
        &mut self,
        kind: OpKind,
        args: Vec<Operand>,
        ty: Option<Type>,
    ) -> Operation {
        let id = OpRef(self.next_id);
        self.next_id += 1;
        Operation::new(id, kind, args, ty)
    }

    /// Emit `op` at the end of the chain, with each argument replaced by
    /// the operand its resolved value lives in.
    pub(crate) fn emit(&mut self, op: &Operation) -> Result<()> {
        let args = op
            .args
            .iter()
            .map(|&arg| match self.resolve_value(arg) {
                Value::Constant(n) => Ok(Operand::Const(n)),
                Value::Opaque(operand) => Ok(operand),
                Value::Virtual(object) => Err(OptimizeError::EscapedVirtual {
                    origin: object.origin(),
                }),
            })
            .collect::<Result<Vec<_>>>()?;
        trace!("emit {op}");
        self.output.push(Operation::new(op.id, op.kind, args, op.ty));
        Ok(())
    }

    /// Handle on the current value-equivalence map.
    ///
    /// The handle is persistent: later bindings do not change it.
    pub fn value_map(&self) -> PersistentMap<Operand, Value> {
        self.values.clone()
    }

    /// Operations emitted so far
    pub fn output(&self) -> &[Operation] {
        &self.output
    }

    pub fn stats(&self) -> &OptimizationStats {
        &self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut OptimizationStats {
        &mut self.stats
    }

    /// Finish the run, returning the output operations and statistics
    pub fn finish(mut self) -> (Vec<Operation>, OptimizationStats) {
        self.stats.ops_out = self.output.len();
        (self.output, self.stats)
    }
}
