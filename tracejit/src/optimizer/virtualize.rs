//! Virtualization (allocation sinking)
//!
//! `new` does not allocate; it binds a [`VirtualObject`]. Field writes to a
//! virtual object are recorded on the object instead of emitted. The first
//! time anything else references the object, it is forced: the allocation
//! is emitted and the object becomes an ordinary opaque value.

use log::{debug, trace};

use crate::error::Result;
use crate::ir::{OpKind, Operand, Operation, Type};

use super::dispatch::{DispatchBuilder, DispatchTable};
use super::driver::Optimizer;
use super::pipeline::{Chain, Handler, OptimizationStage};
use super::value::{Value, VirtualObject};

/// Virtualization stage
pub struct Virtualize {
    table: DispatchTable<Handler>,
}

impl Virtualize {
    pub fn new() -> Self {
        Self {
            table: DispatchBuilder::new()
                .register(OpKind::New, virtualize_new as Handler)
                .register(OpKind::SetField, absorb_setfield as Handler)
                .build_with_default(force_and_forward as Handler),
        }
    }
}

impl Default for Virtualize {
    fn default() -> Self {
        Self::new()
    }
}

impl OptimizationStage for Virtualize {
    fn name(&self) -> &'static str {
        "virtualize"
    }

    fn handle(&self, opt: &mut Optimizer, rest: Chain<'_>, op: &Operation) -> Result<()> {
        (self.table.get(op.kind))(opt, rest, op)
    }
}

fn virtualize_new(opt: &mut Optimizer, _rest: Chain<'_>, op: &Operation) -> Result<()> {
    opt.bind(op.id, Value::Virtual(VirtualObject::new(op.id)));
    opt.stats_mut().virtuals_created += 1;
    Ok(())
}

fn absorb_setfield(opt: &mut Optimizer, rest: Chain<'_>, op: &Operation) -> Result<()> {
    let receiver = op.arg(0)?;
    let Value::Virtual(object) = opt.resolve_value(receiver) else {
        return force_and_forward(opt, rest, op);
    };

    let stored = opt.resolve_value(op.arg(1)?);
    let updated = object.with_field(stored);
    trace!("absorb {op} into {updated}");
    opt.bind(object.origin(), Value::Virtual(updated.clone()));
    if receiver != Operand::Op(object.origin()) {
        opt.bind(receiver, Value::Virtual(updated));
    }
    opt.stats_mut().setfields_absorbed += 1;
    Ok(())
}

/// Materialize every virtual argument of `op`, then pass `op` on
fn force_and_forward(opt: &mut Optimizer, rest: Chain<'_>, op: &Operation) -> Result<()> {
    for &arg in &op.args {
        // resolved per argument: an object forced for an earlier argument is opaque now
        if let Value::Virtual(object) = opt.resolve_value(arg) {
            force(opt, rest, arg, &object)?;
        }
    }
    rest.forward(opt, op)
}

fn force(opt: &mut Optimizer, rest: Chain<'_>, arg: Operand, object: &VirtualObject) -> Result<()> {
    let alloc = rest.append_operation(opt, OpKind::New, Vec::new(), Some(Type::Ref))?;
    if let Some(field) = object.pending_field() {
        debug!(
            "forcing {object} as {}: pending field write ({field}) is not replayed",
            alloc.id
        );
    }

    let materialized = Value::Opaque(alloc.result());
    opt.bind(object.origin(), materialized.clone());
    if arg != Operand::Op(object.origin()) {
        opt.bind(arg, materialized);
    }
    opt.stats_mut().virtuals_forced += 1;
    Ok(())
}
