//! Dispatch tables
//!
//! Each stage routes operations to handlers through a table indexed by
//! [`OpKind`], built once when the stage is constructed and never modified.

use crate::error::{OptimizeError, Result};
use crate::ir::OpKind;

/// Collects handler registrations for one stage
pub struct DispatchBuilder<H> {
    slots: [Option<H>; OpKind::COUNT],
}

impl<H: Copy> DispatchBuilder<H> {
    pub fn new() -> Self {
        Self {
            slots: [None; OpKind::COUNT],
        }
    }

    /// Route `kind` to `handler`; a later registration for the same kind wins
    pub fn register(mut self, kind: OpKind, handler: H) -> Self {
        self.slots[kind.index()] = Some(handler);
        self
    }

    pub fn register_all(self, kinds: &[OpKind], handler: H) -> Self {
        kinds.iter().fold(self, |builder, &kind| builder.register(kind, handler))
    }

    pub fn is_registered(&self, kind: OpKind) -> bool {
        self.slots[kind.index()].is_some()
    }

    /// Build a table that must cover every kind explicitly
    pub fn build(self) -> Result<DispatchTable<H>> {
        let mut handlers = Vec::with_capacity(OpKind::COUNT);
        for kind in OpKind::ALL {
            handlers.push(self.slots[kind.index()].ok_or(OptimizeError::MissingHandler(kind))?);
        }
        Ok(DispatchTable {
            handlers: handlers.into_boxed_slice(),
        })
    }

    /// Build a table sending unregistered kinds to `default`
    pub fn build_with_default(self, default: H) -> DispatchTable<H> {
        DispatchTable {
            handlers: self.slots.iter().map(|slot| slot.unwrap_or(default)).collect(),
        }
    }
}

impl<H: Copy> Default for DispatchBuilder<H> {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolved kind → handler mapping
pub struct DispatchTable<H> {
    /// One entry per kind, in `OpKind::ALL` order
    handlers: Box<[H]>,
}

impl<H: Copy> DispatchTable<H> {
    pub fn get(&self, kind: OpKind) -> H {
        self.handlers[kind.index()]
    }
}
