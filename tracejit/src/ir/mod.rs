//! Trace Intermediate Representation
//!
//! A trace is the straight-line sequence of operations recorded by the
//! tracer. Every operation has a unique [`OpRef`] within one optimization
//! run; arguments refer to trace inputs, earlier operations, or literals.
//!
//! Textual form (one operation per line):
//!
//! ```text
//! %2 = int_add(i0, 5)
//! guard_true(%2)
//! setfield(%4, i1)
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{OptimizeError, Result};

/// Identity of an operation within one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpRef(pub u32);

impl fmt::Display for OpRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Closed set of operation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    IntAdd,
    IntSub,
    IntEq,
    IntLt,
    IntGt,
    GuardTrue,
    GuardFalse,
    New,
    SetField,
    GetField,
    Call,
    Finish,
}

impl OpKind {
    /// Number of operation kinds; size of every dispatch table
    pub const COUNT: usize = 12;

    /// All kinds in declaration order
    pub const ALL: [OpKind; Self::COUNT] = [
        OpKind::IntAdd,
        OpKind::IntSub,
        OpKind::IntEq,
        OpKind::IntLt,
        OpKind::IntGt,
        OpKind::GuardTrue,
        OpKind::GuardFalse,
        OpKind::New,
        OpKind::SetField,
        OpKind::GetField,
        OpKind::Call,
        OpKind::Finish,
    ];

    /// Dense index of this kind, `0..COUNT`
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            OpKind::IntAdd => "int_add",
            OpKind::IntSub => "int_sub",
            OpKind::IntEq => "int_eq",
            OpKind::IntLt => "int_lt",
            OpKind::IntGt => "int_gt",
            OpKind::GuardTrue => "guard_true",
            OpKind::GuardFalse => "guard_false",
            OpKind::New => "new",
            OpKind::SetField => "setfield",
            OpKind::GetField => "getfield",
            OpKind::Call => "call",
            OpKind::Finish => "finish",
        }
    }

    /// Result type recorded for this kind when the tracer does not say
    pub fn default_type(self) -> Option<Type> {
        match self {
            OpKind::IntAdd
            | OpKind::IntSub
            | OpKind::IntEq
            | OpKind::IntLt
            | OpKind::IntGt => Some(Type::Int),
            OpKind::New | OpKind::GetField | OpKind::Call => Some(Type::Ref),
            OpKind::GuardTrue | OpKind::GuardFalse | OpKind::SetField | OpKind::Finish => None,
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Type {
    Int,
    Ref,
    Void,
}

/// An argument reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    /// Trace input argument
    Input(u32),
    /// Value produced by an earlier operation
    Op(OpRef),
    /// Integer literal
    Const(i64),
}

impl From<OpRef> for Operand {
    fn from(op: OpRef) -> Self {
        Operand::Op(op)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Input(n) => write!(f, "i{n}"),
            Operand::Op(op) => write!(f, "{op}"),
            Operand::Const(n) => write!(f, "{n}"),
        }
    }
}

/// A recorded operation; immutable once created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub id: OpRef,
    pub kind: OpKind,
    #[serde(default)]
    pub args: Vec<Operand>,
    #[serde(default, rename = "type")]
    pub ty: Option<Type>,
}

impl Operation {
    pub fn new(id: OpRef, kind: OpKind, args: Vec<Operand>, ty: Option<Type>) -> Self {
        Self { id, kind, args, ty }
    }

    /// Operand this operation's result is referred to by
    pub fn result(&self) -> Operand {
        Operand::Op(self.id)
    }

    /// Argument `index`, or an arity error naming this operation
    pub fn arg(&self, index: usize) -> Result<Operand> {
        self.args.get(index).copied().ok_or(OptimizeError::Arity {
            op: self.id,
            kind: self.kind,
            expected: index + 1,
            got: self.args.len(),
        })
    }

    pub fn produces_value(&self) -> bool {
        matches!(self.ty, Some(Type::Int | Type::Ref))
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.produces_value() {
            write!(f, "{} = ", self.id)?;
        }
        write!(f, "{}(", self.kind)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{arg}")?;
        }
        write!(f, ")")
    }
}

/// A straight-line trace: input arguments plus operations in order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace {
    /// Number of input arguments (`i0 .. i{inputs-1}`)
    #[serde(default)]
    pub inputs: u32,
    pub ops: Vec<Operation>,
}

impl Trace {
    pub fn new(inputs: u32, ops: Vec<Operation>) -> Self {
        Self { inputs, ops }
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Smallest id not used by any operation in the trace
    pub fn next_free_id(&self) -> u32 {
        self.ops.iter().map(|op| op.id.0 + 1).max().unwrap_or(0)
    }

    pub fn count(&self, kind: OpKind) -> usize {
        self.ops.iter().filter(|op| op.kind == kind).count()
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, op) in self.ops.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{op}")?;
        }
        Ok(())
    }
}

/// Recorder-side helper that hands out fresh ids
///
/// The real trace recorder lives outside this crate; this builder is what
/// tests and the CLI fixtures use to produce well-formed traces.
#[derive(Debug, Default)]
pub struct TraceBuilder {
    inputs: u32,
    next_id: u32,
    ops: Vec<Operation>,
}

impl TraceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a new input argument
    pub fn input(&mut self) -> Operand {
        let n = self.inputs;
        self.inputs += 1;
        Operand::Input(n)
    }

    /// Record an operation with an explicit result type
    pub fn op_typed(&mut self, kind: OpKind, args: Vec<Operand>, ty: Option<Type>) -> Operand {
        let id = OpRef(self.next_id);
        self.next_id += 1;
        self.ops.push(Operation::new(id, kind, args, ty));
        Operand::Op(id)
    }

    /// Record an operation using the kind's default result type
    pub fn op(&mut self, kind: OpKind, args: Vec<Operand>) -> Operand {
        self.op_typed(kind, args, kind.default_type())
    }

    pub fn int_add(&mut self, lhs: Operand, rhs: Operand) -> Operand {
        self.op(OpKind::IntAdd, vec![lhs, rhs])
    }

    pub fn int_sub(&mut self, lhs: Operand, rhs: Operand) -> Operand {
        self.op(OpKind::IntSub, vec![lhs, rhs])
    }

    pub fn int_eq(&mut self, lhs: Operand, rhs: Operand) -> Operand {
        self.op(OpKind::IntEq, vec![lhs, rhs])
    }

    pub fn int_lt(&mut self, lhs: Operand, rhs: Operand) -> Operand {
        self.op(OpKind::IntLt, vec![lhs, rhs])
    }

    pub fn int_gt(&mut self, lhs: Operand, rhs: Operand) -> Operand {
        self.op(OpKind::IntGt, vec![lhs, rhs])
    }

    pub fn guard_true(&mut self, cond: Operand) {
        self.op(OpKind::GuardTrue, vec![cond]);
    }

    pub fn guard_false(&mut self, cond: Operand) {
        self.op(OpKind::GuardFalse, vec![cond]);
    }

    pub fn new_object(&mut self) -> Operand {
        self.op(OpKind::New, vec![])
    }

    pub fn setfield(&mut self, object: Operand, value: Operand) {
        self.op(OpKind::SetField, vec![object, value]);
    }

    pub fn call(&mut self, args: Vec<Operand>) -> Operand {
        self.op(OpKind::Call, args)
    }

    pub fn finish(&mut self, args: Vec<Operand>) {
        self.op(OpKind::Finish, args);
    }

    pub fn build(self) -> Trace {
        Trace::new(self.inputs, self.ops)
    }
}
