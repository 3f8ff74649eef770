//! Value model
//!
//! What the optimizer currently knows about the value an operand produces.

use std::fmt;
use std::sync::Arc;

use crate::error::{OptimizeError, Result};
use crate::ir::{OpRef, Operand};

/// Resolved value of an operand
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Known integer
    Constant(i64),
    /// Allocation that has not been committed to the output trace
    Virtual(VirtualObject),
    /// Unknown at optimization time; backed by an input or emitted operation
    Opaque(Operand),
}

impl Value {
    pub fn is_constant(&self) -> bool {
        matches!(self, Value::Constant(_))
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self, Value::Virtual(_))
    }

    /// Integer payload of a constant
    pub fn getint(&self) -> Result<i64> {
        match self {
            Value::Constant(n) => Ok(*n),
            other => Err(OptimizeError::not_constant(other.to_string())),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Constant(n) => write!(f, "const {n}"),
            Value::Virtual(object) => write!(f, "{object}"),
            Value::Opaque(operand) => write!(f, "{operand}"),
        }
    }
}

/// Symbolic stand-in for an allocation performed by `origin`
///
/// A virtual object is replaced, never mutated: a field write produces a new
/// `VirtualObject` with the same origin carrying the written value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualObject {
    origin: OpRef,
    field: Option<Arc<Value>>,
}

impl VirtualObject {
    pub fn new(origin: OpRef) -> Self {
        Self { origin, field: None }
    }

    /// The `new` operation this object stands for
    pub fn origin(&self) -> OpRef {
        self.origin
    }

    /// Value recorded by the most recent field write, if any
    pub fn pending_field(&self) -> Option<&Value> {
        self.field.as_deref()
    }

    pub fn with_field(&self, value: Value) -> Self {
        Self {
            origin: self.origin,
            field: Some(Arc::new(value)),
        }
    }
}

impl fmt::Display for VirtualObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "virtual({}, field = {field})", self.origin),
            None => write!(f, "virtual({})", self.origin),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(Value::Constant(3).is_constant());
        assert!(!Value::Constant(3).is_virtual());
        assert!(Value::Virtual(VirtualObject::new(OpRef(0))).is_virtual());
        assert!(!Value::Opaque(Operand::Input(0)).is_constant());
    }

    #[test]
    fn test_getint_only_on_constants() {
        assert_eq!(Value::Constant(-7).getint(), Ok(-7));
        let err = Value::Opaque(Operand::Input(1)).getint().unwrap_err();
        assert_eq!(err, OptimizeError::NotConstant("i1".to_string()));
    }

    #[test]
    fn test_field_write_keeps_origin() {
        let object = VirtualObject::new(OpRef(2));
        let written = object.with_field(Value::Constant(9));
        assert_eq!(written.origin(), OpRef(2));
        assert_eq!(written.pending_field(), Some(&Value::Constant(9)));
        assert_eq!(object.pending_field(), None);
        assert_eq!(written.to_string(), "virtual(%2, field = const 9)");
    }
}
