//! Runtime value representation
//!
//! This module defines the [`Value`] enum, which represents all runtime
//! values flowing through call frames and the marshaler.  Unlike the raw
//! bytes of linear memory, values are tagged and type-safe: integers and
//! floats are distinct and are never reinterpreted into one another.
//!
//! # Value Types
//!
//! - [`Value::I32`] / [`Value::I64`]: two's-complement integers
//! - [`Value::F32`] / [`Value::F64`]: IEEE-754 floats
//! - [`Value::FuncRef`]: opaque function handle with identity equality
//! - [`Value::Agg`]: small aggregate (struct-by-value), fields in
//!   declaration order

use crate::module::ir::{FuncValue, Ty};

/// Memory address type (32-bit offset into linear memory)
pub type Addr = u32;

/// Runtime values in the engine
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    FuncRef(FuncValue),
    Agg(Vec<Value>),
}

impl Value {
    /// The type of this value.
    pub fn ty(&self) -> Ty {
        match self {
            Value::I32(_) => Ty::I32,
            Value::I64(_) => Ty::I64,
            Value::F32(_) => Ty::F32,
            Value::F64(_) => Ty::F64,
            Value::FuncRef(_) => Ty::FuncRef,
            Value::Agg(fields) => Ty::Agg(fields.iter().map(Value::ty).collect()),
        }
    }

    /// The zero value of a type (locals are zero-initialized).
    pub fn default_for(ty: &Ty) -> Value {
        match ty {
            Ty::I32 => Value::I32(0),
            Ty::I64 => Value::I64(0),
            Ty::F32 => Value::F32(0.0),
            Ty::F64 => Value::F64(0.0),
            Ty::FuncRef => Value::FuncRef(FuncValue::NULL),
            Ty::Agg(fields) => Value::Agg(fields.iter().map(Value::default_for).collect()),
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::F32(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F64(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_funcref(&self) -> Option<FuncValue> {
        match self {
            Value::FuncRef(fv) => Some(*fv),
            _ => None,
        }
    }

    /// Expect an i32, returns an error message otherwise
    pub fn expect_i32(&self) -> Result<i32, String> {
        self.as_i32()
            .ok_or_else(|| format!("Expected i32, got {:?}", self))
    }

    /// Expect an i64, returns an error message otherwise
    pub fn expect_i64(&self) -> Result<i64, String> {
        self.as_i64()
            .ok_or_else(|| format!("Expected i64, got {:?}", self))
    }

    /// Expect a funcref, returns an error message otherwise
    pub fn expect_funcref(&self) -> Result<FuncValue, String> {
        self.as_funcref()
            .ok_or_else(|| format!("Expected funcref, got {:?}", self))
    }
}
