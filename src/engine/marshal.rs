//! ABI marshaling: call frames, variadic cursors, and aggregate passing
//!
//! This module converts a module-level call (fixed arguments of known
//! types, optionally followed by a variadic tail) into a call frame and
//! converts the result back.  The rules it enforces:
//!
//! - Fixed-arity arguments are positional and strictly typed; floats and
//!   integers are never reinterpreted into one another.
//! - Variadic tails are packed into a byte cursor at host-native sizes;
//!   [`VarArgs::next`] is the only sanctioned access path.
//! - Small aggregates travel as flattened field lists.  Aggregates over
//!   [`AGG_BY_VALUE_MAX`] bytes are spilled through a caller-allocated
//!   out-pointer in linear memory and reloaded on the far side, so the
//!   caller always observes a plain aggregate value.

use crate::engine::constants::AGG_BY_VALUE_MAX;
use crate::engine::engine::Engine;
use crate::engine::errors::Trap;
use crate::memory::linear::LinearMemory;
use crate::memory::value::{Addr, Value};
use crate::module::ir::{FuncValue, Sig, Ty};

/// Typed cursor over a variadic argument tail.
///
/// The tail is packed once at the call boundary; each [`next`] pull reads
/// the host-native size of the requested type and advances.  Pulling past
/// the supplied tail is an error (the fixture corpus always matches
/// counts, so this only fires on translator defects).
///
/// [`next`]: VarArgs::next
#[derive(Debug, Clone)]
pub struct VarArgs {
    buf: Vec<u8>,
    pos: usize,
}

impl VarArgs {
    /// Pack a tail of scalar values.  Aggregates are not permitted in
    /// variadic position.
    pub fn pack(tail: &[Value]) -> Result<VarArgs, Trap> {
        let mut buf = Vec::new();
        for v in tail {
            match v {
                Value::I32(n) => buf.extend_from_slice(&n.to_le_bytes()),
                Value::I64(n) => buf.extend_from_slice(&n.to_le_bytes()),
                Value::F32(x) => buf.extend_from_slice(&x.to_bits().to_le_bytes()),
                Value::F64(x) => buf.extend_from_slice(&x.to_bits().to_le_bytes()),
                Value::FuncRef(fv) => buf.extend_from_slice(&fv.0.to_le_bytes()),
                Value::Agg(_) => {
                    return Err(Trap::TypeError {
                        expected: "scalar variadic argument".to_string(),
                        got: "aggregate".to_string(),
                    });
                }
            }
        }
        Ok(VarArgs { buf, pos: 0 })
    }

    /// Pull the next argument as `ty`, advancing by its size.
    pub fn next(&mut self, ty: &Ty) -> Result<Value, String> {
        let size = ty.byte_size();
        if self.pos + size > self.buf.len() {
            return Err(format!(
                "cursor exhausted: {} of {} bytes consumed, {} requested",
                self.pos,
                self.buf.len(),
                size
            ));
        }
        let raw = &self.buf[self.pos..self.pos + size];
        let value = match ty {
            Ty::I32 => {
                let mut b = [0u8; 4];
                b.copy_from_slice(raw);
                Value::I32(i32::from_le_bytes(b))
            }
            Ty::I64 => {
                let mut b = [0u8; 8];
                b.copy_from_slice(raw);
                Value::I64(i64::from_le_bytes(b))
            }
            Ty::F32 => {
                let mut b = [0u8; 4];
                b.copy_from_slice(raw);
                Value::F32(f32::from_bits(u32::from_le_bytes(b)))
            }
            Ty::F64 => {
                let mut b = [0u8; 8];
                b.copy_from_slice(raw);
                Value::F64(f64::from_bits(u64::from_le_bytes(b)))
            }
            Ty::FuncRef => {
                let mut b = [0u8; 4];
                b.copy_from_slice(raw);
                Value::FuncRef(FuncValue(u32::from_le_bytes(b)))
            }
            Ty::Agg(_) => return Err("aggregate pull from variadic cursor".to_string()),
        };
        self.pos += size;
        Ok(value)
    }
}

/// Ephemeral per-call record
#[derive(Debug)]
pub(crate) struct CallFrame {
    pub function_name: String,
    /// Parameters first, then zero-initialized declared locals.
    pub locals: Vec<Value>,
    pub varargs: Option<VarArgs>,
    /// Out-pointer for an over-threshold aggregate result.
    pub sret: Option<Addr>,
    /// Set when a `return` has actually stored through the out-pointer.
    pub sret_written: bool,
}

/// Write an aggregate's fields packed at `addr` in declaration order.
pub(crate) fn write_agg(
    mem: &mut LinearMemory,
    addr: Addr,
    fields: &[Value],
) -> Result<Addr, String> {
    let mut at = addr;
    for field in fields {
        match field {
            Value::I32(n) => {
                mem.store_i32(at, *n)?;
                at += 4;
            }
            Value::I64(n) => {
                mem.store_i64(at, *n)?;
                at += 8;
            }
            Value::F32(x) => {
                mem.store_f32(at, *x)?;
                at += 4;
            }
            Value::F64(x) => {
                mem.store_f64(at, *x)?;
                at += 8;
            }
            Value::FuncRef(fv) => {
                mem.store_u32(at, fv.0)?;
                at += 4;
            }
            Value::Agg(inner) => {
                at = write_agg(mem, at, inner)?;
            }
        }
    }
    Ok(at)
}

/// Read an aggregate of type `ty` packed at `addr`.
pub(crate) fn read_agg(mem: &LinearMemory, addr: Addr, ty: &Ty) -> Result<Value, String> {
    fn read_one(mem: &LinearMemory, at: &mut Addr, ty: &Ty) -> Result<Value, String> {
        let value = match ty {
            Ty::I32 => {
                let v = Value::I32(mem.load_i32(*at)?);
                *at += 4;
                v
            }
            Ty::I64 => {
                let v = Value::I64(mem.load_i64(*at)?);
                *at += 8;
                v
            }
            Ty::F32 => {
                let v = Value::F32(mem.load_f32(*at)?);
                *at += 4;
                v
            }
            Ty::F64 => {
                let v = Value::F64(mem.load_f64(*at)?);
                *at += 8;
                v
            }
            Ty::FuncRef => {
                let v = Value::FuncRef(FuncValue(mem.load_u32(*at)?));
                *at += 4;
                v
            }
            Ty::Agg(fields) => {
                let mut out = Vec::with_capacity(fields.len());
                for f in fields {
                    out.push(read_one(mem, at, f)?);
                }
                Value::Agg(out)
            }
        };
        Ok(value)
    }
    let mut at = addr;
    read_one(mem, &mut at, ty)
}

impl Engine {
    /// Type-check and lower a call's arguments into frame form.
    ///
    /// Returns the fixed prefix (with over-threshold aggregates passed
    /// through the out-pointer path) and the packed variadic cursor when
    /// the signature is variadic.
    pub(crate) fn marshal_args(
        &mut self,
        sig: &Sig,
        mut args: Vec<Value>,
        function: &str,
    ) -> Result<(Vec<Value>, Option<VarArgs>), Trap> {
        let fixed = sig.params.len();
        let count_ok = if sig.variadic {
            args.len() >= fixed
        } else {
            args.len() == fixed
        };
        if !count_ok {
            return Err(Trap::ArgumentCountMismatch {
                function: function.to_string(),
                expected: fixed,
                got: args.len(),
            });
        }

        let tail = args.split_off(fixed);
        for (arg, ty) in args.iter_mut().zip(&sig.params) {
            if arg.ty() != *ty {
                return Err(Trap::TypeError {
                    expected: ty.to_string(),
                    got: arg.ty().to_string(),
                });
            }
            if matches!(ty, Ty::Agg(_)) && ty.byte_size() > AGG_BY_VALUE_MAX {
                *arg = self.pass_aggregate_by_ref(arg.clone())?;
            }
        }

        let varargs = if sig.variadic {
            Some(VarArgs::pack(&tail)?)
        } else {
            None
        };
        Ok((args, varargs))
    }

    /// Round-trip an over-threshold aggregate through a caller-allocated
    /// scratch region, per the out-pointer passing rule.
    fn pass_aggregate_by_ref(&mut self, value: Value) -> Result<Value, Trap> {
        let ty = value.ty();
        let size = ty.byte_size() as u32;
        let addr = self.heap.alloc(&mut self.memory, size);
        if addr == 0 {
            return Err(Trap::memory(format!(
                "no scratch space for a {} byte aggregate",
                size
            )));
        }
        if let Value::Agg(fields) = &value {
            write_agg(&mut self.memory, addr, fields).map_err(Trap::memory)?;
        }
        let out = read_agg(&self.memory, addr, &ty).map_err(Trap::memory)?;
        self.heap.free(addr).map_err(Trap::memory)?;
        Ok(out)
    }

    /// Allocate the out-pointer for an over-threshold aggregate result.
    pub(crate) fn prepare_sret(&mut self, sig: &Sig) -> Result<Option<Addr>, Trap> {
        match &sig.result {
            Some(ty @ Ty::Agg(_)) if ty.byte_size() > AGG_BY_VALUE_MAX => {
                let addr = self.heap.alloc(&mut self.memory, ty.byte_size() as u32);
                if addr == 0 {
                    return Err(Trap::memory(format!(
                        "no scratch space for a {} byte aggregate result",
                        ty.byte_size()
                    )));
                }
                Ok(Some(addr))
            }
            _ => Ok(None),
        }
    }

    /// Lift the callee's result back into the caller.
    ///
    /// For an out-pointer result the aggregate is read back from the
    /// scratch region (and the region freed); a body that fell off the
    /// end without storing through the out-pointer is a missing return,
    /// same as for scalar results.  Otherwise the return slot is checked
    /// against the declared result type.
    pub(crate) fn finish_return(
        &mut self,
        sig: &Sig,
        returned: Option<Value>,
        sret: Option<Addr>,
        sret_written: bool,
        function: &str,
    ) -> Result<Option<Value>, Trap> {
        let result_ty = match &sig.result {
            None => return Ok(None),
            Some(ty) => ty,
        };
        if let Some(addr) = sret {
            if !sret_written {
                self.heap.free(addr).map_err(Trap::memory)?;
                return Err(Trap::MissingReturnValue {
                    function: function.to_string(),
                });
            }
            let value = read_agg(&self.memory, addr, result_ty).map_err(Trap::memory)?;
            self.heap.free(addr).map_err(Trap::memory)?;
            return Ok(Some(value));
        }
        let value = returned.ok_or_else(|| Trap::MissingReturnValue {
            function: function.to_string(),
        })?;
        if value.ty() != *result_ty {
            return Err(Trap::TypeError {
                expected: result_ty.to_string(),
                got: value.ty().to_string(),
            });
        }
        Ok(Some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_pulls_at_native_sizes() {
        let mut va = VarArgs::pack(&[Value::I32(7), Value::F64(1.5), Value::I32(-1)]).unwrap();
        assert_eq!(va.next(&Ty::I32).unwrap(), Value::I32(7));
        assert_eq!(va.next(&Ty::F64).unwrap(), Value::F64(1.5));
        assert_eq!(va.next(&Ty::I32).unwrap(), Value::I32(-1));
        assert!(va.next(&Ty::I32).is_err());
    }

    #[test]
    fn aggregates_are_rejected_in_variadic_position() {
        let err = VarArgs::pack(&[Value::Agg(vec![Value::I32(1)])]);
        assert!(err.is_err());
    }
}
