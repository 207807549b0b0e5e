//! The execution engine
//!
//! One [`Engine`] is one module instance: the decoded module plus its
//! linear memory, heap allocator, indirect call table, syscall shim, and
//! call stack.  Execution walks the statement tree directly; there is no
//! lowering to an internal bytecode.
//!
//! Entry points are exports invoked by name.  Traps unwind to the entry
//! point, flushing buffered console output on the way out so diagnostic
//! text written just before the failure is preserved.

use crate::engine::constants::{MAX_CALL_DEPTH, MAX_HEAP_BYTES, MAX_MEMORY_BYTES};
use crate::engine::errors::Trap;
use crate::engine::marshal::{write_agg, CallFrame};
use crate::engine::table::FuncTable;
use crate::memory::alloc::HeapAllocator;
use crate::memory::linear::LinearMemory;
use crate::memory::value::{Addr, Value};
use crate::module::ir::{BinOp, Expr, FuncId, FuncKind, MemTy, Module, Stmt, UnOp, PAGE_SIZE};
use crate::shim::{Console, SyscallShim};
use std::path::PathBuf;

/// Control-flow signal produced by statement execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ControlFlow {
    Normal,
    Break,
    Continue,
    Return,
}

/// A module instance ready to execute
#[derive(Debug)]
pub struct Engine {
    module: Module,
    pub(crate) memory: LinearMemory,
    pub(crate) heap: HeapAllocator,
    table: FuncTable,
    pub(crate) shim: SyscallShim,
    frames: Vec<CallFrame>,
    control_flow: ControlFlow,
    return_value: Option<Value>,
}

impl Engine {
    /// Instantiate a module: size linear memory, copy data segments, and
    /// pre-register element functions in the indirect call table.
    pub fn new(module: Module) -> Result<Self, Trap> {
        let initial = module.initial_memory.max(PAGE_SIZE) as usize;
        let mut memory = LinearMemory::new(initial, MAX_MEMORY_BYTES);
        for seg in &module.data {
            memory
                .write_bytes(seg.offset, &seg.bytes)
                .map_err(Trap::memory)?;
        }

        let mut table = FuncTable::new();
        for id in &module.elements {
            if *id >= module.funcs.len() {
                return Err(Trap::UndefinedFunction { id: *id });
            }
            table.register_or_lookup(*id);
        }

        Ok(Engine {
            module,
            memory,
            heap: HeapAllocator::new(MAX_HEAP_BYTES),
            table,
            shim: SyscallShim::new(),
            frames: Vec::new(),
            control_flow: ControlFlow::Normal,
            return_value: None,
        })
    }

    /// Grant the instance access to a host directory under a module-side
    /// path prefix.
    pub fn register_preopen(&mut self, fd: i32, prefix: &str, root: impl Into<PathBuf>) {
        self.shim.register_preopen(fd, prefix, root);
    }

    /// Invoke an exported function by name.
    ///
    /// Console output is flushed whether the call completes or traps.
    pub fn invoke(&mut self, name: &str, args: &[Value]) -> Result<Option<Value>, Trap> {
        let id = match self.module.exports.get(name) {
            Some(id) => *id,
            None => {
                return Err(Trap::UndefinedExport {
                    name: name.to_string(),
                })
            }
        };
        let result = self.call_function(id, args.to_vec());
        self.shim.console_mut().flush();
        result
    }

    /// Invoke the conventional `run` entry point and return its i32 exit
    /// value.
    pub fn run(&mut self) -> Result<i32, Trap> {
        match self.invoke("run", &[])? {
            Some(Value::I32(code)) => Ok(code),
            Some(other) => Err(Trap::TypeError {
                expected: "i32".to_string(),
                got: other.ty().to_string(),
            }),
            None => Err(Trap::MissingReturnValue {
                function: "run".to_string(),
            }),
        }
    }

    pub fn console(&self) -> &Console {
        self.shim.console()
    }

    pub fn memory(&self) -> &LinearMemory {
        &self.memory
    }

    pub fn heap(&self) -> &HeapAllocator {
        &self.heap
    }

    /// Call a function by id with already-evaluated arguments.
    pub(crate) fn call_function(
        &mut self,
        id: FuncId,
        args: Vec<Value>,
    ) -> Result<Option<Value>, Trap> {
        if self.frames.len() >= MAX_CALL_DEPTH {
            return Err(Trap::StackOverflow {
                depth: self.frames.len(),
            });
        }
        let func = self
            .module
            .funcs
            .get(id)
            .cloned()
            .ok_or(Trap::UndefinedFunction { id })?;
        let sig = self
            .module
            .sigs
            .get(func.sig)
            .cloned()
            .ok_or(Trap::UndefinedFunction { id })?;

        let (fixed, varargs) = self.marshal_args(&sig, args, &func.name)?;

        match func.kind {
            FuncKind::Host(op) => self.call_host(op, &func.name, &fixed),
            FuncKind::Local { locals, body } => {
                let sret = self.prepare_sret(&sig)?;
                let mut slots = fixed;
                slots.extend(locals.iter().map(Value::default_for));
                self.frames.push(CallFrame {
                    function_name: func.name.clone(),
                    locals: slots,
                    varargs,
                    sret,
                    sret_written: false,
                });

                let outcome = self.exec_block(&body);
                let sret_written = self.frames.last().is_some_and(|f| f.sret_written);
                self.frames.pop();
                outcome?;

                let returned = self.return_value.take();
                self.control_flow = ControlFlow::Normal;
                self.finish_return(&sig, returned, sret, sret_written, &func.name)
            }
        }
    }

    fn exec_block(&mut self, stmts: &[Stmt]) -> Result<(), Trap> {
        for stmt in stmts {
            if self.control_flow != ControlFlow::Normal {
                break;
            }
            self.exec_stmt(stmt)?;
        }
        Ok(())
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> Result<(), Trap> {
        match stmt {
            // Calls in statement position may legitimately produce no
            // value; everything else evaluates to one.
            Stmt::Expr(Expr::Call { func, args }) => {
                let argv = self.eval_args(args)?;
                self.call_function(*func, argv)?;
                Ok(())
            }
            Stmt::Expr(Expr::CallIndirect { sig, callee, args }) => {
                self.call_indirect(*sig, callee, args)?;
                Ok(())
            }
            Stmt::Expr(expr) => {
                self.eval_expr(expr)?;
                Ok(())
            }
            Stmt::LocalSet(index, expr) => {
                let value = self.eval_expr(expr)?;
                let frame = self.frames.last_mut().ok_or(Trap::NoCallFrame)?;
                match frame.locals.get_mut(*index) {
                    Some(slot) => {
                        *slot = value;
                        Ok(())
                    }
                    None => Err(Trap::InvalidLocal {
                        index: *index,
                        function: frame.function_name.clone(),
                    }),
                }
            }
            Stmt::Store {
                ty,
                addr,
                offset,
                value,
            } => {
                let base = self.eval_addr(addr)?.wrapping_add(*offset);
                let v = self.eval_expr(value)?;
                self.store_mem(*ty, base, v)
            }
            Stmt::If {
                cond,
                then_body,
                else_body,
            } => {
                if self.eval_cond(cond)? {
                    self.exec_block(then_body)
                } else {
                    self.exec_block(else_body)
                }
            }
            Stmt::While { cond, body } => {
                while self.eval_cond(cond)? {
                    self.exec_block(body)?;
                    match self.control_flow {
                        ControlFlow::Break => {
                            self.control_flow = ControlFlow::Normal;
                            break;
                        }
                        ControlFlow::Continue => {
                            self.control_flow = ControlFlow::Normal;
                        }
                        ControlFlow::Return => break,
                        ControlFlow::Normal => {}
                    }
                }
                Ok(())
            }
            Stmt::Switch {
                scrut,
                cases,
                default,
            } => {
                let key = self.eval_i32(scrut)?;
                let body = cases
                    .iter()
                    .find(|(value, _)| *value == key)
                    .map(|(_, body)| body)
                    .unwrap_or(default);
                self.exec_block(body)?;
                if self.control_flow == ControlFlow::Break {
                    self.control_flow = ControlFlow::Normal;
                }
                Ok(())
            }
            Stmt::Break => {
                self.control_flow = ControlFlow::Break;
                Ok(())
            }
            Stmt::Continue => {
                self.control_flow = ControlFlow::Continue;
                Ok(())
            }
            Stmt::Return(expr) => {
                if let Some(expr) = expr {
                    let value = self.eval_expr(expr)?;
                    let sret = self.frames.last().and_then(|f| f.sret);
                    match (sret, &value) {
                        (Some(addr), Value::Agg(fields)) => {
                            write_agg(&mut self.memory, addr, fields).map_err(Trap::memory)?;
                            if let Some(frame) = self.frames.last_mut() {
                                frame.sret_written = true;
                            }
                        }
                        _ => self.return_value = Some(value),
                    }
                }
                self.control_flow = ControlFlow::Return;
                Ok(())
            }
        }
    }

    fn eval_args(&mut self, args: &[Expr]) -> Result<Vec<Value>, Trap> {
        let mut out = Vec::with_capacity(args.len());
        for arg in args {
            out.push(self.eval_expr(arg)?);
        }
        Ok(out)
    }

    fn eval_i32(&mut self, expr: &Expr) -> Result<i32, Trap> {
        match self.eval_expr(expr)? {
            Value::I32(n) => Ok(n),
            other => Err(Trap::TypeError {
                expected: "i32".to_string(),
                got: other.ty().to_string(),
            }),
        }
    }

    fn eval_cond(&mut self, expr: &Expr) -> Result<bool, Trap> {
        Ok(self.eval_i32(expr)? != 0)
    }

    fn eval_addr(&mut self, expr: &Expr) -> Result<Addr, Trap> {
        Ok(self.eval_i32(expr)? as u32)
    }

    /// Indirect call: resolve the funcref, check the declared signature
    /// structurally against the resolved function, then call.
    fn call_indirect(
        &mut self,
        sig: usize,
        callee: &Expr,
        args: &[Expr],
    ) -> Result<Option<Value>, Trap> {
        let fv = match self.eval_expr(callee)? {
            Value::FuncRef(fv) => fv,
            other => {
                return Err(Trap::TypeError {
                    expected: "funcref".to_string(),
                    got: other.ty().to_string(),
                })
            }
        };
        let id = self.table.resolve(fv)?;

        let expected = self
            .module
            .sigs
            .get(sig)
            .cloned()
            .ok_or(Trap::UndefinedFunction { id })?;
        let actual = self
            .module
            .funcs
            .get(id)
            .and_then(|f| self.module.sigs.get(f.sig))
            .cloned()
            .ok_or(Trap::UndefinedFunction { id })?;
        if expected != actual {
            return Err(Trap::SignatureMismatch {
                expected: expected.describe(),
                got: actual.describe(),
            });
        }

        let argv = self.eval_args(args)?;
        self.call_function(id, argv)
    }

    fn eval_expr(&mut self, expr: &Expr) -> Result<Value, Trap> {
        match expr {
            Expr::I32Const(n) => Ok(Value::I32(*n)),
            Expr::I64Const(n) => Ok(Value::I64(*n)),
            Expr::F32Const(x) => Ok(Value::F32(*x)),
            Expr::F64Const(x) => Ok(Value::F64(*x)),
            Expr::LocalGet(index) => {
                let frame = self.frames.last().ok_or(Trap::NoCallFrame)?;
                match frame.locals.get(*index) {
                    Some(value) => Ok(value.clone()),
                    None => Err(Trap::InvalidLocal {
                        index: *index,
                        function: frame.function_name.clone(),
                    }),
                }
            }
            Expr::Unary(op, operand) => {
                let v = self.eval_expr(operand)?;
                apply_unop(*op, v)
            }
            Expr::Binary(op, lhs, rhs) => {
                let a = self.eval_expr(lhs)?;
                let b = self.eval_expr(rhs)?;
                apply_binop(*op, a, b)
            }
            Expr::Load { ty, addr, offset } => {
                let base = self.eval_addr(addr)?.wrapping_add(*offset);
                self.load_mem(*ty, base)
            }
            Expr::Call { func, args } => {
                let argv = self.eval_args(args)?;
                let name = self
                    .module
                    .funcs
                    .get(*func)
                    .map(|f| f.name.clone())
                    .unwrap_or_default();
                self.call_function(*func, argv)?
                    .ok_or(Trap::MissingReturnValue { function: name })
            }
            Expr::CallIndirect { sig, callee, args } => {
                self.call_indirect(*sig, callee, args)?
                    .ok_or(Trap::MissingReturnValue {
                        function: "<indirect>".to_string(),
                    })
            }
            Expr::RefFunc(id) => {
                if *id >= self.module.funcs.len() {
                    return Err(Trap::UndefinedFunction { id: *id });
                }
                Ok(Value::FuncRef(self.table.register_or_lookup(*id)))
            }
            Expr::MemoryGrow(delta) => {
                let delta = self.eval_i32(delta)?;
                if delta < 0 {
                    return Ok(Value::I32(-1));
                }
                match self.memory.grow(delta as usize) {
                    Ok(old) => Ok(Value::I32(old as i32)),
                    Err(_) => Ok(Value::I32(-1)),
                }
            }
            Expr::VaArg(ty) => {
                let frame = self.frames.last_mut().ok_or(Trap::NoCallFrame)?;
                let cursor = frame
                    .varargs
                    .as_mut()
                    .ok_or_else(|| Trap::InvalidVarargAccess {
                        message: "no variadic tail in the current frame".to_string(),
                    })?;
                cursor
                    .next(ty)
                    .map_err(|message| Trap::InvalidVarargAccess { message })
            }
            Expr::MakeAgg(fields) => Ok(Value::Agg(self.eval_args(fields)?)),
            Expr::AggField(base, index) => match self.eval_expr(base)? {
                Value::Agg(fields) => {
                    fields
                        .get(*index)
                        .cloned()
                        .ok_or_else(|| Trap::TypeError {
                            expected: format!("aggregate with more than {} fields", index),
                            got: format!("aggregate with {} fields", fields.len()),
                        })
                }
                other => Err(Trap::TypeError {
                    expected: "aggregate".to_string(),
                    got: other.ty().to_string(),
                }),
            },
        }
    }

    fn load_mem(&self, ty: MemTy, addr: Addr) -> Result<Value, Trap> {
        let value = match ty {
            MemTy::I8 => Value::I32(self.memory.load_i8(addr).map_err(Trap::memory)? as i32),
            MemTy::U8 => Value::I32(self.memory.load_u8(addr).map_err(Trap::memory)? as i32),
            MemTy::I16 => Value::I32(self.memory.load_i16(addr).map_err(Trap::memory)? as i32),
            MemTy::U16 => Value::I32(self.memory.load_u16(addr).map_err(Trap::memory)? as i32),
            MemTy::I32 => Value::I32(self.memory.load_i32(addr).map_err(Trap::memory)?),
            MemTy::I64 => Value::I64(self.memory.load_i64(addr).map_err(Trap::memory)?),
            MemTy::F32 => Value::F32(self.memory.load_f32(addr).map_err(Trap::memory)?),
            MemTy::F64 => Value::F64(self.memory.load_f64(addr).map_err(Trap::memory)?),
        };
        Ok(value)
    }

    fn store_mem(&mut self, ty: MemTy, addr: Addr, value: Value) -> Result<(), Trap> {
        let type_error = |expected: &str, got: &Value| Trap::TypeError {
            expected: expected.to_string(),
            got: got.ty().to_string(),
        };
        match (ty, &value) {
            (MemTy::I8 | MemTy::U8, Value::I32(n)) => {
                self.memory.store_u8(addr, *n as u8).map_err(Trap::memory)
            }
            (MemTy::I16 | MemTy::U16, Value::I32(n)) => {
                self.memory.store_u16(addr, *n as u16).map_err(Trap::memory)
            }
            (MemTy::I32, Value::I32(n)) => self.memory.store_i32(addr, *n).map_err(Trap::memory),
            (MemTy::I64, Value::I64(n)) => self.memory.store_i64(addr, *n).map_err(Trap::memory),
            (MemTy::F32, Value::F32(x)) => self.memory.store_f32(addr, *x).map_err(Trap::memory),
            (MemTy::F64, Value::F64(x)) => self.memory.store_f64(addr, *x).map_err(Trap::memory),
            (MemTy::I8 | MemTy::U8 | MemTy::I16 | MemTy::U16 | MemTy::I32, v) => {
                Err(type_error("i32", v))
            }
            (MemTy::I64, v) => Err(type_error("i64", v)),
            (MemTy::F32, v) => Err(type_error("f32", v)),
            (MemTy::F64, v) => Err(type_error("f64", v)),
        }
    }
}

fn apply_unop(op: UnOp, v: Value) -> Result<Value, Trap> {
    let mismatch = |expected: &str, got: &Value| Trap::TypeError {
        expected: expected.to_string(),
        got: got.ty().to_string(),
    };
    let out = match (op, &v) {
        (UnOp::I32Eqz, Value::I32(n)) => Value::I32((*n == 0) as i32),
        (UnOp::F32Abs, Value::F32(x)) => Value::F32(x.abs()),
        (UnOp::F64Abs, Value::F64(x)) => Value::F64(x.abs()),
        (UnOp::F32Neg, Value::F32(x)) => Value::F32(-x),
        (UnOp::F64Neg, Value::F64(x)) => Value::F64(-x),
        (UnOp::I32WrapI64, Value::I64(n)) => Value::I32(*n as i32),
        (UnOp::I64ExtendI32S, Value::I32(n)) => Value::I64(*n as i64),
        (UnOp::I64ExtendI32U, Value::I32(n)) => Value::I64(*n as u32 as i64),
        (UnOp::F32ConvertI32S, Value::I32(n)) => Value::F32(*n as f32),
        (UnOp::F64ConvertI32S, Value::I32(n)) => Value::F64(*n as f64),
        (UnOp::I32TruncF32S, Value::F32(x)) => Value::I32(*x as i32),
        (UnOp::I32TruncF64S, Value::F64(x)) => Value::I32(*x as i32),
        (UnOp::F32DemoteF64, Value::F64(x)) => Value::F32(*x as f32),
        (UnOp::F64PromoteF32, Value::F32(x)) => Value::F64(*x as f64),
        (
            UnOp::I32Eqz | UnOp::I64ExtendI32S | UnOp::I64ExtendI32U | UnOp::F32ConvertI32S
            | UnOp::F64ConvertI32S,
            v,
        ) => return Err(mismatch("i32", v)),
        (UnOp::I32WrapI64, v) => return Err(mismatch("i64", v)),
        (UnOp::F32Abs | UnOp::F32Neg | UnOp::I32TruncF32S | UnOp::F64PromoteF32, v) => {
            return Err(mismatch("f32", v))
        }
        (UnOp::F64Abs | UnOp::F64Neg | UnOp::I32TruncF64S | UnOp::F32DemoteF64, v) => {
            return Err(mismatch("f64", v))
        }
    };
    Ok(out)
}

fn apply_binop(op: BinOp, a: Value, b: Value) -> Result<Value, Trap> {
    use BinOp::*;
    let out = match (op, &a, &b) {
        (I32Add, Value::I32(x), Value::I32(y)) => Value::I32(x.wrapping_add(*y)),
        (I32Sub, Value::I32(x), Value::I32(y)) => Value::I32(x.wrapping_sub(*y)),
        (I32Mul, Value::I32(x), Value::I32(y)) => Value::I32(x.wrapping_mul(*y)),
        (I32DivS, Value::I32(x), Value::I32(y)) => {
            if *y == 0 {
                return Err(Trap::DivisionByZero {
                    operation: "Division".to_string(),
                });
            }
            Value::I32(x.wrapping_div(*y))
        }
        (I32DivU, Value::I32(x), Value::I32(y)) => {
            if *y == 0 {
                return Err(Trap::DivisionByZero {
                    operation: "Division".to_string(),
                });
            }
            Value::I32(((*x as u32) / (*y as u32)) as i32)
        }
        (I32RemS, Value::I32(x), Value::I32(y)) => {
            if *y == 0 {
                return Err(Trap::DivisionByZero {
                    operation: "Remainder".to_string(),
                });
            }
            Value::I32(x.wrapping_rem(*y))
        }
        (I32RemU, Value::I32(x), Value::I32(y)) => {
            if *y == 0 {
                return Err(Trap::DivisionByZero {
                    operation: "Remainder".to_string(),
                });
            }
            Value::I32(((*x as u32) % (*y as u32)) as i32)
        }
        (I32And, Value::I32(x), Value::I32(y)) => Value::I32(x & y),
        (I32Or, Value::I32(x), Value::I32(y)) => Value::I32(x | y),
        (I32Xor, Value::I32(x), Value::I32(y)) => Value::I32(x ^ y),
        (I32Shl, Value::I32(x), Value::I32(y)) => Value::I32(x.wrapping_shl(*y as u32)),
        (I32ShrS, Value::I32(x), Value::I32(y)) => Value::I32(x.wrapping_shr(*y as u32)),
        (I32ShrU, Value::I32(x), Value::I32(y)) => {
            Value::I32((*x as u32).wrapping_shr(*y as u32) as i32)
        }
        (I32Eq, Value::I32(x), Value::I32(y)) => Value::I32((x == y) as i32),
        (I32Ne, Value::I32(x), Value::I32(y)) => Value::I32((x != y) as i32),
        (I32LtS, Value::I32(x), Value::I32(y)) => Value::I32((x < y) as i32),
        (I32LtU, Value::I32(x), Value::I32(y)) => {
            Value::I32(((*x as u32) < (*y as u32)) as i32)
        }
        (I32LeS, Value::I32(x), Value::I32(y)) => Value::I32((x <= y) as i32),
        (I32LeU, Value::I32(x), Value::I32(y)) => {
            Value::I32(((*x as u32) <= (*y as u32)) as i32)
        }
        (I32GtS, Value::I32(x), Value::I32(y)) => Value::I32((x > y) as i32),
        (I32GtU, Value::I32(x), Value::I32(y)) => {
            Value::I32(((*x as u32) > (*y as u32)) as i32)
        }
        (I32GeS, Value::I32(x), Value::I32(y)) => Value::I32((x >= y) as i32),
        (I32GeU, Value::I32(x), Value::I32(y)) => {
            Value::I32(((*x as u32) >= (*y as u32)) as i32)
        }
        (I64Add, Value::I64(x), Value::I64(y)) => Value::I64(x.wrapping_add(*y)),
        (I64Sub, Value::I64(x), Value::I64(y)) => Value::I64(x.wrapping_sub(*y)),
        (I64Mul, Value::I64(x), Value::I64(y)) => Value::I64(x.wrapping_mul(*y)),
        (F32Add, Value::F32(x), Value::F32(y)) => Value::F32(x + y),
        (F32Sub, Value::F32(x), Value::F32(y)) => Value::F32(x - y),
        (F32Mul, Value::F32(x), Value::F32(y)) => Value::F32(x * y),
        (F32Div, Value::F32(x), Value::F32(y)) => Value::F32(x / y),
        (F32Rem, Value::F32(x), Value::F32(y)) => Value::F32(x % y),
        (F64Add, Value::F64(x), Value::F64(y)) => Value::F64(x + y),
        (F64Sub, Value::F64(x), Value::F64(y)) => Value::F64(x - y),
        (F64Mul, Value::F64(x), Value::F64(y)) => Value::F64(x * y),
        (F64Div, Value::F64(x), Value::F64(y)) => Value::F64(x / y),
        (F64Rem, Value::F64(x), Value::F64(y)) => Value::F64(x % y),
        (F32Eq, Value::F32(x), Value::F32(y)) => Value::I32((x == y) as i32),
        (F32Lt, Value::F32(x), Value::F32(y)) => Value::I32((x < y) as i32),
        (F32Gt, Value::F32(x), Value::F32(y)) => Value::I32((x > y) as i32),
        (F64Eq, Value::F64(x), Value::F64(y)) => Value::I32((x == y) as i32),
        (F64Lt, Value::F64(x), Value::F64(y)) => Value::I32((x < y) as i32),
        (F64Gt, Value::F64(x), Value::F64(y)) => Value::I32((x > y) as i32),
        (F64Le, Value::F64(x), Value::F64(y)) => Value::I32((x <= y) as i32),
        (F64Ge, Value::F64(x), Value::F64(y)) => Value::I32((x >= y) as i32),
        (RefEq, Value::FuncRef(x), Value::FuncRef(y)) => Value::I32((x == y) as i32),
        (op, a, b) => {
            return Err(Trap::TypeError {
                expected: format!("operands for {:?}", op),
                got: format!("{}, {}", a.ty(), b.ty()),
            })
        }
    };
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn i32_arithmetic_wraps() {
        let v = apply_binop(BinOp::I32Add, Value::I32(i32::MAX), Value::I32(1)).unwrap();
        assert_eq!(v, Value::I32(i32::MIN));
        let v = apply_binop(BinOp::I32Mul, Value::I32(i32::MIN), Value::I32(-1)).unwrap();
        assert_eq!(v, Value::I32(i32::MIN));
    }

    #[test]
    fn division_by_zero_is_a_trap() {
        let err = apply_binop(BinOp::I32DivS, Value::I32(1), Value::I32(0)).unwrap_err();
        assert!(matches!(err, Trap::DivisionByZero { .. }));
        let err = apply_binop(BinOp::I32RemU, Value::I32(1), Value::I32(0)).unwrap_err();
        assert!(matches!(err, Trap::DivisionByZero { .. }));
    }

    #[test]
    fn shift_amounts_are_masked() {
        let v = apply_binop(BinOp::I32Shl, Value::I32(1), Value::I32(33)).unwrap();
        assert_eq!(v, Value::I32(2));
        let v = apply_binop(BinOp::I32ShrU, Value::I32(-1), Value::I32(28)).unwrap();
        assert_eq!(v, Value::I32(0xF));
    }

    #[test]
    fn unsigned_comparisons_reinterpret() {
        let v = apply_binop(BinOp::I32LtU, Value::I32(-1), Value::I32(1)).unwrap();
        assert_eq!(v, Value::I32(0));
        let v = apply_binop(BinOp::I32LtS, Value::I32(-1), Value::I32(1)).unwrap();
        assert_eq!(v, Value::I32(1));
    }
}
