//! Types, signatures, and the instruction tree consumed by the engine
//!
//! The decoder lowers each WebAssembly function into a statement tree over
//! typed expressions.  Control flow is structured (`if`, `while`, `switch`
//! with an explicit default), matching what the translator emits for the C
//! fixture corpus; there is no arbitrary-label branching at this level.

use rustc_hash::FxHashMap;
use std::fmt;

/// Index of a function within a [`Module`].
pub type FuncId = usize;

/// Index of a signature within a [`Module`].
pub type SigId = usize;

/// WebAssembly page granularity in bytes.
pub const PAGE_SIZE: u32 = 65536;

/// An opaque reference to a callable entity.
///
/// Equality is identity-based: two lookups of the same underlying function
/// yield equal values, and distinct functions are never equal.  Slot 0 is
/// the null funcref.  Handles are only meaningful within the engine
/// instance whose table issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FuncValue(pub u32);

impl FuncValue {
    pub const NULL: FuncValue = FuncValue(0);

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

/// Value types in the translated form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ty {
    I32,
    I64,
    F32,
    F64,
    FuncRef,
    /// Small aggregate passed by value: the packed field types in
    /// declaration order.
    Agg(Vec<Ty>),
}

impl Ty {
    /// Packed byte size of a value of this type.
    pub fn byte_size(&self) -> usize {
        match self {
            Ty::I32 | Ty::F32 | Ty::FuncRef => 4,
            Ty::I64 | Ty::F64 => 8,
            Ty::Agg(fields) => fields.iter().map(Ty::byte_size).sum(),
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::I32 => write!(f, "i32"),
            Ty::I64 => write!(f, "i64"),
            Ty::F32 => write!(f, "f32"),
            Ty::F64 => write!(f, "f64"),
            Ty::FuncRef => write!(f, "funcref"),
            Ty::Agg(fields) => {
                write!(f, "{{")?;
                for (i, ty) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", ty)?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// A function signature: fixed parameters, optional result, and whether
/// the function accepts a variadic tail after the fixed prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct Sig {
    pub params: Vec<Ty>,
    pub result: Option<Ty>,
    pub variadic: bool,
}

impl Sig {
    pub fn new(params: Vec<Ty>, result: Option<Ty>) -> Self {
        Sig {
            params,
            result,
            variadic: false,
        }
    }

    pub fn variadic(params: Vec<Ty>, result: Option<Ty>) -> Self {
        Sig {
            params,
            result,
            variadic: true,
        }
    }

    /// Human-readable form used in trap messages, e.g. `(i32, f32) -> i32`.
    pub fn describe(&self) -> String {
        let params = self
            .params
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let tail = if self.variadic { ", ..." } else { "" };
        match &self.result {
            Some(r) => format!("({}{}) -> {}", params, tail, r),
            None => format!("({}{})", params, tail),
        }
    }
}

/// Width and signedness of a memory access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemTy {
    I32,
    I64,
    F32,
    F64,
    /// 8-bit, sign-extended on load, wrapped on store
    I8,
    /// 8-bit, zero-extended on load
    U8,
    /// 16-bit, sign-extended on load, wrapped on store
    I16,
    /// 16-bit, zero-extended on load
    U16,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    I32Eqz,
    F32Abs,
    F64Abs,
    F32Neg,
    F64Neg,
    I32WrapI64,
    I64ExtendI32S,
    I64ExtendI32U,
    F32ConvertI32S,
    F64ConvertI32S,
    I32TruncF32S,
    I32TruncF64S,
    F32DemoteF64,
    F64PromoteF32,
}

/// Binary operators
///
/// Integer arithmetic wraps (two's complement); shifts mask the shift
/// amount by the operand width, as the WebAssembly spec requires.  `F32Rem`
/// and `F64Rem` are the libm `fmod` lowering (truncated remainder).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    I32Add,
    I32Sub,
    I32Mul,
    I32DivS,
    I32DivU,
    I32RemS,
    I32RemU,
    I32And,
    I32Or,
    I32Xor,
    I32Shl,
    I32ShrS,
    I32ShrU,
    I32Eq,
    I32Ne,
    I32LtS,
    I32LtU,
    I32LeS,
    I32LeU,
    I32GtS,
    I32GtU,
    I32GeS,
    I32GeU,
    I64Add,
    I64Sub,
    I64Mul,
    F32Add,
    F32Sub,
    F32Mul,
    F32Div,
    F32Rem,
    F64Add,
    F64Sub,
    F64Mul,
    F64Div,
    F64Rem,
    F32Eq,
    F32Lt,
    F32Gt,
    F64Eq,
    F64Lt,
    F64Gt,
    F64Le,
    F64Ge,
    /// Identity comparison of two funcref values.
    RefEq,
}

/// Expressions
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    I32Const(i32),
    I64Const(i64),
    F32Const(f32),
    F64Const(f64),
    /// Read a local slot (parameters first, then declared locals).
    LocalGet(usize),
    Unary(UnOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    /// Typed load at `addr + offset` in linear memory.
    Load {
        ty: MemTy,
        addr: Box<Expr>,
        offset: u32,
    },
    /// Direct call to a statically named function.
    Call { func: FuncId, args: Vec<Expr> },
    /// Indirect call through a funcref, checked against the declared
    /// signature before the frame is built.
    CallIndirect {
        sig: SigId,
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    /// Take the address of a function as an opaque funcref value.
    RefFunc(FuncId),
    /// `sbrk`-style growth: returns the previous break boundary, or -1
    /// when the request exceeds the memory limit.  `MemoryGrow(0)` reads
    /// the current boundary without mutating.
    MemoryGrow(Box<Expr>),
    /// Pull the next variadic argument of the given type off the current
    /// frame's cursor.
    VaArg(Ty),
    /// Build an aggregate from field expressions in declaration order.
    MakeAgg(Vec<Expr>),
    /// Project a field out of an aggregate value.
    AggField(Box<Expr>, usize),
}

/// Statements
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Evaluate for effect; any produced value is discarded.
    Expr(Expr),
    LocalSet(usize, Expr),
    /// Typed store at `addr + offset` in linear memory.
    Store {
        ty: MemTy,
        addr: Expr,
        offset: u32,
        value: Expr,
    },
    If {
        cond: Expr,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
    },
    While { cond: Expr, body: Vec<Stmt> },
    /// Multi-way dispatch.  An unmatched scrutinee always takes the
    /// default body; there is no fallthrough between cases.
    Switch {
        scrut: Expr,
        cases: Vec<(i32, Vec<Stmt>)>,
        default: Vec<Stmt>,
    },
    Break,
    Continue,
    Return(Option<Expr>),
}

/// Syscall-shim and allocator entry points surfaced as host functions.
///
/// Exposing these through the ordinary function space means direct calls,
/// indirect calls, and marshaling treat them exactly like module code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOp {
    Malloc,
    Realloc,
    Free,
    Abort,
    FdWrite,
    FdRead,
    FdSeek,
    FdClose,
    PathOpen,
    FdFilestatGet,
    Fcntl,
    Unlink,
}

/// A function: translated module code or a host entry point
#[derive(Debug, Clone)]
pub struct Func {
    pub name: String,
    pub sig: SigId,
    pub kind: FuncKind,
}

#[derive(Debug, Clone)]
pub enum FuncKind {
    Local { locals: Vec<Ty>, body: Vec<Stmt> },
    Host(HostOp),
}

/// A static data segment copied into linear memory at instantiation
#[derive(Debug, Clone)]
pub struct DataSegment {
    pub offset: u32,
    pub bytes: Vec<u8>,
}

/// A fully decoded module, ready for instantiation
#[derive(Debug, Clone)]
pub struct Module {
    pub sigs: Vec<Sig>,
    pub funcs: Vec<Func>,
    pub exports: FxHashMap<String, FuncId>,
    pub data: Vec<DataSegment>,
    /// Functions pre-registered in the indirect call table, in slot order.
    pub elements: Vec<FuncId>,
    /// Initial linear memory size in bytes (a page multiple).
    pub initial_memory: u32,
}
