//! Fatal trap types for the execution engine
//!
//! This module defines [`Trap`], which represents the non-recoverable
//! conditions that terminate the current entry point (as opposed to
//! resource-level errors, which are returned to module code as ordinary
//! values).
//!
//! All traps are fatal — they unwind to the entry-point boundary, and the
//! engine flushes buffered console output before surfacing them so
//! diagnostic text is never lost.

use std::fmt;

/// Fatal conditions during execution
#[derive(Debug, Clone)]
pub enum Trap {
    /// Out-of-range or otherwise invalid linear-memory access
    MemoryFault { message: String },

    /// Indirect call through a null or stale funcref
    InvalidIndirectCall { slot: u32 },

    /// Call-site arity/types disagree with the resolved function
    SignatureMismatch { expected: String, got: String },

    /// Call depth guard tripped
    StackOverflow { depth: usize },

    /// Explicit abort (failed assertion path); output was flushed first
    Aborted,

    /// Double free
    DoubleFree { addr: u32 },

    /// Free of a never-allocated address
    InvalidFree { addr: u32 },

    /// Integer division or remainder by zero
    DivisionByZero { operation: String },

    /// Entry-point name not exported by the module
    UndefinedExport { name: String },

    /// Call to a function id outside the module's function space
    UndefinedFunction { id: usize },

    /// Statement or expression executed with no active call frame
    NoCallFrame,

    /// Local slot index outside the frame
    InvalidLocal { index: usize, function: String },

    /// Operand type does not match what the operation requires
    TypeError { expected: String, got: String },

    /// Direct call with the wrong number of arguments
    ArgumentCountMismatch {
        function: String,
        expected: usize,
        got: usize,
    },

    /// Variadic cursor misuse (pull past the supplied tail, or a pull in
    /// a non-variadic frame)
    InvalidVarargAccess { message: String },

    /// Function with a declared result completed without returning one
    MissingReturnValue { function: String },
}

impl Trap {
    /// Wrap a memory-layer error string.
    pub(crate) fn memory(message: String) -> Trap {
        Trap::MemoryFault { message }
    }
}

impl fmt::Display for Trap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trap::MemoryFault { message } => {
                write!(f, "Memory fault: {}", message)
            }
            Trap::InvalidIndirectCall { slot } => {
                write!(f, "Invalid indirect call through funcref slot {}", slot)
            }
            Trap::SignatureMismatch { expected, got } => {
                write!(
                    f,
                    "Indirect call signature mismatch: expected {}, got {}",
                    expected, got
                )
            }
            Trap::StackOverflow { depth } => {
                write!(f, "Stack overflow at call depth {}", depth)
            }
            Trap::Aborted => {
                write!(f, "Execution aborted")
            }
            Trap::DoubleFree { addr } => {
                write!(f, "Double free at address 0x{:x}", addr)
            }
            Trap::InvalidFree { addr } => {
                write!(f, "Invalid free: address 0x{:x} was never allocated", addr)
            }
            Trap::DivisionByZero { operation } => {
                write!(f, "{} by zero", operation)
            }
            Trap::UndefinedExport { name } => {
                write!(f, "No export named '{}'", name)
            }
            Trap::UndefinedFunction { id } => {
                write!(f, "Call to undefined function id {}", id)
            }
            Trap::NoCallFrame => {
                write!(f, "No call frame available")
            }
            Trap::InvalidLocal { index, function } => {
                write!(f, "Local slot {} out of range in '{}'", index, function)
            }
            Trap::TypeError { expected, got } => {
                write!(f, "Type error: expected {}, got {}", expected, got)
            }
            Trap::ArgumentCountMismatch {
                function,
                expected,
                got,
            } => {
                write!(
                    f,
                    "Function '{}' expects {} argument{}, got {}",
                    function,
                    expected,
                    if *expected == 1 { "" } else { "s" },
                    got
                )
            }
            Trap::InvalidVarargAccess { message } => {
                write!(f, "Invalid variadic access: {}", message)
            }
            Trap::MissingReturnValue { function } => {
                write!(f, "Function '{}' completed without a return value", function)
            }
        }
    }
}

impl std::error::Error for Trap {}
