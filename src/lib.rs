//! # Introduction
//!
//! wasmil is the runtime-semantics layer of a WebAssembly-to-managed-code
//! translator.  It consumes already-decoded module code (an expression and
//! statement tree plus static data, produced by an external decoder) and
//! reproduces the observable behavior of the original compiled C: linear
//! memory, malloc/free, indirect calls through a function table, variadic
//! and struct-by-value marshaling, and a minimal WASI-like syscall shim.
//!
//! ## Execution pipeline
//!
//! ```text
//! Decoded module → Engine → LinearMemory / HeapAllocator
//!                         → FuncTable + marshaling
//!                         → SyscallShim → host filesystem / console
//! ```
//!
//! 1. [`module`] — the decoded-module data model: value types, signatures,
//!    the expression/statement IR, data and element segments, and
//!    [`module::build::ModuleBuilder`].
//! 2. [`memory`] — [`memory::linear::LinearMemory`] (flat, growable,
//!    little-endian byte buffer with `sbrk` semantics) and
//!    [`memory::alloc::HeapAllocator`] (free-list malloc/realloc/free).
//! 3. [`engine`] — tree-walking instruction dispatch, call frames, the
//!    indirect call table, ABI marshaling, and host-call entry points.
//! 4. [`shim`] — preopened directories, file descriptors, `fstat`,
//!    advisory locking, abort semantics, and the buffered console.
//!
//! ## Scope
//!
//! The crate does not parse the WebAssembly binary format and does not
//! implement full WASI — only the memory, call, and syscall semantics a
//! translated C module actually exercises.  One [`engine::Engine`] owns
//! one module instance; nothing is shared between instances.

pub mod engine;
pub mod memory;
pub mod module;
pub mod shim;
