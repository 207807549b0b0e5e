//! Execution engine for translated module code
//!
//! This module provides the core execution logic:
//! - [`engine`]: the [`engine::Engine`] itself — instruction dispatch,
//!   call frames, and the `invoke`/`run` entry points
//! - [`errors`]: the fatal [`errors::Trap`] taxonomy
//! - [`table`]: the indirect call table with identity-equal funcrefs
//! - [`marshal`]: call-frame construction, variadic cursors, and
//!   aggregate passing rules
//! - [`hostcalls`]: the syscall-shim and allocator entry points
//! - [`constants`]: engine-wide limits
//!
//! # Execution Model
//!
//! The engine walks the decoded statement tree one statement at a time.
//! Resource-level failures (allocation exhaustion, path permission) are
//! returned to module code as ordinary values so it can branch on them;
//! structural violations (out-of-range memory, bad indirect calls) are
//! traps that unwind to the entry-point boundary, flushing any buffered
//! console output on the way out.

pub mod constants;
pub mod engine;
pub mod errors;
pub mod hostcalls;
pub mod marshal;
pub mod table;

pub use engine::Engine;
