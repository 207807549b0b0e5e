//! Memory model for the translated module
//!
//! This module provides the core memory abstractions:
//! - [`value`]: tagged runtime value representation (I32, I64, F32, F64,
//!   funcref, aggregate)
//! - [`linear`]: the flat, growable, little-endian linear memory with
//!   `sbrk`-style growth
//! - [`alloc`]: free-list malloc/realloc/free layered on linear memory
//!
//! # Addressing
//!
//! Addresses are 32-bit offsets into one contiguous buffer owned by the
//! module instance.  Growth extends the buffer in place as far as the
//! caller observes: previously returned addresses stay valid and stable
//! for the lifetime of the instance.
//!
//! # Error Handling
//!
//! Methods return `Result<_, String>` for errors.  These are internal
//! APIs; the string errors are converted to `Trap` variants at the engine
//! boundary, which keeps the hot load/store paths free of the larger
//! error type.

pub mod alloc;
pub mod linear;
pub mod value;
