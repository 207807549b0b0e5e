//! Decoded-module data model
//!
//! This module defines everything the external decoder hands to the engine:
//! - [`ir`]: value types, signatures, and the expression/statement IR
//! - [`build`]: [`build::ModuleBuilder`], the construction surface used by
//!   the decoder (and by tests, which build fixture programs by hand)
//!
//! # Layout rules
//!
//! Unlike native C, the translated form uses fixed, platform-independent
//! sizes: `i32`/`f32`/funcref are 4 bytes, `i64`/`f64` are 8 bytes, and an
//! aggregate is the packed sum of its field sizes in declaration order (no
//! padding or alignment).  All multi-byte values are little-endian, so a
//! struct such as a two-float vector round-trips bit-for-bit through
//! load/store pairs.

pub mod build;
pub mod ir;
