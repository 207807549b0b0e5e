// Constants for the execution engine

/// Hard cap on linear memory growth (bytes)
pub const MAX_MEMORY_BYTES: usize = 256 * 1024 * 1024;

/// Live-byte cap for the heap allocator; requests past it return the
/// NULL sentinel
pub const MAX_HEAP_BYTES: usize = 64 * 1024 * 1024;

/// Call depth at which the engine reports a fatal StackOverflow instead
/// of letting the host stack exhaust
pub const MAX_CALL_DEPTH: usize = 8192;

/// Aggregates up to this many bytes are passed and returned as flattened
/// field lists; larger ones go through a caller-allocated out-pointer
pub const AGG_BY_VALUE_MAX: usize = 16;
