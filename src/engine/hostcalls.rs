//! Host function dispatch: allocator and syscall-shim entry points
//!
//! Translated module code reaches the allocator and the syscall shim
//! through ordinary calls to host functions.  The conventions:
//! - allocator exhaustion is reported as the NULL sentinel, never a trap
//! - shim failures come back as errno codes in the i32 return slot;
//!   side-band outputs (byte counts, new offsets, fresh fds) are stored
//!   through a return pointer in linear memory
//! - scatter/gather I/O walks iovec arrays laid out in memory as pairs
//!   of little-endian i32s: buffer address, then length

use crate::engine::engine::Engine;
use crate::engine::errors::Trap;
use crate::memory::value::Value;
use crate::module::ir::HostOp;
use crate::shim::{Whence, ERRNO_INVAL, ERRNO_SUCCESS};

/// Byte stride of one iovec entry in linear memory.
const IOVEC_STRIDE: u32 = 8;

fn arg_i32(args: &[Value], index: usize, function: &str) -> Result<i32, Trap> {
    match args.get(index) {
        Some(Value::I32(n)) => Ok(*n),
        Some(other) => Err(Trap::TypeError {
            expected: "i32".to_string(),
            got: other.ty().to_string(),
        }),
        None => Err(Trap::ArgumentCountMismatch {
            function: function.to_string(),
            expected: index + 1,
            got: args.len(),
        }),
    }
}

fn arg_i64(args: &[Value], index: usize, function: &str) -> Result<i64, Trap> {
    match args.get(index) {
        Some(Value::I64(n)) => Ok(*n),
        Some(other) => Err(Trap::TypeError {
            expected: "i64".to_string(),
            got: other.ty().to_string(),
        }),
        None => Err(Trap::ArgumentCountMismatch {
            function: function.to_string(),
            expected: index + 1,
            got: args.len(),
        }),
    }
}

/// Map a heap-layer error string onto the matching trap.
fn heap_trap(addr: u32, message: String) -> Trap {
    if message.contains("Double free") {
        Trap::DoubleFree { addr }
    } else if message.contains("never allocated") {
        Trap::InvalidFree { addr }
    } else {
        Trap::memory(message)
    }
}

impl Engine {
    /// Execute one host function.  Returns the value for the caller's
    /// result slot, if the host signature declares one.
    pub(crate) fn call_host(
        &mut self,
        op: HostOp,
        name: &str,
        args: &[Value],
    ) -> Result<Option<Value>, Trap> {
        match op {
            HostOp::Malloc => {
                let size = arg_i32(args, 0, name)? as u32;
                let addr = self.heap.alloc(&mut self.memory, size);
                Ok(Some(Value::I32(addr as i32)))
            }
            HostOp::Realloc => {
                let addr = arg_i32(args, 0, name)? as u32;
                let new_size = arg_i32(args, 1, name)? as u32;
                let moved = self
                    .heap
                    .realloc(&mut self.memory, addr, new_size)
                    .map_err(|e| heap_trap(addr, e))?;
                Ok(Some(Value::I32(moved as i32)))
            }
            HostOp::Free => {
                let addr = arg_i32(args, 0, name)? as u32;
                self.heap.free(addr).map_err(|e| heap_trap(addr, e))?;
                Ok(None)
            }
            HostOp::Abort => {
                self.shim.console_mut().flush();
                Err(Trap::Aborted)
            }
            HostOp::FdWrite => {
                let fd = arg_i32(args, 0, name)?;
                let iovs = arg_i32(args, 1, name)? as u32;
                let iovs_len = arg_i32(args, 2, name)?;
                let retptr = arg_i32(args, 3, name)? as u32;
                self.fd_write(fd, iovs, iovs_len, retptr)
            }
            HostOp::FdRead => {
                let fd = arg_i32(args, 0, name)?;
                let iovs = arg_i32(args, 1, name)? as u32;
                let iovs_len = arg_i32(args, 2, name)?;
                let retptr = arg_i32(args, 3, name)? as u32;
                self.fd_read(fd, iovs, iovs_len, retptr)
            }
            HostOp::FdSeek => {
                let fd = arg_i32(args, 0, name)?;
                let offset = arg_i64(args, 1, name)?;
                let whence_raw = arg_i32(args, 2, name)?;
                let retptr = arg_i32(args, 3, name)? as u32;
                let whence = match Whence::from_i32(whence_raw) {
                    Some(w) => w,
                    None => return Ok(Some(Value::I32(ERRNO_INVAL))),
                };
                match self.shim.seek(fd, offset, whence) {
                    Ok(pos) => {
                        self.memory.store_u64(retptr, pos).map_err(Trap::memory)?;
                        Ok(Some(Value::I32(ERRNO_SUCCESS)))
                    }
                    Err(e) => Ok(Some(Value::I32(e.errno()))),
                }
            }
            HostOp::FdClose => {
                let fd = arg_i32(args, 0, name)?;
                let errno = match self.shim.close(fd) {
                    Ok(()) => ERRNO_SUCCESS,
                    Err(e) => e.errno(),
                };
                Ok(Some(Value::I32(errno)))
            }
            HostOp::PathOpen => {
                let path_ptr = arg_i32(args, 0, name)? as u32;
                let path_len = arg_i32(args, 1, name)? as usize;
                let flags = arg_i32(args, 2, name)?;
                let retptr = arg_i32(args, 3, name)? as u32;
                let raw = self
                    .memory
                    .read_bytes(path_ptr, path_len)
                    .map_err(Trap::memory)?
                    .to_vec();
                let path = match String::from_utf8(raw) {
                    Ok(p) => p,
                    Err(_) => return Ok(Some(Value::I32(ERRNO_INVAL))),
                };
                match self.shim.open(&path, flags) {
                    Ok(fd) => {
                        self.memory
                            .store_i32(retptr, fd)
                            .map_err(Trap::memory)?;
                        Ok(Some(Value::I32(ERRNO_SUCCESS)))
                    }
                    Err(e) => Ok(Some(Value::I32(e.errno()))),
                }
            }
            HostOp::FdFilestatGet => {
                let fd = arg_i32(args, 0, name)?;
                let buf_ptr = arg_i32(args, 1, name)? as u32;
                match self.shim.fstat(fd) {
                    Ok(stat) => {
                        self.memory
                            .write_bytes(buf_ptr, &stat.to_le_bytes())
                            .map_err(Trap::memory)?;
                        Ok(Some(Value::I32(ERRNO_SUCCESS)))
                    }
                    Err(e) => Ok(Some(Value::I32(e.errno()))),
                }
            }
            HostOp::Fcntl => {
                let fd = arg_i32(args, 0, name)?;
                let cmd = arg_i32(args, 1, name)?;
                let _arg = arg_i32(args, 2, name)?;
                Ok(Some(Value::I32(self.shim.fcntl(fd, cmd))))
            }
            HostOp::Unlink => {
                let path_ptr = arg_i32(args, 0, name)? as u32;
                let path_len = arg_i32(args, 1, name)? as usize;
                let raw = self
                    .memory
                    .read_bytes(path_ptr, path_len)
                    .map_err(Trap::memory)?
                    .to_vec();
                let path = match String::from_utf8(raw) {
                    Ok(p) => p,
                    Err(_) => return Ok(Some(Value::I32(ERRNO_INVAL))),
                };
                let errno = match self.shim.unlink(&path) {
                    Ok(()) => ERRNO_SUCCESS,
                    Err(e) => e.errno(),
                };
                Ok(Some(Value::I32(errno)))
            }
        }
    }

    /// Gather-write an iovec array through the shim, storing the total
    /// byte count through `retptr`.
    fn fd_write(
        &mut self,
        fd: i32,
        iovs: u32,
        iovs_len: i32,
        retptr: u32,
    ) -> Result<Option<Value>, Trap> {
        let mut total: u32 = 0;
        for i in 0..iovs_len.max(0) as u32 {
            let entry = iovs + i * IOVEC_STRIDE;
            let buf_ptr = self.memory.load_u32(entry).map_err(Trap::memory)?;
            let len = self.memory.load_u32(entry + 4).map_err(Trap::memory)?;
            let bytes = self
                .memory
                .read_bytes(buf_ptr, len as usize)
                .map_err(Trap::memory)?
                .to_vec();
            match self.shim.write(fd, &bytes) {
                Ok(n) => total += n as u32,
                Err(e) => return Ok(Some(Value::I32(e.errno()))),
            }
        }
        self.memory.store_u32(retptr, total).map_err(Trap::memory)?;
        Ok(Some(Value::I32(ERRNO_SUCCESS)))
    }

    /// Scatter-read into an iovec array, storing the total byte count
    /// through `retptr`.  Short reads stop the walk without error.
    fn fd_read(
        &mut self,
        fd: i32,
        iovs: u32,
        iovs_len: i32,
        retptr: u32,
    ) -> Result<Option<Value>, Trap> {
        let mut total: u32 = 0;
        for i in 0..iovs_len.max(0) as u32 {
            let entry = iovs + i * IOVEC_STRIDE;
            let buf_ptr = self.memory.load_u32(entry).map_err(Trap::memory)?;
            let len = self.memory.load_u32(entry + 4).map_err(Trap::memory)? as usize;
            let mut buf = vec![0u8; len];
            let n = match self.shim.read(fd, &mut buf) {
                Ok(n) => n,
                Err(e) => return Ok(Some(Value::I32(e.errno()))),
            };
            self.memory
                .write_bytes(buf_ptr, &buf[..n])
                .map_err(Trap::memory)?;
            total += n as u32;
            if n < len {
                break;
            }
        }
        self.memory.store_u32(retptr, total).map_err(Trap::memory)?;
        Ok(Some(Value::I32(ERRNO_SUCCESS)))
    }
}
