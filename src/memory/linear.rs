//! Linear memory with `sbrk`-style growth
//!
//! One contiguous byte buffer per module instance.  The break boundary
//! (`brk`) is the edge of the committed region and grows monotonically;
//! [`LinearMemory::grow`] returns the previous boundary, so `grow(0)` is a
//! pure read of the current break — exactly the `sbrk` contract the
//! translated libc relies on.
//!
//! All typed accessors are little-endian.  Out-of-range access reports a
//! string error which the engine surfaces as a `MemoryFault` trap.

use super::value::Addr;

/// The linear memory of one module instance
#[derive(Debug, Clone)]
pub struct LinearMemory {
    bytes: Vec<u8>,
    brk: usize,
    limit: usize,
}

impl LinearMemory {
    /// Create a memory of `initial` zeroed bytes with a hard growth limit.
    pub fn new(initial: usize, limit: usize) -> Self {
        LinearMemory {
            bytes: vec![0; initial],
            brk: initial,
            limit,
        }
    }

    /// Current break boundary.
    pub fn brk(&self) -> Addr {
        self.brk as Addr
    }

    /// Committed size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Extend the committed region by `delta` bytes and return the
    /// previous break.  `grow(0)` returns the current break without
    /// mutating.  Growth never moves previously returned addresses.
    pub fn grow(&mut self, delta: usize) -> Result<Addr, String> {
        let old = self.brk;
        if delta == 0 {
            return Ok(old as Addr);
        }
        let new = old
            .checked_add(delta)
            .ok_or_else(|| format!("Memory growth overflow: brk {} + {}", old, delta))?;
        if new > self.limit {
            return Err(format!(
                "Memory limit exceeded: requested break {}, limit is {}",
                new, self.limit
            ));
        }
        self.bytes.resize(new, 0);
        self.brk = new;
        Ok(old as Addr)
    }

    /// Bounds-check an access and return the starting offset.
    fn check(&self, addr: Addr, len: usize) -> Result<usize, String> {
        let start = addr as usize;
        let end = start.checked_add(len).ok_or_else(|| {
            format!("Address overflow: 0x{:x} + {} bytes", addr, len)
        })?;
        if end > self.bytes.len() {
            return Err(format!(
                "Out-of-range access: {} bytes at 0x{:x} in memory of size {}",
                len,
                addr,
                self.bytes.len()
            ));
        }
        Ok(start)
    }

    /// Read a byte range.
    pub fn read_bytes(&self, addr: Addr, len: usize) -> Result<&[u8], String> {
        let start = self.check(addr, len)?;
        Ok(&self.bytes[start..start + len])
    }

    /// Write a byte range.
    pub fn write_bytes(&mut self, addr: Addr, bytes: &[u8]) -> Result<(), String> {
        let start = self.check(addr, bytes.len())?;
        self.bytes[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    pub fn load_u8(&self, addr: Addr) -> Result<u8, String> {
        let start = self.check(addr, 1)?;
        Ok(self.bytes[start])
    }

    pub fn load_i8(&self, addr: Addr) -> Result<i8, String> {
        Ok(self.load_u8(addr)? as i8)
    }

    pub fn load_u16(&self, addr: Addr) -> Result<u16, String> {
        let start = self.check(addr, 2)?;
        let mut b = [0u8; 2];
        b.copy_from_slice(&self.bytes[start..start + 2]);
        Ok(u16::from_le_bytes(b))
    }

    pub fn load_i16(&self, addr: Addr) -> Result<i16, String> {
        Ok(self.load_u16(addr)? as i16)
    }

    pub fn load_i32(&self, addr: Addr) -> Result<i32, String> {
        let start = self.check(addr, 4)?;
        let mut b = [0u8; 4];
        b.copy_from_slice(&self.bytes[start..start + 4]);
        Ok(i32::from_le_bytes(b))
    }

    pub fn load_u32(&self, addr: Addr) -> Result<u32, String> {
        Ok(self.load_i32(addr)? as u32)
    }

    pub fn load_i64(&self, addr: Addr) -> Result<i64, String> {
        let start = self.check(addr, 8)?;
        let mut b = [0u8; 8];
        b.copy_from_slice(&self.bytes[start..start + 8]);
        Ok(i64::from_le_bytes(b))
    }

    pub fn load_f32(&self, addr: Addr) -> Result<f32, String> {
        Ok(f32::from_bits(self.load_i32(addr)? as u32))
    }

    pub fn load_f64(&self, addr: Addr) -> Result<f64, String> {
        Ok(f64::from_bits(self.load_i64(addr)? as u64))
    }

    pub fn store_u8(&mut self, addr: Addr, v: u8) -> Result<(), String> {
        let start = self.check(addr, 1)?;
        self.bytes[start] = v;
        Ok(())
    }

    pub fn store_u16(&mut self, addr: Addr, v: u16) -> Result<(), String> {
        self.write_bytes(addr, &v.to_le_bytes())
    }

    pub fn store_i32(&mut self, addr: Addr, v: i32) -> Result<(), String> {
        self.write_bytes(addr, &v.to_le_bytes())
    }

    pub fn store_u32(&mut self, addr: Addr, v: u32) -> Result<(), String> {
        self.write_bytes(addr, &v.to_le_bytes())
    }

    pub fn store_i64(&mut self, addr: Addr, v: i64) -> Result<(), String> {
        self.write_bytes(addr, &v.to_le_bytes())
    }

    pub fn store_u64(&mut self, addr: Addr, v: u64) -> Result<(), String> {
        self.write_bytes(addr, &v.to_le_bytes())
    }

    pub fn store_f32(&mut self, addr: Addr, v: f32) -> Result<(), String> {
        self.store_u32(addr, v.to_bits())
    }

    pub fn store_f64(&mut self, addr: Addr, v: f64) -> Result<(), String> {
        self.store_u64(addr, v.to_bits())
    }
}
