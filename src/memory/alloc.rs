//! Heap allocation (malloc/realloc/free) over linear memory
//!
//! This module provides a first-fit free-list allocator:
//! - Fresh blocks are carved off the break via [`LinearMemory::grow`]
//! - Freed blocks go on a free list and may be reused whole
//! - Double-free and invalid-free are detected
//!
//! # Invariants
//!
//! Any two concurrently live blocks have disjoint address ranges, and a
//! freed range is never handed out while still live.  `alloc(0)` returns a
//! valid, unique address (a minimum-granule block).  Exhaustion returns
//! the NULL sentinel (0) rather than an error, matching how translated
//! module code branches on malloc failure.

use super::linear::LinearMemory;
use super::value::Addr;
use rustc_hash::FxHashMap;

/// Allocation granule; every capacity is a multiple of this.
const ALLOC_ALIGN: usize = 8;

#[derive(Debug, Clone)]
struct Block {
    capacity: usize,
    free: bool,
}

/// The heap allocator of one module instance
#[derive(Debug, Clone)]
pub struct HeapAllocator {
    blocks: FxHashMap<Addr, Block>,
    free_list: Vec<Addr>,
    total_live: usize,
    max_heap: usize,
}

impl HeapAllocator {
    /// Create an allocator with a live-byte cap.
    pub fn new(max_heap: usize) -> Self {
        HeapAllocator {
            blocks: FxHashMap::default(),
            free_list: Vec::new(),
            total_live: 0,
            max_heap,
        }
    }

    fn granule(size: u32) -> usize {
        let size = (size as usize).max(1);
        size.div_ceil(ALLOC_ALIGN) * ALLOC_ALIGN
    }

    /// Allocate a block of at least `size` bytes.  Returns 0 when the
    /// heap cap or the memory limit is exhausted.
    pub fn alloc(&mut self, mem: &mut LinearMemory, size: u32) -> Addr {
        let need = Self::granule(size);
        if self.total_live + need > self.max_heap {
            return 0;
        }

        // First fit over the free list; whole-block reuse keeps the
        // disjointness invariant trivial.
        let fit = self.free_list.iter().position(|a| {
            self.blocks
                .get(a)
                .is_some_and(|b| b.free && b.capacity >= need)
        });
        if let Some(pos) = fit {
            let addr = self.free_list.swap_remove(pos);
            if let Some(block) = self.blocks.get_mut(&addr) {
                block.free = false;
                self.total_live += block.capacity;
                return addr;
            }
        }

        let addr = match mem.grow(need) {
            Ok(old_brk) => old_brk,
            Err(_) => return 0,
        };
        self.blocks.insert(
            addr,
            Block {
                capacity: need,
                free: false,
            },
        );
        self.total_live += need;
        addr
    }

    /// Resize a block.  Growth within the block's capacity is in place;
    /// anything larger relocates, preserving all bytes written under the
    /// old size.  `realloc(0, n)` behaves like `alloc(n)`; exhaustion
    /// returns 0 and leaves the old block live.
    pub fn realloc(
        &mut self,
        mem: &mut LinearMemory,
        addr: Addr,
        new_size: u32,
    ) -> Result<Addr, String> {
        if addr == 0 {
            return Ok(self.alloc(mem, new_size));
        }
        let capacity = match self.blocks.get(&addr) {
            Some(block) if !block.free => block.capacity,
            Some(_) => return Err(format!("Use-after-free: realloc of freed 0x{:x}", addr)),
            None => return Err(format!("Invalid realloc: 0x{:x} was never allocated", addr)),
        };
        if Self::granule(new_size) <= capacity {
            return Ok(addr);
        }

        let new_addr = self.alloc(mem, new_size);
        if new_addr == 0 {
            return Ok(0);
        }
        let old_bytes = mem.read_bytes(addr, capacity)?.to_vec();
        mem.write_bytes(new_addr, &old_bytes)?;
        self.free(addr)?;
        Ok(new_addr)
    }

    /// Free a block.  Freeing address 0 is a no-op.
    pub fn free(&mut self, addr: Addr) -> Result<(), String> {
        if addr == 0 {
            return Ok(());
        }
        match self.blocks.get_mut(&addr) {
            Some(block) if !block.free => {
                block.free = true;
                self.total_live -= block.capacity;
                self.free_list.push(addr);
                Ok(())
            }
            Some(_) => Err(format!("Double free detected at address 0x{:x}", addr)),
            None => Err(format!(
                "Invalid free: address 0x{:x} was never allocated",
                addr
            )),
        }
    }

    /// Bytes currently handed out to live blocks.
    pub fn total_live(&self) -> usize {
        self.total_live
    }

    /// The live-byte cap.
    pub fn max_heap(&self) -> usize {
        self.max_heap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (LinearMemory, HeapAllocator) {
        (
            LinearMemory::new(65536, 16 * 1024 * 1024),
            HeapAllocator::new(8 * 1024 * 1024),
        )
    }

    #[test]
    fn live_blocks_are_disjoint() {
        let (mut mem, mut heap) = setup();
        let a = heap.alloc(&mut mem, 10);
        let b = heap.alloc(&mut mem, 10);
        assert_ne!(a, 0);
        assert_ne!(b, 0);
        assert!(a + 16 <= b || b + 16 <= a);
    }

    #[test]
    fn freed_block_may_be_reused() {
        let (mut mem, mut heap) = setup();
        let a = heap.alloc(&mut mem, 64);
        heap.free(a).unwrap();
        let b = heap.alloc(&mut mem, 64);
        // Whole-block first fit reuses the freed range.
        assert_eq!(a, b);
    }

    #[test]
    fn double_free_is_detected() {
        let (mut mem, mut heap) = setup();
        let a = heap.alloc(&mut mem, 8);
        heap.free(a).unwrap();
        assert!(heap.free(a).is_err());
        assert!(heap.free(0x9999).is_err());
        // NULL is always a no-op.
        heap.free(0).unwrap();
    }

    #[test]
    fn alloc_zero_is_unique_and_valid() {
        let (mut mem, mut heap) = setup();
        let a = heap.alloc(&mut mem, 0);
        let b = heap.alloc(&mut mem, 0);
        assert_ne!(a, 0);
        assert_ne!(b, 0);
        assert_ne!(a, b);
    }

    #[test]
    fn exhaustion_returns_sentinel() {
        let mut mem = LinearMemory::new(65536, 1 << 20);
        let mut heap = HeapAllocator::new(1024);
        let a = heap.alloc(&mut mem, 512);
        assert_ne!(a, 0);
        assert_eq!(heap.alloc(&mut mem, 4096), 0);
        // A free makes room again.
        heap.free(a).unwrap();
        assert_ne!(heap.alloc(&mut mem, 512), 0);
    }

    #[test]
    fn realloc_preserves_contents() {
        let (mut mem, mut heap) = setup();
        let a = heap.alloc(&mut mem, 50);
        let payload: Vec<u8> = (0..50).collect();
        mem.write_bytes(a, &payload).unwrap();
        let b = heap.realloc(&mut mem, a, 100).unwrap();
        assert_ne!(b, 0);
        assert_eq!(&mem.read_bytes(b, 50).unwrap(), &payload.as_slice());
    }
}
