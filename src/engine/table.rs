//! Indirect call table
//!
//! Maps function identities to opaque [`FuncValue`] slots.  Two lookups of
//! the same function yield the same slot, which is what gives funcrefs
//! pointer-equality semantics for selection logic in module code.  Slot 0
//! is reserved as the null funcref.

use crate::engine::errors::Trap;
use crate::module::ir::{FuncId, FuncValue};
use rustc_hash::FxHashMap;

/// The indirect call table of one module instance
#[derive(Debug, Default)]
pub struct FuncTable {
    /// Slot -> function id; slot 0 is unused (null funcref).
    slots: Vec<Option<FuncId>>,
    /// Function id -> slot, for dedup.
    index: FxHashMap<FuncId, u32>,
}

impl FuncTable {
    pub fn new() -> Self {
        FuncTable {
            slots: vec![None],
            index: FxHashMap::default(),
        }
    }

    /// Get the funcref for a function, allocating a slot on first use.
    pub fn register_or_lookup(&mut self, func: FuncId) -> FuncValue {
        if let Some(slot) = self.index.get(&func) {
            return FuncValue(*slot);
        }
        let slot = self.slots.len() as u32;
        self.slots.push(Some(func));
        self.index.insert(func, slot);
        FuncValue(slot)
    }

    /// Resolve a funcref back to its function id.
    pub fn resolve(&self, fv: FuncValue) -> Result<FuncId, Trap> {
        match self.slots.get(fv.0 as usize) {
            Some(Some(func)) if !fv.is_null() => Ok(*func),
            _ => Err(Trap::InvalidIndirectCall { slot: fv.0 }),
        }
    }

    /// Number of occupied slots (excluding the null slot).
    pub fn len(&self) -> usize {
        self.slots.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_function_yields_equal_funcrefs() {
        let mut table = FuncTable::new();
        let a = table.register_or_lookup(7);
        let b = table.register_or_lookup(7);
        let c = table.register_or_lookup(9);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(table.resolve(a).unwrap(), 7);
        assert_eq!(table.resolve(c).unwrap(), 9);
    }

    #[test]
    fn null_and_stale_slots_are_rejected() {
        let table = FuncTable::new();
        assert!(matches!(
            table.resolve(FuncValue::NULL),
            Err(Trap::InvalidIndirectCall { slot: 0 })
        ));
        assert!(table.resolve(FuncValue(42)).is_err());
    }
}
