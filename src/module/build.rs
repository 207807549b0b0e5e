//! Module construction surface for the decoded-module supplier

use super::ir::{
    DataSegment, Func, FuncId, FuncKind, HostOp, Module, Sig, SigId, Stmt, Ty, PAGE_SIZE,
};
use rustc_hash::FxHashMap;

/// Builds a [`Module`] incrementally.
///
/// The decoder adds signatures, functions, data segments, and table
/// elements as it walks the binary sections, then calls [`finish`].
/// Signatures are deduplicated so structurally equal call sites share a
/// [`SigId`], which is what the indirect-call signature check compares.
///
/// [`finish`]: ModuleBuilder::finish
#[derive(Debug, Default)]
pub struct ModuleBuilder {
    sigs: Vec<Sig>,
    funcs: Vec<Func>,
    exports: FxHashMap<String, FuncId>,
    data: Vec<DataSegment>,
    elements: Vec<FuncId>,
    memory_pages: u32,
}

/// Function ids for the standard host-call surface.
#[derive(Debug, Clone, Copy)]
pub struct HostImports {
    pub malloc: FuncId,
    pub realloc: FuncId,
    pub free: FuncId,
    pub abort: FuncId,
    pub fd_write: FuncId,
    pub fd_read: FuncId,
    pub fd_seek: FuncId,
    pub fd_close: FuncId,
    pub path_open: FuncId,
    pub fd_filestat_get: FuncId,
    pub fcntl: FuncId,
    pub unlink: FuncId,
}

impl ModuleBuilder {
    pub fn new() -> Self {
        ModuleBuilder {
            memory_pages: 1,
            ..Default::default()
        }
    }

    /// Intern a signature, reusing an existing id for structural equals.
    pub fn sig(&mut self, sig: Sig) -> SigId {
        if let Some(pos) = self.sigs.iter().position(|s| *s == sig) {
            return pos;
        }
        self.sigs.push(sig);
        self.sigs.len() - 1
    }

    /// Add a translated function.
    pub fn func(
        &mut self,
        name: impl Into<String>,
        sig: SigId,
        locals: Vec<Ty>,
        body: Vec<Stmt>,
    ) -> FuncId {
        self.funcs.push(Func {
            name: name.into(),
            sig,
            kind: FuncKind::Local { locals, body },
        });
        self.funcs.len() - 1
    }

    /// Add a host entry point.
    pub fn host(&mut self, name: impl Into<String>, sig: SigId, op: HostOp) -> FuncId {
        self.funcs.push(Func {
            name: name.into(),
            sig,
            kind: FuncKind::Host(op),
        });
        self.funcs.len() - 1
    }

    pub fn export(&mut self, name: impl Into<String>, func: FuncId) {
        self.exports.insert(name.into(), func);
    }

    pub fn data(&mut self, offset: u32, bytes: &[u8]) {
        self.data.push(DataSegment {
            offset,
            bytes: bytes.to_vec(),
        });
    }

    /// Pre-register a function in the indirect call table.
    pub fn element(&mut self, func: FuncId) {
        self.elements.push(func);
    }

    pub fn memory_pages(&mut self, pages: u32) {
        self.memory_pages = pages;
    }

    /// Register the full host-call surface with its canonical signatures.
    pub fn standard_hostcalls(&mut self) -> HostImports {
        use Ty::I32;

        let i1_r = self.sig(Sig::new(vec![I32], Some(I32)));
        let i2_r = self.sig(Sig::new(vec![I32, I32], Some(I32)));
        let i3_r = self.sig(Sig::new(vec![I32, I32, I32], Some(I32)));
        let i4_r = self.sig(Sig::new(vec![I32, I32, I32, I32], Some(I32)));
        let i1 = self.sig(Sig::new(vec![I32], None));
        let void = self.sig(Sig::new(vec![], None));
        let seek = self.sig(Sig::new(vec![I32, Ty::I64, I32, I32], Some(I32)));

        HostImports {
            malloc: self.host("malloc", i1_r, HostOp::Malloc),
            realloc: self.host("realloc", i2_r, HostOp::Realloc),
            free: self.host("free", i1, HostOp::Free),
            abort: self.host("abort", void, HostOp::Abort),
            fd_write: self.host("fd_write", i4_r, HostOp::FdWrite),
            fd_read: self.host("fd_read", i4_r, HostOp::FdRead),
            fd_seek: self.host("fd_seek", seek, HostOp::FdSeek),
            fd_close: self.host("fd_close", i1_r, HostOp::FdClose),
            path_open: self.host("path_open", i4_r, HostOp::PathOpen),
            fd_filestat_get: self.host("fd_filestat_get", i2_r, HostOp::FdFilestatGet),
            fcntl: self.host("fcntl", i3_r, HostOp::Fcntl),
            unlink: self.host("unlink", i2_r, HostOp::Unlink),
        }
    }

    /// Finalize the module.  Initial memory covers the requested pages and
    /// every data segment, rounded up to page granularity.
    pub fn finish(self) -> Module {
        let mut initial = self.memory_pages.saturating_mul(PAGE_SIZE);
        for seg in &self.data {
            let end = seg.offset + seg.bytes.len() as u32;
            if end > initial {
                initial = end.div_ceil(PAGE_SIZE) * PAGE_SIZE;
            }
        }
        Module {
            sigs: self.sigs,
            funcs: self.funcs,
            exports: self.exports,
            data: self.data,
            elements: self.elements,
            initial_memory: initial,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signatures_are_interned() {
        let mut b = ModuleBuilder::new();
        let a = b.sig(Sig::new(vec![Ty::I32], Some(Ty::I32)));
        let c = b.sig(Sig::new(vec![Ty::I32], Some(Ty::I32)));
        let d = b.sig(Sig::new(vec![Ty::F32], Some(Ty::F32)));
        assert_eq!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn memory_covers_data_segments() {
        let mut b = ModuleBuilder::new();
        b.data(PAGE_SIZE + 10, b"hello");
        let m = b.finish();
        assert_eq!(m.initial_memory, 2 * PAGE_SIZE);
        assert_eq!(m.initial_memory % PAGE_SIZE, 0);
    }
}
