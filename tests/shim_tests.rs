//! Syscall-shim tests: preopen capability checks, descriptor I/O through
//! translated code, stat, locks, and unlink.  Host files live in a
//! tempfile-backed directory per test.

use wasmil::engine::Engine;
use wasmil::memory::value::Value;
use wasmil::module::build::{HostImports, ModuleBuilder};
use wasmil::module::ir::{BinOp, Expr, MemTy, Sig, Stmt, Ty};
use wasmil::shim::{
    FileKind, SyscallShim, ERRNO_BADF, ERRNO_NOTCAPABLE, ERRNO_SUCCESS, F_GETLK, F_SETLK,
    O_CREAT, O_TRUNC,
};

fn c(n: i32) -> Expr {
    Expr::I32Const(n)
}

fn lg(index: usize) -> Expr {
    Expr::LocalGet(index)
}

fn bin(op: BinOp, a: Expr, b: Expr) -> Expr {
    Expr::Binary(op, Box::new(a), Box::new(b))
}

fn set(index: usize, e: Expr) -> Stmt {
    Stmt::LocalSet(index, e)
}

fn ret(e: Expr) -> Stmt {
    Stmt::Return(Some(e))
}

fn load_i32(addr: i32) -> Expr {
    Expr::Load {
        ty: MemTy::I32,
        addr: Box::new(c(addr)),
        offset: 0,
    }
}

fn store_i32(addr: i32, value: Expr) -> Stmt {
    Stmt::Store {
        ty: MemTy::I32,
        addr: c(addr),
        offset: 0,
        value,
    }
}

fn host_call(func: usize, args: Vec<Expr>) -> Expr {
    Expr::Call { func, args }
}

// Layout used by the I/O programs below.
const PATH_AT: i32 = 256;
const PAYLOAD_AT: i32 = 320;
const FD_AT: i32 = 512;
const IOVEC_AT: i32 = 520;
const COUNT_AT: i32 = 528;
const SEEK_AT: i32 = 536;
const READBUF_AT: i32 = 600;

const PATH: &[u8] = b"/tmp/out.txt";
const PAYLOAD: &[u8] = b"hello, world!";

/// Statements for one gather-write or scatter-read call: point the iovec
/// at `buf`, call, and leave errno in local `errno_local`.
fn io_call(
    host_fn: usize,
    fd: Expr,
    buf: i32,
    len: i32,
    errno_local: usize,
) -> Vec<Stmt> {
    vec![
        store_i32(IOVEC_AT, c(buf)),
        store_i32(IOVEC_AT + 4, c(len)),
        set(
            errno_local,
            host_call(host_fn, vec![fd, c(IOVEC_AT), c(1), c(COUNT_AT)]),
        ),
    ]
}

fn build_io_module() -> (wasmil::module::ir::Module, HostImports) {
    let mut b = ModuleBuilder::new();
    let host = b.standard_hostcalls();
    b.data(PATH_AT as u32, PATH);
    b.data(PAYLOAD_AT as u32, PAYLOAD);

    // Create the file, write the payload, rewind, read it back, compare,
    // close.  Returns the byte count read, or a negative step marker.
    let sig = b.sig(Sig::new(vec![], Some(Ty::I32)));
    let mut body = vec![
        set(
            0,
            host_call(
                host.path_open,
                vec![
                    c(PATH_AT),
                    c(PATH.len() as i32),
                    c(O_CREAT | O_TRUNC),
                    c(FD_AT),
                ],
            ),
        ),
        Stmt::If {
            cond: lg(0),
            then_body: vec![ret(c(-1))],
            else_body: vec![],
        },
        set(1, load_i32(FD_AT)),
    ];
    body.extend(io_call(
        host.fd_write,
        lg(1),
        PAYLOAD_AT,
        PAYLOAD.len() as i32,
        0,
    ));
    body.extend(vec![
        Stmt::If {
            cond: bin(
                BinOp::I32Or,
                lg(0),
                bin(BinOp::I32Ne, load_i32(COUNT_AT), c(PAYLOAD.len() as i32)),
            ),
            then_body: vec![ret(c(-2))],
            else_body: vec![],
        },
        set(
            0,
            Expr::Call {
                func: host.fd_seek,
                args: vec![lg(1), Expr::I64Const(0), c(0), c(SEEK_AT)],
            },
        ),
        Stmt::If {
            cond: lg(0),
            then_body: vec![ret(c(-3))],
            else_body: vec![],
        },
    ]);
    body.extend(io_call(
        host.fd_read,
        lg(1),
        READBUF_AT,
        PAYLOAD.len() as i32,
        0,
    ));
    body.extend(vec![
        Stmt::If {
            cond: lg(0),
            then_body: vec![ret(c(-4))],
            else_body: vec![],
        },
        // Byte-compare the payload against the read-back buffer.
        set(2, c(0)),
        Stmt::While {
            cond: bin(BinOp::I32LtS, lg(2), c(PAYLOAD.len() as i32)),
            body: vec![
                Stmt::If {
                    cond: bin(
                        BinOp::I32Ne,
                        Expr::Load {
                            ty: MemTy::U8,
                            addr: Box::new(bin(BinOp::I32Add, c(PAYLOAD_AT), lg(2))),
                            offset: 0,
                        },
                        Expr::Load {
                            ty: MemTy::U8,
                            addr: Box::new(bin(BinOp::I32Add, c(READBUF_AT), lg(2))),
                            offset: 0,
                        },
                    ),
                    then_body: vec![ret(c(-5))],
                    else_body: vec![],
                },
                set(2, bin(BinOp::I32Add, lg(2), c(1))),
            ],
        },
        Stmt::If {
            cond: Expr::Call {
                func: host.fd_close,
                args: vec![lg(1)],
            },
            then_body: vec![ret(c(-6))],
            else_body: vec![],
        },
        ret(load_i32(COUNT_AT)),
    ]);
    let f = b.func("open_write_read", sig, vec![Ty::I32, Ty::I32, Ty::I32], body);
    b.export("run", f);
    (b.finish(), host)
}

#[test]
fn open_write_seek_read_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let (module, _) = build_io_module();
    let mut engine = Engine::new(module).unwrap();
    engine.register_preopen(4, "/tmp/", dir.path());

    assert_eq!(engine.run().unwrap(), PAYLOAD.len() as i32);
    // The host file really exists with the payload in it.
    let on_disk = std::fs::read(dir.path().join("out.txt")).unwrap();
    assert_eq!(on_disk, PAYLOAD);
}

#[test]
fn paths_outside_preopens_get_notcapable() {
    let dir = tempfile::tempdir().unwrap();
    let mut b = ModuleBuilder::new();
    let host = b.standard_hostcalls();
    let path = b"/etc/passwd";
    b.data(PATH_AT as u32, path);
    let sig = b.sig(Sig::new(vec![], Some(Ty::I32)));
    let f = b.func(
        "sneak",
        sig,
        vec![],
        vec![ret(host_call(
            host.path_open,
            vec![c(PATH_AT), c(path.len() as i32), c(0), c(FD_AT)],
        ))],
    );
    b.export("run", f);

    let mut engine = Engine::new(b.finish()).unwrap();
    engine.register_preopen(4, "/tmp/", dir.path());
    assert_eq!(engine.run().unwrap(), ERRNO_NOTCAPABLE);
}

#[test]
fn console_output_is_captured() {
    let mut b = ModuleBuilder::new();
    let host = b.standard_hostcalls();
    b.data(PAYLOAD_AT as u32, b"printed line\n");
    let sig = b.sig(Sig::new(vec![], Some(Ty::I32)));
    let mut body = io_call(host.fd_write, c(1), PAYLOAD_AT, 13, 0);
    body.push(ret(lg(0)));
    let f = b.func("say", sig, vec![Ty::I32], body);
    b.export("run", f);

    let mut engine = Engine::new(b.finish()).unwrap();
    assert_eq!(engine.run().unwrap(), ERRNO_SUCCESS);
    assert_eq!(engine.console().get_output(), "printed line\n");
}

#[test]
fn reads_from_stdout_are_refused() {
    let mut b = ModuleBuilder::new();
    let host = b.standard_hostcalls();
    let sig = b.sig(Sig::new(vec![], Some(Ty::I32)));
    let mut body = io_call(host.fd_read, c(1), READBUF_AT, 8, 0);
    body.push(ret(lg(0)));
    let f = b.func("read_stdout", sig, vec![Ty::I32], body);
    b.export("run", f);

    let mut engine = Engine::new(b.finish()).unwrap();
    assert_eq!(engine.run().unwrap(), ERRNO_BADF);
}

#[test]
fn fstat_reports_size_kind_and_stable_inode() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("stat.bin"), vec![0u8; 123]).unwrap();

    let mut shim = SyscallShim::new();
    shim.register_preopen(4, "/tmp/", dir.path());
    let fd = shim.open("/tmp/stat.bin", 0).unwrap();

    let first = shim.fstat(fd).unwrap();
    assert_eq!(first.kind, FileKind::RegularFile);
    assert_eq!(first.size, 123);
    assert!(first.ino >= 5);

    let second = shim.fstat(fd).unwrap();
    assert_eq!(second.ino, first.ino);

    // The serialized record carries size at offset 32 and filetype at 16.
    let raw = first.to_le_bytes();
    assert_eq!(raw[16], FileKind::RegularFile as u8);
    assert_eq!(u64::from_le_bytes(raw[32..40].try_into().unwrap()), 123);
    shim.close(fd).unwrap();
}

#[test]
fn filestat_is_marshaled_into_memory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("out.txt"), b"abcdef").unwrap();

    let mut b = ModuleBuilder::new();
    let host = b.standard_hostcalls();
    b.data(PATH_AT as u32, PATH);
    let sig = b.sig(Sig::new(vec![], Some(Ty::I32)));
    let stat_at = 700;
    let body = vec![
        set(
            0,
            host_call(
                host.path_open,
                vec![c(PATH_AT), c(PATH.len() as i32), c(0), c(FD_AT)],
            ),
        ),
        Stmt::If {
            cond: lg(0),
            then_body: vec![ret(c(-1))],
            else_body: vec![],
        },
        set(
            0,
            host_call(
                host.fd_filestat_get,
                vec![load_i32(FD_AT), c(stat_at)],
            ),
        ),
        Stmt::If {
            cond: lg(0),
            then_body: vec![ret(c(-2))],
            else_body: vec![],
        },
        // File size lives at offset 32 of the stat record.
        ret(Expr::Load {
            ty: MemTy::I32,
            addr: Box::new(c(stat_at + 32)),
            offset: 0,
        }),
    ];
    let f = b.func("stat_size", sig, vec![Ty::I32], body);
    b.export("run", f);

    let mut engine = Engine::new(b.finish()).unwrap();
    engine.register_preopen(4, "/tmp/", dir.path());
    assert_eq!(engine.run().unwrap(), 6);
}

#[test]
fn preopened_directory_descriptors_are_statable() {
    let dir = tempfile::tempdir().unwrap();
    let mut shim = SyscallShim::new();
    shim.register_preopen(4, "/tmp/", dir.path());

    let stat = shim.fstat(4).unwrap();
    assert_eq!(stat.kind, FileKind::Directory);
    assert!(stat.ino >= 5);
    // The synthetic inode is stable across queries.
    assert_eq!(shim.fstat(4).unwrap().ino, stat.ino);
    let raw = stat.to_le_bytes();
    assert_eq!(raw[16], FileKind::Directory as u8);
    // Descriptors that are neither streams, preopens, nor open files are
    // still refused.
    assert_eq!(shim.fstat(6).unwrap_err().errno(), ERRNO_BADF);
}

#[test]
fn lock_commands_acknowledge_without_host_locks() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("db.lock"), b"").unwrap();

    let mut shim = SyscallShim::new();
    shim.register_preopen(4, "/tmp/", dir.path());
    let fd = shim.open("/tmp/db.lock", 0).unwrap();

    shim.console_mut().write(b"taking lock\n");
    assert_eq!(shim.fcntl(fd, F_SETLK), 0);
    assert_eq!(shim.fcntl(fd, F_GETLK), 0);
    assert_eq!(shim.fcntl(fd, 1234), -1);
    assert_eq!(shim.fcntl(777, F_SETLK), -1);
    // Pending output was flushed before the command was handled.
    assert_eq!(shim.console().get_output(), "taking lock\n");
}

#[test]
fn unlink_removes_the_host_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("gone.txt"), b"x").unwrap();

    let mut shim = SyscallShim::new();
    shim.register_preopen(4, "/tmp/", dir.path());
    shim.unlink("/tmp/gone.txt").unwrap();
    assert!(!dir.path().join("gone.txt").exists());
    // A second unlink reports a host error, not a panic.
    assert!(shim.unlink("/tmp/gone.txt").is_err());
    // Outside every preopen is still refused.
    assert_eq!(
        shim.unlink("/etc/hosts").unwrap_err().errno(),
        ERRNO_NOTCAPABLE
    );
}

#[test]
fn seek_whence_variants() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("seek.bin"), b"0123456789").unwrap();

    let mut shim = SyscallShim::new();
    shim.register_preopen(4, "/tmp/", dir.path());
    let fd = shim.open("/tmp/seek.bin", 0).unwrap();

    use wasmil::shim::Whence;
    assert_eq!(shim.seek(fd, 4, Whence::Start).unwrap(), 4);
    assert_eq!(shim.seek(fd, 2, Whence::Current).unwrap(), 6);
    assert_eq!(shim.seek(fd, -1, Whence::End).unwrap(), 9);
    let mut buf = [0u8; 1];
    assert_eq!(shim.read(fd, &mut buf).unwrap(), 1);
    assert_eq!(&buf, b"9");
}

#[test]
fn descriptors_are_reusable_after_close() {
    let dir = tempfile::tempdir().unwrap();
    let mut shim = SyscallShim::new();
    shim.register_preopen(4, "/tmp/", dir.path());

    let a = shim.open("/tmp/a.txt", O_CREAT).unwrap();
    assert!(a >= 10);
    shim.close(a).unwrap();
    let b = shim.open("/tmp/b.txt", O_CREAT).unwrap();
    // Linear scan hands the lowest free descriptor back out.
    assert_eq!(a, b);
    shim.close(b).unwrap();
    assert!(shim.close(b).is_err());
}
