//! Syscall shim: preopened directories, descriptors, and the console
//!
//! This module is the only place the engine touches the host OS.  Module
//! code never sees host paths or host file handles; it sees small integer
//! descriptors and errno codes:
//! - fds 0/1/2 are the standard streams (stdout and stderr feed the
//!   buffered [`Console`], stdin is not readable)
//! - preopened directory capabilities map path prefixes to host
//!   directories; any path outside every preopen is refused
//! - file descriptors are allocated from a fixed range by linear scan
//!
//! Failures here are errno-style and recoverable: module code receives
//! the code as an ordinary value and branches on it.  Nothing in this
//! module traps.

use rustc_hash::FxHashMap;
use std::fmt;
use std::fs::{File, Metadata, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::time::UNIX_EPOCH;

/// WASI-style errno codes returned to module code
pub const ERRNO_SUCCESS: i32 = 0;
pub const ERRNO_BADF: i32 = 8;
pub const ERRNO_INVAL: i32 = 28;
pub const ERRNO_IO: i32 = 29;
pub const ERRNO_NOENT: i32 = 44;
pub const ERRNO_NOTCAPABLE: i32 = 76;

/// Open flags accepted by [`SyscallShim::open`]
pub const O_CREAT: i32 = 1;
pub const O_DIRECTORY: i32 = 2;
pub const O_EXCL: i32 = 4;
pub const O_TRUNC: i32 = 8;

/// `fcntl` commands the shim acknowledges (advisory locks are a no-op in
/// a single-threaded instance)
pub const F_GETLK: i32 = 5;
pub const F_SETLK: i32 = 6;

/// First fd handed out for opened files; 0..=2 are the standard streams
/// and preopens sit below this.
const FD_SCAN_START: i32 = 10;
const FD_SCAN_END: i32 = 1000;

/// Recoverable shim failures, each with a stable errno projection
#[derive(Debug, Clone)]
pub enum ShimError {
    /// Path resolves outside every preopened directory
    PathNotPermitted { path: String },

    /// Operation on a descriptor that is not open (or not open for it)
    BadDescriptor { fd: i32 },

    /// Descriptor scan range exhausted
    OutOfDescriptors,

    /// Descriptor refers to something the operation cannot apply to
    NotAFile { fd: i32 },

    /// Underlying host I/O failure
    Io { message: String },
}

impl ShimError {
    /// The errno code module code receives for this failure.
    pub fn errno(&self) -> i32 {
        match self {
            ShimError::PathNotPermitted { .. } => ERRNO_NOTCAPABLE,
            ShimError::BadDescriptor { .. } => ERRNO_BADF,
            ShimError::OutOfDescriptors => ERRNO_IO,
            ShimError::NotAFile { .. } => ERRNO_BADF,
            ShimError::Io { message } => {
                if message.contains("No such file") || message.contains("not found") {
                    ERRNO_NOENT
                } else {
                    ERRNO_IO
                }
            }
        }
    }
}

impl fmt::Display for ShimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShimError::PathNotPermitted { path } => {
                write!(f, "Path '{}' is outside every preopened directory", path)
            }
            ShimError::BadDescriptor { fd } => {
                write!(f, "Bad file descriptor {}", fd)
            }
            ShimError::OutOfDescriptors => {
                write!(f, "File descriptor range exhausted")
            }
            ShimError::NotAFile { fd } => {
                write!(f, "Descriptor {} is not a regular file", fd)
            }
            ShimError::Io { message } => {
                write!(f, "I/O error: {}", message)
            }
        }
    }
}

impl std::error::Error for ShimError {}

impl From<std::io::Error> for ShimError {
    fn from(e: std::io::Error) -> Self {
        ShimError::Io {
            message: e.to_string(),
        }
    }
}

/// Buffered text console fed by fds 1 and 2.
///
/// Output accumulates in a pending buffer and moves to the flushed
/// transcript on [`flush`].  The engine flushes before any abort or trap
/// surfaces, so diagnostic text written just before a failure is kept.
///
/// [`flush`]: Console::flush
#[derive(Debug, Default)]
pub struct Console {
    pending: Vec<u8>,
    flushed: Vec<u8>,
}

impl Console {
    pub fn new() -> Self {
        Console::default()
    }

    /// Append bytes to the pending buffer.
    pub fn write(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Move pending output into the transcript.
    pub fn flush(&mut self) {
        self.flushed.append(&mut self.pending);
    }

    /// The flushed transcript as text.  Invalid UTF-8 is replaced rather
    /// than reported, matching console semantics.
    pub fn get_output(&self) -> String {
        String::from_utf8_lossy(&self.flushed).into_owned()
    }

    /// Bytes written but not yet flushed.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// File kind reported by [`SyscallShim::fstat`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Unknown = 0,
    BlockDevice = 1,
    CharDevice = 2,
    Directory = 3,
    RegularFile = 4,
    SymbolicLink = 7,
}

/// Stat record marshaled into linear memory for `fd_filestat_get`
#[derive(Debug, Clone)]
pub struct FileStat {
    pub kind: FileKind,
    pub size: u64,
    pub atim: u64,
    pub mtim: u64,
    pub ctim: u64,
    pub dev: u64,
    pub ino: u64,
    pub nlink: u64,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
}

impl FileStat {
    /// Serialize into the in-memory stat layout (little-endian, 80 bytes:
    /// dev, ino, filetype, nlink, size, atim, mtim, ctim, then mode, uid,
    /// gid).
    pub fn to_le_bytes(&self) -> [u8; 80] {
        let mut out = [0u8; 80];
        out[0..8].copy_from_slice(&self.dev.to_le_bytes());
        out[8..16].copy_from_slice(&self.ino.to_le_bytes());
        out[16] = self.kind as u8;
        out[24..32].copy_from_slice(&self.nlink.to_le_bytes());
        out[32..40].copy_from_slice(&self.size.to_le_bytes());
        out[40..48].copy_from_slice(&self.atim.to_le_bytes());
        out[48..56].copy_from_slice(&self.mtim.to_le_bytes());
        out[56..64].copy_from_slice(&self.ctim.to_le_bytes());
        out[64..68].copy_from_slice(&self.mode.to_le_bytes());
        out[68..72].copy_from_slice(&self.uid.to_le_bytes());
        out[72..76].copy_from_slice(&self.gid.to_le_bytes());
        out
    }
}

/// Seek origin for [`SyscallShim::seek`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Start,
    Current,
    End,
}

impl Whence {
    pub fn from_i32(raw: i32) -> Option<Whence> {
        match raw {
            0 => Some(Whence::Start),
            1 => Some(Whence::Current),
            2 => Some(Whence::End),
            _ => None,
        }
    }
}

/// One preopened directory capability
#[derive(Debug, Clone)]
struct Preopen {
    /// Descriptor the preopened directory itself is visible under.
    fd: i32,
    /// Module-side path prefix, e.g. "/tmp/"
    prefix: String,
    /// Host directory the prefix maps onto
    root: PathBuf,
}

#[derive(Debug)]
struct OpenFile {
    file: File,
    path: String,
}

/// The syscall shim of one module instance
#[derive(Debug)]
pub struct SyscallShim {
    preopens: Vec<Preopen>,
    files: FxHashMap<i32, OpenFile>,
    /// Synthetic inode numbers, stable per module-side path.
    inodes: FxHashMap<String, u64>,
    next_inode: u64,
    console: Console,
}

impl SyscallShim {
    pub fn new() -> Self {
        SyscallShim {
            preopens: Vec::new(),
            files: FxHashMap::default(),
            inodes: FxHashMap::default(),
            next_inode: 5,
            console: Console::new(),
        }
    }

    /// Grant access to a host directory under a module-side prefix.
    pub fn register_preopen(&mut self, fd: i32, prefix: &str, root: impl Into<PathBuf>) {
        self.preopens.push(Preopen {
            fd,
            prefix: prefix.to_string(),
            root: root.into(),
        });
    }

    /// Map a module-side path to a host path via the longest matching
    /// preopen prefix.
    fn resolve(&self, path: &str) -> Result<PathBuf, ShimError> {
        let mut best: Option<(&Preopen, &str)> = None;
        for pre in &self.preopens {
            if let Some(rest) = path.strip_prefix(&pre.prefix) {
                if best.map_or(true, |(b, _)| pre.prefix.len() > b.prefix.len()) {
                    best = Some((pre, rest));
                }
            }
        }
        match best {
            Some((pre, rest)) => Ok(pre.root.join(rest)),
            None => Err(ShimError::PathNotPermitted {
                path: path.to_string(),
            }),
        }
    }

    fn next_fd(&self) -> Result<i32, ShimError> {
        for fd in FD_SCAN_START..FD_SCAN_END {
            if !self.files.contains_key(&fd) {
                return Ok(fd);
            }
        }
        Err(ShimError::OutOfDescriptors)
    }

    /// Synthetic inode for a module-side path, stable across calls.
    fn inode_for(&mut self, path: &str) -> u64 {
        if let Some(ino) = self.inodes.get(path) {
            return *ino;
        }
        let ino = self.next_inode;
        self.next_inode += 1;
        self.inodes.insert(path.to_string(), ino);
        ino
    }

    /// Open a file under a preopen and return its descriptor.
    pub fn open(&mut self, path: &str, flags: i32) -> Result<i32, ShimError> {
        let host = self.resolve(path)?;
        if flags & O_DIRECTORY != 0 {
            if !host.is_dir() {
                return Err(ShimError::Io {
                    message: format!("'{}' is not a directory", path),
                });
            }
            // Directory handles only need to exist for stat; reuse the
            // file table with a read handle.
        }
        let mut opts = OpenOptions::new();
        opts.read(true);
        if flags & O_DIRECTORY == 0 {
            opts.write(true);
        }
        if flags & O_CREAT != 0 {
            if flags & O_EXCL != 0 {
                opts.create_new(true);
            } else {
                opts.create(true);
            }
        }
        if flags & O_TRUNC != 0 {
            opts.truncate(true);
        }
        let file = opts.open(&host)?;
        let fd = self.next_fd()?;
        self.files.insert(
            fd,
            OpenFile {
                file,
                path: path.to_string(),
            },
        );
        Ok(fd)
    }

    /// Write bytes through a descriptor.  fds 1 and 2 feed the console.
    pub fn write(&mut self, fd: i32, bytes: &[u8]) -> Result<usize, ShimError> {
        match fd {
            1 | 2 => {
                self.console.write(bytes);
                Ok(bytes.len())
            }
            0 => Err(ShimError::BadDescriptor { fd }),
            _ => {
                let entry = self
                    .files
                    .get_mut(&fd)
                    .ok_or(ShimError::BadDescriptor { fd })?;
                Ok(entry.file.write(bytes)?)
            }
        }
    }

    /// Read up to `buf.len()` bytes.  The standard streams are not
    /// readable; short reads are legal.
    pub fn read(&mut self, fd: i32, buf: &mut [u8]) -> Result<usize, ShimError> {
        if (0..=2).contains(&fd) {
            return Err(ShimError::BadDescriptor { fd });
        }
        let entry = self
            .files
            .get_mut(&fd)
            .ok_or(ShimError::BadDescriptor { fd })?;
        Ok(entry.file.read(buf)?)
    }

    /// Reposition a descriptor and return the new absolute offset.
    pub fn seek(&mut self, fd: i32, offset: i64, whence: Whence) -> Result<u64, ShimError> {
        if (0..=2).contains(&fd) {
            return Err(ShimError::NotAFile { fd });
        }
        let entry = self
            .files
            .get_mut(&fd)
            .ok_or(ShimError::BadDescriptor { fd })?;
        let pos = match whence {
            Whence::Start => SeekFrom::Start(offset as u64),
            Whence::Current => SeekFrom::Current(offset),
            Whence::End => SeekFrom::End(offset),
        };
        Ok(entry.file.seek(pos)?)
    }

    /// Close a descriptor.  The standard streams cannot be closed.
    pub fn close(&mut self, fd: i32) -> Result<(), ShimError> {
        if (0..=2).contains(&fd) {
            return Err(ShimError::BadDescriptor { fd });
        }
        self.files
            .remove(&fd)
            .map(|_| ())
            .ok_or(ShimError::BadDescriptor { fd })
    }

    /// Stat an open descriptor.
    pub fn fstat(&mut self, fd: i32) -> Result<FileStat, ShimError> {
        if (0..=2).contains(&fd) {
            return Ok(FileStat {
                kind: FileKind::CharDevice,
                size: 0,
                atim: 0,
                mtim: 0,
                ctim: 0,
                dev: 1,
                ino: fd as u64 + 1,
                nlink: 1,
                mode: 0o666,
                uid: 0,
                gid: 0,
            });
        }
        if let Some(prefix) = self
            .preopens
            .iter()
            .find(|p| p.fd == fd)
            .map(|p| p.prefix.clone())
        {
            let ino = self.inode_for(&prefix);
            return Ok(FileStat {
                kind: FileKind::Directory,
                size: 0,
                atim: 0,
                mtim: 0,
                ctim: 0,
                dev: 1,
                ino,
                nlink: 1,
                mode: 0o555,
                uid: 0,
                gid: 0,
            });
        }
        let path = {
            let entry = self.files.get(&fd).ok_or(ShimError::BadDescriptor { fd })?;
            entry.path.clone()
        };
        let ino = self.inode_for(&path);
        let entry = self.files.get(&fd).ok_or(ShimError::BadDescriptor { fd })?;
        let meta = entry.file.metadata()?;
        Ok(Self::stat_from_metadata(&meta, ino))
    }

    fn stat_from_metadata(meta: &Metadata, ino: u64) -> FileStat {
        fn secs(t: std::io::Result<std::time::SystemTime>) -> u64 {
            t.ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs())
                .unwrap_or(0)
        }
        let kind = if meta.is_dir() {
            FileKind::Directory
        } else if meta.is_file() {
            FileKind::RegularFile
        } else {
            FileKind::Unknown
        };
        FileStat {
            kind,
            size: meta.len(),
            atim: secs(meta.accessed()),
            mtim: secs(meta.modified()),
            ctim: secs(meta.created()),
            dev: 1,
            ino,
            nlink: 1,
            mode: if meta.permissions().readonly() {
                0o444
            } else {
                0o666
            },
            uid: 0,
            gid: 0,
        }
    }

    /// Handle an `fcntl` command.  Console output is flushed first so
    /// lock-bracketed diagnostics are visible; lock commands acknowledge
    /// without taking host locks.
    pub fn fcntl(&mut self, fd: i32, cmd: i32) -> i32 {
        self.console.flush();
        if fd != 1 && fd != 2 && !self.files.contains_key(&fd) {
            return -1;
        }
        match cmd {
            F_GETLK | F_SETLK => 0,
            _ => -1,
        }
    }

    /// Remove a file under a preopen.
    pub fn unlink(&mut self, path: &str) -> Result<(), ShimError> {
        let host = self.resolve(path)?;
        std::fs::remove_file(host)?;
        self.inodes.remove(path);
        Ok(())
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    pub fn console_mut(&mut self) -> &mut Console {
        &mut self.console
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_outside_preopens_are_refused() {
        let mut shim = SyscallShim::new();
        shim.register_preopen(4, "/tmp/", "/nonexistent-root");
        assert!(shim.resolve("/tmp/a.txt").is_ok());
        let err = shim.resolve("/etc/passwd").unwrap_err();
        assert_eq!(err.errno(), ERRNO_NOTCAPABLE);
    }

    #[test]
    fn longest_prefix_wins() {
        let mut shim = SyscallShim::new();
        shim.register_preopen(4, "/tmp/", "/host-tmp");
        shim.register_preopen(5, "/tmp/deep/", "/host-deep");
        let host = shim.resolve("/tmp/deep/f").unwrap();
        assert!(host.starts_with("/host-deep"));
    }

    #[test]
    fn console_buffers_until_flush() {
        let mut console = Console::new();
        console.write(b"hello ");
        console.write(b"world");
        assert_eq!(console.get_output(), "");
        console.flush();
        assert_eq!(console.get_output(), "hello world");
        assert_eq!(console.pending_len(), 0);
    }

    #[test]
    fn standard_streams_reject_reads_and_close() {
        let mut shim = SyscallShim::new();
        let mut buf = [0u8; 4];
        assert_eq!(shim.read(1, &mut buf).unwrap_err().errno(), ERRNO_BADF);
        assert!(shim.close(1).is_err());
        assert_eq!(shim.write(1, b"ok").unwrap(), 2);
    }

    #[test]
    fn lock_commands_acknowledge() {
        let mut shim = SyscallShim::new();
        shim.console_mut().write(b"before lock");
        assert_eq!(shim.fcntl(1, F_SETLK), 0);
        assert_eq!(shim.fcntl(1, F_GETLK), 0);
        assert_eq!(shim.fcntl(1, 99), -1);
        assert_eq!(shim.console().get_output(), "before lock");
    }
}
