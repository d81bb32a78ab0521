//! Filesystem Capability Interface and Serializer
//!
//! The underlying filesystem is an external collaborator and is not
//! internally thread-safe. This module defines:
//! - opaque reference tokens for open files and directory views
//! - the narrow trait the syscall layer calls through
//! - [`FsGate`], the single mutual-exclusion gate serializing every call
//!
//! # Locking Discipline
//! Every handler acquires the gate with [`FsGate::lock`] for the minimum
//! span covering its filesystem calls. The guard is scoped, so release on
//! every exit path - including early failures discovered mid-operation -
//! is structural rather than a per-branch obligation.

use alloc::boxed::Box;
use alloc::string::String;
use core::fmt;

use spin::{Mutex, MutexGuard};

/// Longest directory entry name, in bytes (excluding the terminator).
pub const NAME_MAX: usize = 14;

/// Opaque reference to an open file object.
///
/// A newtype so that arbitrary integers cannot masquerade as open files;
/// only the filesystem mints these, and they are only meaningful to it.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(transparent)]
pub struct FileRef(u64);

impl FileRef {
    /// Wrap a raw token issued by the filesystem.
    #[inline]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw token value.
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file#{}", self.0)
    }
}

/// Opaque reference to an open directory view.
///
/// A directory view carries its own read cursor (for `readdir`) and is
/// opened and closed independently of any file object over the same
/// inode.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(transparent)]
pub struct DirRef(u64);

impl DirRef {
    /// Wrap a raw token issued by the filesystem.
    #[inline]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw token value.
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DirRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dir#{}", self.0)
    }
}

/// Capability interface to the underlying filesystem.
///
/// Not internally thread-safe: every call must happen under [`FsGate`].
/// The trait is object-safe so the kernel can hand the core a boxed
/// implementation at boot.
pub trait Filesystem: Send {
    /// Create a file of `initial_size` zero bytes. `false` on collision
    /// or resolution failure.
    fn create(&mut self, path: &str, initial_size: u32) -> bool;

    /// Remove a file or empty directory. `false` if absent.
    fn remove(&mut self, path: &str) -> bool;

    /// Open a file object over the named inode (file *or* directory).
    fn open(&mut self, path: &str) -> Option<FileRef>;

    /// Release an open file object.
    fn close(&mut self, file: FileRef);

    /// Read from the file's cursor. Returns bytes read (0 at EOF).
    fn read(&mut self, file: FileRef, buf: &mut [u8]) -> usize;

    /// Write at the file's cursor. Returns bytes written.
    fn write(&mut self, file: FileRef, buf: &[u8]) -> usize;

    /// Move the file's cursor to an absolute position.
    fn seek(&mut self, file: FileRef, position: u32);

    /// Current cursor position.
    fn tell(&mut self, file: FileRef) -> u32;

    /// File length in bytes.
    fn length(&mut self, file: FileRef) -> u32;

    /// Whether the underlying inode is a directory.
    fn is_directory(&mut self, file: FileRef) -> bool;

    /// Unique inode-like identifier of the underlying object.
    fn inumber(&mut self, file: FileRef) -> u32;

    /// Open a view on the filesystem root.
    fn open_root(&mut self) -> DirRef;

    /// Open a directory view over the same inode as an open file object.
    /// The file must denote a directory.
    fn open_directory(&mut self, file: FileRef) -> DirRef;

    /// Open an independent view (fresh cursor) over the same directory.
    fn reopen_directory(&mut self, dir: DirRef) -> DirRef;

    /// Release a directory view.
    fn close_directory(&mut self, dir: DirRef);

    /// Look up `name` in `dir`; succeeds only for subdirectories.
    fn lookup_subdirectory(&mut self, dir: DirRef, name: &str) -> Option<DirRef>;

    /// Create a subdirectory `name` in `dir`. `false` on collision.
    fn create_subdirectory(&mut self, dir: DirRef, name: &str) -> bool;

    /// Read the next entry name from the view's cursor, or `None` when
    /// exhausted. Names are at most [`NAME_MAX`] bytes.
    fn read_entry(&mut self, dir: DirRef) -> Option<String>;
}

/// The Filesystem Serializer: one global, non-reentrant gate around every
/// call into the underlying filesystem.
pub struct FsGate {
    inner: Mutex<Box<dyn Filesystem>>,
}

impl FsGate {
    /// Wrap a filesystem behind the gate.
    pub fn new(fs: Box<dyn Filesystem>) -> Self {
        Self {
            inner: Mutex::new(fs),
        }
    }

    /// Acquire the gate, blocking until it is free.
    ///
    /// The guard releases on drop; do not hold it across a blocking
    /// rendezvous wait.
    pub fn lock(&self) -> MutexGuard<'_, Box<dyn Filesystem>> {
        self.inner.lock()
    }
}
