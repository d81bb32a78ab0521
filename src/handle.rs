//! Handle Registry
//!
//! Per-process table of open file and directory handles, keyed by a
//! process-local descriptor number.
//!
//! # Design
//! - Descriptors 0 and 1 are reserved for standard input/output and never
//!   appear in the table
//! - File descriptors start at 2 and increase monotonically; a descriptor
//!   is never reused after `close`, even across many open/close cycles
//!   (documented behavior, not a defect)
//! - A handle is either a plain file or a directory carrying its
//!   directory view - a tagged variant, so a "directory without a view"
//!   is unrepresentable

use alloc::collections::BTreeMap;
use core::fmt;

use crate::fs::{DirRef, FileRef};

/// Process-scoped descriptor number naming an open handle.
pub type Descriptor = u32;

/// Reserved descriptor: standard input (console, read-only).
pub const STDIN_FILENO: Descriptor = 0;
/// Reserved descriptor: standard output (console, write-only).
pub const STDOUT_FILENO: Descriptor = 1;
/// First descriptor ever issued for a file handle.
pub const FIRST_FILE_DESCRIPTOR: Descriptor = 2;

/// The object an open handle refers to.
///
/// Directory handles always carry their open directory view alongside the
/// file object over the same inode.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum HandleObject {
    /// An ordinary file.
    File(FileRef),
    /// A directory: the file object plus the directory view.
    Directory(FileRef, DirRef),
}

/// A kernel-side record owning the reference(s) to one open object.
#[derive(Debug, PartialEq, Eq)]
pub struct Handle {
    descriptor: Descriptor,
    object: HandleObject,
}

impl Handle {
    /// The descriptor naming this handle.
    #[inline]
    pub fn descriptor(&self) -> Descriptor {
        self.descriptor
    }

    /// The object this handle refers to.
    #[inline]
    pub fn object(&self) -> HandleObject {
        self.object
    }

    /// The underlying file object (present for both variants).
    #[inline]
    pub fn file(&self) -> FileRef {
        match self.object {
            HandleObject::File(f) => f,
            HandleObject::Directory(f, _) => f,
        }
    }

    /// The directory view, if this handle denotes a directory.
    #[inline]
    pub fn directory(&self) -> Option<DirRef> {
        match self.object {
            HandleObject::File(_) => None,
            HandleObject::Directory(_, d) => Some(d),
        }
    }

    /// Whether this handle denotes a directory.
    #[inline]
    pub fn is_directory(&self) -> bool {
        matches!(self.object, HandleObject::Directory(..))
    }
}

/// Error type for registry lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleError {
    /// The descriptor is one of the reserved console descriptors.
    Reserved,
    /// No handle with this descriptor is open.
    NotOpen,
    /// The descriptor space is exhausted for this process.
    Exhausted,
}

impl fmt::Display for HandleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reserved => write!(f, "reserved console descriptor"),
            Self::NotOpen => write!(f, "descriptor is not open"),
            Self::Exhausted => write!(f, "descriptor space exhausted"),
        }
    }
}

/// Per-process registry of open handles.
#[derive(Debug)]
pub struct HandleTable {
    next: Descriptor,
    open: BTreeMap<Descriptor, Handle>,
}

impl HandleTable {
    /// Create an empty table. The first descriptor issued will be 2.
    pub fn new() -> Self {
        Self {
            next: FIRST_FILE_DESCRIPTOR,
            open: BTreeMap::new(),
        }
    }

    /// Insert a newly opened object, assigning the next descriptor.
    ///
    /// Descriptors are never reused; once the counter is spent the
    /// process can open nothing further (see DESIGN.md).
    pub fn insert(&mut self, object: HandleObject) -> Result<Descriptor, HandleError> {
        if self.next == Descriptor::MAX {
            return Err(HandleError::Exhausted);
        }
        let descriptor = self.next;
        self.next += 1;
        self.open.insert(
            descriptor,
            Handle { descriptor, object },
        );
        Ok(descriptor)
    }

    /// Look up an open handle.
    pub fn get(&self, descriptor: Descriptor) -> Result<&Handle, HandleError> {
        if descriptor < FIRST_FILE_DESCRIPTOR {
            return Err(HandleError::Reserved);
        }
        self.open.get(&descriptor).ok_or(HandleError::NotOpen)
    }

    /// Remove a handle, returning ownership of it to the caller.
    pub fn remove(&mut self, descriptor: Descriptor) -> Result<Handle, HandleError> {
        if descriptor < FIRST_FILE_DESCRIPTOR {
            return Err(HandleError::Reserved);
        }
        self.open.remove(&descriptor).ok_or(HandleError::NotOpen)
    }

    /// Drain every open handle, leaving the table empty.
    ///
    /// The descriptor counter is deliberately not reset.
    pub fn drain(&mut self) -> impl Iterator<Item = Handle> {
        core::mem::take(&mut self.open).into_values()
    }

    /// Number of open handles.
    pub fn len(&self) -> usize {
        self.open.len()
    }

    /// Whether no handles are open.
    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}
