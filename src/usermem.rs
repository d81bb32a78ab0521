//! User Memory Translation Service
//!
//! Narrow interface to the virtual-memory subsystem: "is this user page
//! currently mapped, and is it writable?", plus raw byte transfer for
//! spans that have already passed validation.
//!
//! The paging machinery itself (page tables, fault handling, frame
//! allocation) lives behind this trait and is not part of this crate.

use bitflags::bitflags;

use crate::addr::VirtAddr;

bitflags! {
    /// Access mode requested for a user-memory span.
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct Access: u8 {
        /// The kernel will read from the span.
        const READ = 1 << 0;
        /// The kernel will write into the span.
        const WRITE = 1 << 1;
    }
}

impl Access {
    /// Whether this access requires a writable mapping.
    #[inline]
    pub fn needs_write(self) -> bool {
        self.contains(Access::WRITE)
    }
}

/// Capability interface to the caller's address space.
///
/// `read`/`write` operate on spans the Memory Validator has already
/// approved; they still report failure (rather than faulting) if a page
/// disappears underneath, and callers treat that as a protocol violation.
pub trait UserSpace: Send {
    /// Check whether the page containing `page` is mapped with the given
    /// access mode. `page` is expected to be any address within the page.
    fn is_mapped(&self, page: VirtAddr, access: Access) -> bool;

    /// Copy bytes out of user memory into `out`.
    ///
    /// Returns `false` if any byte of the span is unmapped.
    fn read(&self, addr: VirtAddr, out: &mut [u8]) -> bool;

    /// Copy bytes from `data` into user memory.
    ///
    /// Returns `false` if any byte of the span is unmapped or not
    /// writable.
    fn write(&mut self, addr: VirtAddr, data: &[u8]) -> bool;
}
