//! User Virtual Address Type
//!
//! Type-safe wrapper for user-space virtual addresses so that raw syscall
//! argument words cannot be dereferenced without going through validation.
//!
//! # Security Properties
//! - A `VirtAddr` is just a name for an address; it carries no proof of
//!   validity. Only the validator in [`crate::syscall::validate`] decides
//!   whether it may be touched.
//! - Page arithmetic is centralized here so boundary-crossing checks use
//!   one definition of "page".

use core::fmt;

/// Page size (4 KiB)
pub const PAGE_SIZE: usize = 4096;
/// Page offset mask
pub const PAGE_MASK: usize = PAGE_SIZE - 1;
/// Bits to shift for the page number
pub const PAGE_SHIFT: usize = 12;

/// First address above the user-accessible range.
///
/// User mappings live strictly below this; everything at or above it is
/// kernel territory and never valid as a syscall argument.
pub const USER_TOP: usize = 0xC000_0000;

/// A user-space virtual address.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct VirtAddr(usize);

impl VirtAddr {
    /// Create a new virtual address.
    #[inline]
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    /// Get the raw address value.
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0
    }

    /// Check if this is the null address.
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Check if the address lies below the kernel boundary.
    #[inline]
    pub const fn is_user(self) -> bool {
        self.0 < USER_TOP
    }

    /// Align the address down to the containing page boundary.
    #[inline]
    pub const fn page_base(self) -> Self {
        Self(self.0 & !PAGE_MASK)
    }

    /// Get the offset within the containing page.
    #[inline]
    pub const fn page_offset(self) -> usize {
        self.0 & PAGE_MASK
    }

    /// Check if the address sits exactly on a page boundary.
    #[inline]
    pub const fn is_page_boundary(self) -> bool {
        self.page_offset() == 0
    }

    /// Add an offset, failing on address-space wraparound.
    #[inline]
    pub fn checked_add(self, offset: usize) -> Option<Self> {
        self.0.checked_add(offset).map(Self)
    }
}

impl fmt::Debug for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirtAddr({:#010x})", self.0)
    }
}

impl fmt::Display for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}
