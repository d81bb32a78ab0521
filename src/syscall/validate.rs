//! User Memory Validator
//!
//! Pure boolean decisions about whether a user-supplied address, buffer
//! span or NUL-terminated string is safe to touch from kernel context.
//!
//! # Security Principles
//! - The single pointer check is the primitive everything composes from
//! - Buffers validate their *last* byte first (catching the off-by-one
//!   class where only the first byte is checked), then every page the
//!   span touches - a buffer may cross mappings with different validity
//! - Strings are scanned byte-by-byte with a hard 4096-byte bound so a
//!   malicious unterminated string cannot pin the kernel
//!
//! A `false` from any of these, observed inside a handler, means the
//! syscall is aborted and the calling process terminated. Validation
//! never continues past the first bad byte.

use alloc::string::String;
use alloc::vec::Vec;

use crate::addr::{VirtAddr, PAGE_MASK, PAGE_SIZE};
use crate::syscall::Violation;
use crate::usermem::{Access, UserSpace};

/// Maximum user string length the kernel will scan, terminator included.
pub const STRING_MAX: usize = 4096;

/// Validate a single user address for the given access mode.
///
/// Fails for the null address, for anything at or above the user/kernel
/// boundary, and for addresses whose page is not currently mapped (or
/// not writable, when writing).
pub fn validate_pointer(user: &dyn UserSpace, addr: VirtAddr, access: Access) -> bool {
    if addr.is_null() || !addr.is_user() {
        return false;
    }
    user.is_mapped(addr, access)
}

/// Validate every byte of a user buffer span.
///
/// The last byte is checked first, then each page the span touches. A
/// zero-length span is trivially valid - nothing will be dereferenced.
pub fn validate_buffer(user: &dyn UserSpace, addr: VirtAddr, len: usize, access: Access) -> bool {
    if len == 0 {
        return true;
    }
    let Some(last) = addr.checked_add(len - 1) else {
        return false;
    };
    if !validate_pointer(user, last, access) {
        return false;
    }
    let mut at = addr;
    while at <= last {
        if !validate_pointer(user, at, access) {
            return false;
        }
        // Step to the next page boundary.
        match at.page_base().checked_add(PAGE_SIZE) {
            Some(next) => at = next,
            None => break,
        }
    }
    true
}

/// Validate a NUL-terminated user string.
///
/// Scans byte-by-byte from `addr`, re-validating at every page boundary
/// crossed, and fails if no terminator appears within [`STRING_MAX`]
/// bytes.
pub fn validate_string(user: &dyn UserSpace, addr: VirtAddr) -> bool {
    scan_string(user, addr, None).is_ok()
}

/// Validate a user string and copy it into kernel space in one pass.
///
/// Copying immediately after validation keeps the window for the user
/// rewriting the bytes as small as the original hardware design allows.
pub fn copy_in_string(user: &dyn UserSpace, addr: VirtAddr) -> Result<String, Violation> {
    let mut bytes = Vec::new();
    scan_string(user, addr, Some(&mut bytes))?;
    String::from_utf8(bytes).map_err(|_| Violation::MalformedString)
}

fn scan_string(
    user: &dyn UserSpace,
    addr: VirtAddr,
    mut collect: Option<&mut Vec<u8>>,
) -> Result<(), Violation> {
    if !validate_pointer(user, addr, Access::READ) {
        return Err(Violation::UnmappedMemory);
    }
    let mut at = addr;
    for _ in 0..STRING_MAX {
        let mut byte = [0u8; 1];
        if !user.read(at, &mut byte) {
            return Err(Violation::UnmappedMemory);
        }
        if byte[0] == 0 {
            return Ok(());
        }
        if let Some(out) = collect.as_deref_mut() {
            out.push(byte[0]);
        }
        at = at.checked_add(1).ok_or(Violation::UnmappedMemory)?;
        if at.as_usize() & PAGE_MASK == 0 && !validate_pointer(user, at, Access::READ) {
            return Err(Violation::UnmappedMemory);
        }
    }
    Err(Violation::UnterminatedString)
}
