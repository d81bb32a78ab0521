//! System Call Interface
//!
//! The dispatcher and its handlers, the per-syscall descriptor table, and
//! the user-memory validator.
//!
//! # Two Error Tiers
//! - **Fatal** ([`Violation`], flowing as `Err`): unvalidated memory, an
//!   unknown syscall number, a descriptor absent from the registry. The
//!   offending process is terminated with -1; the kernel itself never
//!   halts or panics on user error.
//! - **Soft**: expected failures (file not found on `open`, a name
//!   collision on `create`, ...) travel as sentinel values through the
//!   ordinary return channel and the process keeps running.

pub mod handler;
pub mod number;
pub mod validate;

use core::fmt;

pub use handler::{dispatch, SyscallContext};
pub use number::SyscallNumber;

/// A fatal protocol violation by the calling process.
///
/// Producing one of these terminates the caller; it is never an error of
/// the kernel itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    /// A pointer, buffer or argument region failed memory validation.
    UnmappedMemory,
    /// A string argument had no terminator within the scan bound.
    UnterminatedString,
    /// A string argument was not valid UTF-8.
    MalformedString,
    /// The trapped syscall number is not in the descriptor table.
    UnknownSyscall,
    /// A descriptor operation named a descriptor absent from the
    /// registry (or a reserved console descriptor).
    BadDescriptor,
    /// A file operation named a directory handle, or vice versa.
    WrongObjectKind,
    /// Read on stdout, or write on stdin.
    ReservedDescriptorMisuse,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnmappedMemory => write!(f, "unmapped or foreign user memory"),
            Self::UnterminatedString => write!(f, "unterminated user string"),
            Self::MalformedString => write!(f, "malformed user string"),
            Self::UnknownSyscall => write!(f, "unknown syscall number"),
            Self::BadDescriptor => write!(f, "descriptor not open"),
            Self::WrongObjectKind => write!(f, "wrong object kind for operation"),
            Self::ReservedDescriptorMisuse => {
                write!(f, "forbidden direction on console descriptor")
            }
        }
    }
}
