//! Margay - Syscall Trampoline Core
//!
//! The trust-boundary layer of the Margay teaching kernel: receives a raw
//! trap from an unprivileged user process, validates every process-supplied
//! pointer, string and buffer, dispatches to the correct kernel operation,
//! manages the per-process table of open file and directory handles, and
//! reports results (or tears the process down) across the boundary.
//!
//! # Security Model
//! - Whitelist approach: only syscall numbers in the descriptor table are
//!   dispatched; everything else terminates the caller
//! - Two-phase validation: the fixed-size argument region is checked before
//!   decoding, then each handler re-validates every pointer argument for
//!   its actual role and access mode
//! - Fail-secure: an unvalidated memory access is never "handled softly" -
//!   the offending process is terminated, the kernel itself never panics
//!   on user error
//!
//! # Collaborators
//! The surrounding kernel is consumed through narrow capability traits:
//! - [`fs::Filesystem`] - the (not thread-safe) filesystem, serialized
//!   behind [`fs::FsGate`]
//! - [`usermem::UserSpace`] - "is this user address mapped, and writable?"
//!   plus raw byte transfer for validated spans
//! - [`console::Console`] - descriptor 0 input and descriptor 1 output
//! - [`process::Spawner`] - program loading and thread creation
//!
//! Scheduling, paging internals, ELF loading and on-disk layout live behind
//! those traits and are out of scope here.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

pub mod addr;
pub mod console;
pub mod fs;
pub mod handle;
pub mod path;
pub mod process;
pub mod syscall;
pub mod trap;
pub mod usermem;

#[cfg(test)]
pub(crate) mod testing;

pub use syscall::{dispatch, SyscallContext, Violation};
pub use trap::{Disposition, TrapFrame};
