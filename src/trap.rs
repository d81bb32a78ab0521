//! Trap Frame and Dispatch Outcome
//!
//! The register/argument snapshot captured when a user process traps into
//! the kernel, and the verdict the dispatcher hands back to the
//! architecture glue.
//!
//! The syscall number and its up-to-three word arguments live in *user
//! memory*, on the caller's stack - the frame only records where. The
//! argument region is untrusted and must pass the Memory Validator
//! before a single word is decoded.

use crate::addr::VirtAddr;

/// Size of one syscall argument word, in bytes.
pub const WORD_SIZE: usize = 4;

/// The trap snapshot for one syscall.
///
/// Consumed and mutated exactly once per syscall: the dispatcher reads
/// the argument region through `user_stack` and writes `return_value`
/// back before the process resumes.
#[derive(Debug, Clone, Copy)]
pub struct TrapFrame {
    /// User stack pointer at trap time. The syscall number is the word
    /// at offset 0; arguments follow at offsets 4, 8 and 12.
    pub user_stack: VirtAddr,
    /// Return-value slot, restored into the caller's return register.
    pub return_value: u32,
}

impl TrapFrame {
    /// Build a frame for a trap taken with the given user stack pointer.
    pub fn new(user_stack: VirtAddr) -> Self {
        Self {
            user_stack,
            return_value: 0,
        }
    }

    /// Address of the syscall number word.
    #[inline]
    pub fn number_slot(&self) -> VirtAddr {
        self.user_stack
    }

    /// Address of the first argument word.
    #[inline]
    pub fn argument_base(&self) -> Option<VirtAddr> {
        self.user_stack.checked_add(WORD_SIZE)
    }
}

/// What the architecture glue must do after a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Resume the calling process; the return slot holds its result.
    Resume,
    /// Tear down the calling process with this exit code. Covers both
    /// the `exit` syscall and fatal protocol violations.
    Terminate(i32),
    /// Power off the machine (`halt`).
    Shutdown,
}
