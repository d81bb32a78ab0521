//! Syscall Numbers and the Argument-Width Table
//!
//! One row per syscall: its trap number and how many argument words it
//! consumes. This is phase 1 of the two-phase validation - the dispatcher
//! checks exactly this many words of the argument region before any
//! handler runs. What each word *means* (string pointer, buffer pointer,
//! plain word) is phase 2, enforced inside the handler that knows the
//! role.
//!
//! Numbers 13 and 14 are reserved for the unimplemented memory-mapping
//! calls and deliberately absent.

use crate::syscall::Violation;

/// The syscall whitelist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SyscallNumber {
    /// Shut down the machine. Never returns.
    Halt = 0,
    /// Terminate the calling process with a status code. Never returns.
    Exit = 1,
    /// Spawn a child from a command line; returns its pid or -1.
    Exec = 2,
    /// Block until a child exits; returns its status or -1.
    Wait = 3,
    /// Create a file with an initial size; returns a success flag.
    Create = 4,
    /// Remove a file; returns a success flag.
    Remove = 5,
    /// Open a file or directory; returns a descriptor or -1.
    Open = 6,
    /// Byte length of an open file.
    Filesize = 7,
    /// Read into a user buffer; returns bytes read.
    Read = 8,
    /// Write from a user buffer; returns bytes written.
    Write = 9,
    /// Move an open file's cursor.
    Seek = 10,
    /// Current cursor position of an open file.
    Tell = 11,
    /// Close a descriptor.
    Close = 12,
    /// Change the current directory; returns a success flag.
    Chdir = 15,
    /// Create a directory; returns a success flag.
    Mkdir = 16,
    /// Read the next entry name of an open directory.
    Readdir = 17,
    /// Whether a descriptor denotes a directory.
    Isdir = 18,
    /// Inode-like identifier of an open object.
    Inumber = 19,
}

impl SyscallNumber {
    /// How many argument words this syscall consumes (0 to 3).
    pub const fn argument_words(self) -> usize {
        match self {
            Self::Halt => 0,

            Self::Exit
            | Self::Exec
            | Self::Wait
            | Self::Remove
            | Self::Open
            | Self::Filesize
            | Self::Tell
            | Self::Close
            | Self::Chdir
            | Self::Mkdir
            | Self::Isdir
            | Self::Inumber => 1,

            Self::Create | Self::Seek | Self::Readdir => 2,

            Self::Read | Self::Write => 3,
        }
    }
}

impl TryFrom<u32> for SyscallNumber {
    type Error = Violation;

    fn try_from(raw: u32) -> Result<Self, Violation> {
        match raw {
            0 => Ok(Self::Halt),
            1 => Ok(Self::Exit),
            2 => Ok(Self::Exec),
            3 => Ok(Self::Wait),
            4 => Ok(Self::Create),
            5 => Ok(Self::Remove),
            6 => Ok(Self::Open),
            7 => Ok(Self::Filesize),
            8 => Ok(Self::Read),
            9 => Ok(Self::Write),
            10 => Ok(Self::Seek),
            11 => Ok(Self::Tell),
            12 => Ok(Self::Close),
            15 => Ok(Self::Chdir),
            16 => Ok(Self::Mkdir),
            17 => Ok(Self::Readdir),
            18 => Ok(Self::Isdir),
            19 => Ok(Self::Inumber),
            _ => Err(Violation::UnknownSyscall),
        }
    }
}
