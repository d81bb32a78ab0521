//! Process Context and Exit/Wait Coordination
//!
//! Per-process state owned by the syscall layer (handle table, current
//! directory, child mailboxes) plus the parent/child exit-code handoff.
//!
//! # Mailbox Protocol
//! One [`ChildMailbox`] exists per parent/child pair, jointly owned via
//! `Arc` until both sides have let go:
//! - the child raises the startup rendezvous exactly once when its
//!   initial load finishes (success or failure); `exec` blocks on it
//! - the child posts its exit code at most once, and only if the parent
//!   has not already torn down (the parent flips `parent_gone` on its
//!   own exit, so nothing is written into a mailbox whose reader is gone)
//! - `wait` claims the mailbox by removing it from the parent's list, so
//!   a second wait on the same pid fails immediately

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use spin::Once;

use crate::fs::{DirRef, Filesystem};
use crate::handle::{HandleObject, HandleTable};

/// Process identifier.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
#[repr(transparent)]
pub struct Pid(u32);

impl Pid {
    /// Wrap a raw process identifier.
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw identifier value.
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pid {}", self.0)
    }
}

/// Outcome of a child's initial program load.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LoadReport {
    /// The program loaded and the child is running.
    Completed,
    /// Loading failed; the child will never run user code.
    Failed,
}

/// One-shot coordination channel between a parent and one child.
pub struct ChildMailbox {
    /// The child's identifier, filled in by the parent after spawn.
    pid: AtomicU32,
    /// Startup rendezvous: raised once when the load outcome is known.
    startup: Once<LoadReport>,
    /// Exit code, written at most once by the child.
    exit: Once<i32>,
    /// Set by the parent when it exits first; the child must not post
    /// into a mailbox whose reader is gone.
    parent_gone: AtomicBool,
}

impl ChildMailbox {
    /// Create an empty mailbox, ready to hand to the spawner.
    pub fn new() -> Self {
        Self {
            pid: AtomicU32::new(0),
            startup: Once::new(),
            exit: Once::new(),
            parent_gone: AtomicBool::new(false),
        }
    }

    /// Record the child's identifier (parent side, after spawn).
    pub fn set_pid(&self, pid: Pid) {
        self.pid.store(pid.as_u32(), Ordering::Release);
    }

    /// The child's identifier.
    pub fn pid(&self) -> Pid {
        Pid::new(self.pid.load(Ordering::Acquire))
    }

    /// Raise the startup rendezvous (child/loader side). Later calls are
    /// ignored; the signal fires exactly once.
    pub fn report_load(&self, report: LoadReport) {
        self.startup.call_once(|| report);
    }

    /// Block until the startup rendezvous has been raised (parent side).
    pub fn wait_startup(&self) -> LoadReport {
        *self.startup.wait()
    }

    /// Post the exit code (child side). Silently dropped if the parent
    /// already tore down, or if a code was already posted.
    pub fn post_exit(&self, code: i32) {
        if !self.parent_gone.load(Ordering::Acquire) {
            self.exit.call_once(|| code);
        }
    }

    /// Block until the child has posted its exit code (parent side).
    pub fn wait_exit(&self) -> i32 {
        *self.exit.wait()
    }

    /// Non-blocking peek at the exit code.
    pub fn try_exit(&self) -> Option<i32> {
        self.exit.get().copied()
    }

    /// Mark the reader as gone (parent side, on parent exit).
    pub fn mark_parent_gone(&self) {
        self.parent_gone.store(true, Ordering::Release);
    }
}

impl Default for ChildMailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ChildMailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ChildMailbox({}, started={}, exit={:?})",
            self.pid(),
            self.startup.is_completed(),
            self.try_exit()
        )
    }
}

/// Capability interface to the process/loader subsystem.
///
/// `spawn` creates the child thread and starts the program load; the
/// loader raises `mailbox`'s startup rendezvous when the outcome is
/// known. Returns `None` if the thread could not be created at all.
pub trait Spawner: Send {
    /// Spawn a child executing `command_line`.
    fn spawn(&mut self, command_line: &str, mailbox: Arc<ChildMailbox>) -> Option<Pid>;
}

/// Per-process state owned by the syscall layer.
///
/// Passed by reference into every handler; there is no process-global
/// mutable state in this crate.
pub struct ProcessContext {
    pid: Pid,
    /// Open file/directory handles.
    pub handles: HandleTable,
    cwd: DirRef,
    children: Vec<Arc<ChildMailbox>>,
    parent: Option<Arc<ChildMailbox>>,
}

impl ProcessContext {
    /// Create the context for a freshly spawned process.
    ///
    /// `cwd` is an already-open view (inherited or the root) now owned by
    /// this context. `parent` links to the mailbox the parent is holding,
    /// or `None` for the initial process.
    pub fn new(pid: Pid, cwd: DirRef, parent: Option<Arc<ChildMailbox>>) -> Self {
        Self {
            pid,
            handles: HandleTable::new(),
            cwd,
            children: Vec::new(),
            parent,
        }
    }

    /// This process's identifier.
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// The current directory view.
    pub fn cwd(&self) -> DirRef {
        self.cwd
    }

    /// Install a new current directory, returning the old view for the
    /// caller to close under the Serializer.
    #[must_use = "the previous view must be closed"]
    pub fn replace_cwd(&mut self, cwd: DirRef) -> DirRef {
        core::mem::replace(&mut self.cwd, cwd)
    }

    /// Adopt a newly spawned child's mailbox.
    pub fn adopt_child(&mut self, mailbox: Arc<ChildMailbox>) {
        self.children.push(mailbox);
    }

    /// Wait for the child `pid` to exit and return its code.
    ///
    /// Returns -1 immediately if `pid` names no live, unclaimed child
    /// (unknown pid, already-waited pid, or the failure sentinel).
    pub fn wait_child(&mut self, pid: u32) -> i32 {
        let index = self
            .children
            .iter()
            .position(|mb| mb.pid().as_u32() == pid);
        match index {
            Some(index) => {
                // Removing the mailbox is the claim: a second wait on the
                // same pid finds nothing.
                let mailbox = self.children.remove(index);
                mailbox.wait_exit()
            }
            None => -1,
        }
    }

    /// Post the exit code toward the parent (if it is still alive) and
    /// tell every child its reader is gone.
    pub fn post_exit(&mut self, code: i32) {
        if let Some(parent) = &self.parent {
            parent.post_exit(code);
        }
        for child in &self.children {
            child.mark_parent_gone();
        }
    }

    /// Release every filesystem resource this context owns: all open
    /// handles and the current directory view.
    ///
    /// Called on the teardown path with the Serializer held by the
    /// caller.
    pub fn release_resources(&mut self, fs: &mut dyn Filesystem) {
        for handle in self.handles.drain() {
            match handle.object() {
                HandleObject::File(file) => fs.close(file),
                HandleObject::Directory(file, dir) => {
                    fs.close_directory(dir);
                    fs.close(file);
                }
            }
        }
        fs.close_directory(self.cwd);
    }
}

impl fmt::Debug for ProcessContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ProcessContext({}, {} handles, {} children)",
            self.pid,
            self.handles.len(),
            self.children.len()
        )
    }
}
