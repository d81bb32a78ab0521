//! Shared mock collaborators for the test suite.
//!
//! - [`MemFs`]: in-memory filesystem with token-based open-object
//!   tracking and instrumentation counters
//! - [`PageMap`]: a fake user address space with per-page mappings and
//!   write protection
//! - [`ScriptedConsole`] / [`ScriptedSpawner`]: canned device and loader
//!   behavior
//! - [`Harness`]: one simulated process, ready to issue syscalls through
//!   the real dispatcher

use alloc::boxed::Box;
use alloc::collections::{BTreeMap, VecDeque};
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use crate::addr::{VirtAddr, PAGE_MASK, PAGE_SIZE};
use crate::console::Console;
use crate::fs::{DirRef, FileRef, Filesystem, FsGate};
use crate::process::{ChildMailbox, LoadReport, Pid, ProcessContext, Spawner};
use crate::syscall::{dispatch, SyscallContext};
use crate::trap::{Disposition, TrapFrame};
use crate::usermem::{Access, UserSpace};

// ---------------------------------------------------------------------
// In-memory filesystem
// ---------------------------------------------------------------------

enum Inode {
    File { data: Vec<u8> },
    Dir { entries: BTreeMap<String, usize> },
}

struct OpenFile {
    inode: usize,
    pos: usize,
}

struct OpenDir {
    inode: usize,
    cursor: usize,
}

/// In-memory filesystem. Inode 0 is the root directory.
pub struct MemFs {
    inodes: Vec<Inode>,
    next_token: u64,
    open_files: BTreeMap<u64, OpenFile>,
    open_dirs: BTreeMap<u64, OpenDir>,
    /// Open file objects plus open directory views, shared with tests.
    pub open_objects: Arc<AtomicUsize>,
    /// Number of subdirectory lookups performed.
    pub lookups: Arc<AtomicUsize>,
}

impl MemFs {
    pub fn new() -> Self {
        Self {
            inodes: vec![Inode::Dir {
                entries: BTreeMap::new(),
            }],
            next_token: 1,
            open_files: BTreeMap::new(),
            open_dirs: BTreeMap::new(),
            open_objects: Arc::new(AtomicUsize::new(0)),
            lookups: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn open_view_count(&self) -> usize {
        self.open_dirs.len()
    }

    /// Seed a directory, creating it under its (existing) parent.
    pub fn seed_dir(&mut self, path: &str) {
        let (parent, leaf) = self.resolve_parent(path).expect("bad seed path");
        let inode = self.inodes.len();
        self.inodes.push(Inode::Dir {
            entries: BTreeMap::new(),
        });
        self.entries_mut(parent).insert(leaf, inode);
    }

    /// Seed a file with contents under its (existing) parent.
    pub fn seed_file(&mut self, path: &str, data: &[u8]) {
        let (parent, leaf) = self.resolve_parent(path).expect("bad seed path");
        let inode = self.inodes.len();
        self.inodes.push(Inode::File {
            data: data.to_vec(),
        });
        self.entries_mut(parent).insert(leaf, inode);
    }

    fn mint(&mut self) -> u64 {
        let token = self.next_token;
        self.next_token += 1;
        token
    }

    fn entries_mut(&mut self, inode: usize) -> &mut BTreeMap<String, usize> {
        match &mut self.inodes[inode] {
            Inode::Dir { entries } => entries,
            Inode::File { .. } => panic!("inode {inode} is not a directory"),
        }
    }

    fn entries(&self, inode: usize) -> Option<&BTreeMap<String, usize>> {
        match &self.inodes[inode] {
            Inode::Dir { entries } => Some(entries),
            Inode::File { .. } => None,
        }
    }

    fn resolve_inode(&self, path: &str) -> Option<usize> {
        let mut at = 0usize;
        for component in path.split('/').filter(|c| !c.is_empty()) {
            at = *self.entries(at)?.get(component)?;
        }
        Some(at)
    }

    /// Split a path into (parent inode, leaf name).
    fn resolve_parent(&self, path: &str) -> Option<(usize, String)> {
        let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
        let (leaf, intermediates) = components.split_last()?;
        let mut at = 0usize;
        for component in intermediates {
            at = *self.entries(at)?.get(*component)?;
        }
        Some((at, leaf.to_string()))
    }

    fn file_inode(&self, token: FileRef) -> usize {
        self.open_files[&token.raw()].inode
    }
}

impl Default for MemFs {
    fn default() -> Self {
        Self::new()
    }
}

impl Filesystem for MemFs {
    fn create(&mut self, path: &str, initial_size: u32) -> bool {
        let Some((parent, leaf)) = self.resolve_parent(path) else {
            return false;
        };
        if self.entries(parent).is_none() || self.entries(parent).unwrap().contains_key(&leaf) {
            return false;
        }
        let inode = self.inodes.len();
        self.inodes.push(Inode::File {
            data: vec![0; initial_size as usize],
        });
        self.entries_mut(parent).insert(leaf, inode);
        true
    }

    fn remove(&mut self, path: &str) -> bool {
        let Some((parent, leaf)) = self.resolve_parent(path) else {
            return false;
        };
        match self.entries(parent) {
            Some(entries) if entries.contains_key(&leaf) => {
                self.entries_mut(parent).remove(&leaf);
                true
            }
            _ => false,
        }
    }

    fn open(&mut self, path: &str) -> Option<FileRef> {
        let inode = self.resolve_inode(path)?;
        let token = self.mint();
        self.open_files.insert(token, OpenFile { inode, pos: 0 });
        self.open_objects.fetch_add(1, Ordering::SeqCst);
        Some(FileRef::new(token))
    }

    fn close(&mut self, file: FileRef) {
        self.open_files.remove(&file.raw()).expect("double close");
        self.open_objects.fetch_sub(1, Ordering::SeqCst);
    }

    fn read(&mut self, file: FileRef, buf: &mut [u8]) -> usize {
        let open = self.open_files.get_mut(&file.raw()).expect("stale token");
        let Inode::File { data } = &self.inodes[open.inode] else {
            return 0;
        };
        let available = data.len().saturating_sub(open.pos);
        let take = buf.len().min(available);
        buf[..take].copy_from_slice(&data[open.pos..open.pos + take]);
        open.pos += take;
        take
    }

    fn write(&mut self, file: FileRef, buf: &[u8]) -> usize {
        let open = self.open_files.get_mut(&file.raw()).expect("stale token");
        let inode = open.inode;
        let pos = open.pos;
        let Inode::File { data } = &mut self.inodes[inode] else {
            return 0;
        };
        if data.len() < pos + buf.len() {
            data.resize(pos + buf.len(), 0);
        }
        data[pos..pos + buf.len()].copy_from_slice(buf);
        self.open_files.get_mut(&file.raw()).unwrap().pos += buf.len();
        buf.len()
    }

    fn seek(&mut self, file: FileRef, position: u32) {
        self.open_files.get_mut(&file.raw()).expect("stale token").pos = position as usize;
    }

    fn tell(&mut self, file: FileRef) -> u32 {
        self.open_files[&file.raw()].pos as u32
    }

    fn length(&mut self, file: FileRef) -> u32 {
        match &self.inodes[self.file_inode(file)] {
            Inode::File { data } => data.len() as u32,
            Inode::Dir { entries } => entries.len() as u32,
        }
    }

    fn is_directory(&mut self, file: FileRef) -> bool {
        matches!(self.inodes[self.file_inode(file)], Inode::Dir { .. })
    }

    fn inumber(&mut self, file: FileRef) -> u32 {
        self.file_inode(file) as u32
    }

    fn open_root(&mut self) -> DirRef {
        let token = self.mint();
        self.open_dirs.insert(token, OpenDir { inode: 0, cursor: 0 });
        self.open_objects.fetch_add(1, Ordering::SeqCst);
        DirRef::new(token)
    }

    fn open_directory(&mut self, file: FileRef) -> DirRef {
        let inode = self.file_inode(file);
        assert!(matches!(self.inodes[inode], Inode::Dir { .. }));
        let token = self.mint();
        self.open_dirs.insert(token, OpenDir { inode, cursor: 0 });
        self.open_objects.fetch_add(1, Ordering::SeqCst);
        DirRef::new(token)
    }

    fn reopen_directory(&mut self, dir: DirRef) -> DirRef {
        let inode = self.open_dirs[&dir.raw()].inode;
        let token = self.mint();
        self.open_dirs.insert(token, OpenDir { inode, cursor: 0 });
        self.open_objects.fetch_add(1, Ordering::SeqCst);
        DirRef::new(token)
    }

    fn close_directory(&mut self, dir: DirRef) {
        self.open_dirs.remove(&dir.raw()).expect("double dir close");
        self.open_objects.fetch_sub(1, Ordering::SeqCst);
    }

    fn lookup_subdirectory(&mut self, dir: DirRef, name: &str) -> Option<DirRef> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let inode = self.open_dirs[&dir.raw()].inode;
        let child = *self.entries(inode)?.get(name)?;
        if !matches!(self.inodes[child], Inode::Dir { .. }) {
            return None;
        }
        let token = self.mint();
        self.open_dirs.insert(
            token,
            OpenDir {
                inode: child,
                cursor: 0,
            },
        );
        self.open_objects.fetch_add(1, Ordering::SeqCst);
        Some(DirRef::new(token))
    }

    fn create_subdirectory(&mut self, dir: DirRef, name: &str) -> bool {
        let inode = self.open_dirs[&dir.raw()].inode;
        match self.entries(inode) {
            Some(entries) if !entries.contains_key(name) => {
                let child = self.inodes.len();
                self.inodes.push(Inode::Dir {
                    entries: BTreeMap::new(),
                });
                self.entries_mut(inode).insert(name.to_string(), child);
                true
            }
            _ => false,
        }
    }

    fn read_entry(&mut self, dir: DirRef) -> Option<String> {
        let open = self.open_dirs.get_mut(&dir.raw()).expect("stale token");
        let inode = open.inode;
        let cursor = open.cursor;
        let Inode::Dir { entries } = &self.inodes[inode] else {
            return None;
        };
        let name = entries.keys().nth(cursor)?.clone();
        self.open_dirs.get_mut(&dir.raw()).unwrap().cursor += 1;
        Some(name)
    }
}

// ---------------------------------------------------------------------
// Fake user address space
// ---------------------------------------------------------------------

struct UserPage {
    bytes: Vec<u8>,
    writable: bool,
}

/// A fake user address space: a sparse set of 4 KiB pages with per-page
/// write protection.
pub struct PageMap {
    pages: BTreeMap<usize, UserPage>,
}

impl PageMap {
    pub fn new() -> Self {
        Self {
            pages: BTreeMap::new(),
        }
    }

    /// Map a zeroed page containing `addr`.
    pub fn map_page(&mut self, addr: VirtAddr, writable: bool) {
        self.pages.insert(
            addr.page_base().as_usize(),
            UserPage {
                bytes: vec![0; PAGE_SIZE],
                writable,
            },
        );
    }

    /// Map every page covering `[addr, addr + len)` that is not mapped
    /// yet.
    pub fn map_span(&mut self, addr: VirtAddr, len: usize, writable: bool) {
        let mut page = addr.page_base().as_usize();
        let end = addr.as_usize() + len.max(1) - 1;
        while page <= end {
            self.pages.entry(page).or_insert_with(|| UserPage {
                bytes: vec![0; PAGE_SIZE],
                writable,
            });
            page += PAGE_SIZE;
        }
    }

    /// Write bytes directly into mapped pages, ignoring write protection
    /// (test setup only).
    pub fn poke(&mut self, addr: VirtAddr, data: &[u8]) {
        for (offset, byte) in data.iter().enumerate() {
            let at = addr.as_usize() + offset;
            let page = self
                .pages
                .get_mut(&(at & !PAGE_MASK))
                .expect("poke into unmapped page");
            page.bytes[at & PAGE_MASK] = *byte;
        }
    }

    pub fn poke_str(&mut self, addr: VirtAddr, s: &str) {
        self.poke(addr, s.as_bytes());
        self.poke(VirtAddr::new(addr.as_usize() + s.len()), &[0]);
    }

    pub fn poke_words(&mut self, addr: VirtAddr, words: &[u32]) {
        for (index, word) in words.iter().enumerate() {
            self.poke(
                VirtAddr::new(addr.as_usize() + index * 4),
                &word.to_le_bytes(),
            );
        }
    }

    /// Read bytes back out of mapped pages (test assertions only).
    pub fn peek(&self, addr: VirtAddr, len: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(len);
        for offset in 0..len {
            let at = addr.as_usize() + offset;
            let page = self.pages.get(&(at & !PAGE_MASK)).expect("peek unmapped");
            out.push(page.bytes[at & PAGE_MASK]);
        }
        out
    }
}

impl Default for PageMap {
    fn default() -> Self {
        Self::new()
    }
}

impl UserSpace for PageMap {
    fn is_mapped(&self, page: VirtAddr, access: Access) -> bool {
        match self.pages.get(&page.page_base().as_usize()) {
            Some(page) => page.writable || !access.needs_write(),
            None => false,
        }
    }

    fn read(&self, addr: VirtAddr, out: &mut [u8]) -> bool {
        for (offset, slot) in out.iter_mut().enumerate() {
            let at = addr.as_usize() + offset;
            match self.pages.get(&(at & !PAGE_MASK)) {
                Some(page) => *slot = page.bytes[at & PAGE_MASK],
                None => return false,
            }
        }
        true
    }

    fn write(&mut self, addr: VirtAddr, data: &[u8]) -> bool {
        for (offset, byte) in data.iter().enumerate() {
            let at = addr.as_usize() + offset;
            match self.pages.get_mut(&(at & !PAGE_MASK)) {
                Some(page) if page.writable => page.bytes[at & PAGE_MASK] = *byte,
                _ => return false,
            }
        }
        true
    }
}

// ---------------------------------------------------------------------
// Scripted console and spawner
// ---------------------------------------------------------------------

/// Console with canned input and captured output.
pub struct ScriptedConsole {
    pub input: VecDeque<u8>,
    pub output: Vec<u8>,
}

impl ScriptedConsole {
    pub fn new() -> Self {
        Self {
            input: VecDeque::new(),
            output: Vec::new(),
        }
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.input.extend(bytes.iter().copied());
    }
}

impl Default for ScriptedConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl Console for ScriptedConsole {
    fn read_byte(&mut self) -> u8 {
        self.input.pop_front().expect("console input exhausted")
    }

    fn write_bytes(&mut self, buf: &[u8]) {
        self.output.extend_from_slice(buf);
    }
}

/// What the scripted loader should do on the next spawn.
#[derive(Clone, Copy)]
pub enum SpawnPlan {
    /// Thread creation itself fails.
    Refuse,
    /// The child starts but its load fails; it exits with -1.
    FailLoad { pid: u32 },
    /// The child loads and exits immediately with `exit_code`.
    Complete { pid: u32, exit_code: i32 },
    /// The child loads now but exits from a background thread after
    /// `delay_ms` - exercises the blocking wait path.
    Deferred {
        pid: u32,
        exit_code: i32,
        delay_ms: u64,
    },
}

pub struct ScriptedSpawner {
    pub plan: SpawnPlan,
    pub commands: Vec<String>,
}

impl ScriptedSpawner {
    pub fn new() -> Self {
        Self {
            plan: SpawnPlan::Refuse,
            commands: Vec::new(),
        }
    }
}

impl Default for ScriptedSpawner {
    fn default() -> Self {
        Self::new()
    }
}

impl Spawner for ScriptedSpawner {
    fn spawn(&mut self, command_line: &str, mailbox: Arc<ChildMailbox>) -> Option<Pid> {
        self.commands.push(command_line.to_string());
        match self.plan {
            SpawnPlan::Refuse => None,
            SpawnPlan::FailLoad { pid } => {
                mailbox.report_load(LoadReport::Failed);
                mailbox.post_exit(-1);
                Some(Pid::new(pid))
            }
            SpawnPlan::Complete { pid, exit_code } => {
                mailbox.report_load(LoadReport::Completed);
                mailbox.post_exit(exit_code);
                Some(Pid::new(pid))
            }
            SpawnPlan::Deferred {
                pid,
                exit_code,
                delay_ms,
            } => {
                mailbox.report_load(LoadReport::Completed);
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(delay_ms));
                    mailbox.post_exit(exit_code);
                });
                Some(Pid::new(pid))
            }
        }
    }
}

// ---------------------------------------------------------------------
// Harness: one simulated process
// ---------------------------------------------------------------------

/// Where the harness builds the syscall argument region.
pub const STACK_TOP: usize = 0x0810_0000;
/// Scratch area for strings and buffers.
pub const SCRATCH: usize = 0x0804_8000;

/// One simulated process wired to the real dispatcher.
pub struct Harness {
    pub fs: Arc<FsGate>,
    pub user: PageMap,
    pub console: ScriptedConsole,
    pub spawner: ScriptedSpawner,
    pub process: ProcessContext,
    /// The mailbox a (simulated) parent holds for this process.
    pub parent_box: Arc<ChildMailbox>,
    pub open_objects: Arc<AtomicUsize>,
    pub lookups: Arc<AtomicUsize>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_fs(MemFs::new())
    }

    pub fn with_fs(fs: MemFs) -> Self {
        let open_objects = fs.open_objects.clone();
        let lookups = fs.lookups.clone();
        let gate = Arc::new(FsGate::new(Box::new(fs)));
        Self::attach(gate, open_objects, lookups, 1)
    }

    /// A second process sharing this harness's filesystem.
    pub fn sibling(&self, pid: u32) -> Self {
        Self::attach(
            self.fs.clone(),
            self.open_objects.clone(),
            self.lookups.clone(),
            pid,
        )
    }

    fn attach(
        gate: Arc<FsGate>,
        open_objects: Arc<AtomicUsize>,
        lookups: Arc<AtomicUsize>,
        pid: u32,
    ) -> Self {
        let parent_box = Arc::new(ChildMailbox::new());
        parent_box.set_pid(Pid::new(pid));
        let cwd = gate.lock().open_root();
        let process = ProcessContext::new(Pid::new(pid), cwd, Some(parent_box.clone()));
        let mut user = PageMap::new();
        user.map_page(VirtAddr::new(STACK_TOP), true);
        Self {
            fs: gate,
            user,
            console: ScriptedConsole::new(),
            spawner: ScriptedSpawner::new(),
            process,
            parent_box,
            open_objects,
            lookups,
        }
    }

    /// Issue a syscall through the real dispatcher.
    pub fn syscall(&mut self, number: u32, args: &[u32]) -> (Disposition, u32) {
        let mut words = vec![number];
        words.extend_from_slice(args);
        self.user.poke_words(VirtAddr::new(STACK_TOP), &words);
        self.dispatch_frame(STACK_TOP)
    }

    /// Dispatch with an arbitrary (possibly unmapped) argument region.
    pub fn dispatch_frame(&mut self, stack: usize) -> (Disposition, u32) {
        let mut frame = TrapFrame::new(VirtAddr::new(stack));
        let mut env = SyscallContext {
            process: &mut self.process,
            user: &mut self.user,
            console: &mut self.console,
            spawner: &mut self.spawner,
            fs: &self.fs,
        };
        let disposition = dispatch(&mut frame, &mut env);
        (disposition, frame.return_value)
    }

    /// Place a NUL-terminated string in user memory and return its
    /// address as an argument word.
    pub fn put_str(&mut self, offset: usize, s: &str) -> u32 {
        let addr = VirtAddr::new(SCRATCH + offset);
        self.user.map_span(addr, s.len() + 1, true);
        self.user.poke_str(addr, s);
        addr.as_usize() as u32
    }

    /// Map a user buffer and return its address as an argument word.
    pub fn put_buffer(&mut self, offset: usize, data: &[u8], writable: bool) -> u32 {
        let addr = VirtAddr::new(SCRATCH + offset);
        self.user.map_span(addr, data.len().max(1), writable);
        self.user.poke(addr, data);
        addr.as_usize() as u32
    }
}
