//! Syscall Dispatcher and Handlers
//!
//! Decodes the trap frame, validates the argument region, routes to the
//! handler and writes the result back into the frame's return slot.
//!
//! # Dispatch Phases
//! 1. The fixed-size argument region (syscall number word, then as many
//!    argument words as the descriptor table says) is validated with the
//!    buffer validator before anything is decoded.
//! 2. Each handler re-validates its pointer arguments for their actual
//!    role and access mode - only the handler knows whether a word is a
//!    string, a buffer, or plain data.
//!
//! A `Violation` from either phase terminates the calling process with
//! failure code -1; the parent (if waiting) observes it through the
//! mailbox exactly like a voluntary exit.

use alloc::sync::Arc;

use log::{debug, warn};

use crate::addr::VirtAddr;
use crate::console::Console;
use crate::fs::{FileRef, FsGate, NAME_MAX};
use crate::handle::{Handle, HandleObject, STDIN_FILENO, STDOUT_FILENO};
use crate::path;
use crate::process::{ChildMailbox, LoadReport, ProcessContext, Spawner};
use crate::syscall::number::SyscallNumber;
use crate::syscall::validate::{copy_in_string, validate_buffer};
use crate::syscall::Violation;
use crate::trap::{Disposition, TrapFrame, WORD_SIZE};
use crate::usermem::{Access, UserSpace};

/// Sentinel written to the return slot on soft failures.
const FAILURE: u32 = -1i32 as u32;
/// Exit code for a process terminated over a protocol violation.
const KILLED: i32 = -1;
/// Chunk size for file transfers; the user-supplied length never sizes a
/// kernel allocation.
const TRANSFER_CHUNK: usize = 512;

/// Everything a handler may touch, passed by reference into every call.
///
/// There is no process-global mutable state behind the handlers: the
/// registry travels in `process`, the Filesystem Serializer in `fs`.
pub struct SyscallContext<'a> {
    /// The calling process's registry, current directory and mailboxes.
    pub process: &'a mut ProcessContext,
    /// The caller's address space.
    pub user: &'a mut dyn UserSpace,
    /// Console and input device.
    pub console: &'a mut dyn Console,
    /// Program loader / thread creation.
    pub spawner: &'a mut dyn Spawner,
    /// The Filesystem Serializer.
    pub fs: &'a FsGate,
}

/// What a handler decided, before it is applied to the trap frame.
enum Control {
    /// Write this value to the return slot and resume.
    Value(u32),
    /// Resume without touching the return slot.
    Done,
    /// Terminate the calling process with this code.
    Exit(i32),
    /// Power off.
    Halt,
}

type HandlerResult = Result<Control, Violation>;
type Handler = fn(&mut SyscallContext<'_>, [u32; 3]) -> HandlerResult;

/// Dispatch one trapped syscall.
///
/// On a fatal violation the caller's resources (open handles, current
/// directory view) are released, the failure code is posted to any
/// waiting parent, and the glue is told to tear the process down.
pub fn dispatch(frame: &mut TrapFrame, env: &mut SyscallContext<'_>) -> Disposition {
    match run(frame, env) {
        Ok(Control::Value(value)) => {
            frame.return_value = value;
            Disposition::Resume
        }
        Ok(Control::Done) => Disposition::Resume,
        Ok(Control::Exit(code)) => terminate(frame, env, code),
        Ok(Control::Halt) => Disposition::Shutdown,
        Err(violation) => {
            warn!("killing {}: {}", env.process.pid(), violation);
            terminate(frame, env, KILLED)
        }
    }
}

fn run(frame: &mut TrapFrame, env: &mut SyscallContext<'_>) -> HandlerResult {
    // Phase 1: the argument region itself is untrusted user memory.
    if !validate_buffer(env.user, frame.number_slot(), WORD_SIZE, Access::READ) {
        return Err(Violation::UnmappedMemory);
    }
    let number = SyscallNumber::try_from(read_word(env.user, frame.number_slot())?)?;

    let words = number.argument_words();
    let mut args = [0u32; 3];
    if words > 0 {
        let base = frame.argument_base().ok_or(Violation::UnmappedMemory)?;
        if !validate_buffer(env.user, base, words * WORD_SIZE, Access::READ) {
            return Err(Violation::UnmappedMemory);
        }
        for (index, slot) in args.iter_mut().enumerate().take(words) {
            let at = base
                .checked_add(index * WORD_SIZE)
                .ok_or(Violation::UnmappedMemory)?;
            *slot = read_word(env.user, at)?;
        }
    }

    debug!("{}: {:?} {:?}", env.process.pid(), number, &args[..words]);
    handler_for(number)(env, args)
}

/// The teardown path: post the code to the parent, release everything
/// the process owns, report the verdict.
fn terminate(frame: &mut TrapFrame, env: &mut SyscallContext<'_>, code: i32) -> Disposition {
    frame.return_value = code as u32;
    env.process.post_exit(code);
    let mut fs = env.fs.lock();
    env.process.release_resources(&mut **fs);
    Disposition::Terminate(code)
}

fn handler_for(number: SyscallNumber) -> Handler {
    match number {
        SyscallNumber::Halt => sys_halt,
        SyscallNumber::Exit => sys_exit,
        SyscallNumber::Exec => sys_exec,
        SyscallNumber::Wait => sys_wait,
        SyscallNumber::Create => sys_create,
        SyscallNumber::Remove => sys_remove,
        SyscallNumber::Open => sys_open,
        SyscallNumber::Filesize => sys_filesize,
        SyscallNumber::Read => sys_read,
        SyscallNumber::Write => sys_write,
        SyscallNumber::Seek => sys_seek,
        SyscallNumber::Tell => sys_tell,
        SyscallNumber::Close => sys_close,
        SyscallNumber::Chdir => sys_chdir,
        SyscallNumber::Mkdir => sys_mkdir,
        SyscallNumber::Readdir => sys_readdir,
        SyscallNumber::Isdir => sys_isdir,
        SyscallNumber::Inumber => sys_inumber,
    }
}

fn read_word(user: &dyn UserSpace, addr: VirtAddr) -> Result<u32, Violation> {
    let mut bytes = [0u8; WORD_SIZE];
    if !user.read(addr, &mut bytes) {
        return Err(Violation::UnmappedMemory);
    }
    Ok(u32::from_le_bytes(bytes))
}

fn require_file(handle: &Handle) -> Result<FileRef, Violation> {
    match handle.object() {
        HandleObject::File(file) => Ok(file),
        HandleObject::Directory(..) => Err(Violation::WrongObjectKind),
    }
}

fn sys_halt(_env: &mut SyscallContext<'_>, _args: [u32; 3]) -> HandlerResult {
    Ok(Control::Halt)
}

fn sys_exit(_env: &mut SyscallContext<'_>, args: [u32; 3]) -> HandlerResult {
    // Mailbox posting and resource release happen on the shared
    // teardown path in `terminate`.
    Ok(Control::Exit(args[0] as i32))
}

fn sys_exec(env: &mut SyscallContext<'_>, args: [u32; 3]) -> HandlerResult {
    let command = copy_in_string(env.user, VirtAddr::new(args[0] as usize))?;
    let mailbox = Arc::new(ChildMailbox::new());

    // The loader reads the executable, so spawning serializes on the
    // gate - but the gate must be free again before we block on the
    // rendezvous, or the child's own load deadlocks against us.
    let spawned = {
        let gate = env.fs;
        let _guard = gate.lock();
        env.spawner.spawn(&command, mailbox.clone())
    };
    let Some(pid) = spawned else {
        return Ok(Control::Value(FAILURE));
    };
    mailbox.set_pid(pid);
    env.process.adopt_child(mailbox.clone());

    match mailbox.wait_startup() {
        LoadReport::Completed => Ok(Control::Value(pid.as_u32())),
        // Report the sentinel instead of the pid so a subsequent wait
        // fails immediately rather than blocking on a process that never
        // truly started.
        LoadReport::Failed => Ok(Control::Value(FAILURE)),
    }
}

fn sys_wait(env: &mut SyscallContext<'_>, args: [u32; 3]) -> HandlerResult {
    Ok(Control::Value(env.process.wait_child(args[0]) as u32))
}

fn sys_create(env: &mut SyscallContext<'_>, args: [u32; 3]) -> HandlerResult {
    let name = copy_in_string(env.user, VirtAddr::new(args[0] as usize))?;
    let created = env.fs.lock().create(&name, args[1]);
    Ok(Control::Value(created as u32))
}

fn sys_remove(env: &mut SyscallContext<'_>, args: [u32; 3]) -> HandlerResult {
    let name = copy_in_string(env.user, VirtAddr::new(args[0] as usize))?;
    let removed = env.fs.lock().remove(&name);
    Ok(Control::Value(removed as u32))
}

fn sys_open(env: &mut SyscallContext<'_>, args: [u32; 3]) -> HandlerResult {
    let name = copy_in_string(env.user, VirtAddr::new(args[0] as usize))?;

    let object = {
        let mut fs = env.fs.lock();
        match fs.open(&name) {
            // Opening a nonexistent file is an expected, recoverable
            // condition - the one soft failure in the descriptor family.
            None => return Ok(Control::Value(FAILURE)),
            Some(file) => {
                if fs.is_directory(file) {
                    let dir = fs.open_directory(file);
                    HandleObject::Directory(file, dir)
                } else {
                    HandleObject::File(file)
                }
            }
        }
    };

    match env.process.handles.insert(object) {
        Ok(descriptor) => Ok(Control::Value(descriptor)),
        Err(error) => {
            warn!("{}: open failed: {}", env.process.pid(), error);
            let mut fs = env.fs.lock();
            match object {
                HandleObject::File(file) => fs.close(file),
                HandleObject::Directory(file, dir) => {
                    fs.close_directory(dir);
                    fs.close(file);
                }
            }
            Ok(Control::Value(FAILURE))
        }
    }
}

fn sys_filesize(env: &mut SyscallContext<'_>, args: [u32; 3]) -> HandlerResult {
    let file = {
        let handle = env
            .process
            .handles
            .get(args[0])
            .map_err(|_| Violation::BadDescriptor)?;
        require_file(handle)?
    };
    Ok(Control::Value(env.fs.lock().length(file)))
}

fn sys_read(env: &mut SyscallContext<'_>, args: [u32; 3]) -> HandlerResult {
    let descriptor = args[0];
    let addr = VirtAddr::new(args[1] as usize);
    let len = args[2] as usize;

    if !validate_buffer(env.user, addr, len, Access::WRITE) {
        return Err(Violation::UnmappedMemory);
    }
    if descriptor == STDOUT_FILENO {
        return Err(Violation::ReservedDescriptorMisuse);
    }
    if descriptor == STDIN_FILENO {
        // Byte-at-a-time from the input device; no filesystem involved.
        for offset in 0..len {
            let byte = env.console.read_byte();
            let at = addr.checked_add(offset).ok_or(Violation::UnmappedMemory)?;
            if !env.user.write(at, &[byte]) {
                return Err(Violation::UnmappedMemory);
            }
        }
        return Ok(Control::Value(len as u32));
    }

    let file = {
        let handle = env
            .process
            .handles
            .get(descriptor)
            .map_err(|_| Violation::BadDescriptor)?;
        require_file(handle)?
    };

    let mut fs = env.fs.lock();
    let mut chunk = [0u8; TRANSFER_CHUNK];
    let mut moved = 0usize;
    while moved < len {
        let take = TRANSFER_CHUNK.min(len - moved);
        let got = fs.read(file, &mut chunk[..take]);
        if got == 0 {
            break;
        }
        let at = addr.checked_add(moved).ok_or(Violation::UnmappedMemory)?;
        if !env.user.write(at, &chunk[..got]) {
            return Err(Violation::UnmappedMemory);
        }
        moved += got;
        if got < take {
            break;
        }
    }
    Ok(Control::Value(moved as u32))
}

fn sys_write(env: &mut SyscallContext<'_>, args: [u32; 3]) -> HandlerResult {
    let descriptor = args[0];
    let addr = VirtAddr::new(args[1] as usize);
    let len = args[2] as usize;

    if !validate_buffer(env.user, addr, len, Access::READ) {
        return Err(Violation::UnmappedMemory);
    }
    if descriptor == STDIN_FILENO {
        return Err(Violation::ReservedDescriptorMisuse);
    }

    let mut chunk = [0u8; TRANSFER_CHUNK];

    if descriptor == STDOUT_FILENO {
        let mut moved = 0usize;
        while moved < len {
            let take = TRANSFER_CHUNK.min(len - moved);
            let at = addr.checked_add(moved).ok_or(Violation::UnmappedMemory)?;
            if !env.user.read(at, &mut chunk[..take]) {
                return Err(Violation::UnmappedMemory);
            }
            env.console.write_bytes(&chunk[..take]);
            moved += take;
        }
        return Ok(Control::Value(len as u32));
    }

    let file = {
        let handle = env
            .process
            .handles
            .get(descriptor)
            .map_err(|_| Violation::BadDescriptor)?;
        require_file(handle)?
    };

    let mut fs = env.fs.lock();
    let mut moved = 0usize;
    while moved < len {
        let take = TRANSFER_CHUNK.min(len - moved);
        let at = addr.checked_add(moved).ok_or(Violation::UnmappedMemory)?;
        if !env.user.read(at, &mut chunk[..take]) {
            return Err(Violation::UnmappedMemory);
        }
        let put = fs.write(file, &chunk[..take]);
        moved += put;
        if put < take {
            break;
        }
    }
    Ok(Control::Value(moved as u32))
}

fn sys_seek(env: &mut SyscallContext<'_>, args: [u32; 3]) -> HandlerResult {
    let file = env
        .process
        .handles
        .get(args[0])
        .map_err(|_| Violation::BadDescriptor)?
        .file();
    env.fs.lock().seek(file, args[1]);
    Ok(Control::Done)
}

fn sys_tell(env: &mut SyscallContext<'_>, args: [u32; 3]) -> HandlerResult {
    let file = {
        let handle = env
            .process
            .handles
            .get(args[0])
            .map_err(|_| Violation::BadDescriptor)?;
        require_file(handle)?
    };
    Ok(Control::Value(env.fs.lock().tell(file)))
}

fn sys_close(env: &mut SyscallContext<'_>, args: [u32; 3]) -> HandlerResult {
    // Closing an invalid descriptor is a protocol violation, not a soft
    // failure.
    let handle = env
        .process
        .handles
        .remove(args[0])
        .map_err(|_| Violation::BadDescriptor)?;
    let mut fs = env.fs.lock();
    match handle.object() {
        HandleObject::File(file) => fs.close(file),
        HandleObject::Directory(file, dir) => {
            fs.close_directory(dir);
            fs.close(file);
        }
    }
    Ok(Control::Done)
}

fn sys_chdir(env: &mut SyscallContext<'_>, args: [u32; 3]) -> HandlerResult {
    let target = copy_in_string(env.user, VirtAddr::new(args[0] as usize))?;
    if target.is_empty() {
        return Ok(Control::Value(0));
    }

    let gate = env.fs;
    let mut fs = gate.lock();

    // The root needs no lookup at all.
    if path::is_root_path(&target) {
        let root = fs.open_root();
        let old = env.process.replace_cwd(root);
        fs.close_directory(old);
        return Ok(Control::Value(1));
    }

    let Some(resolution) = path::resolve(&mut **fs, env.process.cwd(), &target) else {
        return Ok(Control::Value(0));
    };
    let verdict = match fs.lookup_subdirectory(resolution.parent, &resolution.leaf) {
        Some(new_cwd) => {
            let old = env.process.replace_cwd(new_cwd);
            fs.close_directory(old);
            1
        }
        None => 0,
    };
    fs.close_directory(resolution.parent);
    Ok(Control::Value(verdict))
}

fn sys_mkdir(env: &mut SyscallContext<'_>, args: [u32; 3]) -> HandlerResult {
    let target = copy_in_string(env.user, VirtAddr::new(args[0] as usize))?;
    if target.is_empty() || path::is_root_path(&target) {
        return Ok(Control::Value(0));
    }

    let mut fs = env.fs.lock();
    let Some(resolution) = path::resolve(&mut **fs, env.process.cwd(), &target) else {
        return Ok(Control::Value(0));
    };
    let created = fs.create_subdirectory(resolution.parent, &resolution.leaf);
    fs.close_directory(resolution.parent);
    Ok(Control::Value(created as u32))
}

fn sys_readdir(env: &mut SyscallContext<'_>, args: [u32; 3]) -> HandlerResult {
    let descriptor = args[0];
    let addr = VirtAddr::new(args[1] as usize);

    if descriptor == STDIN_FILENO || descriptor == STDOUT_FILENO {
        return Ok(Control::Value(0));
    }
    if !validate_buffer(env.user, addr, NAME_MAX + 1, Access::WRITE) {
        return Err(Violation::UnmappedMemory);
    }
    let Ok(handle) = env.process.handles.get(descriptor) else {
        return Ok(Control::Value(0));
    };
    let Some(dir) = handle.directory() else {
        return Ok(Control::Value(0));
    };

    let entry = env.fs.lock().read_entry(dir);
    match entry {
        Some(name) => {
            let bytes = name.as_bytes();
            let take = bytes.len().min(NAME_MAX);
            let end = addr.checked_add(take).ok_or(Violation::UnmappedMemory)?;
            if !env.user.write(addr, &bytes[..take]) || !env.user.write(end, &[0]) {
                return Err(Violation::UnmappedMemory);
            }
            Ok(Control::Value(1))
        }
        None => Ok(Control::Value(0)),
    }
}

fn sys_isdir(env: &mut SyscallContext<'_>, args: [u32; 3]) -> HandlerResult {
    let descriptor = args[0];
    if descriptor == STDIN_FILENO || descriptor == STDOUT_FILENO {
        return Ok(Control::Value(0));
    }
    let verdict = match env.process.handles.get(descriptor) {
        Ok(handle) => handle.is_directory() as u32,
        Err(_) => 0,
    };
    Ok(Control::Value(verdict))
}

fn sys_inumber(env: &mut SyscallContext<'_>, args: [u32; 3]) -> HandlerResult {
    let descriptor = args[0];
    if descriptor == STDIN_FILENO || descriptor == STDOUT_FILENO {
        return Err(Violation::BadDescriptor);
    }
    let file = match env.process.handles.get(descriptor) {
        Ok(handle) => handle.file(),
        Err(_) => return Ok(Control::Value(FAILURE)),
    };
    Ok(Control::Value(env.fs.lock().inumber(file)))
}
