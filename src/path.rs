//! Path Resolver
//!
//! Turns a hierarchical path string into (containing-directory view, leaf
//! name, does-the-leaf-denote-a-directory) for the directory-capable
//! syscall family.
//!
//! The resolver walks intermediate components itself but always leaves
//! the final component unresolved: `chdir` wants to look it up, `mkdir`
//! wants to create it. Callers own the returned parent view and must
//! close it when done.
//!
//! All calls in here go through the [`Filesystem`] trait; the caller
//! holds the Filesystem Serializer around the whole resolution.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::fs::{DirRef, Filesystem, NAME_MAX};

/// Transient result of resolving one path.
///
/// Lives for the duration of the single syscall that requested it; the
/// caller must close `parent` when done.
#[derive(Debug)]
pub struct DirResolution {
    /// View on the directory containing the leaf.
    pub parent: DirRef,
    /// The final, unresolved component.
    pub leaf: String,
    /// Whether the path's spelling says the leaf is a directory
    /// (trailing slash).
    pub expects_directory: bool,
}

/// Whether the path denotes the filesystem root.
///
/// The root is any non-empty run of slashes; it short-circuits without
/// any component lookup.
pub fn is_root_path(path: &str) -> bool {
    !path.is_empty() && path.bytes().all(|b| b == b'/')
}

/// Resolve `path` down to its containing directory and leaf name.
///
/// Starts from the filesystem root for absolute paths, from `cwd` for
/// relative ones (reopened, so the caller's view is untouched). Fails if
/// any intermediate component is missing or not a directory, if the path
/// is empty or the root, or if the leaf exceeds [`NAME_MAX`] bytes.
pub fn resolve(fs: &mut dyn Filesystem, cwd: DirRef, path: &str) -> Option<DirResolution> {
    if path.is_empty() || is_root_path(path) {
        return None;
    }

    let expects_directory = path.ends_with('/');
    let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
    let (leaf, intermediates) = components.split_last()?;
    if leaf.len() > NAME_MAX {
        return None;
    }

    let mut current = if path.starts_with('/') {
        fs.open_root()
    } else {
        fs.reopen_directory(cwd)
    };

    for component in intermediates {
        match fs.lookup_subdirectory(current, component) {
            Some(next) => {
                fs.close_directory(current);
                current = next;
            }
            None => {
                fs.close_directory(current);
                return None;
            }
        }
    }

    Some(DirResolution {
        parent: current,
        leaf: leaf.to_string(),
        expects_directory,
    })
}
