// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Path and descriptor resolution for syscall targets

use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;
use std::sync::Arc;

use sentry_vfs::{DirentRef, FsError, OpenFile};
use tracing::debug;

use crate::abi::PATH_MAX;
use crate::errors::{SyscallError, SyscallResult};
use crate::memory::{GuestAddr, GuestMemory, MemoryError};
use crate::task::Task;

/// How a syscall names the object it operates on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum XattrTarget {
    /// A guest path; `follow` selects whether a final symlink is dereferenced
    Path { addr: GuestAddr, follow: bool },
    /// An open descriptor of the calling process
    Descriptor(i32),
}

/// Path copied in from the guest, trailing slashes removed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuestPath {
    pub path: PathBuf,
    /// The original path ended in `/`; the target must be a directory
    pub dir_path: bool,
}

/// Copy a path argument in from the guest. Empty paths are rejected with
/// `ENOENT`.
pub fn copy_in_path<M: GuestMemory>(mem: &M, addr: GuestAddr) -> SyscallResult<GuestPath> {
    let raw = mem.copy_in_cstr(addr, PATH_MAX).map_err(|err| match err {
        MemoryError::NameTooLong { .. } => SyscallError::NameTooLong,
        other => other.into(),
    })?;
    if raw.is_empty() {
        return Err(FsError::NotFound.into());
    }

    let mut path = raw.as_slice();
    let mut dir_path = false;
    while path.len() > 1 && path.ends_with(b"/") {
        path = &path[..path.len() - 1];
        dir_path = true;
    }
    Ok(GuestPath {
        path: PathBuf::from(OsStr::from_bytes(path)),
        dir_path,
    })
}

enum Held {
    Dirent(DirentRef),
    File(Arc<OpenFile>),
}

/// Object a syscall operates on, held for the duration of the call.
///
/// Dropping the target gives back the dirent reference or the borrowed
/// open file.
pub struct ResolvedTarget {
    held: Held,
}

impl ResolvedTarget {
    pub fn dirent(&self) -> &DirentRef {
        match &self.held {
            Held::Dirent(dirent) => dirent,
            Held::File(file) => file.dirent(),
        }
    }
}

/// Resolve `target` for the calling task.
///
/// Path targets ending in `/` must resolve to a directory. Descriptors opened
/// with `O_PATH` only name an object and are refused with `EBADF`.
pub fn resolve_target<M: GuestMemory>(
    task: &Task<'_, M>,
    target: XattrTarget,
) -> SyscallResult<ResolvedTarget> {
    match target {
        XattrTarget::Path { addr, follow } => {
            let guest_path = copy_in_path(task.mem, addr)?;
            let dirent = task.core.resolve(&task.pid, &guest_path.path, follow)?;
            if guest_path.dir_path && !dirent.kind().is_dir() {
                debug!(path = %guest_path.path.display(), "trailing slash on non-directory");
                return Err(SyscallError::NotADirectory {
                    path: guest_path.path,
                });
            }
            Ok(ResolvedTarget {
                held: Held::Dirent(dirent),
            })
        }
        XattrTarget::Descriptor(fd) => {
            let file = task.core.get_file(&task.pid, fd).ok_or(SyscallError::BadFd { fd })?;
            if file.is_path_only() {
                debug!(fd, "O_PATH descriptor used for xattr access");
                return Err(SyscallError::BadFd { fd });
            }
            Ok(ResolvedTarget {
                held: Held::File(file),
            })
        }
    }
}
