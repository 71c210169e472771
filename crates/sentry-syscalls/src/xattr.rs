// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Extended attribute syscalls
//!
//! Each family (get, set, list, remove) has one routine parameterized by an
//! [`XattrTarget`]; the path, no-follow path and descriptor entry points are
//! thin wrappers choosing the target.
//!
//! The order of checks inside each routine is guest-visible: the first
//! failing check decides the errno.

use sentry_vfs::PermMask;
use tracing::{trace, warn};

use crate::abi::{XATTR_CREATE, XATTR_LIST_MAX, XATTR_REPLACE, XATTR_SIZE_MAX, XATTR_USER_PREFIX};
use crate::errors::{SyscallError, SyscallResult};
use crate::memory::{GuestAddr, GuestMemory};
use crate::permission::check_xattr_permissions;
use crate::resolve::{resolve_target, XattrTarget};
use crate::task::Task;
use crate::validate::{check_namespace, check_value_size, copy_in_xattr_name, request_size};

/// Shared getxattr routine; returns the value length
pub fn get_xattr<M: GuestMemory>(
    task: &Task<'_, M>,
    target: XattrTarget,
    name_addr: GuestAddr,
    value_addr: GuestAddr,
    size: usize,
) -> SyscallResult<usize> {
    let resolved = resolve_target(task, target)?;
    let dirent = resolved.dirent();

    check_xattr_permissions(task, dirent, PermMask::READ)?;
    let name = copy_in_xattr_name(task.mem, name_addr)?;
    check_namespace(&name)?;

    let requested = request_size(size, XATTR_SIZE_MAX);
    let value = task.core.get_xattr(dirent, name.as_bytes(), requested)?;
    if value.len() > requested {
        if requested == XATTR_SIZE_MAX {
            warn!(
                path = %dirent.path().display(),
                %name,
                len = value.len(),
                requested,
                "backend returned more than the requested size"
            );
        }
        return Err(SyscallError::OutOfRange {
            len: value.len(),
            limit: requested,
        });
    }

    // A zero-size call only reports the length
    if size == 0 {
        return Ok(value.len());
    }
    task.mem.copy_out_bytes(value_addr, &value)?;
    trace!(path = %dirent.path().display(), %name, len = value.len(), "getxattr");
    Ok(value.len())
}

/// Shared setxattr routine
pub fn set_xattr<M: GuestMemory>(
    task: &Task<'_, M>,
    target: XattrTarget,
    name_addr: GuestAddr,
    value_addr: GuestAddr,
    size: usize,
    flags: u32,
) -> SyscallResult<()> {
    let resolved = resolve_target(task, target)?;
    let dirent = resolved.dirent();

    if flags & !(XATTR_CREATE | XATTR_REPLACE) != 0 {
        return Err(SyscallError::invalid(format!("unknown setxattr flags {flags:#x}")));
    }
    check_xattr_permissions(task, dirent, PermMask::WRITE)?;
    let name = copy_in_xattr_name(task.mem, name_addr)?;

    check_value_size(size)?;
    let mut value = vec![0u8; size];
    task.mem.copy_in_bytes(value_addr, &mut value)?;

    // Checked only after the value was copied in
    check_namespace(&name)?;

    task.core.set_xattr(dirent, name.as_bytes(), &value, flags)?;
    trace!(path = %dirent.path().display(), %name, len = size, flags, "setxattr");
    Ok(())
}

/// Shared listxattr routine; returns the size of the name list
pub fn list_xattr<M: GuestMemory>(
    task: &Task<'_, M>,
    target: XattrTarget,
    list_addr: GuestAddr,
    size: usize,
) -> SyscallResult<usize> {
    let resolved = resolve_target(task, target)?;
    let dirent = resolved.dirent();

    // Objects that cannot carry attributes simply have none
    if !task.core.supports_xattrs(dirent) {
        return Ok(0);
    }
    check_xattr_permissions(task, dirent, PermMask::READ)?;

    let requested = request_size(size, XATTR_LIST_MAX);
    let names = task.core.list_xattr(dirent, requested)?;

    let mut list = Vec::new();
    for name in names.iter().filter(|n| n.starts_with(XATTR_USER_PREFIX.as_bytes())) {
        list.extend_from_slice(name);
        list.push(0);
    }

    if list.len() > XATTR_LIST_MAX {
        return Err(SyscallError::TooBig { size: list.len() });
    }
    if list.len() > requested {
        return Err(SyscallError::OutOfRange {
            len: list.len(),
            limit: requested,
        });
    }

    if size == 0 {
        return Ok(list.len());
    }
    task.mem.copy_out_bytes(list_addr, &list)?;
    Ok(list.len())
}

/// Shared removexattr routine
pub fn remove_xattr<M: GuestMemory>(
    task: &Task<'_, M>,
    target: XattrTarget,
    name_addr: GuestAddr,
) -> SyscallResult<()> {
    let resolved = resolve_target(task, target)?;
    let dirent = resolved.dirent();

    let name = copy_in_xattr_name(task.mem, name_addr)?;
    check_xattr_permissions(task, dirent, PermMask::WRITE)?;
    check_namespace(&name)?;

    task.core.remove_xattr(dirent, name.as_bytes())?;
    trace!(path = %dirent.path().display(), %name, "removexattr");
    Ok(())
}

fn path(addr: GuestAddr, follow: bool) -> XattrTarget {
    XattrTarget::Path { addr, follow }
}

pub fn getxattr<M: GuestMemory>(
    task: &Task<'_, M>,
    path_addr: GuestAddr,
    name_addr: GuestAddr,
    value_addr: GuestAddr,
    size: usize,
) -> SyscallResult<usize> {
    get_xattr(task, path(path_addr, true), name_addr, value_addr, size)
}

pub fn lgetxattr<M: GuestMemory>(
    task: &Task<'_, M>,
    path_addr: GuestAddr,
    name_addr: GuestAddr,
    value_addr: GuestAddr,
    size: usize,
) -> SyscallResult<usize> {
    get_xattr(task, path(path_addr, false), name_addr, value_addr, size)
}

pub fn fgetxattr<M: GuestMemory>(
    task: &Task<'_, M>,
    fd: i32,
    name_addr: GuestAddr,
    value_addr: GuestAddr,
    size: usize,
) -> SyscallResult<usize> {
    get_xattr(task, XattrTarget::Descriptor(fd), name_addr, value_addr, size)
}

pub fn setxattr<M: GuestMemory>(
    task: &Task<'_, M>,
    path_addr: GuestAddr,
    name_addr: GuestAddr,
    value_addr: GuestAddr,
    size: usize,
    flags: u32,
) -> SyscallResult<()> {
    set_xattr(task, path(path_addr, true), name_addr, value_addr, size, flags)
}

pub fn lsetxattr<M: GuestMemory>(
    task: &Task<'_, M>,
    path_addr: GuestAddr,
    name_addr: GuestAddr,
    value_addr: GuestAddr,
    size: usize,
    flags: u32,
) -> SyscallResult<()> {
    set_xattr(task, path(path_addr, false), name_addr, value_addr, size, flags)
}

pub fn fsetxattr<M: GuestMemory>(
    task: &Task<'_, M>,
    fd: i32,
    name_addr: GuestAddr,
    value_addr: GuestAddr,
    size: usize,
    flags: u32,
) -> SyscallResult<()> {
    set_xattr(task, XattrTarget::Descriptor(fd), name_addr, value_addr, size, flags)
}

pub fn listxattr<M: GuestMemory>(
    task: &Task<'_, M>,
    path_addr: GuestAddr,
    list_addr: GuestAddr,
    size: usize,
) -> SyscallResult<usize> {
    list_xattr(task, path(path_addr, true), list_addr, size)
}

pub fn llistxattr<M: GuestMemory>(
    task: &Task<'_, M>,
    path_addr: GuestAddr,
    list_addr: GuestAddr,
    size: usize,
) -> SyscallResult<usize> {
    list_xattr(task, path(path_addr, false), list_addr, size)
}

pub fn flistxattr<M: GuestMemory>(
    task: &Task<'_, M>,
    fd: i32,
    list_addr: GuestAddr,
    size: usize,
) -> SyscallResult<usize> {
    list_xattr(task, XattrTarget::Descriptor(fd), list_addr, size)
}

pub fn removexattr<M: GuestMemory>(
    task: &Task<'_, M>,
    path_addr: GuestAddr,
    name_addr: GuestAddr,
) -> SyscallResult<()> {
    remove_xattr(task, path(path_addr, true), name_addr)
}

pub fn lremovexattr<M: GuestMemory>(
    task: &Task<'_, M>,
    path_addr: GuestAddr,
    name_addr: GuestAddr,
) -> SyscallResult<()> {
    remove_xattr(task, path(path_addr, false), name_addr)
}

pub fn fremovexattr<M: GuestMemory>(
    task: &Task<'_, M>,
    fd: i32,
    name_addr: GuestAddr,
) -> SyscallResult<()> {
    remove_xattr(task, XattrTarget::Descriptor(fd), name_addr)
}
