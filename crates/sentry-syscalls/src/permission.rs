// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Access checks for attribute operations

use sentry_vfs::{DirentRef, FsError, PermMask};
use tracing::debug;

use crate::errors::{SyscallError, SyscallResult};
use crate::memory::GuestMemory;
use crate::task::Task;

/// Authorize `mask` against `target` for an attribute operation.
///
/// Objects whose type cannot carry attributes are refused before mode bits
/// are looked at: writes with `EPERM`, reads with `ENODATA`.
pub fn check_xattr_permissions<M: GuestMemory>(
    task: &Task<'_, M>,
    target: &DirentRef,
    mask: PermMask,
) -> SyscallResult<()> {
    if !task.core.supports_xattrs(target) {
        debug!(path = %target.path().display(), kind = ?target.kind(), "object type has no xattrs");
        return Err(if mask.write {
            SyscallError::NotPermitted
        } else {
            SyscallError::NoData
        });
    }

    task.core
        .check_permission(&task.pid, target, mask)
        .map_err(|err| match err {
            FsError::AccessDenied => SyscallError::PermissionDenied,
            other => other.into(),
        })
}
