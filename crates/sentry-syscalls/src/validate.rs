// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Attribute name and value validation

use std::fmt;

use tracing::debug;

use crate::abi::{XATTR_NAME_MAX, XATTR_SIZE_MAX, XATTR_USER_PREFIX};
use crate::errors::{SyscallError, SyscallResult};
use crate::memory::{GuestAddr, GuestMemory, MemoryError};

/// Attribute name copied from the guest: non-empty and at most
/// `XATTR_NAME_MAX` bytes. The namespace is checked separately.
///
/// Names are kept as the raw bytes the guest passed in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XattrName(Vec<u8>);

impl XattrName {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn in_user_namespace(&self) -> bool {
        self.0.starts_with(XATTR_USER_PREFIX.as_bytes())
    }
}

impl fmt::Display for XattrName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.escape_ascii())
    }
}

/// Copy an attribute name in from the guest.
///
/// Names that are too long or empty are reported as `ERANGE`, as Linux does.
pub fn copy_in_xattr_name<M: GuestMemory>(mem: &M, addr: GuestAddr) -> SyscallResult<XattrName> {
    let name = match mem.copy_in_cstr(addr, XATTR_NAME_MAX + 1) {
        Ok(name) => name,
        Err(MemoryError::NameTooLong { .. }) => {
            debug!(%addr, "xattr name longer than {XATTR_NAME_MAX} bytes");
            return Err(SyscallError::OutOfRange {
                len: XATTR_NAME_MAX + 1,
                limit: XATTR_NAME_MAX,
            });
        }
        Err(err) => return Err(err.into()),
    };
    if name.is_empty() {
        debug!(%addr, "empty xattr name");
        return Err(SyscallError::OutOfRange {
            len: 0,
            limit: XATTR_NAME_MAX,
        });
    }
    Ok(XattrName(name))
}

/// Only the `user.` namespace is supported
pub fn check_namespace(name: &XattrName) -> SyscallResult<()> {
    if name.in_user_namespace() {
        Ok(())
    } else {
        debug!(%name, "unsupported xattr namespace");
        Err(SyscallError::NotSupported {
            name: name.to_string(),
        })
    }
}

/// Reject values larger than `XATTR_SIZE_MAX` before anything is copied
pub fn check_value_size(size: usize) -> SyscallResult<()> {
    if size > XATTR_SIZE_MAX {
        return Err(SyscallError::TooBig { size });
    }
    Ok(())
}

/// Size to ask the backend for. A zero-size query, or a buffer larger than
/// the limit, asks for the limit so the true length can be reported.
pub fn request_size(size: usize, limit: usize) -> usize {
    if size == 0 || size > limit {
        limit
    } else {
        size
    }
}
