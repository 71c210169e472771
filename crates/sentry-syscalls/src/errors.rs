// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Guest-visible syscall errors

use std::path::PathBuf;

use sentry_vfs::FsError;

use crate::memory::{GuestAddr, MemoryError};

/// Failure of a single syscall invocation
#[derive(thiserror::Error, Debug)]
pub enum SyscallError {
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },
    #[error("bad file descriptor {fd}")]
    BadFd { fd: i32 },
    #[error("not a directory: {}", path.display())]
    NotADirectory { path: PathBuf },
    #[error("no attribute data")]
    NoData,
    #[error("operation not supported for attribute {name:?}")]
    NotSupported { name: String },
    #[error("operation not permitted")]
    NotPermitted,
    #[error("permission denied")]
    PermissionDenied,
    #[error("result out of range: {len} bytes, {limit} allowed")]
    OutOfRange { len: usize, limit: usize },
    #[error("argument too large: {size} bytes")]
    TooBig { size: usize },
    #[error("guest memory fault at {addr} (+{len})")]
    Fault { addr: GuestAddr, len: usize },
    #[error("name too long")]
    NameTooLong,
    #[error(transparent)]
    Fs(#[from] FsError),
}

impl SyscallError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        SyscallError::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Linux errno reported to the guest
    pub fn errno(&self) -> i32 {
        match self {
            SyscallError::InvalidArgument { .. } => libc::EINVAL,
            SyscallError::BadFd { .. } => libc::EBADF,
            SyscallError::NotADirectory { .. } => libc::ENOTDIR,
            SyscallError::NoData => libc::ENODATA,
            SyscallError::NotSupported { .. } => libc::EOPNOTSUPP,
            SyscallError::NotPermitted => libc::EPERM,
            SyscallError::PermissionDenied => libc::EACCES,
            SyscallError::OutOfRange { .. } => libc::ERANGE,
            SyscallError::TooBig { .. } => libc::E2BIG,
            SyscallError::Fault { .. } => libc::EFAULT,
            SyscallError::NameTooLong => libc::ENAMETOOLONG,
            SyscallError::Fs(err) => err.errno(),
        }
    }
}

impl From<MemoryError> for SyscallError {
    fn from(err: MemoryError) -> Self {
        match err {
            MemoryError::Fault { addr, len } => SyscallError::Fault { addr, len },
            MemoryError::NameTooLong { .. } => SyscallError::NameTooLong,
        }
    }
}

pub type SyscallResult<T> = Result<T, SyscallError>;

/// Raw return register value: the result, or `-errno` on failure
pub fn into_return_value(result: SyscallResult<usize>) -> i64 {
    match result {
        Ok(value) => value as i64,
        Err(err) => -(err.errno() as i64),
    }
}

/// Symbolic name of an errno, for logs and the CLI
pub fn errno_name(errno: i32) -> &'static str {
    match errno {
        libc::EPERM => "EPERM",
        libc::ENOENT => "ENOENT",
        libc::EIO => "EIO",
        libc::E2BIG => "E2BIG",
        libc::EBADF => "EBADF",
        libc::EACCES => "EACCES",
        libc::EFAULT => "EFAULT",
        libc::EEXIST => "EEXIST",
        libc::ENOTDIR => "ENOTDIR",
        libc::EISDIR => "EISDIR",
        libc::EINVAL => "EINVAL",
        libc::EMFILE => "EMFILE",
        libc::ENOSPC => "ENOSPC",
        libc::ERANGE => "ERANGE",
        libc::ENAMETOOLONG => "ENAMETOOLONG",
        libc::ENOSYS => "ENOSYS",
        libc::ENOTEMPTY => "ENOTEMPTY",
        libc::ELOOP => "ELOOP",
        libc::ENODATA => "ENODATA",
        libc::EOPNOTSUPP => "EOPNOTSUPP",
        _ => "EUNKNOWN",
    }
}
