// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for the sentry VFS

use std::io;

/// Core filesystem error type
#[derive(thiserror::Error, Debug)]
pub enum FsError {
    #[error("not found")]
    NotFound,
    #[error("already exists")]
    AlreadyExists,
    #[error("access denied")]
    AccessDenied,
    #[error("operation not permitted")]
    NotPermitted,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("not a directory")]
    NotADirectory,
    #[error("is a directory")]
    IsADirectory,
    #[error("directory not empty")]
    NotEmpty,
    #[error("bad file descriptor")]
    BadFileDescriptor,
    #[error("no data available")]
    NoData,
    #[error("too many open files")]
    TooManyOpenFiles,
    #[error("too many levels of symbolic links")]
    TooManySymlinks,
    #[error("name too long")]
    NameTooLong,
    #[error("result out of range")]
    OutOfRange,
    #[error("argument list too long")]
    TooBig,
    #[error("no space left")]
    NoSpace,
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("unsupported")]
    Unsupported,
}

impl FsError {
    /// Linux errno reported to the guest for this error
    pub fn errno(&self) -> i32 {
        match self {
            FsError::NotFound => libc::ENOENT,
            FsError::AlreadyExists => libc::EEXIST,
            FsError::AccessDenied => libc::EACCES,
            FsError::NotPermitted => libc::EPERM,
            FsError::InvalidArgument => libc::EINVAL,
            FsError::NotADirectory => libc::ENOTDIR,
            FsError::IsADirectory => libc::EISDIR,
            FsError::NotEmpty => libc::ENOTEMPTY,
            FsError::BadFileDescriptor => libc::EBADF,
            FsError::NoData => libc::ENODATA,
            FsError::TooManyOpenFiles => libc::EMFILE,
            FsError::TooManySymlinks => libc::ELOOP,
            FsError::NameTooLong => libc::ENAMETOOLONG,
            FsError::OutOfRange => libc::ERANGE,
            FsError::TooBig => libc::E2BIG,
            FsError::NoSpace => libc::ENOSPC,
            FsError::Io(err) => err.raw_os_error().unwrap_or(libc::EIO),
            FsError::Unsupported => libc::EOPNOTSUPP,
        }
    }
}

pub type FsResult<T> = Result<T, FsError>;
