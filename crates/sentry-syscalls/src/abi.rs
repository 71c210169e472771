// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Linux ABI constants used by the xattr syscalls

pub use sentry_vfs::{XATTR_CREATE, XATTR_REPLACE};

/// Longest attribute name, terminating NUL excluded
pub const XATTR_NAME_MAX: usize = 255;
/// Largest attribute value
pub const XATTR_SIZE_MAX: usize = 65536;
/// Largest buffer returned by listxattr
pub const XATTR_LIST_MAX: usize = 65536;
/// The only namespace exposed to guests
pub const XATTR_USER_PREFIX: &str = "user.";

pub const PATH_MAX: usize = 4096;

// x86_64 syscall numbers
pub const SYS_SETXATTR: u64 = 188;
pub const SYS_LSETXATTR: u64 = 189;
pub const SYS_FSETXATTR: u64 = 190;
pub const SYS_GETXATTR: u64 = 191;
pub const SYS_LGETXATTR: u64 = 192;
pub const SYS_FGETXATTR: u64 = 193;
pub const SYS_LISTXATTR: u64 = 194;
pub const SYS_LLISTXATTR: u64 = 195;
pub const SYS_FLISTXATTR: u64 = 196;
pub const SYS_REMOVEXATTR: u64 = 197;
pub const SYS_LREMOVEXATTR: u64 = 198;
pub const SYS_FREMOVEXATTR: u64 = 199;
