// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Syscall-to-VFS translation for the extended attribute syscalls
//!
//! Handlers copy their arguments out of guest memory, resolve the target by
//! path or descriptor, authorize the access and then call into the
//! [`sentry_vfs::FsCore`]. Every failure is reported as a Linux errno.

pub mod abi;
pub mod args;
pub mod dispatch;
pub mod errors;
pub mod memory;
pub mod permission;
pub mod resolve;
pub mod task;
pub mod validate;
pub mod xattr;

pub use args::SyscallArgs;
pub use dispatch::{handle_syscall, XattrSyscall};
pub use errors::{errno_name, into_return_value, SyscallError, SyscallResult};
pub use memory::{GuestAddr, GuestMemory, GuestMemoryMap, MemoryError};
pub use resolve::{GuestPath, ResolvedTarget, XattrTarget};
pub use task::Task;
pub use validate::XattrName;
