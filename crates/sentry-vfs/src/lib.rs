// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Sentry VFS core
//!
//! In-memory virtual filesystem behind the sentry syscall layer: an inode
//! backend interface with an in-memory implementation, per-process working
//! directories and descriptor tables, path resolution with symlink handling,
//! and POSIX permission evaluation.

pub mod backend;
pub mod config;
pub mod error;
pub mod fault;
pub mod memfs;
pub mod types;
pub mod vfs;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use backend::{InodeBackend, NewNode};
pub use config::{ConfigError, FsConfig, FsLimits, SecurityPolicy, XattrPolicy};
pub use error::{FsError, FsResult};
pub use fault::{FaultErrno, FaultInjector, FaultOp, FaultPolicy, FaultRule};
pub use memfs::MemBackend;
pub use types::*;
pub use vfs::{DirentRef, FsCore, OpenFile, OpenOptions, PID};
