// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Misbehaving inode backend for error-path tests
//!
//! [`MockInodeBackend`] wraps a real [`InodeBackend`] and can be told to fail
//! selected operations, or to hand back attribute values longer than the
//! caller asked for (a value that grew between a size query and the read).

use crate::backend::{InodeBackend, NewNode};
use crate::error::FsResult;
use crate::types::{InodeAttr, InodeId, ObjectType, Owner};
use crate::FsError;
use libc::EIO;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Custom predicate function type for fault injection
pub type FaultPredicate = Arc<dyn Fn(&str, u64) -> Option<FsError> + Send + Sync>;

/// Configurable failure behavior for mock backend operations
#[derive(Default)]
pub enum FailureBehavior {
    #[default]
    AlwaysSucceed,

    /// Fail every call to `op` after the first `count` succeeded
    FailAfter {
        op: &'static str,
        count: u64,
        error_fn: Arc<dyn Fn() -> FsError + Send + Sync>,
    },

    /// Fail the first `count` calls to `op`
    FailFor {
        op: &'static str,
        count: u64,
        error_fn: Arc<dyn Fn() -> FsError + Send + Sync>,
    },

    AlwaysFail {
        op: &'static str,
        error_fn: Arc<dyn Fn() -> FsError + Send + Sync>,
    },

    /// Receives (operation_name, call_count) and returns Some(error) to fail
    Custom(FaultPredicate),
}

/// Decorator backend delegating to `inner` with injectable failures
pub struct MockInodeBackend {
    inner: Arc<dyn InodeBackend>,
    behavior: Mutex<FailureBehavior>,
    call_counts: Mutex<HashMap<String, AtomicU64>>,
    value_growth: Mutex<usize>,
    symlink_xattrs: Mutex<Option<bool>>,
}

impl MockInodeBackend {
    pub fn new(inner: Arc<dyn InodeBackend>) -> Self {
        Self::with_behavior(inner, FailureBehavior::AlwaysSucceed)
    }

    pub fn with_behavior(inner: Arc<dyn InodeBackend>, behavior: FailureBehavior) -> Self {
        Self {
            inner,
            behavior: Mutex::new(behavior),
            call_counts: Mutex::new(HashMap::new()),
            value_growth: Mutex::new(0),
            symlink_xattrs: Mutex::new(None),
        }
    }

    pub fn set_behavior(&self, behavior: FailureBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    /// Append `extra` bytes to every value returned by `get_xattr`
    pub fn grow_values_by(&self, extra: usize) {
        *self.value_growth.lock().unwrap() = extra;
    }

    /// Override whether symlinks report xattr support
    pub fn set_symlink_xattrs(&self, enabled: bool) {
        *self.symlink_xattrs.lock().unwrap() = Some(enabled);
    }

    pub fn call_count(&self, op: &str) -> u64 {
        self.call_counts
            .lock()
            .unwrap()
            .get(op)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    pub fn reset_counters(&self) {
        let counts = self.call_counts.lock().unwrap();
        for counter in counts.values() {
            counter.store(0, Ordering::SeqCst);
        }
    }

    fn check_fault(&self, op: &str) -> FsResult<()> {
        let mut counts_guard = self.call_counts.lock().unwrap();
        let counter = counts_guard.entry(op.to_string()).or_insert_with(|| AtomicU64::new(0));
        let current_count = counter.fetch_add(1, Ordering::SeqCst);
        drop(counts_guard);

        let behavior_guard = self.behavior.lock().unwrap();
        let injected = match &*behavior_guard {
            FailureBehavior::AlwaysSucceed => None,
            FailureBehavior::FailAfter {
                op: target,
                count,
                error_fn,
            } => (op == *target && current_count >= *count).then(|| error_fn()),
            FailureBehavior::FailFor {
                op: target,
                count,
                error_fn,
            } => (op == *target && current_count < *count).then(|| error_fn()),
            FailureBehavior::AlwaysFail {
                op: target,
                error_fn,
            } => (op == *target).then(|| error_fn()),
            FailureBehavior::Custom(predicate) => predicate(op, current_count),
        };
        match injected {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl InodeBackend for MockInodeBackend {
    fn root(&self) -> InodeId {
        self.inner.root()
    }

    fn stat(&self, ino: InodeId) -> FsResult<InodeAttr> {
        self.check_fault("stat")?;
        self.inner.stat(ino)
    }

    fn lookup(&self, parent: InodeId, name: &OsStr) -> FsResult<InodeId> {
        self.check_fault("lookup")?;
        self.inner.lookup(parent, name)
    }

    fn readlink(&self, ino: InodeId) -> FsResult<PathBuf> {
        self.check_fault("readlink")?;
        self.inner.readlink(ino)
    }

    fn mknode(
        &self,
        parent: InodeId,
        name: &OsStr,
        node: NewNode,
        perm: u32,
        owner: Owner,
    ) -> FsResult<InodeId> {
        self.check_fault("mknode")?;
        self.inner.mknode(parent, name, node, perm, owner)
    }

    fn unlink(&self, parent: InodeId, name: &OsStr) -> FsResult<InodeId> {
        self.check_fault("unlink")?;
        self.inner.unlink(parent, name)
    }

    fn evict(&self, ino: InodeId) -> FsResult<()> {
        self.check_fault("evict")?;
        self.inner.evict(ino)
    }

    fn set_perm(&self, ino: InodeId, perm: u32) -> FsResult<()> {
        self.check_fault("set_perm")?;
        self.inner.set_perm(ino, perm)
    }

    fn set_owner(&self, ino: InodeId, owner: Owner) -> FsResult<()> {
        self.check_fault("set_owner")?;
        self.inner.set_owner(ino, owner)
    }

    fn supports_xattrs(&self, kind: ObjectType) -> bool {
        match (kind, *self.symlink_xattrs.lock().unwrap()) {
            (ObjectType::Symlink, Some(enabled)) => enabled,
            _ => self.inner.supports_xattrs(kind),
        }
    }

    fn get_xattr(&self, ino: InodeId, name: &[u8], max_size: usize) -> FsResult<Vec<u8>> {
        self.check_fault("get_xattr")?;
        let mut value = self.inner.get_xattr(ino, name, max_size)?;
        let growth = *self.value_growth.lock().unwrap();
        value.resize(value.len() + growth, b'+');
        Ok(value)
    }

    fn set_xattr(&self, ino: InodeId, name: &[u8], value: &[u8], flags: u32) -> FsResult<()> {
        self.check_fault("set_xattr")?;
        self.inner.set_xattr(ino, name, value, flags)
    }

    fn list_xattr(&self, ino: InodeId, max_size: usize) -> FsResult<Vec<Vec<u8>>> {
        self.check_fault("list_xattr")?;
        self.inner.list_xattr(ino, max_size)
    }

    fn remove_xattr(&self, ino: InodeId, name: &[u8]) -> FsResult<()> {
        self.check_fault("remove_xattr")?;
        self.inner.remove_xattr(ino, name)
    }
}

/// Helper function to create a simple EIO error for testing
pub fn eio_error() -> FsError {
    FsError::Io(io::Error::from_raw_os_error(EIO))
}

/// Helper function to create an ENOSPC error for testing
pub fn enospc_error() -> FsError {
    FsError::NoSpace
}
