// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Inode backend interface
//!
//! Every filesystem variant mounted into the VFS implements [`InodeBackend`].
//! The VFS core owns path walking, descriptor tables, reference tracking and
//! permission evaluation; a backend only stores nodes and their attributes.
//!
//! Entry names, symlink targets and attribute names are byte strings: no
//! encoding is assumed, and distinct byte sequences are distinct names.

use std::ffi::OsStr;
use std::path::PathBuf;

use crate::error::FsResult;
use crate::types::{InodeAttr, InodeId, ObjectType, Owner};

/// Node to be created by [`InodeBackend::mknode`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NewNode {
    File,
    Directory,
    Symlink { target: PathBuf },
    /// Fifo, socket or device node
    Special(ObjectType),
}

impl NewNode {
    pub fn kind(&self) -> ObjectType {
        match self {
            NewNode::File => ObjectType::Regular,
            NewNode::Directory => ObjectType::Directory,
            NewNode::Symlink { .. } => ObjectType::Symlink,
            NewNode::Special(kind) => *kind,
        }
    }
}

/// Storage interface implemented per filesystem type
pub trait InodeBackend: Send + Sync {
    /// Root directory of this backend
    fn root(&self) -> InodeId;

    /// Type, mode and ownership of a node
    fn stat(&self, ino: InodeId) -> FsResult<InodeAttr>;

    /// Look up `name` in directory `parent`. `.` and `..` are understood; the
    /// parent of the root is the root.
    fn lookup(&self, parent: InodeId, name: &OsStr) -> FsResult<InodeId>;

    /// Target of a symlink node
    fn readlink(&self, ino: InodeId) -> FsResult<PathBuf>;

    /// Create a child node under `parent`
    fn mknode(
        &self,
        parent: InodeId,
        name: &OsStr,
        node: NewNode,
        perm: u32,
        owner: Owner,
    ) -> FsResult<InodeId>;

    /// Remove the entry `name` from `parent` and return the node it named.
    ///
    /// The node loses its link but stays addressable by id, attributes
    /// included, until [`InodeBackend::evict`] is called for it.
    fn unlink(&self, parent: InodeId, name: &OsStr) -> FsResult<InodeId>;

    /// Free a node that no directory entry refers to any more. Nodes that are
    /// still linked are left alone.
    fn evict(&self, ino: InodeId) -> FsResult<()>;

    fn set_perm(&self, ino: InodeId, perm: u32) -> FsResult<()>;

    fn set_owner(&self, ino: InodeId, owner: Owner) -> FsResult<()>;

    /// Object types that can carry extended attributes on this backend
    fn supports_xattrs(&self, kind: ObjectType) -> bool {
        matches!(kind, ObjectType::Regular | ObjectType::Directory)
    }

    /// Fetch an attribute value. `max_size` is the size the caller is prepared
    /// to accept; a backend may return a longer value and leave the bounds
    /// check to the caller.
    fn get_xattr(&self, ino: InodeId, name: &[u8], max_size: usize) -> FsResult<Vec<u8>>;

    /// Store an attribute value. `flags` carries `XATTR_CREATE`/`XATTR_REPLACE`
    /// verbatim.
    fn set_xattr(&self, ino: InodeId, name: &[u8], value: &[u8], flags: u32) -> FsResult<()>;

    /// Names of all attributes on a node
    fn list_xattr(&self, ino: InodeId, max_size: usize) -> FsResult<Vec<Vec<u8>>>;

    fn remove_xattr(&self, ino: InodeId, name: &[u8]) -> FsResult<()>;
}
