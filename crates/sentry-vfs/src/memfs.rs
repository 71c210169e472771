// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! In-memory inode backend

use std::collections::{BTreeMap, HashMap};
use std::ffi::{OsStr, OsString};
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::trace;

use crate::backend::{InodeBackend, NewNode};
use crate::config::XattrPolicy;
use crate::error::{FsError, FsResult};
use crate::types::{InodeAttr, InodeId, ObjectType, Owner, XATTR_CREATE, XATTR_REPLACE};

/// Longest single path component accepted by `mknode`
const NAME_MAX: usize = 255;

#[derive(Clone, Debug)]
enum MemNodeKind {
    File,
    Directory { children: BTreeMap<OsString, InodeId> },
    Symlink { target: PathBuf },
    Special(ObjectType),
}

#[derive(Clone, Debug)]
struct MemNode {
    parent: InodeId,
    kind: MemNodeKind,
    perm: u32,
    uid: u32,
    gid: u32,
    nlink: u32,
    xattrs: HashMap<Vec<u8>, Vec<u8>>,
}

impl MemNode {
    fn object_type(&self) -> ObjectType {
        match &self.kind {
            MemNodeKind::File => ObjectType::Regular,
            MemNodeKind::Directory { .. } => ObjectType::Directory,
            MemNodeKind::Symlink { .. } => ObjectType::Symlink,
            MemNodeKind::Special(kind) => *kind,
        }
    }
}

/// Backend keeping every node and attribute in process memory
pub struct MemBackend {
    policy: XattrPolicy,
    root: InodeId,
    nodes: Mutex<HashMap<InodeId, MemNode>>,
    next_node_id: Mutex<u64>,
}

impl MemBackend {
    /// Create a backend holding only a root directory (mode 0755)
    pub fn new(policy: XattrPolicy, root_owner: Owner) -> Self {
        let root = InodeId(1);
        let mut nodes = HashMap::new();
        nodes.insert(
            root,
            MemNode {
                parent: root,
                kind: MemNodeKind::Directory {
                    children: BTreeMap::new(),
                },
                perm: 0o755,
                uid: root_owner.uid,
                gid: root_owner.gid,
                nlink: 2, // root has '.' and '..'
                xattrs: HashMap::new(),
            },
        );
        Self {
            policy,
            root,
            nodes: Mutex::new(nodes),
            next_node_id: Mutex::new(2),
        }
    }

    fn allocate_node_id(&self) -> InodeId {
        let mut next_id = self.next_node_id.lock().unwrap();
        let id = InodeId(*next_id);
        *next_id += 1;
        id
    }

    fn check_xattrs_enabled(&self) -> FsResult<()> {
        if self.policy.enabled {
            Ok(())
        } else {
            Err(FsError::Unsupported)
        }
    }

    fn validate_name(name: &OsStr) -> FsResult<()> {
        let bytes = name.as_bytes();
        if matches!(bytes, b"" | b"." | b"..") || bytes.contains(&b'/') {
            return Err(FsError::InvalidArgument);
        }
        if name.len() > NAME_MAX {
            return Err(FsError::NameTooLong);
        }
        Ok(())
    }
}

impl InodeBackend for MemBackend {
    fn root(&self) -> InodeId {
        self.root
    }

    fn stat(&self, ino: InodeId) -> FsResult<InodeAttr> {
        let nodes = self.nodes.lock().unwrap();
        let node = nodes.get(&ino).ok_or(FsError::NotFound)?;
        Ok(InodeAttr {
            ino,
            kind: node.object_type(),
            perm: node.perm,
            uid: node.uid,
            gid: node.gid,
            nlink: node.nlink,
        })
    }

    fn lookup(&self, parent: InodeId, name: &OsStr) -> FsResult<InodeId> {
        let nodes = self.nodes.lock().unwrap();
        let node = nodes.get(&parent).ok_or(FsError::NotFound)?;
        match &node.kind {
            MemNodeKind::Directory { children } => match name.as_bytes() {
                b"" | b"." => Ok(parent),
                b".." => Ok(node.parent),
                _ => children.get(name).copied().ok_or(FsError::NotFound),
            },
            _ => Err(FsError::NotADirectory),
        }
    }

    fn readlink(&self, ino: InodeId) -> FsResult<PathBuf> {
        let nodes = self.nodes.lock().unwrap();
        let node = nodes.get(&ino).ok_or(FsError::NotFound)?;
        match &node.kind {
            MemNodeKind::Symlink { target } => Ok(target.clone()),
            _ => Err(FsError::InvalidArgument), // Not a symlink
        }
    }

    fn mknode(
        &self,
        parent: InodeId,
        name: &OsStr,
        node: NewNode,
        perm: u32,
        owner: Owner,
    ) -> FsResult<InodeId> {
        Self::validate_name(name)?;

        let is_dir = matches!(node, NewNode::Directory);
        let kind = match node {
            NewNode::File => MemNodeKind::File,
            NewNode::Directory => MemNodeKind::Directory {
                children: BTreeMap::new(),
            },
            NewNode::Symlink { target } => MemNodeKind::Symlink { target },
            NewNode::Special(ObjectType::Regular) => MemNodeKind::File,
            NewNode::Special(ObjectType::Directory) | NewNode::Special(ObjectType::Symlink) => {
                return Err(FsError::InvalidArgument);
            }
            NewNode::Special(kind) => MemNodeKind::Special(kind),
        };

        let mut nodes = self.nodes.lock().unwrap();
        let parent_node = nodes.get(&parent).ok_or(FsError::NotFound)?;
        match &parent_node.kind {
            MemNodeKind::Directory { children } if children.contains_key(name) => {
                return Err(FsError::AlreadyExists);
            }
            MemNodeKind::Directory { .. } => {}
            _ => return Err(FsError::NotADirectory),
        }

        let node_id = self.allocate_node_id();
        nodes.insert(
            node_id,
            MemNode {
                parent,
                kind,
                perm: perm & 0o7777,
                uid: owner.uid,
                gid: owner.gid,
                nlink: if is_dir { 2 } else { 1 },
                xattrs: HashMap::new(),
            },
        );

        if let Some(parent_node) = nodes.get_mut(&parent) {
            if let MemNodeKind::Directory { children } = &mut parent_node.kind {
                children.insert(name.to_os_string(), node_id);
            }
            if is_dir {
                parent_node.nlink += 1;
            }
        }
        Ok(node_id)
    }

    fn unlink(&self, parent: InodeId, name: &OsStr) -> FsResult<InodeId> {
        let mut nodes = self.nodes.lock().unwrap();
        let child_id = match &nodes.get(&parent).ok_or(FsError::NotFound)?.kind {
            MemNodeKind::Directory { children } => {
                *children.get(name).ok_or(FsError::NotFound)?
            }
            _ => return Err(FsError::NotADirectory),
        };

        let child_is_dir = match &nodes.get(&child_id).ok_or(FsError::NotFound)?.kind {
            MemNodeKind::Directory { children } if !children.is_empty() => {
                return Err(FsError::NotEmpty);
            }
            MemNodeKind::Directory { .. } => true,
            _ => false,
        };

        if let Some(parent_node) = nodes.get_mut(&parent) {
            if let MemNodeKind::Directory { children } = &mut parent_node.kind {
                children.remove(name);
            }
            if child_is_dir {
                parent_node.nlink = parent_node.nlink.saturating_sub(1);
            }
        }
        if let Some(child) = nodes.get_mut(&child_id) {
            child.nlink = 0;
        }
        trace!(%parent, name = %name.to_string_lossy(), %child_id, "memfs unlink");
        Ok(child_id)
    }

    fn evict(&self, ino: InodeId) -> FsResult<()> {
        let mut nodes = self.nodes.lock().unwrap();
        let node = nodes.get(&ino).ok_or(FsError::NotFound)?;
        if node.nlink == 0 && ino != self.root {
            nodes.remove(&ino);
            trace!(%ino, "memfs evict");
        }
        Ok(())
    }

    fn set_perm(&self, ino: InodeId, perm: u32) -> FsResult<()> {
        let mut nodes = self.nodes.lock().unwrap();
        let node = nodes.get_mut(&ino).ok_or(FsError::NotFound)?;
        node.perm = perm & 0o7777;
        Ok(())
    }

    fn set_owner(&self, ino: InodeId, owner: Owner) -> FsResult<()> {
        let mut nodes = self.nodes.lock().unwrap();
        let node = nodes.get_mut(&ino).ok_or(FsError::NotFound)?;
        node.uid = owner.uid;
        node.gid = owner.gid;
        Ok(())
    }

    fn supports_xattrs(&self, kind: ObjectType) -> bool {
        match kind {
            ObjectType::Regular | ObjectType::Directory => true,
            ObjectType::Symlink => self.policy.symlink_xattrs,
            _ => false,
        }
    }

    fn get_xattr(&self, ino: InodeId, name: &[u8], max_size: usize) -> FsResult<Vec<u8>> {
        self.check_xattrs_enabled()?;
        let nodes = self.nodes.lock().unwrap();
        let node = nodes.get(&ino).ok_or(FsError::NotFound)?;
        trace!(%ino, name = %name.escape_ascii(), max_size, "memfs get_xattr");
        // The full value is returned; bounding it is the caller's job.
        node.xattrs.get(name).cloned().ok_or(FsError::NoData)
    }

    fn set_xattr(&self, ino: InodeId, name: &[u8], value: &[u8], flags: u32) -> FsResult<()> {
        self.check_xattrs_enabled()?;
        let mut nodes = self.nodes.lock().unwrap();
        let node = nodes.get_mut(&ino).ok_or(FsError::NotFound)?;
        let exists = node.xattrs.contains_key(name);
        if flags & XATTR_CREATE != 0 && exists {
            return Err(FsError::AlreadyExists);
        }
        if flags & XATTR_REPLACE != 0 && !exists {
            return Err(FsError::NoData);
        }
        trace!(%ino, name = %name.escape_ascii(), len = value.len(), flags, "memfs set_xattr");
        node.xattrs.insert(name.to_vec(), value.to_vec());
        Ok(())
    }

    fn list_xattr(&self, ino: InodeId, _max_size: usize) -> FsResult<Vec<Vec<u8>>> {
        self.check_xattrs_enabled()?;
        let nodes = self.nodes.lock().unwrap();
        let node = nodes.get(&ino).ok_or(FsError::NotFound)?;
        let mut names: Vec<Vec<u8>> = node.xattrs.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn remove_xattr(&self, ino: InodeId, name: &[u8]) -> FsResult<()> {
        self.check_xattrs_enabled()?;
        let mut nodes = self.nodes.lock().unwrap();
        let node = nodes.get_mut(&ino).ok_or(FsError::NotFound)?;
        node.xattrs.remove(name).map(|_| ()).ok_or(FsError::NoData)
    }
}
