// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Core type definitions for the sentry VFS

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Set-xattr flag: fail if the attribute already exists
pub const XATTR_CREATE: u32 = 0x1;
/// Set-xattr flag: fail if the attribute does not exist yet
pub const XATTR_REPLACE: u32 = 0x2;

/// Inode identifier, unique within one backend
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InodeId(pub u64);

impl InodeId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for InodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "inode:{}", self.0)
    }
}

/// Kind of object an inode represents
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectType {
    Regular,
    Directory,
    Symlink,
    Fifo,
    CharDevice,
    BlockDevice,
    Socket,
}

impl ObjectType {
    pub fn is_regular(self) -> bool {
        self == ObjectType::Regular
    }

    pub fn is_dir(self) -> bool {
        self == ObjectType::Directory
    }

    pub fn is_symlink(self) -> bool {
        self == ObjectType::Symlink
    }

    /// `S_IFMT` bits for this type
    pub fn format_bits(self) -> u32 {
        (match self {
            ObjectType::Regular => libc::S_IFREG,
            ObjectType::Directory => libc::S_IFDIR,
            ObjectType::Symlink => libc::S_IFLNK,
            ObjectType::Fifo => libc::S_IFIFO,
            ObjectType::CharDevice => libc::S_IFCHR,
            ObjectType::BlockDevice => libc::S_IFBLK,
            ObjectType::Socket => libc::S_IFSOCK,
        }) as u32
    }

    /// Decode the type from the `S_IFMT` bits of a full mode
    pub fn from_mode(mode: u32) -> Option<Self> {
        let fmt = mode & libc::S_IFMT as u32;
        [
            ObjectType::Regular,
            ObjectType::Directory,
            ObjectType::Symlink,
            ObjectType::Fifo,
            ObjectType::CharDevice,
            ObjectType::BlockDevice,
            ObjectType::Socket,
        ]
        .into_iter()
        .find(|kind| kind.format_bits() == fmt)
    }
}

/// Inode attributes reported by a backend
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InodeAttr {
    pub ino: InodeId,
    pub kind: ObjectType,
    /// Permission bits including setuid/setgid/sticky; no type bits
    pub perm: u32,
    pub uid: u32,
    pub gid: u32,
    pub nlink: u32,
}

impl InodeAttr {
    /// Full `st_mode` value (type bits | permission bits)
    pub fn mode(&self) -> u32 {
        self.kind.format_bits() | (self.perm & 0o7777)
    }
}

/// Access requested against an object
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PermMask {
    pub read: bool,
    pub write: bool,
    pub execute: bool,
}

impl PermMask {
    pub const READ: PermMask = PermMask {
        read: true,
        write: false,
        execute: false,
    };
    pub const WRITE: PermMask = PermMask {
        read: false,
        write: true,
        execute: false,
    };
    pub const EXECUTE: PermMask = PermMask {
        read: false,
        write: false,
        execute: true,
    };
}

/// Ownership applied to newly created nodes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Owner {
    pub uid: u32,
    pub gid: u32,
}

/// Event kinds for filesystem change notifications
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    Created { path: PathBuf },
    Removed { path: PathBuf },
    AttributesChanged { path: PathBuf },
}

/// Event sink trait for receiving filesystem change notifications
#[cfg_attr(test, mockall::automock)]
pub trait EventSink: Send + Sync {
    fn on_event(&self, evt: &EventKind);
}

/// Opaque event subscription identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

impl SubscriptionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}
