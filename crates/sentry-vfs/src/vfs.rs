// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! VFS core: processes, path resolution, descriptors and permission checks

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, trace, warn};

use crate::backend::{InodeBackend, NewNode};
use crate::config::FsConfig;
use crate::error::{FsError, FsResult};
use crate::fault::{FaultInjector, FaultOp, FaultPolicy};
use crate::memfs::MemBackend;
#[cfg(feature = "events")]
use crate::types::{EventSink, SubscriptionId};
use crate::types::{EventKind, InodeAttr, InodeId, ObjectType, Owner, PermMask};

/// Process identifier for type safety in the filesystem API.
/// Operations on behalf of a guest process take the `PID` returned by
/// `register_process`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PID(pub(crate) u32);

impl PID {
    pub fn new(pid: u32) -> Self {
        Self(pid)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

/// Security identity of a process
#[derive(Clone, Debug)]
pub(crate) struct User {
    pub(crate) uid: u32,
    pub(crate) gid: u32,
    pub(crate) groups: Vec<u32>,
}

#[derive(Debug, Default)]
struct RefState {
    counts: HashMap<InodeId, usize>,
    /// Referenced nodes that no directory entry names any more
    unlinked: HashSet<InodeId>,
}

/// Live reference counts per inode.
///
/// A node unlinked while referenced stays in the backend until its last
/// reference is released, at which point it is evicted.
struct RefTable {
    state: Mutex<RefState>,
    backend: Arc<dyn InodeBackend>,
}

impl fmt::Debug for RefTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefTable").field("state", &self.state).finish_non_exhaustive()
    }
}

impl RefTable {
    fn new(backend: Arc<dyn InodeBackend>) -> Self {
        Self {
            state: Mutex::new(RefState::default()),
            backend,
        }
    }

    fn acquire(&self, ino: InodeId) {
        *self.state.lock().unwrap().counts.entry(ino).or_insert(0) += 1;
    }

    fn release(&self, ino: InodeId) {
        let mut state = self.state.lock().unwrap();
        let Some(count) = state.counts.get_mut(&ino) else {
            return;
        };
        *count -= 1;
        if *count > 0 {
            return;
        }
        state.counts.remove(&ino);
        let orphaned = state.unlinked.remove(&ino);
        drop(state);
        if orphaned {
            self.evict(ino);
        }
    }

    /// Note that `ino` lost its last link. Returns true when nothing holds
    /// it, so it can be evicted right away.
    fn mark_unlinked(&self, ino: InodeId) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.counts.contains_key(&ino) {
            state.unlinked.insert(ino);
            false
        } else {
            true
        }
    }

    fn evict(&self, ino: InodeId) {
        if let Err(err) = self.backend.evict(ino) {
            warn!(%ino, %err, "failed to evict unlinked node");
        }
    }

    fn total(&self) -> usize {
        self.state.lock().unwrap().counts.values().sum()
    }
}

/// Counted reference to a resolved filesystem object.
///
/// The reference is taken when the value is created or cloned and given back
/// when it is dropped.
#[derive(Debug)]
pub struct DirentRef {
    ino: InodeId,
    kind: ObjectType,
    path: PathBuf,
    refs: Arc<RefTable>,
}

impl DirentRef {
    fn acquire(refs: &Arc<RefTable>, ino: InodeId, kind: ObjectType, path: PathBuf) -> Self {
        refs.acquire(ino);
        Self {
            ino,
            kind,
            path,
            refs: Arc::clone(refs),
        }
    }

    pub fn ino(&self) -> InodeId {
        self.ino
    }

    pub fn kind(&self) -> ObjectType {
        self.kind
    }

    /// Absolute path the object was reached by. It is not updated when the
    /// object is unlinked afterwards.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Clone for DirentRef {
    fn clone(&self) -> Self {
        Self::acquire(&self.refs, self.ino, self.kind, self.path.clone())
    }
}

impl Drop for DirentRef {
    fn drop(&mut self) {
        self.refs.release(self.ino);
    }
}

/// Flags for `FsCore::open`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OpenOptions {
    pub read: bool,
    pub write: bool,
    /// `O_PATH`: the descriptor only names the object
    pub path_only: bool,
    /// `O_DIRECTORY`
    pub directory: bool,
    /// `O_NOFOLLOW`
    pub nofollow: bool,
}

/// Open file description shared by the descriptors referring to it
#[derive(Debug)]
pub struct OpenFile {
    dirent: DirentRef,
    options: OpenOptions,
}

impl OpenFile {
    pub fn dirent(&self) -> &DirentRef {
        &self.dirent
    }

    pub fn is_path_only(&self) -> bool {
        self.options.path_only
    }

    pub fn readable(&self) -> bool {
        self.options.read && !self.options.path_only
    }

    pub fn writable(&self) -> bool {
        self.options.write && !self.options.path_only
    }
}

struct Process {
    user: User,
    cwd: DirentRef,
    files: BTreeMap<i32, Arc<OpenFile>>,
}

/// The main filesystem core
pub struct FsCore {
    config: FsConfig,
    backend: Arc<dyn InodeBackend>,
    refs: Arc<RefTable>,
    processes: Mutex<HashMap<u32, Process>>,
    faults: FaultInjector,
    #[cfg(feature = "events")]
    next_subscription_id: Mutex<u64>,
    #[cfg(feature = "events")]
    event_subscriptions: Mutex<HashMap<SubscriptionId, Arc<dyn EventSink>>>,
}

impl FsCore {
    pub fn new(config: FsConfig, backend: Arc<dyn InodeBackend>) -> Self {
        Self {
            config,
            refs: Arc::new(RefTable::new(Arc::clone(&backend))),
            backend,
            processes: Mutex::new(HashMap::new()),
            faults: FaultInjector::new(),
            #[cfg(feature = "events")]
            next_subscription_id: Mutex::new(1),
            #[cfg(feature = "events")]
            event_subscriptions: Mutex::new(HashMap::new()),
        }
    }

    /// FsCore over a fresh [`MemBackend`] whose root is owned by the
    /// configured default identity
    pub fn in_memory(config: FsConfig) -> Self {
        let owner = Owner {
            uid: config.security.default_uid,
            gid: config.security.default_gid,
        };
        let backend = Arc::new(MemBackend::new(config.xattrs.clone(), owner));
        Self::new(config, backend)
    }

    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    /// Number of dirent references currently held, descriptors and process
    /// working directories included
    pub fn live_refs(&self) -> usize {
        self.refs.total()
    }

    fn root_ref(&self) -> FsResult<DirentRef> {
        let root = self.backend.root();
        let attr = self.backend.stat(root)?;
        Ok(DirentRef::acquire(&self.refs, root, attr.kind, PathBuf::from("/")))
    }

    /// Register a process (or refresh its identity).
    ///
    /// A new process starts in its parent's working directory, or at the root
    /// when the parent is unknown.
    pub fn register_process(&self, pid: u32, parent_pid: u32, uid: u32, gid: u32) -> FsResult<PID> {
        let user = User {
            uid,
            gid,
            groups: vec![gid],
        };

        let mut processes = self.processes.lock().unwrap();
        if let Some(existing) = processes.get_mut(&pid) {
            existing.user = user;
            return Ok(PID(pid));
        }

        let cwd = match processes.get(&parent_pid) {
            Some(parent) => parent.cwd.clone(),
            None => self.root_ref()?,
        };
        processes.insert(
            pid,
            Process {
                user,
                cwd,
                files: BTreeMap::new(),
            },
        );
        debug!(pid, parent_pid, uid, gid, "registered process");
        Ok(PID(pid))
    }

    /// Forget a process, closing its descriptors
    pub fn unregister_process(&self, pid: &PID) -> FsResult<()> {
        let removed = self.processes.lock().unwrap().remove(&pid.0);
        match removed {
            Some(_) => Ok(()),
            None => Err(FsError::NotFound),
        }
    }

    /// Supplementary groups replace the primary-group-only default
    pub fn set_groups(&self, pid: &PID, groups: &[u32]) -> FsResult<()> {
        let mut processes = self.processes.lock().unwrap();
        let process = processes.get_mut(&pid.0).ok_or(FsError::NotFound)?;
        process.user.groups = groups.to_vec();
        if !process.user.groups.contains(&process.user.gid) {
            process.user.groups.push(process.user.gid);
        }
        Ok(())
    }

    fn user_for_process(&self, pid: &PID) -> Option<User> {
        self.processes.lock().unwrap().get(&pid.0).map(|p| p.user.clone())
    }

    fn cwd_for_process(&self, pid: &PID) -> FsResult<DirentRef> {
        match self.processes.lock().unwrap().get(&pid.0) {
            Some(process) => Ok(process.cwd.clone()),
            None => self.root_ref(),
        }
    }

    fn allowed_for_user(&self, attr: &InodeAttr, user: &User, mask: PermMask) -> bool {
        if !self.config.security.enforce_posix_permissions {
            return true;
        }
        if self.config.security.root_bypass_permissions && user.uid == 0 {
            return true;
        }

        let (r_bit, w_bit, x_bit) = if user.uid == attr.uid {
            (0o400, 0o200, 0o100)
        } else if user.gid == attr.gid || user.groups.contains(&attr.gid) {
            (0o040, 0o020, 0o010)
        } else {
            (0o004, 0o002, 0o001)
        };

        let allow_r = !mask.read || (attr.perm & r_bit) != 0;
        let allow_w = !mask.write || (attr.perm & w_bit) != 0;
        let allow_x = !mask.execute || (attr.perm & x_bit) != 0;
        allow_r && allow_w && allow_x
    }

    fn check_attr_access(&self, user: Option<&User>, attr: &InodeAttr, mask: PermMask) -> FsResult<()> {
        if !self.config.security.enforce_posix_permissions {
            return Ok(());
        }
        // Unregistered callers are denied while permissions are enforced
        let user = user.ok_or(FsError::AccessDenied)?;
        if self.allowed_for_user(attr, user, mask) {
            Ok(())
        } else {
            Err(FsError::AccessDenied)
        }
    }

    /// Owner/group/other evaluation of `mask` against the object, with the
    /// configured root bypass
    pub fn check_permission(&self, pid: &PID, target: &DirentRef, mask: PermMask) -> FsResult<()> {
        let attr = self.backend.stat(target.ino)?;
        let user = self.user_for_process(pid);
        self.check_attr_access(user.as_ref(), &attr, mask).inspect_err(|_| {
            debug!(pid = pid.0, path = %target.path().display(), ?mask, "permission denied");
        })
    }

    /// Resolve `path` for `pid`.
    ///
    /// Relative paths start at the process working directory. Symlinks are
    /// followed in every position except the last, which is followed only
    /// when `follow_final` is set.
    pub fn resolve(&self, pid: &PID, path: impl AsRef<Path>, follow_final: bool) -> FsResult<DirentRef> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(FsError::NotFound);
        }
        let user = self.user_for_process(pid);
        if self.config.security.enforce_posix_permissions && user.is_none() {
            return Err(FsError::AccessDenied);
        }

        let start = if path.has_root() {
            self.root_ref()?
        } else {
            self.cwd_for_process(pid)?
        };
        let mut current = start.ino;
        let mut current_kind = start.kind;
        let mut names: Vec<OsString> = split_components(&start.path).into();
        drop(start);

        let mut pending = split_components(path);
        let mut symlink_hops = 0u32;

        while let Some(component) = pending.pop_front() {
            if component.as_bytes() == b"." {
                if !current_kind.is_dir() {
                    return Err(FsError::NotADirectory);
                }
                continue;
            }

            let dir_attr = self.backend.stat(current)?;
            if !dir_attr.kind.is_dir() {
                return Err(FsError::NotADirectory);
            }
            self.check_attr_access(user.as_ref(), &dir_attr, PermMask::EXECUTE)?;

            if let Some(err) = self.faults.should_fault(FaultOp::Lookup) {
                return Err(err);
            }
            let child = self.backend.lookup(current, &component)?;
            let child_attr = self.backend.stat(child)?;

            if component.as_bytes() == b".." {
                names.pop();
                current = child;
                current_kind = child_attr.kind;
                continue;
            }

            let is_final = pending.is_empty();
            if child_attr.kind.is_symlink() && (!is_final || follow_final) {
                symlink_hops += 1;
                if symlink_hops > self.config.limits.max_symlink_traversals {
                    debug!(path = %path.display(), hops = symlink_hops, "symlink traversal limit reached");
                    return Err(FsError::TooManySymlinks);
                }
                let target = self.backend.readlink(child)?;
                if target.as_os_str().is_empty() {
                    return Err(FsError::NotFound);
                }
                if target.has_root() {
                    current = self.backend.root();
                    current_kind = ObjectType::Directory;
                    names.clear();
                }
                for part in split_components(&target).into_iter().rev() {
                    pending.push_front(part);
                }
                continue;
            }

            names.push(component);
            current = child;
            current_kind = child_attr.kind;
        }

        let mut resolved = PathBuf::from("/");
        resolved.extend(&names);
        trace!(pid = pid.0, path = %path.display(), resolved = %resolved.display(), ino = %current, "resolved path");
        Ok(DirentRef::acquire(&self.refs, current, current_kind, resolved))
    }

    /// Change the working directory of a process
    pub fn set_cwd(&self, pid: &PID, path: impl AsRef<Path>) -> FsResult<()> {
        let dir = self.resolve(pid, path, true)?;
        if !dir.kind.is_dir() {
            return Err(FsError::NotADirectory);
        }
        self.check_permission(pid, &dir, PermMask::EXECUTE)?;
        let mut processes = self.processes.lock().unwrap();
        let process = processes.get_mut(&pid.0).ok_or(FsError::NotFound)?;
        process.cwd = dir;
        Ok(())
    }

    /// Open `path` and install it at the lowest free descriptor
    pub fn open(&self, pid: &PID, path: impl AsRef<Path>, opts: &OpenOptions) -> FsResult<i32> {
        let path = path.as_ref();
        let dirent = self.resolve(pid, path, !opts.nofollow)?;
        if dirent.kind.is_symlink() && !opts.path_only {
            return Err(FsError::TooManySymlinks);
        }
        if opts.directory && !dirent.kind.is_dir() {
            return Err(FsError::NotADirectory);
        }
        if !opts.path_only {
            if opts.write && dirent.kind.is_dir() {
                return Err(FsError::IsADirectory);
            }
            let mask = PermMask {
                read: opts.read,
                write: opts.write,
                execute: false,
            };
            self.check_permission(pid, &dirent, mask)?;
        }

        let mut processes = self.processes.lock().unwrap();
        let process = processes.get_mut(&pid.0).ok_or(FsError::AccessDenied)?;
        if process.files.len() >= self.config.limits.max_open_handles {
            return Err(FsError::TooManyOpenFiles);
        }
        let fd = (0..)
            .find(|fd| !process.files.contains_key(fd))
            .ok_or(FsError::TooManyOpenFiles)?;
        process.files.insert(
            fd,
            Arc::new(OpenFile {
                dirent,
                options: *opts,
            }),
        );
        trace!(pid = pid.0, path = %path.display(), fd, "opened");
        Ok(fd)
    }

    pub fn close(&self, pid: &PID, fd: i32) -> FsResult<()> {
        let mut processes = self.processes.lock().unwrap();
        let process = processes.get_mut(&pid.0).ok_or(FsError::BadFileDescriptor)?;
        process.files.remove(&fd).map(|_| ()).ok_or(FsError::BadFileDescriptor)
    }

    /// Borrow the open file behind `fd`. The returned `Arc` keeps the file
    /// alive even if the descriptor is closed concurrently.
    pub fn get_file(&self, pid: &PID, fd: i32) -> Option<Arc<OpenFile>> {
        let processes = self.processes.lock().unwrap();
        processes.get(&pid.0)?.files.get(&fd).cloned()
    }

    pub fn stat(&self, target: &DirentRef) -> FsResult<InodeAttr> {
        self.backend.stat(target.ino)
    }

    /// Whether the backend stores attributes on objects of this type
    pub fn supports_xattrs(&self, target: &DirentRef) -> bool {
        self.backend.supports_xattrs(target.kind)
    }

    fn owner_for(&self, user: Option<&User>) -> Owner {
        match user {
            Some(user) => Owner {
                uid: user.uid,
                gid: user.gid,
            },
            None => Owner {
                uid: self.config.security.default_uid,
                gid: self.config.security.default_gid,
            },
        }
    }

    /// Resolve the parent of `path` and check the caller may add or remove
    /// entries in it
    fn parent_for_update(&self, pid: &PID, path: &Path) -> FsResult<(DirentRef, OsString)> {
        let (parent_path, name) = split_parent(path)?;
        let parent = self.resolve(pid, &parent_path, true)?;
        if !parent.kind.is_dir() {
            return Err(FsError::NotADirectory);
        }
        self.check_permission(
            pid,
            &parent,
            PermMask {
                read: false,
                write: true,
                execute: true,
            },
        )?;
        Ok((parent, name))
    }

    fn make_node(&self, pid: &PID, path: &Path, node: NewNode, perm: u32) -> FsResult<()> {
        let (parent, name) = self.parent_for_update(pid, path)?;
        let owner = self.owner_for(self.user_for_process(pid).as_ref());
        let kind = node.kind();
        self.backend.mknode(parent.ino, &name, node, perm, owner)?;
        debug!(pid = pid.0, path = %path.display(), ?kind, perm = format_args!("{perm:o}"), "created node");
        self.emit_event(EventKind::Created {
            path: parent.path().join(&name),
        });
        Ok(())
    }

    pub fn mkdir(&self, pid: &PID, path: impl AsRef<Path>, perm: u32) -> FsResult<()> {
        self.make_node(pid, path.as_ref(), NewNode::Directory, perm)
    }

    pub fn create_file(&self, pid: &PID, path: impl AsRef<Path>, perm: u32) -> FsResult<()> {
        self.make_node(pid, path.as_ref(), NewNode::File, perm)
    }

    pub fn symlink(&self, pid: &PID, target: impl AsRef<Path>, linkpath: impl AsRef<Path>) -> FsResult<()> {
        self.make_node(
            pid,
            linkpath.as_ref(),
            NewNode::Symlink {
                target: target.as_ref().to_path_buf(),
            },
            0o777,
        )
    }

    /// Create a fifo, socket or device node
    pub fn mknod(&self, pid: &PID, path: impl AsRef<Path>, kind: ObjectType, perm: u32) -> FsResult<()> {
        self.make_node(pid, path.as_ref(), NewNode::Special(kind), perm)
    }

    /// Remove a directory entry. Objects still held through a descriptor or
    /// a dirent reference stay usable until the last holder lets go.
    pub fn unlink(&self, pid: &PID, path: impl AsRef<Path>) -> FsResult<()> {
        let path = path.as_ref();
        let (parent, name) = self.parent_for_update(pid, path)?;
        let child = self.backend.unlink(parent.ino, &name)?;
        if self.refs.mark_unlinked(child) {
            self.refs.evict(child);
        } else {
            debug!(pid = pid.0, path = %path.display(), ino = %child, "unlinked while in use");
        }
        self.emit_event(EventKind::Removed {
            path: parent.path().join(&name),
        });
        Ok(())
    }

    /// chmod: only the owner (or root) may change the mode
    pub fn set_mode(&self, pid: &PID, path: impl AsRef<Path>, perm: u32) -> FsResult<()> {
        let target = self.resolve(pid, path, true)?;
        let attr = self.backend.stat(target.ino)?;
        if self.config.security.enforce_posix_permissions {
            let user = self.user_for_process(pid).ok_or(FsError::NotPermitted)?;
            if user.uid != 0 && user.uid != attr.uid {
                return Err(FsError::NotPermitted);
            }
        }
        self.backend.set_perm(target.ino, perm)?;
        self.emit_event(EventKind::AttributesChanged {
            path: target.path().to_path_buf(),
        });
        Ok(())
    }

    /// chown: reserved to root
    pub fn set_owner(&self, pid: &PID, path: impl AsRef<Path>, uid: u32, gid: u32) -> FsResult<()> {
        let target = self.resolve(pid, path, true)?;
        if self.config.security.enforce_posix_permissions {
            let user = self.user_for_process(pid).ok_or(FsError::NotPermitted)?;
            if user.uid != 0 {
                return Err(FsError::NotPermitted);
            }
        }
        self.backend.set_owner(target.ino, Owner { uid, gid })?;
        self.emit_event(EventKind::AttributesChanged {
            path: target.path().to_path_buf(),
        });
        Ok(())
    }

    // Extended attributes. Callers have already authorized the access.
    // Names are raw bytes.

    pub fn get_xattr(&self, target: &DirentRef, name: &[u8], max_size: usize) -> FsResult<Vec<u8>> {
        if let Some(err) = self.faults.should_fault(FaultOp::GetXattr) {
            return Err(err);
        }
        trace!(path = %target.path().display(), name = %name.escape_ascii(), max_size, "get_xattr");
        self.backend.get_xattr(target.ino, name, max_size)
    }

    pub fn set_xattr(&self, target: &DirentRef, name: &[u8], value: &[u8], flags: u32) -> FsResult<()> {
        if let Some(err) = self.faults.should_fault(FaultOp::SetXattr) {
            return Err(err);
        }
        trace!(
            path = %target.path().display(),
            name = %name.escape_ascii(),
            len = value.len(),
            flags,
            "set_xattr"
        );
        self.backend.set_xattr(target.ino, name, value, flags)?;
        self.emit_event(EventKind::AttributesChanged {
            path: target.path().to_path_buf(),
        });
        Ok(())
    }

    pub fn list_xattr(&self, target: &DirentRef, max_size: usize) -> FsResult<Vec<Vec<u8>>> {
        if let Some(err) = self.faults.should_fault(FaultOp::ListXattr) {
            return Err(err);
        }
        trace!(path = %target.path().display(), max_size, "list_xattr");
        self.backend.list_xattr(target.ino, max_size)
    }

    pub fn remove_xattr(&self, target: &DirentRef, name: &[u8]) -> FsResult<()> {
        if let Some(err) = self.faults.should_fault(FaultOp::RemoveXattr) {
            return Err(err);
        }
        trace!(path = %target.path().display(), name = %name.escape_ascii(), "remove_xattr");
        self.backend.remove_xattr(target.ino, name)?;
        self.emit_event(EventKind::AttributesChanged {
            path: target.path().to_path_buf(),
        });
        Ok(())
    }

    pub fn set_fault_policy(&self, policy: FaultPolicy) {
        debug!(enabled = policy.enabled, rules = policy.rules.len(), "installing fault policy");
        self.faults.set_policy(policy);
    }

    pub fn clear_fault_policy(&self) {
        self.faults.clear();
    }

    pub fn fault_policy(&self) -> FaultPolicy {
        self.faults.snapshot()
    }

    // Event subscription operations
    #[cfg(feature = "events")]
    pub fn subscribe_events(&self, cb: Arc<dyn EventSink>) -> FsResult<SubscriptionId> {
        let mut subscriptions = self.event_subscriptions.lock().unwrap();
        let mut next_id = self.next_subscription_id.lock().unwrap();
        let subscription_id = SubscriptionId::new(*next_id);
        *next_id += 1;
        subscriptions.insert(subscription_id, cb);
        Ok(subscription_id)
    }

    #[cfg(feature = "events")]
    pub fn unsubscribe_events(&self, sub: SubscriptionId) -> FsResult<()> {
        let mut subscriptions = self.event_subscriptions.lock().unwrap();
        if subscriptions.remove(&sub).is_none() {
            return Err(FsError::NotFound);
        }
        Ok(())
    }

    #[cfg(feature = "events")]
    fn emit_event(&self, event: EventKind) {
        let subscriptions = self.event_subscriptions.lock().unwrap();
        for sink in subscriptions.values() {
            sink.on_event(&event);
        }
    }

    #[cfg(not(feature = "events"))]
    fn emit_event(&self, _event: EventKind) {}
}

/// Non-empty components of `path`, split on `/` byte-wise
fn split_components(path: &Path) -> VecDeque<OsString> {
    path.as_os_str()
        .as_bytes()
        .split(|&b| b == b'/')
        .filter(|c| !c.is_empty())
        .map(|c| OsStr::from_bytes(c).to_os_string())
        .collect()
}

/// Split into (parent path, final name), ignoring trailing slashes
fn split_parent(path: &Path) -> FsResult<(PathBuf, OsString)> {
    let bytes = path.as_os_str().as_bytes();
    let end = bytes.iter().rposition(|&b| b != b'/').map_or(0, |i| i + 1);
    let trimmed = &bytes[..end];
    if trimmed.is_empty() {
        // "/" or ""
        return Err(if bytes.is_empty() {
            FsError::NotFound
        } else {
            FsError::AlreadyExists
        });
    }
    let (parent, name): (&[u8], &[u8]) = match trimmed.iter().rposition(|&b| b == b'/') {
        Some(0) => (b"/", &trimmed[1..]),
        Some(slash) => (&trimmed[..slash], &trimmed[slash + 1..]),
        None => (b".", trimmed),
    };
    Ok((
        PathBuf::from(OsStr::from_bytes(parent)),
        OsStr::from_bytes(name).to_os_string(),
    ))
}
