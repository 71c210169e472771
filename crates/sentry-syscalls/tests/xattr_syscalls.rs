// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! End-to-end xattr syscall tests: guest memory, raw register arguments and
//! return values, against an in-memory filesystem.

use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::sync::Arc;

use sentry_syscalls::abi::*;
use sentry_syscalls::{handle_syscall, GuestAddr, GuestMemoryMap, SyscallArgs, Task, XattrSyscall};
use sentry_vfs::testing::mock_backend::{eio_error, FailureBehavior, MockInodeBackend};
use sentry_vfs::{
    FaultErrno, FaultOp, FaultPolicy, FaultRule, FsConfig, FsCore, MemBackend, ObjectType, OpenOptions, Owner,
    XattrPolicy, PID,
};

const PATH: GuestAddr = GuestAddr(0x1_0000);
const NAME: GuestAddr = GuestAddr(0x2_0000);
const VALUE: GuestAddr = GuestAddr(0x3_0000);
const LIST: GuestAddr = GuestAddr(0x6_0000);
const UNMAPPED: GuestAddr = GuestAddr(0xdead_0000);

const ROOT: u32 = 1;
const USER: u32 = 2;

fn neg(errno: i32) -> i64 {
    -(errno as i64)
}

struct Guest {
    core: FsCore,
    mem: GuestMemoryMap,
    root: PID,
}

impl Guest {
    fn new(core: FsCore) -> Self {
        let mem = GuestMemoryMap::new(&[
            (PATH, 2 * PATH_MAX),
            (NAME, 512),
            (VALUE, 2 * XATTR_SIZE_MAX),
            (LIST, 2 * XATTR_LIST_MAX),
        ])
        .unwrap();
        let root = core.register_process(ROOT, 0, 0, 0).unwrap();
        core.mkdir(&root, "/tmp", 0o777).unwrap();
        Self { core, mem, root }
    }

    fn in_memory() -> Self {
        Self::new(FsCore::in_memory(FsConfig::default()))
    }

    fn user(&self) -> PID {
        self.core.register_process(USER, ROOT, 1000, 1000).unwrap()
    }

    fn call(&self, pid: PID, call: XattrSyscall, regs: [u64; 6]) -> i64 {
        let task = Task::new(&self.core, pid, &self.mem);
        handle_syscall(&task, call.number(), &SyscallArgs::new(regs))
    }

    fn put_path(&self, path: impl AsRef<[u8]>) {
        self.mem.write_cstr(PATH, path).unwrap();
    }

    fn put_name(&self, name: impl AsRef<[u8]>) {
        self.mem.write_cstr(NAME, name).unwrap();
    }

    fn setxattr_as(
        &self,
        pid: PID,
        call: XattrSyscall,
        first: u64,
        name: impl AsRef<[u8]>,
        value: &[u8],
        flags: u32,
    ) -> i64 {
        self.put_name(name);
        self.mem.write(VALUE, value).unwrap();
        self.call(pid, call, [first, NAME.0, VALUE.0, value.len() as u64, flags as u64, 0])
    }

    fn setxattr(&self, path: &str, name: impl AsRef<[u8]>, value: &[u8], flags: u32) -> i64 {
        self.put_path(path);
        self.setxattr_as(self.root, XattrSyscall::SetXattr, PATH.0, name, value, flags)
    }

    fn getxattr_as(&self, pid: PID, call: XattrSyscall, first: u64, name: impl AsRef<[u8]>, size: usize) -> i64 {
        self.put_name(name);
        self.call(pid, call, [first, NAME.0, VALUE.0, size as u64, 0, 0])
    }

    fn getxattr(&self, path: &str, name: impl AsRef<[u8]>, size: usize) -> i64 {
        self.put_path(path);
        self.getxattr_as(self.root, XattrSyscall::GetXattr, PATH.0, name, size)
    }

    fn listxattr(&self, path: &str, size: usize) -> i64 {
        self.put_path(path);
        self.call(self.root, XattrSyscall::ListXattr, [PATH.0, LIST.0, size as u64, 0, 0, 0])
    }

    fn removexattr(&self, path: &str, name: impl AsRef<[u8]>) -> i64 {
        self.put_path(path);
        self.put_name(name);
        self.call(self.root, XattrSyscall::RemoveXattr, [PATH.0, NAME.0, 0, 0, 0, 0])
    }

    fn value(&self, len: usize) -> Vec<u8> {
        self.mem.read(VALUE, len).unwrap()
    }
}

#[test]
fn set_then_get_round_trips_the_value() {
    let guest = Guest::in_memory();
    guest.core.create_file(&guest.root, "/tmp/f", 0o644).unwrap();

    assert_eq!(guest.setxattr("/tmp/f", "user.foo", b"bar", 0), 0);
    // Clobber the buffer so the read below proves a fresh copy-out
    guest.mem.write(VALUE, b"xxxxxx").unwrap();

    assert_eq!(guest.getxattr("/tmp/f", "user.foo", 10), 3);
    assert_eq!(guest.value(3), b"bar");
    assert_eq!(guest.getxattr("/tmp/f", "user.missing", 10), neg(libc::ENODATA));
}

#[test]
fn empty_value_is_stored() {
    let guest = Guest::in_memory();
    guest.core.create_file(&guest.root, "/tmp/f", 0o644).unwrap();

    assert_eq!(guest.setxattr("/tmp/f", "user.empty", b"", 0), 0);
    assert_eq!(guest.getxattr("/tmp/f", "user.empty", 0), 0);
    assert_eq!(guest.getxattr("/tmp/f", "user.empty", 8), 0);
}

#[test]
fn zero_size_get_reports_length_without_copy_out() {
    let guest = Guest::in_memory();
    guest.core.create_file(&guest.root, "/tmp/f", 0o644).unwrap();
    assert_eq!(guest.setxattr("/tmp/f", "user.foo", b"bar", 0), 0);

    guest.mem.reset_counters();
    assert_eq!(guest.getxattr("/tmp/f", "user.foo", 0), 3);
    assert_eq!(guest.mem.copy_out_calls(), 0);
    assert_eq!(guest.mem.bytes_copied_out(), 0);

    assert_eq!(guest.getxattr("/tmp/f", "user.foo", 3), 3);
    assert_eq!(guest.mem.bytes_copied_out(), 3);
}

#[test]
fn short_buffer_is_out_of_range() {
    let guest = Guest::in_memory();
    guest.core.create_file(&guest.root, "/tmp/f", 0o644).unwrap();
    assert_eq!(guest.setxattr("/tmp/f", "user.foo", b"bar", 0), 0);

    guest.mem.reset_counters();
    assert_eq!(guest.getxattr("/tmp/f", "user.foo", 2), neg(libc::ERANGE));
    assert_eq!(guest.mem.bytes_copied_out(), 0);
}

#[test]
fn oversized_buffer_is_clamped() {
    let guest = Guest::in_memory();
    guest.core.create_file(&guest.root, "/tmp/f", 0o644).unwrap();
    assert_eq!(guest.setxattr("/tmp/f", "user.foo", b"bar", 0), 0);

    assert_eq!(guest.getxattr("/tmp/f", "user.foo", XATTR_SIZE_MAX + 4096), 3);
    assert_eq!(guest.value(3), b"bar");
}

#[test]
fn objects_without_xattr_support() {
    let guest = Guest::in_memory();
    guest
        .core
        .mknod(&guest.root, "/tmp/fifo", ObjectType::Fifo, 0o666)
        .unwrap();

    assert_eq!(guest.setxattr("/tmp/fifo", "user.foo", b"bar", 0), neg(libc::EPERM));
    assert_eq!(guest.getxattr("/tmp/fifo", "user.foo", 0), neg(libc::ENODATA));
    assert_eq!(guest.removexattr("/tmp/fifo", "user.foo"), neg(libc::EPERM));
    assert_eq!(guest.listxattr("/tmp/fifo", 0), 0);
}

#[test]
fn directories_carry_xattrs() {
    let guest = Guest::in_memory();
    assert_eq!(guest.setxattr("/tmp", "user.dir", b"1", 0), 0);
    assert_eq!(guest.getxattr("/tmp/", "user.dir", 4), 1);
}

#[test]
fn name_validation() {
    let guest = Guest::in_memory();
    guest.core.create_file(&guest.root, "/tmp/f", 0o644).unwrap();

    let long = format!("user.{}", "a".repeat(XATTR_NAME_MAX));
    assert_eq!(guest.setxattr("/tmp/f", &long, b"v", 0), neg(libc::ERANGE));
    assert_eq!(guest.getxattr("/tmp/f", &long, 0), neg(libc::ERANGE));
    assert_eq!(guest.setxattr("/tmp/f", "", b"v", 0), neg(libc::ERANGE));
    assert_eq!(guest.getxattr("/tmp/f", "", 0), neg(libc::ERANGE));

    // Exactly XATTR_NAME_MAX bytes is accepted
    let max = format!("user.{}", "a".repeat(XATTR_NAME_MAX - XATTR_USER_PREFIX.len()));
    assert_eq!(guest.setxattr("/tmp/f", &max, b"v", 0), 0);

    for name in ["trusted.x", "security.selinux", "system.posix_acl_access", "user"] {
        assert_eq!(guest.setxattr("/tmp/f", name, b"v", 0), neg(libc::EOPNOTSUPP), "{name}");
        assert_eq!(guest.getxattr("/tmp/f", name, 0), neg(libc::EOPNOTSUPP), "{name}");
    }
}

#[test]
fn set_flags() {
    let guest = Guest::in_memory();
    guest.core.create_file(&guest.root, "/tmp/f", 0o644).unwrap();

    assert_eq!(guest.setxattr("/tmp/f", "user.a", b"1", 0x4), neg(libc::EINVAL));
    assert_eq!(
        guest.setxattr("/tmp/f", "user.a", b"1", XATTR_CREATE | 0x100),
        neg(libc::EINVAL)
    );

    assert_eq!(guest.setxattr("/tmp/f", "user.a", b"1", XATTR_REPLACE), neg(libc::ENODATA));
    assert_eq!(guest.setxattr("/tmp/f", "user.a", b"1", XATTR_CREATE), 0);
    assert_eq!(guest.setxattr("/tmp/f", "user.a", b"2", XATTR_CREATE), neg(libc::EEXIST));
    assert_eq!(guest.setxattr("/tmp/f", "user.a", b"22", XATTR_REPLACE), 0);
    assert_eq!(guest.getxattr("/tmp/f", "user.a", 8), 2);
    assert_eq!(guest.value(2), b"22");
}

#[test]
fn invalid_flags_win_over_permission_checks() {
    let guest = Guest::in_memory();
    guest.core.mknod(&guest.root, "/tmp/fifo", ObjectType::Fifo, 0o666).unwrap();
    guest.core.create_file(&guest.root, "/tmp/private", 0o600).unwrap();
    let user = guest.user();

    // The type restriction alone gives EPERM
    assert_eq!(guest.setxattr("/tmp/fifo", "user.a", b"1", 0), neg(libc::EPERM));
    assert_eq!(guest.setxattr("/tmp/fifo", "user.a", b"1", 0x4), neg(libc::EINVAL));

    // The mode bits alone give EACCES
    guest.put_path("/tmp/private");
    let set = guest.setxattr_as(user, XattrSyscall::SetXattr, PATH.0, "user.a", b"1", 0);
    assert_eq!(set, neg(libc::EACCES));
    let set = guest.setxattr_as(user, XattrSyscall::SetXattr, PATH.0, "user.a", b"1", 0x4);
    assert_eq!(set, neg(libc::EINVAL));
}

#[test]
fn value_and_name_length_boundaries() {
    let guest = Guest::in_memory();
    guest.core.create_file(&guest.root, "/tmp/f", 0o644).unwrap();

    for len in [0, 1, XATTR_SIZE_MAX - 1, XATTR_SIZE_MAX] {
        let value: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        assert_eq!(guest.setxattr("/tmp/f", "user.v", &value, 0), 0, "len {len}");
        assert_eq!(guest.getxattr("/tmp/f", "user.v", 0), len as i64, "len {len}");
        if len > 0 {
            assert_eq!(guest.getxattr("/tmp/f", "user.v", len - 1), neg(libc::ERANGE), "len {len}");
            assert_eq!(guest.getxattr("/tmp/f", "user.v", len), len as i64, "len {len}");
            assert!(guest.value(len) == value, "len {len}");
        }
    }

    let name_of = |len: usize| {
        let mut name = XATTR_USER_PREFIX.as_bytes().to_vec();
        name.resize(len, b'n');
        name
    };
    let cases = [
        (name_of(XATTR_USER_PREFIX.len()), 0),
        (name_of(XATTR_NAME_MAX - 1), 0),
        (name_of(XATTR_NAME_MAX), 0),
        (name_of(XATTR_NAME_MAX + 1), neg(libc::ERANGE)),
    ];
    for (name, expected) in cases {
        let len = name.len();
        assert_eq!(guest.setxattr("/tmp/f", &name, b"x", 0), expected, "name len {len}");
        let get = if expected == 0 { 1 } else { expected };
        assert_eq!(guest.getxattr("/tmp/f", &name, 8), get, "name len {len}");
    }
}

#[test]
fn non_utf8_names_stay_distinct() {
    let guest = Guest::in_memory();
    guest.core.create_file(&guest.root, "/tmp/f", 0o644).unwrap();

    assert_eq!(guest.setxattr("/tmp/f", b"user.\xff", b"A", 0), 0);
    assert_eq!(guest.getxattr("/tmp/f", b"user.\xfe", 8), neg(libc::ENODATA));
    assert_eq!(guest.getxattr("/tmp/f", b"user.\xff", 8), 1);
    assert_eq!(guest.value(1), b"A");

    assert_eq!(guest.setxattr("/tmp/f", b"user.\xfe", b"B", XATTR_CREATE), 0);
    let expected = b"user.\xfe\0user.\xff\0";
    assert_eq!(guest.listxattr("/tmp/f", 64), expected.len() as i64);
    assert_eq!(guest.mem.read(LIST, expected.len()).unwrap(), expected);

    // Paths are byte strings too
    guest
        .core
        .create_file(&guest.root, OsStr::from_bytes(b"/tmp/\xff"), 0o644)
        .unwrap();
    guest.put_path(b"/tmp/\xff");
    let set = guest.setxattr_as(guest.root, XattrSyscall::SetXattr, PATH.0, "user.p", b"1", 0);
    assert_eq!(set, 0);
    guest.put_path(b"/tmp/\xfe");
    let get = guest.getxattr_as(guest.root, XattrSyscall::GetXattr, PATH.0, "user.p", 8);
    assert_eq!(get, neg(libc::ENOENT));
}

#[test]
fn value_size_limit() {
    let guest = Guest::in_memory();
    guest.core.create_file(&guest.root, "/tmp/f", 0o644).unwrap();

    let max = vec![7u8; XATTR_SIZE_MAX];
    assert_eq!(guest.setxattr("/tmp/f", "user.big", &max, 0), 0);
    assert_eq!(guest.getxattr("/tmp/f", "user.big", 0), XATTR_SIZE_MAX as i64);

    let over = vec![7u8; XATTR_SIZE_MAX + 1];
    assert_eq!(guest.setxattr("/tmp/f", "user.huge", &over, 0), neg(libc::E2BIG));
}

#[test]
fn bad_guest_pointers_fault() {
    let guest = Guest::in_memory();
    guest.core.create_file(&guest.root, "/tmp/f", 0o644).unwrap();
    assert_eq!(guest.setxattr("/tmp/f", "user.foo", b"bar", 0), 0);

    let get = guest.call(
        guest.root,
        XattrSyscall::GetXattr,
        [UNMAPPED.0, NAME.0, VALUE.0, 8, 0, 0],
    );
    assert_eq!(get, neg(libc::EFAULT));

    guest.put_path("/tmp/f");
    let get = guest.call(
        guest.root,
        XattrSyscall::GetXattr,
        [PATH.0, NAME.0, UNMAPPED.0, 8, 0, 0],
    );
    assert_eq!(get, neg(libc::EFAULT));

    let set = guest.call(
        guest.root,
        XattrSyscall::SetXattr,
        [PATH.0, NAME.0, UNMAPPED.0, 3, 0, 0],
    );
    assert_eq!(set, neg(libc::EFAULT));
}

#[test]
fn path_errors() {
    let guest = Guest::in_memory();
    guest.core.create_file(&guest.root, "/tmp/f", 0o644).unwrap();

    assert_eq!(guest.getxattr("/tmp/nope", "user.foo", 0), neg(libc::ENOENT));
    assert_eq!(guest.getxattr("", "user.foo", 0), neg(libc::ENOENT));
    assert_eq!(guest.getxattr("/tmp/f/", "user.foo", 0), neg(libc::ENOTDIR));
    assert_eq!(guest.getxattr("/tmp/f/x", "user.foo", 0), neg(libc::ENOTDIR));

    let long = format!("/{}", "a".repeat(PATH_MAX));
    assert_eq!(guest.getxattr(&long, "user.foo", 0), neg(libc::ENAMETOOLONG));
}

#[test]
fn relative_paths_use_the_working_directory() {
    let guest = Guest::in_memory();
    guest.core.create_file(&guest.root, "/tmp/f", 0o644).unwrap();
    guest.core.set_cwd(&guest.root, "/tmp").unwrap();

    assert_eq!(guest.setxattr("f", "user.rel", b"r", 0), 0);
    assert_eq!(guest.getxattr("/tmp/f", "user.rel", 0), 1);
    assert_eq!(guest.getxattr("../tmp/./f", "user.rel", 0), 1);
}

#[test]
fn descriptor_variants() {
    let guest = Guest::in_memory();
    guest.core.create_file(&guest.root, "/tmp/f", 0o644).unwrap();
    let opts = OpenOptions {
        read: true,
        ..Default::default()
    };
    let fd = guest.core.open(&guest.root, "/tmp/f", &opts).unwrap();

    let set = guest.setxattr_as(guest.root, XattrSyscall::FSetXattr, fd as u64, "user.fd", b"via-fd", 0);
    assert_eq!(set, 0);
    let get = guest.getxattr_as(guest.root, XattrSyscall::FGetXattr, fd as u64, "user.fd", 16);
    assert_eq!(get, 6);
    assert_eq!(guest.value(6), b"via-fd");

    let list = guest.call(guest.root, XattrSyscall::FListXattr, [fd as u64, LIST.0, 64, 0, 0, 0]);
    assert_eq!(list, 8);

    guest.put_name("user.fd");
    let remove = guest.call(guest.root, XattrSyscall::FRemoveXattr, [fd as u64, NAME.0, 0, 0, 0, 0]);
    assert_eq!(remove, 0);
    assert_eq!(guest.getxattr("/tmp/f", "user.fd", 0), neg(libc::ENODATA));

    // Unknown and negative descriptors
    let get = guest.getxattr_as(guest.root, XattrSyscall::FGetXattr, 99, "user.fd", 0);
    assert_eq!(get, neg(libc::EBADF));
    let get = guest.getxattr_as(guest.root, XattrSyscall::FGetXattr, (-1i64) as u64, "user.fd", 0);
    assert_eq!(get, neg(libc::EBADF));

    guest.core.close(&guest.root, fd).unwrap();
    let get = guest.getxattr_as(guest.root, XattrSyscall::FGetXattr, fd as u64, "user.fd", 0);
    assert_eq!(get, neg(libc::EBADF));
}

#[test]
fn descriptor_outlives_unlink() {
    let guest = Guest::in_memory();
    guest.core.create_file(&guest.root, "/tmp/f", 0o644).unwrap();
    let baseline = guest.core.live_refs();
    let opts = OpenOptions {
        read: true,
        ..Default::default()
    };
    let fd = guest.core.open(&guest.root, "/tmp/f", &opts).unwrap();

    let set = guest.setxattr_as(guest.root, XattrSyscall::FSetXattr, fd as u64, "user.a", b"1", 0);
    assert_eq!(set, 0);
    guest.core.unlink(&guest.root, "/tmp/f").unwrap();
    assert_eq!(guest.getxattr("/tmp/f", "user.a", 0), neg(libc::ENOENT));

    let get = guest.getxattr_as(guest.root, XattrSyscall::FGetXattr, fd as u64, "user.a", 8);
    assert_eq!(get, 1);
    assert_eq!(guest.value(1), b"1");
    let set = guest.setxattr_as(guest.root, XattrSyscall::FSetXattr, fd as u64, "user.b", b"22", 0);
    assert_eq!(set, 0);
    let list = guest.call(guest.root, XattrSyscall::FListXattr, [fd as u64, LIST.0, 64, 0, 0, 0]);
    assert_eq!(list, 14);

    guest.core.close(&guest.root, fd).unwrap();
    assert_eq!(guest.core.live_refs(), baseline);

    // A new file under the old name starts without attributes
    guest.core.create_file(&guest.root, "/tmp/f", 0o644).unwrap();
    assert_eq!(guest.getxattr("/tmp/f", "user.a", 0), neg(libc::ENODATA));
}

#[test]
fn path_only_descriptors_are_refused() {
    let guest = Guest::in_memory();
    guest.core.create_file(&guest.root, "/tmp/f", 0o644).unwrap();
    let opts = OpenOptions {
        path_only: true,
        ..Default::default()
    };
    let fd = guest.core.open(&guest.root, "/tmp/f", &opts).unwrap();

    let set = guest.setxattr_as(guest.root, XattrSyscall::FSetXattr, fd as u64, "user.a", b"1", 0);
    assert_eq!(set, neg(libc::EBADF));
    let get = guest.getxattr_as(guest.root, XattrSyscall::FGetXattr, fd as u64, "user.a", 0);
    assert_eq!(get, neg(libc::EBADF));
    let list = guest.call(guest.root, XattrSyscall::FListXattr, [fd as u64, LIST.0, 0, 0, 0, 0]);
    assert_eq!(list, neg(libc::EBADF));
}

#[test]
fn descriptor_checks_permissions_not_open_mode() {
    let guest = Guest::in_memory();
    guest.core.create_file(&guest.root, "/tmp/f", 0o666).unwrap();
    let user = guest.user();
    let opts = OpenOptions {
        read: true,
        ..Default::default()
    };
    let fd = guest.core.open(&user, "/tmp/f", &opts).unwrap();

    // Read-only descriptor, but the mode bits grant write
    let set = guest.setxattr_as(user, XattrSyscall::FSetXattr, fd as u64, "user.a", b"1", 0);
    assert_eq!(set, 0);
}

#[test]
fn symlinks_without_symlink_xattrs() {
    let guest = Guest::in_memory();
    guest.core.create_file(&guest.root, "/tmp/f", 0o644).unwrap();
    guest.core.symlink(&guest.root, "/tmp/f", "/tmp/link").unwrap();

    // The path variant follows the link and reaches the file
    assert_eq!(guest.setxattr("/tmp/link", "user.t", b"target", 0), 0);
    assert_eq!(guest.getxattr("/tmp/f", "user.t", 16), 6);

    guest.put_path("/tmp/link");
    let lset = guest.setxattr_as(guest.root, XattrSyscall::LSetXattr, PATH.0, "user.l", b"1", 0);
    assert_eq!(lset, neg(libc::EPERM));
    let lget = guest.getxattr_as(guest.root, XattrSyscall::LGetXattr, PATH.0, "user.t", 0);
    assert_eq!(lget, neg(libc::ENODATA));
    let llist = guest.call(guest.root, XattrSyscall::LListXattr, [PATH.0, LIST.0, 0, 0, 0, 0]);
    assert_eq!(llist, 0);
}

#[test]
fn symlinks_with_symlink_xattrs() {
    let config = FsConfig {
        xattrs: XattrPolicy {
            enabled: true,
            symlink_xattrs: true,
        },
        ..FsConfig::default()
    };
    let guest = Guest::new(FsCore::in_memory(config));
    guest.core.create_file(&guest.root, "/tmp/f", 0o644).unwrap();
    guest.core.symlink(&guest.root, "/tmp/f", "/tmp/link").unwrap();

    guest.put_path("/tmp/link");
    let lset = guest.setxattr_as(guest.root, XattrSyscall::LSetXattr, PATH.0, "user.on-link", b"L", 0);
    assert_eq!(lset, 0);
    let lget = guest.getxattr_as(guest.root, XattrSyscall::LGetXattr, PATH.0, "user.on-link", 4);
    assert_eq!(lget, 1);

    // The attribute lives on the link, not on its target
    assert_eq!(guest.getxattr("/tmp/link", "user.on-link", 0), neg(libc::ENODATA));
    assert_eq!(guest.getxattr("/tmp/f", "user.on-link", 0), neg(libc::ENODATA));
}

#[test]
fn dangling_symlink() {
    let guest = Guest::in_memory();
    guest.core.symlink(&guest.root, "/tmp/gone", "/tmp/dangling").unwrap();
    assert_eq!(guest.getxattr("/tmp/dangling", "user.x", 0), neg(libc::ENOENT));
}

#[test]
fn permission_checks_for_other_users() {
    let guest = Guest::in_memory();
    guest.core.create_file(&guest.root, "/tmp/ro", 0o644).unwrap();
    guest.core.create_file(&guest.root, "/tmp/private", 0o600).unwrap();
    assert_eq!(guest.setxattr("/tmp/ro", "user.a", b"1", 0), 0);
    assert_eq!(guest.setxattr("/tmp/private", "user.a", b"1", 0), 0);
    let user = guest.user();

    guest.put_path("/tmp/ro");
    assert_eq!(guest.getxattr_as(user, XattrSyscall::GetXattr, PATH.0, "user.a", 0), 1);
    let set = guest.setxattr_as(user, XattrSyscall::SetXattr, PATH.0, "user.b", b"2", 0);
    assert_eq!(set, neg(libc::EACCES));
    guest.put_name("user.a");
    let remove = guest.call(user, XattrSyscall::RemoveXattr, [PATH.0, NAME.0, 0, 0, 0, 0]);
    assert_eq!(remove, neg(libc::EACCES));

    guest.put_path("/tmp/private");
    let get = guest.getxattr_as(user, XattrSyscall::GetXattr, PATH.0, "user.a", 0);
    assert_eq!(get, neg(libc::EACCES));
    let list = guest.call(user, XattrSyscall::ListXattr, [PATH.0, LIST.0, 0, 0, 0, 0]);
    assert_eq!(list, neg(libc::EACCES));

    // Ownership moves the owner bits to the user
    guest.core.set_owner(&guest.root, "/tmp/private", 1000, 1000).unwrap();
    assert_eq!(guest.getxattr_as(user, XattrSyscall::GetXattr, PATH.0, "user.a", 0), 1);
}

#[test]
fn permission_is_checked_before_the_name() {
    let guest = Guest::in_memory();
    guest.core.create_file(&guest.root, "/tmp/private", 0o600).unwrap();
    let user = guest.user();

    guest.put_path("/tmp/private");
    let get = guest.getxattr_as(user, XattrSyscall::GetXattr, PATH.0, "trusted.x", 0);
    assert_eq!(get, neg(libc::EACCES));
}

#[test]
fn list_returns_user_names_only() {
    let guest = Guest::new(FsCore::new(
        FsConfig::default(),
        Arc::new(MemBackend::new(XattrPolicy::default(), Owner { uid: 0, gid: 0 })),
    ));
    guest.core.create_file(&guest.root, "/tmp/f", 0o644).unwrap();
    assert_eq!(guest.setxattr("/tmp/f", "user.b", b"2", 0), 0);
    assert_eq!(guest.setxattr("/tmp/f", "user.a", b"1", 0), 0);
    // Stored behind the syscall layer, never listed
    let f = guest.core.resolve(&guest.root, "/tmp/f", true).unwrap();
    guest.core.set_xattr(&f, b"trusted.hidden", b"h", 0).unwrap();

    let expected = b"user.a\0user.b\0";
    assert_eq!(guest.listxattr("/tmp/f", 0), expected.len() as i64);
    assert_eq!(guest.listxattr("/tmp/f", 4), neg(libc::ERANGE));
    assert_eq!(guest.listxattr("/tmp/f", 64), expected.len() as i64);
    assert_eq!(guest.mem.read(LIST, expected.len()).unwrap(), expected);

    guest.core.create_file(&guest.root, "/tmp/bare", 0o644).unwrap();
    assert_eq!(guest.listxattr("/tmp/bare", 64), 0);
}

#[test]
fn remove_family() {
    let guest = Guest::in_memory();
    guest.core.create_file(&guest.root, "/tmp/f", 0o644).unwrap();
    assert_eq!(guest.setxattr("/tmp/f", "user.gone", b"x", 0), 0);

    assert_eq!(guest.removexattr("/tmp/f", "user.gone"), 0);
    assert_eq!(guest.getxattr("/tmp/f", "user.gone", 0), neg(libc::ENODATA));
    assert_eq!(guest.removexattr("/tmp/f", "user.gone"), neg(libc::ENODATA));
    assert_eq!(guest.removexattr("/tmp/f", "trusted.x"), neg(libc::EOPNOTSUPP));
    assert_eq!(guest.removexattr("/tmp/f", ""), neg(libc::ERANGE));
}

#[test]
fn disabled_backend_reports_not_supported() {
    let config = FsConfig {
        xattrs: XattrPolicy {
            enabled: false,
            symlink_xattrs: false,
        },
        ..FsConfig::default()
    };
    let guest = Guest::new(FsCore::in_memory(config));
    guest.core.create_file(&guest.root, "/tmp/f", 0o644).unwrap();

    assert_eq!(guest.setxattr("/tmp/f", "user.a", b"1", 0), neg(libc::EOPNOTSUPP));
    assert_eq!(guest.getxattr("/tmp/f", "user.a", 0), neg(libc::EOPNOTSUPP));
}

#[test]
fn references_are_released_on_every_path() {
    let guest = Guest::in_memory();
    guest.core.create_file(&guest.root, "/tmp/f", 0o600).unwrap();
    guest.core.symlink(&guest.root, "/tmp/f", "/tmp/link").unwrap();
    let user = guest.user();
    let baseline = guest.core.live_refs();

    assert_eq!(guest.setxattr("/tmp/f", "user.a", b"1", 0), 0);
    assert_eq!(guest.getxattr("/tmp/link", "user.a", 8), 1);
    assert_eq!(guest.listxattr("/tmp/f", 0), 7);
    assert_eq!(guest.getxattr("/tmp/f", "user.a", 0x1), 1);
    assert_eq!(guest.core.live_refs(), baseline);

    // Failures after resolution
    assert_eq!(guest.getxattr("/tmp/f", "user.missing", 0), neg(libc::ENODATA));
    assert_eq!(guest.getxattr("/tmp/f", "trusted.a", 0), neg(libc::EOPNOTSUPP));
    assert_eq!(guest.setxattr("/tmp/f", "user.a", b"1", 0x8), neg(libc::EINVAL));
    assert_eq!(guest.getxattr("/tmp/f/", "user.a", 0), neg(libc::ENOTDIR));
    guest.put_path("/tmp/f");
    assert_eq!(guest.getxattr_as(user, XattrSyscall::GetXattr, PATH.0, "user.a", 0), neg(libc::EACCES));
    assert_eq!(guest.core.live_refs(), baseline);

    // Descriptor targets borrow the open file without leaking it
    let fd = guest.core.open(&guest.root, "/tmp/f", &OpenOptions::default()).unwrap();
    let with_fd = guest.core.live_refs();
    assert_eq!(guest.getxattr_as(guest.root, XattrSyscall::FGetXattr, fd as u64, "user.a", 8), 1);
    assert_eq!(guest.getxattr_as(guest.root, XattrSyscall::FGetXattr, fd as u64, "user.b", 8), neg(libc::ENODATA));
    assert_eq!(guest.core.live_refs(), with_fd);
    guest.core.close(&guest.root, fd).unwrap();
    assert_eq!(guest.core.live_refs(), baseline);
}

#[test]
fn injected_backend_faults_surface_as_errno() {
    let guest = Guest::in_memory();
    guest.core.create_file(&guest.root, "/tmp/f", 0o644).unwrap();
    assert_eq!(guest.setxattr("/tmp/f", "user.a", b"1", 0), 0);

    guest.core.set_fault_policy(FaultPolicy {
        enabled: true,
        rules: vec![FaultRule {
            op: FaultOp::GetXattr,
            errno: FaultErrno::Eio,
            start_after: 1,
            max_faults: Some(1),
        }],
    });
    assert_eq!(guest.getxattr("/tmp/f", "user.a", 0), 1);
    assert_eq!(guest.getxattr("/tmp/f", "user.a", 0), neg(libc::EIO));
    assert_eq!(guest.getxattr("/tmp/f", "user.a", 0), 1);

    guest.core.clear_fault_policy();
    assert_eq!(guest.setxattr("/tmp/f", "user.b", b"2", 0), 0);
}

#[test]
fn mock_backend_failures_and_growing_values() {
    let inner = Arc::new(MemBackend::new(XattrPolicy::default(), Owner { uid: 0, gid: 0 }));
    let mock = Arc::new(MockInodeBackend::new(inner));
    let guest = Guest::new(FsCore::new(FsConfig::default(), mock.clone()));
    guest.core.create_file(&guest.root, "/tmp/f", 0o644).unwrap();
    assert_eq!(guest.setxattr("/tmp/f", "user.a", b"abc", 0), 0);
    assert_eq!(mock.call_count("set_xattr"), 1);

    // A value that grew past the requested size
    mock.grow_values_by(2);
    assert_eq!(guest.getxattr("/tmp/f", "user.a", 4), neg(libc::ERANGE));
    // A zero-size get asks for the maximum, so the grown value still fits
    assert_eq!(guest.getxattr("/tmp/f", "user.a", 0), 5);
    mock.grow_values_by(0);

    mock.set_behavior(FailureBehavior::AlwaysFail {
        op: "set_xattr",
        error_fn: Arc::new(eio_error),
    });
    assert_eq!(guest.setxattr("/tmp/f", "user.b", b"1", 0), neg(libc::EIO));
    assert_eq!(guest.getxattr("/tmp/f", "user.a", 8), 3);

    mock.set_behavior(FailureBehavior::AlwaysSucceed);
    mock.reset_counters();
    guest.core.symlink(&guest.root, "/tmp/f", "/tmp/link").unwrap();
    mock.set_symlink_xattrs(true);
    guest.put_path("/tmp/link");
    let lset = guest.setxattr_as(guest.root, XattrSyscall::LSetXattr, PATH.0, "user.l", b"1", 0);
    assert_eq!(lset, 0);
    assert_eq!(mock.call_count("set_xattr"), 1);
}

#[test]
fn unknown_syscall_numbers() {
    let guest = Guest::in_memory();
    let task = Task::new(&guest.core, guest.root, &guest.mem);
    assert_eq!(handle_syscall(&task, 0, &SyscallArgs::default()), neg(libc::ENOSYS));
    assert_eq!(handle_syscall(&task, 500, &SyscallArgs::default()), neg(libc::ENOSYS));
}
