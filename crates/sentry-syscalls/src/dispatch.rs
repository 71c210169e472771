// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Syscall-number dispatch for the xattr family

use tracing::debug;

use crate::abi::*;
use crate::args::SyscallArgs;
use crate::errors::{errno_name, into_return_value, SyscallResult};
use crate::memory::GuestMemory;
use crate::resolve::XattrTarget;
use crate::task::Task;
use crate::xattr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum XattrSyscall {
    SetXattr,
    LSetXattr,
    FSetXattr,
    GetXattr,
    LGetXattr,
    FGetXattr,
    ListXattr,
    LListXattr,
    FListXattr,
    RemoveXattr,
    LRemoveXattr,
    FRemoveXattr,
}

impl XattrSyscall {
    pub const ALL: [XattrSyscall; 12] = [
        XattrSyscall::SetXattr,
        XattrSyscall::LSetXattr,
        XattrSyscall::FSetXattr,
        XattrSyscall::GetXattr,
        XattrSyscall::LGetXattr,
        XattrSyscall::FGetXattr,
        XattrSyscall::ListXattr,
        XattrSyscall::LListXattr,
        XattrSyscall::FListXattr,
        XattrSyscall::RemoveXattr,
        XattrSyscall::LRemoveXattr,
        XattrSyscall::FRemoveXattr,
    ];

    pub fn number(self) -> u64 {
        match self {
            XattrSyscall::SetXattr => SYS_SETXATTR,
            XattrSyscall::LSetXattr => SYS_LSETXATTR,
            XattrSyscall::FSetXattr => SYS_FSETXATTR,
            XattrSyscall::GetXattr => SYS_GETXATTR,
            XattrSyscall::LGetXattr => SYS_LGETXATTR,
            XattrSyscall::FGetXattr => SYS_FGETXATTR,
            XattrSyscall::ListXattr => SYS_LISTXATTR,
            XattrSyscall::LListXattr => SYS_LLISTXATTR,
            XattrSyscall::FListXattr => SYS_FLISTXATTR,
            XattrSyscall::RemoveXattr => SYS_REMOVEXATTR,
            XattrSyscall::LRemoveXattr => SYS_LREMOVEXATTR,
            XattrSyscall::FRemoveXattr => SYS_FREMOVEXATTR,
        }
    }

    pub fn from_number(nr: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|call| call.number() == nr)
    }

    pub fn name(self) -> &'static str {
        match self {
            XattrSyscall::SetXattr => "setxattr",
            XattrSyscall::LSetXattr => "lsetxattr",
            XattrSyscall::FSetXattr => "fsetxattr",
            XattrSyscall::GetXattr => "getxattr",
            XattrSyscall::LGetXattr => "lgetxattr",
            XattrSyscall::FGetXattr => "fgetxattr",
            XattrSyscall::ListXattr => "listxattr",
            XattrSyscall::LListXattr => "llistxattr",
            XattrSyscall::FListXattr => "flistxattr",
            XattrSyscall::RemoveXattr => "removexattr",
            XattrSyscall::LRemoveXattr => "lremovexattr",
            XattrSyscall::FRemoveXattr => "fremovexattr",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|call| call.name() == name)
    }

    /// Takes a descriptor rather than a path as its first argument
    pub fn uses_descriptor(self) -> bool {
        matches!(
            self,
            XattrSyscall::FSetXattr
                | XattrSyscall::FGetXattr
                | XattrSyscall::FListXattr
                | XattrSyscall::FRemoveXattr
        )
    }

    fn follows_final_symlink(self) -> bool {
        !matches!(
            self,
            XattrSyscall::LSetXattr
                | XattrSyscall::LGetXattr
                | XattrSyscall::LListXattr
                | XattrSyscall::LRemoveXattr
        )
    }

    fn target(self, args: &SyscallArgs) -> XattrTarget {
        if self.uses_descriptor() {
            XattrTarget::Descriptor(args.int(0))
        } else {
            XattrTarget::Path {
                addr: args.pointer(0),
                follow: self.follows_final_symlink(),
            }
        }
    }

    /// Run the syscall with raw register arguments
    pub fn dispatch<M: GuestMemory>(
        self,
        task: &Task<'_, M>,
        args: &SyscallArgs,
    ) -> SyscallResult<usize> {
        let target = self.target(args);
        match self {
            XattrSyscall::GetXattr | XattrSyscall::LGetXattr | XattrSyscall::FGetXattr => {
                xattr::get_xattr(task, target, args.pointer(1), args.pointer(2), args.size(3))
            }
            XattrSyscall::SetXattr | XattrSyscall::LSetXattr | XattrSyscall::FSetXattr => {
                xattr::set_xattr(
                    task,
                    target,
                    args.pointer(1),
                    args.pointer(2),
                    args.size(3),
                    args.uint(4),
                )
                .map(|()| 0)
            }
            XattrSyscall::ListXattr | XattrSyscall::LListXattr | XattrSyscall::FListXattr => {
                xattr::list_xattr(task, target, args.pointer(1), args.size(2))
            }
            XattrSyscall::RemoveXattr | XattrSyscall::LRemoveXattr | XattrSyscall::FRemoveXattr => {
                xattr::remove_xattr(task, target, args.pointer(1)).map(|()| 0)
            }
        }
    }
}

/// Entry point from the syscall table: returns the raw return register
/// value, `-ENOSYS` for numbers outside the xattr family
pub fn handle_syscall<M: GuestMemory>(task: &Task<'_, M>, nr: u64, args: &SyscallArgs) -> i64 {
    let Some(call) = XattrSyscall::from_number(nr) else {
        debug!(nr, "not an xattr syscall");
        return -(libc::ENOSYS as i64);
    };
    let ret = into_return_value(call.dispatch(task, args));
    if ret < 0 {
        debug!(
            pid = task.pid.as_u32(),
            syscall = call.name(),
            errno = errno_name(-ret as i32),
            "syscall failed"
        );
    }
    ret
}
