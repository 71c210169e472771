// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Calling-task context handed to syscall handlers

use sentry_vfs::{FsCore, PID};

use crate::memory::GuestMemory;

/// The process issuing a syscall: its filesystem view and its memory
pub struct Task<'a, M: GuestMemory> {
    pub core: &'a FsCore,
    pub pid: PID,
    pub mem: &'a M,
}

impl<'a, M: GuestMemory> Task<'a, M> {
    pub fn new(core: &'a FsCore, pid: PID, mem: &'a M) -> Self {
        Self { core, pid, mem }
    }
}
