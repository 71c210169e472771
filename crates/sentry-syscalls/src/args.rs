// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Raw syscall argument registers

use crate::memory::GuestAddr;

/// The six argument registers of a syscall, as the guest left them
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyscallArgs(pub [u64; 6]);

impl SyscallArgs {
    pub fn new(regs: [u64; 6]) -> Self {
        Self(regs)
    }

    fn reg(&self, index: usize) -> u64 {
        self.0.get(index).copied().unwrap_or(0)
    }

    /// Low 32 bits as a signed int (descriptors)
    pub fn int(&self, index: usize) -> i32 {
        self.reg(index) as u32 as i32
    }

    /// Low 32 bits as an unsigned int (flags)
    pub fn uint(&self, index: usize) -> u32 {
        self.reg(index) as u32
    }

    pub fn size(&self, index: usize) -> usize {
        self.reg(index) as usize
    }

    pub fn pointer(&self, index: usize) -> GuestAddr {
        GuestAddr(self.reg(index))
    }
}
