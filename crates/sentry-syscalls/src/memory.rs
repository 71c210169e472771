// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Guest memory access
//!
//! Syscall handlers never touch guest memory directly; every transfer goes
//! through a bounded [`GuestMemory`] copy. [`GuestMemoryMap`] is an
//! in-process address space made of disjoint regions, used by the CLI and
//! by tests.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// An address in the guest's address space
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GuestAddr(pub u64);

impl GuestAddr {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Returns the result of the add or None if there is overflow.
    pub fn checked_add(&self, len: u64) -> Option<GuestAddr> {
        self.0.checked_add(len).map(GuestAddr)
    }
}

impl fmt::Display for GuestAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("unmapped guest range {addr} (+{len})")]
    Fault { addr: GuestAddr, len: usize },
    #[error("no NUL terminator within {max_len} bytes at {addr}")]
    NameTooLong { addr: GuestAddr, max_len: usize },
}

/// Bounded copies between guest memory and host buffers
#[cfg_attr(test, mockall::automock)]
pub trait GuestMemory {
    /// Copy a NUL-terminated byte string of at most `max_len` bytes
    /// (terminator included) and return it without the terminator. The
    /// bytes are returned as they are; no encoding is assumed. Fails with
    /// `NameTooLong` when no NUL is found in that span.
    fn copy_in_cstr(&self, addr: GuestAddr, max_len: usize) -> Result<Vec<u8>, MemoryError>;

    /// Fill `buf` from guest memory starting at `addr`
    fn copy_in_bytes(&self, addr: GuestAddr, buf: &mut [u8]) -> Result<(), MemoryError>;

    /// Write `buf` to guest memory starting at `addr`
    fn copy_out_bytes(&self, addr: GuestAddr, buf: &[u8]) -> Result<(), MemoryError>;
}

struct Region {
    base: u64,
    bytes: Vec<u8>,
}

impl Region {
    fn end(&self) -> u64 {
        self.base + self.bytes.len() as u64
    }
}

/// Guest address space backed by host vectors
pub struct GuestMemoryMap {
    regions: Mutex<Vec<Region>>,
    copied_out: AtomicU64,
    copy_out_calls: AtomicU64,
}

impl GuestMemoryMap {
    /// Build an address space from `(base, size)` regions. Regions must not
    /// overlap, be empty, or wrap the address space; the zero page is never
    /// mapped.
    pub fn new(layout: &[(GuestAddr, usize)]) -> Result<Self, MemoryError> {
        let mut regions: Vec<Region> = Vec::with_capacity(layout.len());
        for &(base, size) in layout {
            let invalid = MemoryError::Fault { addr: base, len: size };
            if size == 0 || base.is_null() {
                return Err(invalid);
            }
            let end = base.checked_add(size as u64).ok_or(invalid.clone())?;
            if regions.iter().any(|r| base.0 < r.end() && r.base < end.0) {
                return Err(invalid);
            }
            regions.push(Region {
                base: base.0,
                bytes: vec![0; size],
            });
        }
        regions.sort_by_key(|r| r.base);
        Ok(Self {
            regions: Mutex::new(regions),
            copied_out: AtomicU64::new(0),
            copy_out_calls: AtomicU64::new(0),
        })
    }

    /// Total bytes written by `copy_out_bytes`
    pub fn bytes_copied_out(&self) -> u64 {
        self.copied_out.load(Ordering::SeqCst)
    }

    pub fn copy_out_calls(&self) -> u64 {
        self.copy_out_calls.load(Ordering::SeqCst)
    }

    pub fn reset_counters(&self) {
        self.copied_out.store(0, Ordering::SeqCst);
        self.copy_out_calls.store(0, Ordering::SeqCst);
    }

    /// Host-side write, not counted as a guest copy-out
    pub fn write(&self, addr: GuestAddr, data: &[u8]) -> Result<(), MemoryError> {
        self.with_range_mut(addr, data.len(), |dst| dst.copy_from_slice(data))
    }

    /// Host-side write of `s` followed by a NUL
    pub fn write_cstr(&self, addr: GuestAddr, s: impl AsRef<[u8]>) -> Result<(), MemoryError> {
        let mut bytes = s.as_ref().to_vec();
        bytes.push(0);
        self.write(addr, &bytes)
    }

    /// Host-side read
    pub fn read(&self, addr: GuestAddr, len: usize) -> Result<Vec<u8>, MemoryError> {
        let mut buf = vec![0; len];
        self.with_range_mut(addr, len, |src| buf.copy_from_slice(src))?;
        Ok(buf)
    }

    /// Run `f` on the host slice behind `[addr, addr + len)`, which must lie
    /// inside a single region
    fn with_range_mut<R>(
        &self,
        addr: GuestAddr,
        len: usize,
        f: impl FnOnce(&mut [u8]) -> R,
    ) -> Result<R, MemoryError> {
        let fault = MemoryError::Fault { addr, len };
        let end = addr.checked_add(len as u64).ok_or(fault.clone())?;
        let mut regions = self.regions.lock().unwrap();
        let region = regions
            .iter_mut()
            .find(|r| r.base <= addr.0 && end.0 <= r.end())
            .ok_or(fault)?;
        let start = (addr.0 - region.base) as usize;
        Ok(f(&mut region.bytes[start..start + len]))
    }
}

impl GuestMemory for GuestMemoryMap {
    fn copy_in_cstr(&self, addr: GuestAddr, max_len: usize) -> Result<Vec<u8>, MemoryError> {
        let regions = self.regions.lock().unwrap();
        let region = regions
            .iter()
            .find(|r| r.base <= addr.0 && addr.0 < r.end())
            .ok_or(MemoryError::Fault { addr, len: 1 })?;
        let start = (addr.0 - region.base) as usize;
        let available = &region.bytes[start..];
        let window = &available[..available.len().min(max_len)];
        match window.iter().position(|&b| b == 0) {
            Some(nul) => Ok(window[..nul].to_vec()),
            // The string runs past the end of the mapping
            None if window.len() < max_len => Err(MemoryError::Fault {
                addr,
                len: max_len,
            }),
            None => Err(MemoryError::NameTooLong { addr, max_len }),
        }
    }

    fn copy_in_bytes(&self, addr: GuestAddr, buf: &mut [u8]) -> Result<(), MemoryError> {
        if buf.is_empty() {
            return Ok(());
        }
        self.with_range_mut(addr, buf.len(), |src| buf.copy_from_slice(src))
    }

    fn copy_out_bytes(&self, addr: GuestAddr, buf: &[u8]) -> Result<(), MemoryError> {
        self.copy_out_calls.fetch_add(1, Ordering::SeqCst);
        if buf.is_empty() {
            return Ok(());
        }
        self.with_range_mut(addr, buf.len(), |dst| dst.copy_from_slice(buf))?;
        self.copied_out.fetch_add(buf.len() as u64, Ordering::SeqCst);
        Ok(())
    }
}
