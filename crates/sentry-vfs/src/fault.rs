// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Fault injection policy + runtime controller for FsCore

use crate::FsError;
use libc::EIO;
use serde::{Deserialize, Serialize};
use std::io;
use std::sync::Mutex;

/// Backend operations that can be made to fail on demand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultOp {
    Lookup,
    GetXattr,
    SetXattr,
    ListXattr,
    RemoveXattr,
}

/// Supported errno values for synthetic failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultErrno {
    Eio,
    Enospc,
    Enodata,
}

impl FaultErrno {
    fn to_error(self) -> FsError {
        match self {
            FaultErrno::Eio => FsError::Io(io::Error::from_raw_os_error(EIO)),
            FaultErrno::Enospc => FsError::NoSpace,
            FaultErrno::Enodata => FsError::NoData,
        }
    }
}

/// Individual rule describing which op should fail and how often.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultRule {
    pub op: FaultOp,
    pub errno: FaultErrno,
    /// Leading invocations to let through before injecting faults.
    #[serde(default)]
    pub start_after: u64,
    #[serde(default)]
    pub max_faults: Option<u64>,
}

/// JSON-serializable policy, loaded by the CLI from `--fault-policy`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultPolicy {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub rules: Vec<FaultRule>,
}

impl FaultPolicy {
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn is_active(&self) -> bool {
        self.enabled && !self.rules.is_empty()
    }
}

#[derive(Clone, Debug, Default)]
struct RuleCounters {
    hits: u64,
    invocations: u64,
}

#[derive(Debug, Default)]
struct FaultState {
    policy: FaultPolicy,
    counters: Vec<RuleCounters>,
}

/// Runtime controller tracking the installed policy and per-rule hit counts.
#[derive(Debug, Default)]
pub struct FaultInjector {
    state: Mutex<FaultState>,
}

impl FaultInjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> FaultPolicy {
        self.state.lock().unwrap().policy.clone()
    }

    pub fn set_policy(&self, policy: FaultPolicy) {
        let mut guard = self.state.lock().unwrap();
        guard.counters = vec![RuleCounters::default(); policy.rules.len()];
        guard.policy = policy;
    }

    pub fn clear(&self) {
        self.set_policy(FaultPolicy::default());
    }

    /// Error to inject for this invocation of `op`, if any rule fires.
    pub fn should_fault(&self, op: FaultOp) -> Option<FsError> {
        let mut guard = self.state.lock().unwrap();
        if !guard.policy.enabled {
            return None;
        }
        let FaultState { policy, counters } = &mut *guard;
        for (rule, counter) in policy.rules.iter().zip(counters.iter_mut()) {
            if rule.op != op {
                continue;
            }
            counter.invocations = counter.invocations.saturating_add(1);
            if counter.invocations <= rule.start_after {
                continue;
            }
            if rule.max_faults.is_some_and(|max| counter.hits >= max) {
                continue;
            }
            counter.hits = counter.hits.saturating_add(1);
            return Some(rule.errno.to_error());
        }
        None
    }
}
