// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Library half of the `sentry-xattr` binary

pub mod config;
pub mod script;

pub use config::CliConfig;
pub use script::{Expect, Script, ScriptReport, ScriptRunner, ScriptStep, Step, StepOutcome, XattrArgs};

/// Component name used for log filtering and the default log file
pub const COMPONENT: &str = "sentry-cli";
