// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Config file of the `sentry-xattr` binary: the VFS settings at the top
//! level plus an optional `[logging]` table.

use std::path::Path;

use anyhow::{Context, Result};
use sentry_logging::LoggingConfig;
use sentry_vfs::FsConfig;
use serde::Deserialize;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CliConfig {
    pub fs: FsConfig,
    pub logging: LoggingConfig,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct LoggingSection {
    logging: LoggingConfig,
}

impl CliConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let fs = FsConfig::from_toml_str(text)?;
        let logging = toml::from_str::<LoggingSection>(text)
            .context("invalid [logging] section")?
            .logging;
        Ok(Self { fs, logging })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("invalid config file {}", path.display()))
    }
}
