// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Configuration types for the sentry VFS

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Error raised while loading a configuration file
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("reading config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level VFS configuration
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FsConfig {
    pub security: SecurityPolicy,
    pub limits: FsLimits,
    pub xattrs: XattrPolicy,
}

impl FsConfig {
    /// Parse a configuration from TOML text; missing keys take their defaults
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load a configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

/// Permission enforcement policy
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SecurityPolicy {
    /// Evaluate owner/group/other mode bits on every access
    pub enforce_posix_permissions: bool,
    /// uid 0 bypasses mode bits (CAP_DAC_OVERRIDE)
    pub root_bypass_permissions: bool,
    /// Owner of the root directory and of nodes created by unregistered callers
    pub default_uid: u32,
    pub default_gid: u32,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self {
            enforce_posix_permissions: true,
            root_bypass_permissions: true,
            default_uid: 0,
            default_gid: 0,
        }
    }
}

/// Resource limits
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FsLimits {
    /// Maximum open descriptors per process
    pub max_open_handles: usize,
    /// Symlinks followed during one resolution before ELOOP
    pub max_symlink_traversals: u32,
}

impl Default for FsLimits {
    fn default() -> Self {
        Self {
            max_open_handles: 1024,
            max_symlink_traversals: 40,
        }
    }
}

/// Extended attribute support of the in-memory backend
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct XattrPolicy {
    /// When false every xattr call reports EOPNOTSUPP
    pub enabled: bool,
    /// Allow attributes on symlink inodes themselves
    pub symlink_xattrs: bool,
}

impl Default for XattrPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            symlink_xattrs: false,
        }
    }
}
