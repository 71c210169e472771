// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Test-only utilities for the sentry VFS
//!
//! Enabled for this crate's own tests and, through the `testing` feature, for
//! the tests of crates that build on `FsCore`.

pub mod mock_backend;
