//! # skiff-core
//!
//! Low-level Linux isolation primitives for the skiff runtime.
//!
//! This crate provides safe abstractions over:
//! - **Namespaces**: PID and mount isolation via `unshare(2)`.
//! - **Filesystem**: root changes, `proc` mounts, and symlink-safe path
//!   resolution inside a root filesystem.
//! - **Isolation**: an explicit [`isolation::IsolationConfig`] describing the
//!   boundary a command runs under, applied only inside the spawned child.
//!
//! All unsafe system calls are encapsulated in safe wrappers with
//! `// SAFETY:` documentation.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod filesystem;
pub mod isolation;
#[cfg(target_os = "linux")]
pub mod namespace;
