//! Filesystem management for command isolation.
//!
//! Provides the root change, pseudo-filesystem mounts, and resolution of
//! paths as the isolated command will see them.

#[cfg(target_os = "linux")]
pub mod chroot;
#[cfg(target_os = "linux")]
pub mod mount;
pub mod resolve;
