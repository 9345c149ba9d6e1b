//! # skiff-image
//!
//! Image retrieval for the skiff runtime.
//!
//! Handles:
//! - **Registry**: token authentication, manifest resolution, and blob
//!   download against a registry v2 endpoint.
//! - **Manifests**: extraction of the ordered layer list.
//! - **Layers**: sequential, path-traversal-guarded extraction into a
//!   merged root filesystem.
//! - **Hashing**: SHA-256 verification of downloaded blobs.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod hash;
pub mod layer;
pub mod manifest;
pub mod registry;
