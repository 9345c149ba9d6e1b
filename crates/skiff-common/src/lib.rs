//! # skiff-common
//!
//! Shared types, error definitions, configuration models, and constants
//! used across the entire skiff workspace.
//!
//! This crate is the leaf of the dependency graph: it depends on no other
//! internal crate and provides the primitives the registry client, the
//! layer materializer, and the executor all pass between each other.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod config;
pub mod constants;
pub mod error;
pub mod types;
