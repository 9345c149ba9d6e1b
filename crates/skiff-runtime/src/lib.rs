//! Run orchestration for the skiff runtime.
//!
//! One run pulls an image, materializes it into a scratch root filesystem,
//! executes a command inside it under isolation, and hands back the
//! command's output and exit code.

#![allow(unsafe_code)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod backend;
pub mod engine;
pub mod exec;
pub mod scratch;
