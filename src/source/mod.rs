//! Block source integration.
//!
//! This module provides the client and types for pulling blocks, one height at a time, from the
//! remote block endpoint. The source answers either with a block or with an absence marker that
//! signals the caller has reached the current tip.

/// HTTP client for the remote block endpoint
mod client;
/// Type definitions for block source data structures
mod types;

pub use client::{BlockSource, HttpBlockSource};
pub use types::*;
