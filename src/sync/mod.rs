//! Block Synchronization Module
//!
//! This module drives the local chain state forward from the remote block source. It is composed
//! of several submodules, each responsible for a specific aspect of the sync process:
//!
//! - `machine`: The pure sync state machine. Named triggers go in, actions come out.
//! - `controller`: Runs the fetch/apply loop the machine asks for, one height at a time, with a
//!   single-flight guard.
//! - `events`: Event types and handler traits used to report sync progress without coupling the
//!   controller to its observers.
//! - `progress_tracker`: Counts applied blocks for a run and logs progress at intervals.
//! - `types`: Errors, run outcomes and settings shared by the above.

/// Fetch/apply loop driver
pub mod controller;
/// Event system for decoupled progress reporting
pub mod events;
/// Pure sync state machine
pub mod machine;
/// Tracks blocks applied during a sync run
pub mod progress_tracker;
/// Shared sync types
pub mod types;

pub use controller::SyncController;
pub use events::ConsoleEventHandler;
pub use types::*;
