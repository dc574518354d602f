use crate::chain::ChainError;
use crate::source::SourceError;

use std::time::Duration;

/// Errors that stop a sync run
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
	#[error("Transport error at height {height}: {source}")]
	Transport {
		height: u64,
		#[source]
		source: SourceError,
	},

	#[error("Validation error at height {height}: {source}")]
	Validation {
		height: u64,
		#[source]
		source: ChainError,
	},
}

impl SyncError {
	/// Height the run stopped at.
	pub fn height(&self) -> u64 {
		match self {
			SyncError::Transport { height, .. } | SyncError::Validation { height, .. } => *height,
		}
	}
}

/// What a trigger into the controller ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncRun {
	/// A loop ran until the source reported no further block.
	Completed { applied: u64, height: u64 },
	/// The state machine had nothing to run for this trigger.
	Skipped,
	/// Another loop invocation was already in flight.
	Busy,
}

/// Tunables for the sync controller.
#[derive(Debug, Clone)]
pub struct SyncSettings {
	/// Retry transport errors with exponential backoff for at most this long. `None` halts on the
	/// first transport error.
	pub retry_window: Option<Duration>,
	/// Log progress every N applied blocks.
	pub progress_log_interval: u64,
}

impl Default for SyncSettings {
	fn default() -> Self {
		Self {
			retry_window: None,
			progress_log_interval: 100,
		}
	}
}
