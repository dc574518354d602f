//! Progress tracking for a sync run.
//!
//! The controller creates one `SyncProgressTracker` per loop invocation and records every applied
//! block in it. The tracker logs at a fixed block interval and produces a summary at the end of the
//! run.

use crate::utils::format_rate;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct SyncProgressTracker {
	/// Height the run started from
	start_height: u64,
	/// Highest height applied so far
	highest_applied: u64,
	blocks_applied: u64,
	/// Height at which progress was last logged
	last_logged_height: u64,
	log_interval: u64,
	started_at: Instant,
}

impl SyncProgressTracker {
	/// Create a tracker for a run starting on top of `start_height`.
	pub fn new(start_height: u64, log_interval: u64) -> Self {
		Self {
			start_height,
			highest_applied: start_height,
			blocks_applied: 0,
			last_logged_height: start_height,
			log_interval: log_interval.max(1),
			started_at: Instant::now(),
		}
	}

	/// Record a block applied at `height`.
	pub fn record_block(&mut self, height: u64) {
		if height != self.highest_applied + 1 {
			warn!(
				"Applied block {} after {}; heights are expected to be consecutive",
				height, self.highest_applied
			);
		}
		self.highest_applied = self.highest_applied.max(height);
		self.blocks_applied += 1;
		self.log_progress(false);
	}

	/// Log progress every `log_interval` blocks or when forced
	pub fn log_progress(&mut self, force: bool) {
		let since_last_log = self.highest_applied.saturating_sub(self.last_logged_height);
		if (force || since_last_log >= self.log_interval) && self.blocks_applied > 0 {
			info!(
				"Sync progress: {} blocks applied, height {} ({})",
				self.blocks_applied,
				self.highest_applied,
				format_rate(self.blocks_applied, self.started_at.elapsed())
			);
			self.last_logged_height = self.highest_applied;
		}
	}

	pub fn get_stats(&self) -> SyncStats {
		SyncStats {
			start_height: self.start_height,
			highest_applied: self.highest_applied,
			blocks_applied: self.blocks_applied,
			elapsed: self.started_at.elapsed(),
		}
	}
}

/// Statistics about a finished or ongoing run
#[derive(Debug, Clone)]
pub struct SyncStats {
	pub start_height: u64,
	pub highest_applied: u64,
	pub blocks_applied: u64,
	pub elapsed: Duration,
}

impl SyncStats {
	/// Get a human-readable summary of the run
	pub fn summary(&self) -> String {
		format!(
			"Sync from {} to {}: {} blocks applied ({})",
			self.start_height,
			self.highest_applied,
			self.blocks_applied,
			format_rate(self.blocks_applied, self.elapsed)
		)
	}
}
