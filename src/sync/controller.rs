//! Sync controller.
//!
//! `SyncController` feeds named triggers (user start, refresh tick) into the `SyncMachine` and runs
//! the fetch/apply loop when the machine asks for it. Each loop iteration reads the current height,
//! fetches exactly the next block and applies it before asking for another, so there is never more
//! than one fetch in flight. A busy flag turns away a second invocation while a loop is running.
//!
//! Transport and validation errors stop the loop where it is. The controller stays in `Syncing`
//! until a new start trigger arrives; nothing is rolled back.

use crate::chain::{ChainCollaborator, SharedChain};
use crate::source::{BlockFetch, BlockSource, SourceError};
use crate::sync::{
	events::{EventDispatcher, SyncEvent, SyncEventHandler},
	machine::{SyncAction, SyncMachine, SyncPhase, SyncTrigger},
	progress_tracker::SyncProgressTracker,
	types::{SyncError, SyncRun, SyncSettings},
};

use backoff::{ExponentialBackoffBuilder, future::retry};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Clears the busy flag when a loop invocation ends, however it ends.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
	fn drop(&mut self) {
		self.0.store(false, Ordering::Release);
	}
}

pub struct SyncController<S: BlockSource, C: ChainCollaborator> {
	source: S,
	chain: SharedChain<C>,
	machine: Mutex<SyncMachine>,
	busy: AtomicBool,
	dispatcher: Mutex<EventDispatcher>,
	settings: SyncSettings,
}

impl<S: BlockSource, C: ChainCollaborator> SyncController<S, C> {
	pub fn new(source: S, chain: SharedChain<C>, settings: SyncSettings) -> Self {
		Self {
			source,
			chain,
			machine: Mutex::new(SyncMachine::new()),
			busy: AtomicBool::new(false),
			dispatcher: Mutex::new(EventDispatcher::new()),
			settings,
		}
	}

	/// Register an event handler.
	pub fn with_handler(mut self, handler: Box<dyn SyncEventHandler>) -> Self {
		self.dispatcher.get_mut().register_handler(handler);
		self
	}

	/// Shared chain state this controller applies blocks to.
	pub fn chain(&self) -> &SharedChain<C> {
		&self.chain
	}

	#[cfg(test)]
	pub(crate) fn source(&self) -> &S {
		&self.source
	}

	pub async fn phase(&self) -> SyncPhase {
		self.machine.lock().await.phase()
	}

	pub async fn is_halted(&self) -> bool {
		self.machine.lock().await.is_halted()
	}

	/// User-initiated start. Also restarts a halted loop.
	pub async fn start(&self) -> Result<SyncRun, SyncError> {
		self.trigger(SyncTrigger::Start).await
	}

	/// Refresh tick. Picks up new blocks once in steady state.
	pub async fn tick(&self) -> Result<SyncRun, SyncError> {
		self.trigger(SyncTrigger::Tick).await
	}

	async fn trigger(&self, trigger: SyncTrigger) -> Result<SyncRun, SyncError> {
		if self.busy.swap(true, Ordering::AcqRel) {
			debug!("Ignoring {:?}: a sync loop is already running", trigger);
			return Ok(SyncRun::Busy);
		}
		let _guard = BusyGuard(&self.busy);

		let actions = self.machine.lock().await.on(trigger);
		if !actions.contains(&SyncAction::RunLoop) {
			return Ok(SyncRun::Skipped);
		}

		self.run_loop().await
	}

	/// Fetch and apply blocks until the source has none left.
	async fn run_loop(&self) -> Result<SyncRun, SyncError> {
		let start_height = self.chain.lock().await.height();
		let mut tracker = SyncProgressTracker::new(start_height, self.settings.progress_log_interval);

		info!("Starting sync loop from height {}", start_height);

		loop {
			let next = self.chain.lock().await.height() + 1;

			let fetched = match self.fetch(next).await {
				Ok(fetched) => fetched,
				Err(e) => {
					return self
						.halt(SyncError::Transport {
							height: next,
							source: e,
						})
						.await;
				}
			};

			let block = match fetched {
				BlockFetch::Present(block) => block,
				BlockFetch::Absent => {
					debug!("No block at height {}, source exhausted", next);
					break;
				}
			};

			let applied = {
				let mut chain = self.chain.lock().await;
				chain.apply_block(&block).map(|_| chain.tip())
			};

			match applied {
				Ok(tip) => {
					tracker.record_block(next);
					self.dispatcher
						.lock()
						.await
						.dispatch(&SyncEvent::BlockApplied { height: next, tip })
						.await;
				}
				Err(e) => {
					return self
						.halt(SyncError::Validation {
							height: next,
							source: e,
						})
						.await;
				}
			}
		}

		let actions = self.machine.lock().await.on(SyncTrigger::SourceExhausted);
		let height = self.chain.lock().await.height();

		if actions.contains(&SyncAction::LeaveInitialSync) {
			self.chain.lock().await.toggle_initial_sync();
			info!("Initial sync completed at height {}", height);
			self.dispatcher
				.lock()
				.await
				.dispatch(&SyncEvent::InitialSyncCompleted { height })
				.await;
		}

		tracker.log_progress(true);
		let stats = tracker.get_stats();
		info!("{}", stats.summary());

		Ok(SyncRun::Completed {
			applied: stats.blocks_applied,
			height,
		})
	}

	/// Fetch one block, retrying transport errors when a retry window is configured.
	async fn fetch(&self, height: u64) -> Result<BlockFetch, SourceError> {
		let Some(window) = self.settings.retry_window else {
			return self.source.fetch_block(height).await;
		};

		let policy = ExponentialBackoffBuilder::new()
			.with_max_elapsed_time(Some(window))
			.build();

		retry(policy, || async {
			self.source.fetch_block(height).await.map_err(|e| {
				warn!("Fetching block {} failed, retrying: {}", height, e);
				backoff::Error::transient(e)
			})
		})
		.await
	}

	async fn halt(&self, error: SyncError) -> Result<SyncRun, SyncError> {
		self.machine.lock().await.on(SyncTrigger::LoopFailed);

		let height = error.height();
		error!("Sync halted at height {}: {}", height, error);

		self.dispatcher
			.lock()
			.await
			.dispatch(&SyncEvent::SyncHalted {
				height,
				error: error.to_string(),
			})
			.await;

		Err(error)
	}
}
