//! Periodic refresh driver.
//!
//! On a fixed interval the driver re-renders the chain state and, once initial sync is over,
//! fires a tick into the sync controller so new blocks are picked up. The interval runs
//! independently of the sync loop; a tick that lands while a loop is running is turned away by the
//! controller's busy guard.

use crate::chain::ChainCollaborator;
use crate::display::{DisplayProjector, Presenter};
use crate::source::BlockSource;
use crate::sync::{SyncController, SyncError, SyncRun};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

pub struct RefreshDriver<S: BlockSource, C: ChainCollaborator, P: Presenter> {
	controller: Arc<SyncController<S, C>>,
	projector: DisplayProjector<P>,
	interval: Duration,
}

impl<S: BlockSource, C: ChainCollaborator, P: Presenter> RefreshDriver<S, C, P> {
	pub fn new(controller: Arc<SyncController<S, C>>, presenter: P, interval: Duration) -> Self {
		Self {
			controller,
			projector: DisplayProjector::new(presenter),
			interval,
		}
	}

	/// One refresh cycle.
	///
	/// Renders, then returns `None` while the chain is still in initial sync. Otherwise the
	/// controller's tick result is returned.
	pub async fn tick(&mut self) -> Option<Result<SyncRun, SyncError>> {
		let in_initial_sync = {
			let chain = self.controller.chain().lock().await;
			self.projector.render(&chain);
			chain.in_initial_sync()
		};

		if in_initial_sync {
			return None;
		}

		Some(self.controller.tick().await)
	}

	/// Run refresh cycles until `shutdown` flips to true or its sender goes away.
	pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
		let mut ticker = interval(self.interval);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

		info!("Refreshing every {:?}", self.interval);

		loop {
			tokio::select! {
				changed = shutdown.changed() => {
					if changed.is_err() || *shutdown.borrow() {
						break;
					}
				}
				_ = ticker.tick() => {
					match self.tick().await {
						Some(Ok(SyncRun::Completed { applied, height })) if applied > 0 => {
							debug!("Refresh picked up {} block(s), now at height {}", applied, height);
						}
						Some(Err(e)) => warn!("Refresh sync stopped: {}", e),
						_ => {}
					}
				}
			}
		}

		info!("Refresh driver stopped");
	}
}
