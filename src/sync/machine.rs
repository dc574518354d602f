//! Sync state machine.
//!
//! `SyncMachine` holds the controller's mode and decides, for every named trigger, what the
//! controller should do next. It performs no I/O, so every transition is testable on its own.
//!
//! ```text
//!            start                    source exhausted
//!   Idle ───────────► Syncing ─────────────────────────► SteadyState
//!                      │   ▲                                  │
//!          loop failed │   │ start (restart)                  │ tick
//!                      ▼   │                                  │
//!                 Syncing (halted)           Syncing ◄────────┘
//! ```

/// Mode of the sync controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPhase {
	/// Waiting for the user to start sync.
	#[default]
	Idle,
	/// A fetch/apply loop is running, or halted on an error.
	Syncing,
	/// Caught up with the source.
	SteadyState,
}

/// Named inputs into the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
	/// User asked to start (or restart) sync.
	Start,
	/// The refresh timer fired.
	Tick,
	/// The source reported no block at the next height.
	SourceExhausted,
	/// A fetch or apply failed and the loop stopped.
	LoopFailed,
}

/// Work the controller must carry out after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
	/// Run the fetch/apply loop.
	RunLoop,
	/// Flip the chain state out of initial sync.
	LeaveInitialSync,
}

#[derive(Debug, Clone, Default)]
pub struct SyncMachine {
	phase: SyncPhase,
	halted: bool,
	initial_sync_left: bool,
}

impl SyncMachine {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn phase(&self) -> SyncPhase {
		self.phase
	}

	/// True once a loop has failed and no restart has been requested.
	pub fn is_halted(&self) -> bool {
		self.halted
	}

	/// Apply a trigger and return the actions it calls for.
	pub fn on(&mut self, trigger: SyncTrigger) -> Vec<SyncAction> {
		match (self.phase, trigger) {
			(SyncPhase::Idle, SyncTrigger::Start) | (SyncPhase::SteadyState, SyncTrigger::Start) => {
				self.phase = SyncPhase::Syncing;
				vec![SyncAction::RunLoop]
			}
			(SyncPhase::Syncing, SyncTrigger::Start) if self.halted => {
				self.halted = false;
				vec![SyncAction::RunLoop]
			}
			(SyncPhase::SteadyState, SyncTrigger::Tick) => {
				self.phase = SyncPhase::Syncing;
				vec![SyncAction::RunLoop]
			}
			(SyncPhase::Syncing, SyncTrigger::SourceExhausted) if !self.halted => {
				self.phase = SyncPhase::SteadyState;
				if self.initial_sync_left {
					vec![]
				} else {
					self.initial_sync_left = true;
					vec![SyncAction::LeaveInitialSync]
				}
			}
			(SyncPhase::Syncing, SyncTrigger::LoopFailed) => {
				self.halted = true;
				vec![]
			}
			_ => vec![],
		}
	}
}
