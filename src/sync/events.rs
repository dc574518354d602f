//! Event system for block synchronization.
//!
//! This module defines the event types, the event handler trait, and the event dispatcher used by
//! the sync controller. The controller emits events as blocks are applied, when initial sync ends
//! and when a run halts; registered handlers react to them. This keeps logging, display hooks and
//! tests out of the controller itself.

use crate::sync::SyncError;

/// Events that occur during block synchronization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
	/// A block was applied to the chain state
	BlockApplied { height: u64, tip: String },
	/// The first run reached the end of the source and the chain left initial sync
	InitialSyncCompleted { height: u64 },
	/// A run stopped on an error and will not continue until restarted
	SyncHalted { height: u64, error: String },
}

/// Trait for handling sync events.
#[async_trait::async_trait]
pub trait SyncEventHandler: Send + Sync {
	/// Handle a sync event.
	async fn handle(&mut self, event: &SyncEvent) -> Result<(), SyncError>;

	/// Get the name of this handler for logging and diagnostics.
	fn name(&self) -> &'static str;
}

/// Event dispatcher that manages multiple event handlers.
///
/// Handlers are called in registration order. A failing handler is logged and does not stop the
/// others.
#[derive(Default)]
pub struct EventDispatcher {
	handlers: Vec<Box<dyn SyncEventHandler>>,
}

impl EventDispatcher {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register_handler(&mut self, handler: Box<dyn SyncEventHandler>) {
		self.handlers.push(handler);
	}

	pub async fn dispatch(&mut self, event: &SyncEvent) {
		for handler in &mut self.handlers {
			if let Err(e) = handler.handle(event).await {
				tracing::error!("Handler {} failed to process event: {}", handler.name(), e);
			}
		}
	}
}

/// Handler that reports milestones to the console log.
///
/// Per-block events only show at debug level; progress at info level comes from the tracker.
#[derive(Debug, Default)]
pub struct ConsoleEventHandler;

#[async_trait::async_trait]
impl SyncEventHandler for ConsoleEventHandler {
	async fn handle(&mut self, event: &SyncEvent) -> Result<(), SyncError> {
		match event {
			SyncEvent::BlockApplied { height, tip } => {
				tracing::debug!("Applied block {} ({})", height, tip);
			}
			SyncEvent::InitialSyncCompleted { height } => {
				tracing::info!("Caught up with the block source at height {}", height);
			}
			SyncEvent::SyncHalted { height, error } => {
				tracing::warn!("Sync halted at height {}, send `start` to resume: {}", height, error);
			}
		}
		Ok(())
	}

	fn name(&self) -> &'static str {
		"ConsoleEventHandler"
	}
}
