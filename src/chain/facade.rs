//! Chain state facade.
//!
//! This module defines the contract the sync path expects from a chain-state collaborator and the
//! `ChainStateFacade` that wraps one. The facade is the only place chain state is mutated: the
//! sync controller applies blocks through it and the watch ledger adds addresses through it.
//! Reads are pure projections of the collaborator's properties.

use super::types::{ChainError, ChainSnapshot, Network, TrackedTransaction};
use crate::source::BlockMessage;

use chrono::DateTime;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Contract of the external chain-state collaborator.
///
/// Implementations own validation. `accept_block` must be all-or-nothing: on error the
/// collaborator's state is unchanged.
pub trait ChainCollaborator: Send {
	/// Validate a serialized block and connect it on top of the current tip.
	fn accept_block(&mut self, payload: &str) -> Result<(), ChainError>;
	/// Flip the initial-block-download flag.
	fn toggle_ibd(&mut self);
	/// Start tracking transactions paying `address`. Returns the address in the form it is stored.
	fn add_address(&mut self, address: &str) -> Result<String, ChainError>;
	/// Derive a fresh address. Does not add it to the watch set.
	fn random_address(&self) -> Result<String, ChainError>;

	fn height(&self) -> u64;
	fn tip(&self) -> String;
	/// Header time of the tip, in seconds since the epoch.
	fn tip_time(&self) -> Option<u32>;
	fn network(&self) -> Network;
	fn ibd(&self) -> bool;
	fn difficulty(&self) -> f64;
	fn target(&self) -> String;
	fn our_txs(&self) -> Vec<TrackedTransaction>;
	fn watched_addresses(&self) -> Vec<String>;
}

/// Chain state shared between the sync controller, the refresh driver and the watch ledger.
pub type SharedChain<C> = Arc<Mutex<ChainStateFacade<C>>>;

/// Facade over a chain-state collaborator.
pub struct ChainStateFacade<C: ChainCollaborator> {
	inner: C,
}

impl<C: ChainCollaborator> ChainStateFacade<C> {
	pub fn new(inner: C) -> Self {
		Self { inner }
	}

	/// Wrap the facade for sharing.
	pub fn shared(self) -> SharedChain<C> {
		Arc::new(Mutex::new(self))
	}

	/// Apply the next block.
	///
	/// The block must sit at `height + 1`. After the collaborator accepts it the facade checks
	/// that the height moved by exactly one and that the tip changed with it.
	pub fn apply_block(&mut self, block: &BlockMessage) -> Result<(), ChainError> {
		let height = self.inner.height();
		let tip = self.inner.tip();

		if block.height != height + 1 {
			return Err(ChainError::Validation(format!(
				"expected block at height {}, got {}",
				height + 1,
				block.height
			)));
		}

		self.inner.accept_block(&block.payload)?;

		let new_height = self.inner.height();
		let new_tip = self.inner.tip();
		if new_height != height + 1 || new_tip == tip {
			warn!(
				"Collaborator moved from {}@{} to {}@{} on a single block",
				tip, height, new_tip, new_height
			);
			return Err(ChainError::Validation(format!(
				"chain did not advance to height {} with a new tip",
				height + 1
			)));
		}

		Ok(())
	}

	/// Flip the initial-sync flag. The sync controller calls this once, when catch-up ends.
	pub fn toggle_initial_sync(&mut self) {
		self.inner.toggle_ibd();
		info!("Initial sync flag is now {}", self.inner.ibd());
	}

	/// Add an address to the watch set and return its stored form. Format checks are left to the
	/// collaborator.
	pub fn add_watched_address(&mut self, address: &str) -> Result<String, ChainError> {
		self.inner.add_address(address)
	}

	/// Ask the collaborator for a fresh address and start watching it.
	pub fn generate_watched_address(&mut self) -> Result<String, ChainError> {
		let address = self.inner.random_address()?;
		self.inner.add_address(&address)
	}

	pub fn height(&self) -> u64 {
		self.inner.height()
	}

	pub fn tip(&self) -> String {
		self.inner.tip()
	}

	pub fn network(&self) -> Network {
		self.inner.network()
	}

	pub fn difficulty(&self) -> f64 {
		self.inner.difficulty()
	}

	pub fn target(&self) -> String {
		self.inner.target()
	}

	pub fn in_initial_sync(&self) -> bool {
		self.inner.ibd()
	}

	pub fn tracked_transactions(&self) -> Vec<TrackedTransaction> {
		self.inner.our_txs()
	}

	pub fn watched_addresses(&self) -> Vec<String> {
		self.inner.watched_addresses()
	}

	/// Bundle every derived property into one snapshot.
	pub fn snapshot(&self) -> ChainSnapshot {
		ChainSnapshot {
			height: self.height(),
			tip: self.tip(),
			tip_time: self
				.inner
				.tip_time()
				.and_then(|t| DateTime::from_timestamp(t as i64, 0)),
			network: self.network(),
			difficulty: self.difficulty(),
			target: self.target(),
			in_initial_sync: self.in_initial_sync(),
			tracked_transactions: self.tracked_transactions(),
			watched_addresses: self.watched_addresses(),
		}
	}
}
