//! Watch-only address ledger.
//!
//! Adds user-supplied or freshly generated addresses to the chain state's watch set. The set lives
//! in the collaborator for the lifetime of the process; nothing is persisted.

use crate::chain::{ChainCollaborator, ChainError, SharedChain};
use tracing::info;

pub struct WatchLedger<C: ChainCollaborator> {
	chain: SharedChain<C>,
}

impl<C: ChainCollaborator> WatchLedger<C> {
	pub fn new(chain: SharedChain<C>) -> Self {
		Self { chain }
	}

	/// Watch an address typed in by the user.
	///
	/// Surrounding whitespace is trimmed; format checks are left to the collaborator and come
	/// back as `ChainError::InvalidAddress`. On success the address is returned in the form the
	/// collaborator stored it, and the caller may clear its input.
	pub async fn submit_user_address(&self, raw: &str) -> Result<String, ChainError> {
		let address = self.chain.lock().await.add_watched_address(raw.trim())?;
		info!("Watching address {}", address);
		Ok(address)
	}

	/// Generate a fresh address, watch it and hand it back.
	pub async fn request_random_address(&self) -> Result<String, ChainError> {
		let address = self.chain.lock().await.generate_watched_address()?;
		self.submit_user_address(&address).await
	}

	/// Addresses currently watched.
	pub async fn watched(&self) -> Vec<String> {
		self.chain.lock().await.watched_addresses()
	}
}
