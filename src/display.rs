//! Display projection of the chain state.
//!
//! `DisplayProjector` renders the chain state only when the tip has moved since the previous
//! render. The last rendered tip is owned by the projector; it plays no part in sync.

use crate::chain::{ChainCollaborator, ChainSnapshot, ChainStateFacade};
use crate::utils::{COIN_DECIMALS, format_token_amount};
use tracing::info;

/// Presentation layer the projector writes to.
pub trait Presenter: Send {
	fn present(&mut self, snapshot: &ChainSnapshot);
}

/// Presenter that writes snapshots to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPresenter;

impl Presenter for LogPresenter {
	fn present(&mut self, snapshot: &ChainSnapshot) {
		info!(
			"Chain: network={} height={} tip={} ibd={}",
			snapshot.network, snapshot.height, snapshot.tip, snapshot.in_initial_sync
		);
		info!(
			"Difficulty: {} target: {}{}",
			snapshot.difficulty,
			snapshot.target,
			snapshot
				.tip_time
				.map(|t| format!(" tip time: {}", t.to_rfc3339()))
				.unwrap_or_default()
		);
		info!(
			"Watching {} address(es), {} transaction(s) found",
			snapshot.watched_addresses.len(),
			snapshot.tracked_transactions.len()
		);
		for tx in &snapshot.tracked_transactions {
			info!(
				"   - {} at height {}: {} BTC",
				tx.txid,
				tx.height,
				format_token_amount(tx.received, COIN_DECIMALS)
			);
		}
	}
}

pub struct DisplayProjector<P: Presenter> {
	presenter: P,
	last_rendered_tip: Option<String>,
}

impl<P: Presenter> DisplayProjector<P> {
	pub fn new(presenter: P) -> Self {
		Self {
			presenter,
			last_rendered_tip: None,
		}
	}

	/// Render the chain state if its tip differs from the last rendered one.
	///
	/// Returns whether anything was written to the presenter.
	pub fn render<C: ChainCollaborator>(&mut self, chain: &ChainStateFacade<C>) -> bool {
		let tip = chain.tip();
		if self.last_rendered_tip.as_deref() == Some(tip.as_str()) {
			return false;
		}

		let snapshot = chain.snapshot();
		self.presenter.present(&snapshot);
		self.last_rendered_tip = Some(tip);
		true
	}
}
