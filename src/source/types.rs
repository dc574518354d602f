//! Types for the block source wire contract

use serde::{Deserialize, Serialize};

/// A single block as handed from the source to the chain state.
///
/// The payload is the raw JSON of the response's `data` object. Its inner format belongs to the
/// chain-state collaborator; nothing on the sync path looks inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockMessage {
	/// Height the block was requested at.
	pub height: u64,
	/// Serialized block data, forwarded untouched to the collaborator.
	pub payload: String,
}

/// Outcome of a single fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockFetch {
	/// The source has a block at the requested height.
	Present(BlockMessage),
	/// No block at this height yet. This is the end-of-chain signal, not an error.
	Absent,
}

/// Envelope returned by `GET <endpoint>/block/{height}`.
///
/// Only the presence of `data.block` is significant; everything else under `data` is carried
/// along as payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockResponse {
	#[serde(default)]
	pub data: Option<serde_json::Value>,
}

/// Error types for block source operations
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
	#[error("HTTP error: {0}")]
	HttpError(#[from] reqwest::Error),

	#[error("Unexpected status {status} for height {height}")]
	StatusError { height: u64, status: u16 },

	#[error("JSON parse error: {0}")]
	JsonError(#[from] serde_json::Error),

	#[error("Invalid endpoint: {0}")]
	EndpointError(String),
}
