use bitcoin::block::Header;
use bitcoin::{BlockHash, Target};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Network the chain state follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
	Mainnet,
	Testnet,
	Signet,
	Regtest,
}

impl Network {
	/// Human-readable part used by segwit addresses on this network.
	pub fn hrp(&self) -> bech32::Hrp {
		match self {
			Network::Mainnet => bech32::hrp::BC,
			Network::Testnet | Network::Signet => bech32::hrp::TB,
			Network::Regtest => bech32::hrp::BCRT,
		}
	}

	/// The `bitcoin` crate's view of this network.
	pub fn bitcoin_network(&self) -> bitcoin::Network {
		match self {
			Network::Mainnet => bitcoin::Network::Bitcoin,
			Network::Testnet => bitcoin::Network::Testnet,
			Network::Signet => bitcoin::Network::Signet,
			Network::Regtest => bitcoin::Network::Regtest,
		}
	}

	/// Easiest target a block on this network may carry.
	pub fn max_target(&self) -> Target {
		match self {
			Network::Mainnet => Target::MAX_ATTAINABLE_MAINNET,
			Network::Testnet => Target::MAX_ATTAINABLE_TESTNET,
			Network::Signet => Target::MAX_ATTAINABLE_SIGNET,
			Network::Regtest => Target::MAX_ATTAINABLE_REGTEST,
		}
	}
}

impl fmt::Display for Network {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Network::Mainnet => "Mainnet",
			Network::Testnet => "Testnet",
			Network::Signet => "Signet",
			Network::Regtest => "Regtest",
		};
		f.write_str(name)
	}
}

impl FromStr for Network {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"mainnet" | "bitcoin" => Ok(Network::Mainnet),
			"testnet" => Ok(Network::Testnet),
			"signet" => Ok(Network::Signet),
			"regtest" => Ok(Network::Regtest),
			other => Err(other.to_string()),
		}
	}
}

/// A transaction that paid one of the watched addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedTransaction {
	pub txid: String,
	/// Height of the block the transaction was confirmed in.
	pub height: u64,
	/// Satoshis paid to watched addresses by this transaction.
	pub received: u64,
}

/// Read-only projection of the chain state handed to the display layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainSnapshot {
	pub height: u64,
	pub tip: String,
	/// Header time of the tip, when the collaborator knows it.
	pub tip_time: Option<DateTime<Utc>>,
	pub network: Network,
	pub difficulty: f64,
	pub target: String,
	pub in_initial_sync: bool,
	pub tracked_transactions: Vec<TrackedTransaction>,
	pub watched_addresses: Vec<String>,
}

/// Trusted starting point for a chain that does not begin at genesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
	pub height: u64,
	pub tip: BlockHash,
	pub header: Header,
}

/// Errors raised by the chain state and its collaborator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
	/// The collaborator refused a block.
	#[error("Invalid block: {0}")]
	Validation(String),

	/// A user-supplied address was rejected.
	#[error("Invalid address: {0}")]
	InvalidAddress(String),

	#[error("Address generation failed: {0}")]
	AddressGeneration(String),
}
