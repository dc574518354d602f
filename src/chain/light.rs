//! In-process chain-state collaborator.
//!
//! `LightChain` connects `bitcoin` blocks by header: each block must extend the tip, meet its own
//! proof-of-work target within the network limit and commit to its transactions through the merkle
//! root. Transactions paying a watched address are recorded. Scripts and the accumulator proofs
//! carried alongside each block are accepted and not interpreted.

use super::facade::ChainCollaborator;
use super::types::{ChainError, Network, TrackedTransaction};

use bitcoin::blockdata::constants::genesis_block;
use bitcoin::block::Header;
use bitcoin::{Address, Block, BlockHash, ScriptBuf};
use rand::Rng;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::{debug, info};

/// A block as served by the block source, with the accumulator data that travels with it.
#[derive(Debug, Deserialize)]
struct ProvenBlock {
	block: Block,
	#[serde(default)]
	proof: BlockProof,
	#[serde(default)]
	leaf_data: Vec<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct BlockProof {
	#[serde(default)]
	targets: Vec<u64>,
	#[serde(default)]
	hashes: Vec<String>,
}

/// Header-linking chain state with a watch-only address filter.
#[derive(Debug, Clone)]
pub struct LightChain {
	network: Network,
	height: u64,
	tip: BlockHash,
	tip_header: Header,
	ibd: bool,
	/// Canonical address string to the script it locks to
	watched: BTreeMap<String, ScriptBuf>,
	our_txs: Vec<TrackedTransaction>,
}

impl LightChain {
	/// Fresh chain at the network's genesis block, in initial sync.
	pub fn new(network: Network) -> Self {
		let genesis = genesis_block(network.bitcoin_network());
		Self {
			network,
			height: 0,
			tip: genesis.block_hash(),
			tip_header: genesis.header,
			ibd: true,
			watched: BTreeMap::new(),
			our_txs: Vec::new(),
		}
	}

	/// Chain starting from a trusted block instead of genesis.
	///
	/// `header` must hash to `tip`. Sync continues from `height + 1`.
	pub fn from_checkpoint(
		network: Network,
		tip: BlockHash,
		height: u64,
		header: Header,
	) -> Result<Self, ChainError> {
		if header.block_hash() != tip {
			return Err(ChainError::Validation(format!(
				"checkpoint header hashes to {}, not {}",
				header.block_hash(),
				tip
			)));
		}

		Ok(Self {
			height,
			tip,
			tip_header: header,
			..Self::new(network)
		})
	}

	/// Parse an address for this network.
	fn parse_address(&self, address: &str) -> Result<Address, ChainError> {
		Address::from_str(address)
			.and_then(|a| a.require_network(self.network.bitcoin_network()))
			.map_err(|e| ChainError::InvalidAddress(format!("{address}: {e}")))
	}

	/// Check `block` can be connected on top of the tip and return its hash.
	fn check_block(&self, block: &Block) -> Result<BlockHash, ChainError> {
		let header = &block.header;

		if header.prev_blockhash != self.tip {
			return Err(ChainError::Validation(format!(
				"block {} does not extend tip {}",
				header.block_hash(),
				self.tip
			)));
		}

		let target = header.target();
		if target > self.network.max_target() {
			return Err(ChainError::Validation(format!(
				"block {} has a target above the {} limit",
				header.block_hash(),
				self.network
			)));
		}

		let hash = header
			.validate_pow(target)
			.map_err(|e| ChainError::Validation(format!("block {}: {e}", header.block_hash())))?;

		if !block.check_merkle_root() {
			return Err(ChainError::Validation(format!(
				"block {} does not commit to its transactions",
				hash
			)));
		}

		Ok(hash)
	}

	fn relevant_transactions(&self, block: &Block, height: u64) -> Vec<TrackedTransaction> {
		block
			.txdata
			.iter()
			.filter_map(|tx| {
				let ours: Vec<u64> = tx
					.output
					.iter()
					.filter(|out| self.watched.values().any(|script| *script == out.script_pubkey))
					.map(|out| out.value.to_sat())
					.collect();

				(!ours.is_empty()).then(|| TrackedTransaction {
					txid: tx.compute_txid().to_string(),
					height,
					received: ours.iter().sum(),
				})
			})
			.collect()
	}
}

impl Default for LightChain {
	fn default() -> Self {
		Self::new(Network::Regtest)
	}
}

impl ChainCollaborator for LightChain {
	fn accept_block(&mut self, payload: &str) -> Result<(), ChainError> {
		let proven: ProvenBlock = serde_json::from_str(payload)
			.map_err(|e| ChainError::Validation(format!("malformed block payload: {e}")))?;
		let block = proven.block;

		let hash = self.check_block(&block)?;
		debug!(
			"Block {} carries a proof of {} target(s), {} hash(es) and {} leaves",
			hash,
			proven.proof.targets.len(),
			proven.proof.hashes.len(),
			proven.leaf_data.len()
		);

		let height = self.height + 1;
		let ours = self.relevant_transactions(&block, height);
		if !ours.is_empty() {
			info!(
				"Block {} carries {} transaction(s) for watched addresses",
				height,
				ours.len()
			);
		}

		self.our_txs.extend(ours);
		self.height = height;
		self.tip = hash;
		self.tip_header = block.header;

		debug!("Connected block {} at height {}", self.tip, self.height);
		Ok(())
	}

	fn toggle_ibd(&mut self) {
		self.ibd = !self.ibd;
	}

	fn add_address(&mut self, address: &str) -> Result<String, ChainError> {
		let address = self.parse_address(address)?;
		let canonical = address.to_string();
		if self
			.watched
			.insert(canonical.clone(), address.script_pubkey())
			.is_none()
		{
			debug!("Watching address {}", canonical);
		}
		Ok(canonical)
	}

	fn random_address(&self) -> Result<String, ChainError> {
		let mut program = [0u8; 20];
		rand::rng().fill(&mut program);

		bech32::segwit::encode_v0(self.network.hrp(), &program)
			.map_err(|e| ChainError::AddressGeneration(e.to_string()))
	}

	fn height(&self) -> u64 {
		self.height
	}

	fn tip(&self) -> String {
		self.tip.to_string()
	}

	fn tip_time(&self) -> Option<u32> {
		Some(self.tip_header.time)
	}

	fn network(&self) -> Network {
		self.network
	}

	fn ibd(&self) -> bool {
		self.ibd
	}

	fn difficulty(&self) -> f64 {
		self.tip_header.difficulty(self.network.bitcoin_network()) as f64
	}

	fn target(&self) -> String {
		hex::encode(self.tip_header.target().to_be_bytes())
	}

	fn our_txs(&self) -> Vec<TrackedTransaction> {
		self.our_txs.clone()
	}

	fn watched_addresses(&self) -> Vec<String> {
		self.watched.keys().cloned().collect()
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use bitcoin::absolute::LockTime;
	use bitcoin::block::Version;
	use bitcoin::hashes::Hash;
	use bitcoin::{
		Amount, CompactTarget, OutPoint, Sequence, Transaction, TxIn, TxMerkleNode, TxOut, Txid,
		Witness, transaction,
	};
	use serde_json::json;

	pub const WATCHED: &str = "bcrt1q9t6g0l36wgk454masqey03npa6esn370g4wuc9";

	pub fn script_for(address: &str) -> ScriptBuf {
		Address::from_str(address)
			.unwrap()
			.assume_checked()
			.script_pubkey()
	}

	/// Transaction paying `sats` to each of `addresses`.
	pub fn payment(addresses: &[&str], sats: u64, vout: u32) -> Transaction {
		Transaction {
			version: transaction::Version::TWO,
			lock_time: LockTime::ZERO,
			input: vec![TxIn {
				previous_output: OutPoint::new(Txid::all_zeros(), vout),
				script_sig: ScriptBuf::new(),
				sequence: Sequence::MAX,
				witness: Witness::new(),
			}],
			output: addresses
				.iter()
				.map(|address| TxOut {
					value: Amount::from_sat(sats),
					script_pubkey: script_for(address),
				})
				.collect(),
		}
	}

	/// Regtest block at `height` on top of `prev`: a coinbase followed by `extra`, with a valid
	/// merkle root and proof of work.
	pub fn mine_block(prev: BlockHash, height: u64, extra: Vec<Transaction>) -> Block {
		let coinbase = Transaction {
			version: transaction::Version::TWO,
			lock_time: LockTime::ZERO,
			input: vec![TxIn {
				previous_output: OutPoint::null(),
				script_sig: ScriptBuf::from_bytes(height.to_le_bytes().to_vec()),
				sequence: Sequence::MAX,
				witness: Witness::new(),
			}],
			output: vec![TxOut {
				value: Amount::from_sat(5_000_000_000),
				script_pubkey: ScriptBuf::new(),
			}],
		};

		let mut block = Block {
			header: Header {
				version: Version::TWO,
				prev_blockhash: prev,
				merkle_root: TxMerkleNode::all_zeros(),
				time: 1_700_000_000 + height as u32,
				bits: CompactTarget::from_consensus(0x207fffff),
				nonce: 0,
			},
			txdata: std::iter::once(coinbase).chain(extra).collect(),
		};
		if let Some(root) = block.compute_merkle_root() {
			block.header.merkle_root = root;
		}
		while block.header.validate_pow(block.header.target()).is_err() {
			block.header.nonce += 1;
		}
		block
	}

	/// Block `height` of the deterministic regtest chain used across tests. Height 0 is genesis.
	pub fn block_at(height: u64) -> Block {
		let mut block = genesis_block(bitcoin::Network::Regtest);
		for h in 1..=height {
			block = mine_block(block.block_hash(), h, vec![]);
		}
		block
	}

	/// Block source payload carrying `block`.
	pub fn block_payload(block: &Block) -> String {
		json!({
			"block": block,
			"proof": { "targets": [], "hashes": [] },
			"leaf_data": [],
		})
		.to_string()
	}

	#[test]
	fn test_new_chain_starts_at_genesis() {
		let chain = LightChain::new(Network::Regtest);
		assert_eq!(chain.height(), 0);
		assert_eq!(
			chain.tip(),
			"0f9188f13cb7b2c71f2a335e3a4fc328bf5beb436012afca590b1a11466e2206"
		);
		assert!(chain.ibd());
		assert_eq!(chain.difficulty(), 1.0);
		assert_eq!(
			chain.target(),
			"7fffff0000000000000000000000000000000000000000000000000000000000"
		);
		assert_eq!(chain.tip_time(), Some(1_296_688_602));
	}

	#[test]
	fn test_accept_linked_block() {
		let mut chain = LightChain::default();
		chain.accept_block(&block_payload(&block_at(1))).expect("block links to genesis");

		assert_eq!(chain.height(), 1);
		assert_eq!(chain.tip(), block_at(1).block_hash().to_string());
		assert_eq!(chain.tip_time(), Some(1_700_000_001));
	}

	#[test]
	fn test_reject_unlinked_block() {
		let mut chain = LightChain::default();
		let err = chain.accept_block(&block_payload(&block_at(2))).unwrap_err();

		assert!(matches!(err, ChainError::Validation(_)));
		assert_eq!(chain.height(), 0);
	}

	#[test]
	fn test_reject_garbage_payload() {
		let mut chain = LightChain::default();
		let err = chain.accept_block(r#"{"block": "nope"}"#).unwrap_err();
		assert!(matches!(err, ChainError::Validation(_)));
	}

	#[test]
	fn test_reject_block_without_work() {
		let mut chain = LightChain::default();
		let mut block = block_at(1);
		// walk the nonce until the hash misses the target
		while block.header.validate_pow(block.header.target()).is_ok() {
			block.header.nonce += 1;
		}

		assert!(chain.accept_block(&block_payload(&block)).is_err());
		assert_eq!(chain.height(), 0);
	}

	#[test]
	fn test_reject_tampered_transactions() {
		let mut chain = LightChain::default();
		let mut block = block_at(1);
		block.txdata.push(payment(&[WATCHED], 1_000, 0));

		let err = chain.accept_block(&block_payload(&block)).unwrap_err();
		assert!(matches!(err, ChainError::Validation(_)));
		assert!(chain.our_txs().is_empty());
	}

	#[test]
	fn test_tracks_payments_to_watched_addresses() {
		let mut chain = LightChain::default();
		chain.add_address(WATCHED).unwrap();

		let stranger = chain.random_address().unwrap();
		let to_us = payment(&[WATCHED, WATCHED], 21_000, 0);
		let elsewhere = payment(&[stranger.as_str()], 7, 1);
		let block = mine_block(
			block_at(0).block_hash(),
			1,
			vec![elsewhere, to_us.clone()],
		);
		chain.accept_block(&block_payload(&block)).unwrap();

		assert_eq!(
			chain.our_txs(),
			vec![TrackedTransaction {
				txid: to_us.compute_txid().to_string(),
				height: 1,
				received: 42_000,
			}]
		);
	}

	#[test]
	fn test_rejected_block_records_nothing() {
		let mut chain = LightChain::default();
		chain.add_address(WATCHED).unwrap();

		let block = mine_block(block_at(1).block_hash(), 2, vec![payment(&[WATCHED], 1, 0)]);
		assert!(chain.accept_block(&block_payload(&block)).is_err());
		assert!(chain.our_txs().is_empty());
	}

	#[test]
	fn test_from_checkpoint() {
		let checkpoint = block_at(5);
		let mut chain =
			LightChain::from_checkpoint(Network::Regtest, checkpoint.block_hash(), 5, checkpoint.header)
				.unwrap();

		assert_eq!(chain.height(), 5);
		assert_eq!(chain.tip(), checkpoint.block_hash().to_string());
		assert!(chain.ibd());

		chain.accept_block(&block_payload(&block_at(6))).unwrap();
		assert_eq!(chain.height(), 6);
	}

	#[test]
	fn test_checkpoint_header_must_match_tip() {
		let err = LightChain::from_checkpoint(
			Network::Regtest,
			block_at(4).block_hash(),
			5,
			block_at(5).header,
		)
		.unwrap_err();
		assert!(matches!(err, ChainError::Validation(_)));
	}

	#[test]
	fn test_address_validation() {
		let mut chain = LightChain::default();
		assert!(matches!(
			chain.add_address("definitely not an address"),
			Err(ChainError::InvalidAddress(_))
		));
		// mainnet address on a regtest chain
		assert!(matches!(
			chain.add_address("bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4"),
			Err(ChainError::InvalidAddress(_))
		));
		assert!(chain.watched_addresses().is_empty());
	}

	#[test]
	fn test_legacy_addresses_accepted() {
		let mut chain = LightChain::default();
		// testnet-prefixed P2PKH and P2SH are valid on regtest
		chain.add_address("mipcBbFg9gMiCh81Kj8tqqdgoZub1ZJRfn").unwrap();
		chain.add_address("2MzQwSSnBHWHqSAqtTVQ6v47XtaisrJa1Vc").unwrap();

		assert_eq!(chain.watched_addresses().len(), 2);
	}

	#[test]
	fn test_address_stored_in_canonical_form() {
		let mut chain = LightChain::default();
		let stored = chain.add_address(&WATCHED.to_uppercase()).unwrap();

		assert_eq!(stored, WATCHED);
		assert_eq!(chain.watched_addresses(), vec![WATCHED.to_string()]);
	}

	#[test]
	fn test_random_address_is_valid_for_network() {
		let mut chain = LightChain::default();
		let address = chain.random_address().unwrap();
		assert!(address.starts_with("bcrt1q"));
		chain.add_address(&address).unwrap();
		assert_eq!(chain.watched_addresses(), vec![address]);
	}

	#[test]
	fn test_toggle_ibd() {
		let mut chain = LightChain::default();
		chain.toggle_ibd();
		assert!(!chain.ibd());
	}
}
