//! Runtime configuration.
//!
//! Values come from the process environment, after an optional `.env` file has been loaded. Every
//! key has a default, so an empty environment gives a regtest setup polling a local endpoint.

use crate::chain::{Checkpoint, Network};
use crate::sync::SyncSettings;

use bitcoin::BlockHash;
use bitcoin::block::Header;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
	#[error("Invalid value for {key}: {value:?}")]
	Invalid { key: &'static str, value: String },

	#[error("START_HEIGHT, START_TIP and START_HEADER must be set together")]
	IncompleteCheckpoint,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
	/// Base URL of the block source
	pub endpoint: String,
	pub network: Network,
	/// Refresh driver period
	pub refresh_interval: Duration,
	/// Per-request timeout of the HTTP client
	pub http_timeout: Duration,
	/// Backoff window for transport errors. `None` halts on the first one.
	pub retry_window: Option<Duration>,
	/// Start syncing without waiting for a `start` command
	pub auto_start: bool,
	/// Addresses to watch from startup
	pub watch_addresses: Vec<String>,
	pub progress_log_interval: u64,
	/// Trusted block to sync on top of instead of genesis
	pub checkpoint: Option<Checkpoint>,
}

impl Config {
	/// Load configuration from the environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		// Load .env file if it exists
		let _ = dotenv::dotenv();

		Self::from_lookup(|key| env::var(key).ok())
	}

	/// Build configuration from an arbitrary key lookup.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let endpoint = lookup("SYNC_ENDPOINT").unwrap_or_else(|| "http://localhost:8080".to_string());

		let network = parse_or(&lookup, "SYNC_NETWORK", Network::Regtest)?;

		let refresh_secs: u64 = parse_or(&lookup, "REFRESH_INTERVAL_SECS", 5)?;
		if refresh_secs == 0 {
			return Err(ConfigError::Invalid {
				key: "REFRESH_INTERVAL_SECS",
				value: refresh_secs.to_string(),
			});
		}

		let http_timeout_secs: u64 = parse_or(&lookup, "HTTP_TIMEOUT_SECS", 30)?;

		let retry_window_secs: u64 = parse_or(&lookup, "FETCH_RETRY_WINDOW_SECS", 0)?;

		let auto_start = match lookup("AUTO_START") {
			Some(value) => parse_bool(&value).ok_or(ConfigError::Invalid {
				key: "AUTO_START",
				value,
			})?,
			None => false,
		};

		let watch_addresses = lookup("WATCH_ADDRESSES")
			.map(|value| {
				value
					.split(',')
					.map(str::trim)
					.filter(|a| !a.is_empty())
					.map(str::to_string)
					.collect()
			})
			.unwrap_or_default();

		let progress_log_interval = parse_or(&lookup, "PROGRESS_LOG_INTERVAL", 100)?;

		let checkpoint = parse_checkpoint(&lookup)?;

		Ok(Config {
			endpoint,
			network,
			refresh_interval: Duration::from_secs(refresh_secs),
			http_timeout: Duration::from_secs(http_timeout_secs),
			retry_window: (retry_window_secs > 0).then(|| Duration::from_secs(retry_window_secs)),
			auto_start,
			watch_addresses,
			progress_log_interval,
			checkpoint,
		})
	}

	pub fn sync_settings(&self) -> SyncSettings {
		SyncSettings {
			retry_window: self.retry_window,
			progress_log_interval: self.progress_log_interval,
		}
	}
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
	F: Fn(&str) -> Option<String>,
	T: FromStr,
{
	match lookup(key) {
		Some(value) => value
			.trim()
			.parse()
			.map_err(|_| ConfigError::Invalid { key, value }),
		None => Ok(default),
	}
}

fn parse_checkpoint<F>(lookup: &F) -> Result<Option<Checkpoint>, ConfigError>
where
	F: Fn(&str) -> Option<String>,
{
	let (height, tip, header) = match (
		lookup("START_HEIGHT"),
		lookup("START_TIP"),
		lookup("START_HEADER"),
	) {
		(None, None, None) => return Ok(None),
		(Some(height), Some(tip), Some(header)) => (height, tip, header),
		_ => return Err(ConfigError::IncompleteCheckpoint),
	};

	let height = height.trim().parse().map_err(|_| ConfigError::Invalid {
		key: "START_HEIGHT",
		value: height.clone(),
	})?;

	let tip = BlockHash::from_str(tip.trim()).map_err(|_| ConfigError::Invalid {
		key: "START_TIP",
		value: tip.clone(),
	})?;

	let header = hex::decode(header.trim())
		.ok()
		.and_then(|bytes| bitcoin::consensus::deserialize::<Header>(&bytes).ok())
		.ok_or_else(|| ConfigError::Invalid {
			key: "START_HEADER",
			value: header.clone(),
		})?;

	Ok(Some(Checkpoint {
		height,
		tip,
		header,
	}))
}

fn parse_bool(value: &str) -> Option<bool> {
	match value.trim().to_ascii_lowercase().as_str() {
		"true" | "1" | "yes" => Some(true),
		"false" | "0" | "no" => Some(false),
		_ => None,
	}
}
