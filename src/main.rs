mod chain;
mod config;
mod display;
mod refresh;
mod source;
mod sync;
mod utils;
mod watch;

use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use crate::chain::{ChainStateFacade, LightChain};
use crate::config::Config;
use crate::display::{LogPresenter, Presenter};
use crate::refresh::RefreshDriver;
use crate::source::HttpBlockSource;
use crate::sync::{ConsoleEventHandler, SyncController, SyncRun};
use crate::watch::WatchLedger;

type Controller = SyncController<HttpBlockSource, LightChain>;

#[tokio::main(flavor = "current_thread")]
async fn main() {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
		)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.with_timer(tracing_subscriber::fmt::time::time())
		.init();

	info!("Starting chain state sync");

	let config = match Config::from_env() {
		Ok(config) => config,
		Err(e) => {
			error!("Configuration error: {}", e);
			return;
		}
	};

	let source = match HttpBlockSource::new(&config.endpoint, config.http_timeout) {
		Ok(source) => source,
		Err(e) => {
			error!("Failed to create block source client: {}", e);
			return;
		}
	};

	info!("Using block source {} on {}", config.endpoint, config.network);

	let light = match &config.checkpoint {
		Some(checkpoint) => match LightChain::from_checkpoint(
			config.network,
			checkpoint.tip,
			checkpoint.height,
			checkpoint.header,
		) {
			Ok(light) => {
				info!("Starting from checkpoint {} at height {}", checkpoint.tip, checkpoint.height);
				light
			}
			Err(e) => {
				error!("Invalid start checkpoint: {}", e);
				return;
			}
		},
		None => LightChain::new(config.network),
	};

	let mut facade = ChainStateFacade::new(light);
	for address in &config.watch_addresses {
		match facade.add_watched_address(address) {
			Ok(stored) => info!("Watching configured address {}", stored),
			Err(e) => warn!("Skipping configured address {}: {}", address, e),
		}
	}
	let chain = facade.shared();

	let controller = Arc::new(
		SyncController::new(source, chain.clone(), config.sync_settings())
			.with_handler(Box::new(ConsoleEventHandler)),
	);
	let ledger = WatchLedger::new(chain.clone());

	let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
	let refresh = tokio::spawn(
		RefreshDriver::new(controller.clone(), LogPresenter, config.refresh_interval).run(shutdown_rx),
	);

	if config.auto_start {
		spawn_start(&controller);
	}

	print_help();

	let mut lines = BufReader::new(tokio::io::stdin()).lines();
	loop {
		let line = match lines.next_line().await {
			Ok(Some(line)) => line,
			Ok(None) => break,
			Err(e) => {
				error!("Failed to read command: {}", e);
				break;
			}
		};

		let mut parts = line.split_whitespace();
		match (parts.next(), parts.next()) {
			(None, _) => continue,
			(Some("start"), _) => spawn_start(&controller),
			(Some("watch"), Some(address)) => match ledger.submit_user_address(address).await {
				Ok(address) => info!(
					"Added {} to the watch list ({} watched)",
					address,
					ledger.watched().await.len()
				),
				Err(e) => warn!("{}", e),
			},
			(Some("watch"), None) => warn!("Usage: watch <address>"),
			(Some("random"), _) => match ledger.request_random_address().await {
				Ok(address) => info!(
					"Generated and watching {} ({} watched)",
					address,
					ledger.watched().await.len()
				),
				Err(e) => warn!("{}", e),
			},
			(Some("status"), _) => {
				let snapshot = chain.lock().await.snapshot();
				info!(
					"Sync phase: {:?}{}",
					controller.phase().await,
					if controller.is_halted().await {
						" (halted)"
					} else {
						""
					}
				);
				LogPresenter.present(&snapshot);
			}
			(Some("quit" | "exit"), _) => break,
			(Some(other), _) => {
				warn!("Unknown command: {}", other);
				print_help();
			}
		}
	}

	let _ = shutdown_tx.send(true);
	if let Err(e) = refresh.await {
		error!("Refresh driver failed: {}", e);
	}

	info!("Stopped at height {}", chain.lock().await.height());
}

/// Run a start trigger in the background so the command loop stays responsive.
fn spawn_start(controller: &Arc<Controller>) {
	let controller = controller.clone();
	tokio::spawn(async move {
		match controller.start().await {
			Ok(SyncRun::Completed { applied, height }) => {
				info!("Sync run finished: {} block(s) applied, height {}", applied, height);
			}
			Ok(SyncRun::Busy) => info!("A sync run is already in progress"),
			Ok(SyncRun::Skipped) => {}
			// already reported by the controller
			Err(_) => {}
		}
	});
}

fn print_help() {
	info!("Commands:");
	info!("   start             start or resume syncing");
	info!("   watch <address>   watch an address for incoming transactions");
	info!("   random            generate and watch a fresh address");
	info!("   status            show the current chain state");
	info!("   quit              stop and exit");
}
