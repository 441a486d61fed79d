//! Main entry point for the AGI solver service.
//!
//! This binary runs the off-chain intent solver: it watches an escrow
//! contract for published Agent Generated Intents, executes each one
//! through the withdraw-swap-deposit cycle, and reports unrecoverable swap
//! failures to a local store.
//!
//! # Usage
//!
//! ```bash
//! agi-solver --config config.toml
//! agi-solver --config config.toml --log-level debug
//! ```

use clap::Parser;
use solver_config::Config;
use std::path::PathBuf;

/// Command-line arguments for the solver service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to the TOML configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

/// Main entry point for the solver service.
///
/// This function:
/// 1. Parses command-line arguments
/// 2. Initializes logging infrastructure
/// 3. Loads and validates configuration
/// 4. Builds the solver service graph
/// 5. Runs the solver until interrupted
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	fmt()
		.with_env_filter(env_filter)
		.with_target(true)
		.init();

	tracing::info!("Started solver");

	let config = Config::from_file(&args.config)?;
	tracing::info!(
		chain_id = config.network.chain_id,
		escrow = %config.contract.escrow_address,
		"Loaded configuration"
	);

	let service = solver_service::build_solver(&config).await?;
	solver_service::run(service).await?;

	tracing::info!("Stopped solver");
	Ok(())
}
