//! Main entry point for the campus delivery service.
//!
//! This binary serves the campus food-delivery order lifecycle and the
//! peer-to-peer discount-code exchange over HTTP. It uses a modular
//! architecture with pluggable implementations for storage backends and
//! identity providers, selected and configured via a TOML file.

use campus_config::Config;
use campus_exchange::ExchangeLifecycle;
use campus_identity::IdentityService;
use campus_order::OrderLifecycle;
use campus_storage::StorageService;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

mod apis;
mod server;

/// Command-line arguments for the campus delivery service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

/// Main entry point for the service.
///
/// This function:
/// 1. Parses command-line arguments
/// 2. Initializes logging infrastructure
/// 3. Loads configuration from file
/// 4. Wires the configured storage and identity backends
/// 5. Serves the HTTP API until interrupted
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
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started campus delivery service");

	let config = Config::from_file(&args.config)?;
	tracing::info!("Loaded configuration [{}]", config.service.id);

	let state = build_state(config.clone())?;

	if config.api.enabled {
		server::start_server(config.api.clone(), state).await?;
	} else {
		tracing::warn!("API server is disabled in the configuration, nothing to serve");
	}

	tracing::info!("Stopped campus delivery service");
	Ok(())
}

/// Wires the lifecycle engines onto the configured backends.
fn build_state(config: Config) -> Result<server::AppState, Box<dyn std::error::Error>> {
	let storage = Arc::new(build_storage(&config)?);
	let identity = Arc::new(build_identity(&config)?);

	Ok(server::AppState {
		orders: Arc::new(OrderLifecycle::new(Arc::clone(&storage))),
		exchange: Arc::new(ExchangeLifecycle::new(Arc::clone(&storage))),
		identity,
		config,
	})
}

/// Resolves the configured storage backend through the factory registry.
fn build_storage(config: &Config) -> Result<StorageService, Box<dyn std::error::Error>> {
	let primary = &config.storage.primary;
	let factory = campus_storage::get_all_implementations()
		.into_iter()
		.find(|(name, _)| name == primary)
		.map(|(_, factory)| factory)
		.ok_or_else(|| format!("unknown storage implementation '{}'", primary))?;
	let backend_config = config
		.storage
		.implementations
		.get(primary)
		.ok_or_else(|| format!("missing configuration for storage implementation '{}'", primary))?;

	let backend = factory(backend_config)?;
	backend.config_schema().validate(backend_config).map_err(|e| {
		format!(
			"invalid configuration for storage implementation '{}': {}",
			primary, e
		)
	})?;

	Ok(StorageService::new(backend))
}

/// Resolves the configured identity provider through the factory registry.
fn build_identity(config: &Config) -> Result<IdentityService, Box<dyn std::error::Error>> {
	let primary = &config.identity.primary;
	let factory = campus_identity::get_all_implementations()
		.into_iter()
		.find(|(name, _)| name == primary)
		.map(|(_, factory)| factory)
		.ok_or_else(|| format!("unknown identity implementation '{}'", primary))?;
	let provider_config = config
		.identity
		.implementations
		.get(primary)
		.ok_or_else(|| format!("missing configuration for identity implementation '{}'", primary))?;

	let provider = factory(provider_config)?;
	provider.config_schema().validate(provider_config).map_err(|e| {
		format!(
			"invalid configuration for identity implementation '{}': {}",
			primary, e
		)
	})?;

	Ok(IdentityService::new(provider))
}
