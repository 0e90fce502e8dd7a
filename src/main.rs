use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{self, EnvFilter};

use netguard_pg_backend::config;
use netguard_pg_backend::facade::Facade;
use netguard_pg_backend::store::MemStore;
use netguard_pg_backend::sync::{EnforcementClient, LoggingClient};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
	/// Optional YAML config file; environment variables take precedence.
	#[arg(short, long, value_name = "file")]
	file: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
		.with_writer(std::io::stderr)
		.with_ansi(false)
		.init();

	let args = Args::parse();
	let contents = match args.file {
		Some(path) => Some(tokio::fs::read_to_string(path).await?),
		None => None,
	};
	// Boot-time config or validation failures exit non-zero here.
	let cfg = config::parse_config(contents)?;

	let store = Arc::new(MemStore::new());
	let shutdown = CancellationToken::new();

	let (sync_handle, worker) = if cfg.sync.enabled {
		// The concrete sgroups transport is wired in by the embedding server;
		// without an address we publish dry-run.
		let client: Arc<dyn EnforcementClient> = Arc::new(LoggingClient);
		if let Some(addr) = &cfg.sgroups_address {
			info!(address = %addr, "enforcement backend configured");
		}
		let (handle, worker) =
			netguard_pg_backend::sync::spawn(cfg.sync.clone(), store.clone(), client, shutdown.clone());
		(Some(handle), Some(worker))
	} else {
		(None, None)
	};

	let _facade = Facade::new(store, sync_handle, cfg.strict_ops);
	info!("registry started");

	tokio::signal::ctrl_c().await?;
	info!("shutting down");
	shutdown.cancel();
	if let Some(worker) = worker {
		let _ = worker.await;
	}
	Ok(())
}
