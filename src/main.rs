use clap::Parser;
use std::path::PathBuf;

use frontier_ledger::api::{serve, AppState};
use frontier_ledger::config::{ledger_data_dir, Config};

/// Tamper-evident transparency ledger for AI deployment compliance.
#[derive(Parser, Debug)]
#[command(name = "frontier-ledgerd", version, about)]
struct Args {
    /// Address to bind (overrides config)
    #[arg(long)]
    bind: Option<String>,

    /// Port to listen on (overrides config)
    #[arg(long)]
    port: Option<u16>,

    /// Data directory holding the persisted stores and config.toml
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().init();

    let args = Args::parse();
    let data_dir = args.data_dir.unwrap_or_else(ledger_data_dir);

    let config = match Config::load(&data_dir) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(error = %e, "could not load config, using defaults");
            Config::default()
        }
    };
    let bind = args.bind.unwrap_or_else(|| config.api.bind.clone());
    let port = args.port.unwrap_or(config.api.port);

    let state = match AppState::open(&data_dir, config) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, data_dir = %data_dir.display(), "failed to open ledger stores");
            std::process::exit(1);
        }
    };

    tracing::info!(data_dir = %data_dir.display(), "ledger stores opened");
    if let Err(e) = serve(state, &bind, port).await {
        tracing::error!(error = %e, "server exited with error");
        std::process::exit(1);
    }
}
