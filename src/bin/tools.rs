use clap::Parser;
use deskpilot::host;
use deskpilot::rpc;
use std::error::Error;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(
    name = "deskpilot-tools",
    version,
    about = "Host-automation tool server speaking line-delimited JSON-RPC over stdio"
)]
struct Cli {}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    let _cli = Cli::parse();

    let registry = host::builtin_registry();
    info!(tools = registry.len(), "Tool server ready");
    rpc::serve(&registry).await?;
    Ok(())
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        // stdout carries the protocol; diagnostics go to stderr.
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_level(true)
            .with_writer(std::io::stderr)
            .init();
    });
}
