use clap::Parser;
use deskpilot::AppConfig;
use deskpilot::model::OpenAiClient;
use deskpilot::repl;
use deskpilot::session::Session;
use deskpilot::turn::TurnOrchestrator;
use std::error::Error;
use std::path::Path;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(
    name = "deskpilot",
    version,
    about = "LLM desktop agent driving an MCP-style tool server"
)]
struct Cli {
    /// Path to the tool server script (.py or .js)
    server: Option<String>,
    #[arg(long)]
    config: Option<String>,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    api_base: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let file_config = AppConfig::load(cli.config.as_deref().map(Path::new))?;
    let Some(server_path) = cli.server.clone().or_else(|| file_config.server.clone()) else {
        return Err("tool server script path required (positional argument or config file)".into());
    };
    let config = file_config.into_agent_config(server_path, cli.model, cli.api_base);
    info!(server = %config.server_path, model = %config.model, "Starting deskpilot");

    let provider = OpenAiClient::from_config(&config);
    println!("Connecting to server: {}", config.server_path);
    let mut session = Session::connect(&config).await?;
    let names: Vec<&str> = session.tools().iter().map(|tool| tool.name.as_str()).collect();
    println!("Connected to server with tools: {names:?}");

    let orchestrator = TurnOrchestrator::new(provider, config.model.clone());

    // The session is released on every exit path, loop error included.
    let loop_result = repl::run(&orchestrator, &mut session).await;
    let cleanup_result = session.cleanup().await;
    loop_result?;
    cleanup_result?;

    info!("deskpilot finished");
    Ok(())
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_level(true)
            .init();
    });
}
