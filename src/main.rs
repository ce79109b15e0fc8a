use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use tracing::info;
use tracing_subscriber::EnvFilter;

use sonar_mcp::client::SonarClient;
use sonar_mcp::config::load_config;
use sonar_mcp::errors::Result;
use sonar_mcp::mcp::{McpServer, ToolRegistry};

/// SonarQube metrics for AI assistants over MCP.
#[derive(Parser)]
#[command(
    name = "sonar-mcp",
    version,
    about = "SonarQube metrics for AI assistants over MCP"
)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// SonarQube base URL (overrides the config file and SONARQUBE_URL)
    #[arg(long, global = true)]
    url: Option<String>,
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the MCP server on stdin/stdout (default)
    Serve,
    /// Check SonarQube once and print the health report
    Health,
    /// Print the metric definitions known to the SonarQube server
    Metrics,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to start async runtime: {}", e);
            process::exit(1);
        }
    };

    let result = runtime.block_on(run(cli));
    // Stdin is read on a blocking thread that never returns on its own.
    runtime.shutdown_background();

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

/// Logs go to stderr; stdout carries the protocol.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<i32> {
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(url) = cli.url {
        config.base_url = url;
        config = config.validate()?;
    }
    info!(?config, "configuration loaded");

    let client = SonarClient::new(&config);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            McpServer::new(client).run().await?;
        }
        Commands::Health => {
            let registry = ToolRegistry::new(client);
            let report = registry.health_check().await;
            registry.client().close();
            println!(
                "{}",
                serde_json::to_string_pretty(&report).unwrap_or_default()
            );
            if report["status"] != "healthy" {
                return Ok(1);
            }
        }
        Commands::Metrics => {
            let metrics = client.get_available_metrics().await;
            client.close();
            println!(
                "{}",
                serde_json::to_string_pretty(&metrics?).unwrap_or_default()
            );
        }
    }
    Ok(0)
}
