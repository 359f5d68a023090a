use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use serde_json::Value as Json;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use velociraptor_bridge::tools::dispatch;
use velociraptor_bridge::{Client, Error, ServerConfig, ToolCall};

#[derive(Parser)]
#[command(name = "velociraptor-bridge")]
#[command(author, version, about = "Run VQL and named operations against a Velociraptor server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the Velociraptor api.config.yaml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (overrides MCP_LOG_LEVEL)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Server name (overrides MCP_SERVER_NAME)
    #[arg(long, global = true)]
    server_name: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List operation names
    Tools,

    /// Run a named operation
    Call {
        /// Operation name, e.g. list_clients
        tool: String,

        /// Arguments as a JSON object
        #[arg(short, long)]
        args: Option<String>,
    },

    /// Run a VQL statement and print the rows
    Query {
        /// VQL to execute
        vql: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Commands::Tools = cli.command {
        for name in ToolCall::NAMES {
            println!("{}", name);
        }
        return ExitCode::SUCCESS;
    }

    let mut config = match ServerConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(Error::Config(message)) => {
            eprintln!("Config error: {}", message);
            return ExitCode::from(1);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(1);
        }
    };
    if let Some(level) = &cli.log_level {
        config = config.with_log_level(level);
    }
    if let Some(name) = &cli.server_name {
        config = config.with_server_name(name);
    }

    init_logging(&config.log_level);

    match run(cli.command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, config: &ServerConfig) -> Result<()> {
    info!(
        server = %config.server_name,
        api_config = %config.api_config_path.display(),
        "starting"
    );
    let client = Client::from_config(config);

    match command {
        Commands::Tools => {}
        Commands::Call { tool, args } => {
            let arguments: Json = match args {
                Some(raw) => serde_json::from_str(&raw).context("--args is not valid JSON")?,
                None => Json::Null,
            };
            let output = dispatch(&client, &tool, arguments).await?;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Commands::Query { vql } => {
            let mut stream = client.query_stream(vql).await?;
            let mut rows = Vec::new();
            while let Some(record) = stream.next().await {
                rows.push(record?);
            }
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
    }

    Ok(())
}

/// Log to stderr so stdout carries only results.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_lowercase()));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
