//! DebateIQ server entry point.

use anyhow::Result;
use clap::{Parser, Subcommand};
use debateiq::config::Config;
use tracing_subscriber::EnvFilter;

/// DebateIQ - AI debate arena with historical-figure personas
#[derive(Parser, Debug)]
#[command(name = "debateiq")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the API server (default)
    Serve {
        /// Bind address override
        #[arg(long)]
        bind: Option<String>,

        /// Port override
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debateiq=info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = match cli.config {
        Some(ref path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    match cli.command.unwrap_or(Commands::Serve {
        bind: None,
        port: None,
    }) {
        Commands::Serve { bind, port } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            debateiq::server::run(config).await
        }
    }
}
