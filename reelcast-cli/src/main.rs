//! Reelcast CLI - Command-line interface
//!
//! Probes the network, previews quality selection and runs the server.

mod commands;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "reelcast")]
#[command(about = "Adaptive video playback toolkit")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = commands::handle_command(cli.command).await {
        error!("{e:#}");
        eprintln!("Error: {}", commands::user_message(&e));
        std::process::exit(commands::exit_code(&e));
    }
}
