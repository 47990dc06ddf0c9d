//! Query coordinator CLI.
//!
//! # Quick start
//!
//! ```bash
//! qcoord init ./deploy
//! qcoord --project ./deploy start
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// qcoord - distributed vector-database query coordinator.
#[derive(Parser)]
#[command(name = "qcoord")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Project directory holding `qcoord.toml`.
    #[arg(short, long, global = true, default_value = ".")]
    project: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version information.
    Version,

    /// Initialize a new coordinator project directory.
    Init,

    /// Start the coordinator process.
    Start,

    /// Configuration management.
    Config {
        /// Output format: `toml` or `json`.
        #[arg(short, long, default_value = "toml")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            commands::version::run();
            Ok(())
        }
        Commands::Init => commands::init::run(&cli.project),
        Commands::Start => commands::start::run(&cli.project).await,
        Commands::Config { format } => commands::config::show(&cli.project, &format),
    }
}
