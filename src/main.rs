use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use specflow::cmd;
use specflow::server::{ServerConfig, start_server};

#[derive(Parser)]
#[command(name = "specflow")]
#[command(version, about = "Spec-driven workflow coordinator - approval gates, task tracking, and a live dashboard")]
pub struct Cli {
    /// Project directory (defaults to the current directory)
    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the .specflow/ layout in a project
    Init,
    /// Show per-spec task progress and pending approvals
    Status,
    /// Review pending approval requests interactively
    Review,
    /// Serve the dashboard API and push channel
    Serve {
        /// Port to serve on
        #[arg(short, long, default_value = "5353")]
        port: u16,

        /// Enable dev mode (CORS permissive for a local dashboard dev server)
        #[arg(long)]
        dev: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Init => cmd::cmd_init(&project_dir)?,
        Commands::Status => cmd::cmd_status(&project_dir)?,
        Commands::Review => cmd::cmd_review(&project_dir)?,
        Commands::Serve { port, dev } => {
            start_server(ServerConfig {
                port: *port,
                project_dir,
                dev_mode: *dev,
            })
            .await?;
        }
    }

    Ok(())
}
