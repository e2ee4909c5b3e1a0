use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use local_rag::Result;
use local_rag::commands::{ask, serve};
use local_rag::config::{Config, LoggingConfig, get_config_dir, run_interactive_config, show_config};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "local-rag")]
#[command(about = "Ask questions about your PDFs with a local retrieval index")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml (defaults to ~/.local-rag)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the embedding backend and retrieval settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Start the HTTP API
    Serve {
        /// Address to bind, overrides the configured host
        #[arg(long)]
        host: Option<String>,
        /// Port to bind, overrides the configured port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Index one or more PDFs and answer a single question about them
    Ask {
        /// PDF files to index
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Question to answer
        #[arg(long, short)]
        query: String,
        /// Number of chunks to retrieve
        #[arg(long)]
        top_k: Option<usize>,
        /// Minimum similarity score for a chunk to be used
        #[arg(long)]
        threshold: Option<f32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => get_config_dir()?,
    };

    if let Commands::Config { show } = cli.command {
        init_tracing(&LoggingConfig::default());
        if show {
            show_config(&config_dir)?;
        } else {
            run_interactive_config(&config_dir)?;
        }
        return Ok(());
    }

    let config = Config::load(&config_dir)
        .with_context(|| format!("Failed to load configuration from {}", config_dir.display()))?;
    init_tracing(&config.logging);

    match cli.command {
        Commands::Serve { host, port } => {
            serve(config, host, port).await?;
        }
        Commands::Ask {
            files,
            query,
            top_k,
            threshold,
        } => {
            ask(config, files, query, top_k, threshold).await?;
        }
        Commands::Config { .. } => {}
    }

    Ok(())
}

/// `RUST_LOG` wins over the configured level
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
