use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod graph;
mod index;
mod indexer;
mod mcp;
mod provider;
mod query;
mod worker;

use config::{load_config, Config};

#[derive(Parser)]
#[command(name = "coderag")]
#[command(author = "Intent Project Team")]
#[command(version)]
#[command(about = "Multi-repository code index with graph-guided retrieval", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Enable verbose logging (and detailed stats)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to ./.coderag.toml)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl a directory of repositories, embed and rebuild the index
    Process {
        /// Directory whose immediate subdirectories are repositories
        #[arg(long, value_name = "DIR")]
        root_dir: PathBuf,

        /// Requirements CSV with 'Project ID' and 'Description' columns
        #[arg(long, value_name = "FILE")]
        requirements_csv: Option<PathBuf>,
    },

    /// Embed a requirements CSV into the existing index
    ProcessRequirements {
        #[arg(long, value_name = "FILE")]
        requirements_csv: PathBuf,
    },

    /// Ask questions about the indexed code interactively
    Query {
        /// Initial retrieval size
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Graph hops to expand from the initial files
        #[arg(long)]
        max_depth: Option<usize>,
    },

    /// Start the MCP server on stdio
    Serve,

    /// Show index statistics
    Stats,

    /// List supported languages
    Languages,
}

fn init_logging(debug: bool, verbose: bool, config: &Config) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level))
    };

    // stdout belongs to the query loop and the MCP protocol
    let registry = tracing_subscriber::registry().with(filter);
    match config.logging.format.as_str() {
        "json" => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        "pretty" => registry
            .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
            .init(),
        _ => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    config.validate()?;
    init_logging(cli.debug, cli.verbose, &config);

    info!("CodeRAG v{} starting...", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Process {
            root_dir,
            requirements_csv,
        } => {
            cli::process::process_root_dir(&config, &root_dir, requirements_csv.as_deref()).await?;
        }

        Commands::ProcessRequirements { requirements_csv } => {
            cli::process::process_requirements_file(&config, &requirements_csv).await?;
        }

        Commands::Query { top_k, max_depth } => {
            cli::query::interactive(config, top_k, max_depth).await?;
        }

        Commands::Serve => {
            cli::serve::serve_stdio(config).await?;
        }

        Commands::Stats => {
            cli::stats::show_stats(&config, cli.verbose)?;
        }

        Commands::Languages => {
            cli::languages::list_languages(&config);
        }
    }

    Ok(())
}
