use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use pdf_rag::commands::{ask, chat, ingest, status};
use pdf_rag::config::{Config, get_config_dir, run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "pdf-rag")]
#[command(about = "Ask questions about a PDF using retrieval-augmented generation")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and the persisted index [default: ~/.pdf-rag]
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the embedding and answer backends
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Build the vector index from a PDF, replacing any previous index
    Ingest {
        /// Path to the PDF file
        pdf: PathBuf,
    },
    /// Answer one question from the indexed PDF
    Ask {
        /// The question to answer
        question: String,
    },
    /// Ask questions interactively until 'exit'
    Chat {
        /// Index this PDF first instead of loading the saved index
        #[arg(long)]
        pdf: Option<PathBuf>,
    },
    /// Show backend and index status
    Status,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => get_config_dir()?,
    };

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&data_dir)?;
            } else {
                run_interactive_config(&data_dir)?;
            }
        }
        Commands::Ingest { pdf } => {
            ingest(&Config::load(&data_dir)?, &pdf)?;
        }
        Commands::Ask { question } => {
            ask(&Config::load(&data_dir)?, &question)?;
        }
        Commands::Chat { pdf } => {
            chat(&Config::load(&data_dir)?, pdf)?;
        }
        Commands::Status => {
            status(&Config::load(&data_dir)?)?;
        }
    }

    Ok(())
}
