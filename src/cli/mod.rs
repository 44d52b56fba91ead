use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod chat;
pub mod export;
pub mod recent;
pub mod stats;

use crate::core::logging::init_tracing;
use crate::core::{AppConfig, Provider};
use crate::dataset::DatasetWriter;

#[derive(Subcommand)]
enum Command {
    /// Curate a conversation with the model and save it to the dataset
    Chat {
        /// Override the system prompt
        #[arg(long)]
        system: Option<String>,

        /// Max tokens per reply, clamped to 256..=4096
        #[arg(long)]
        max_tokens: Option<u32>,

        #[arg(long, value_enum)]
        provider: Option<Provider>,

        #[arg(long)]
        model: Option<String>,

        /// Don't offer to edit each reply as it arrives
        #[arg(long, action, default_value = "false")]
        no_review: bool,
    },
    /// Print the size of the dataset and how many conversations it holds
    Stats {},
    /// Print the most recently saved conversations
    Recent {
        #[arg(long, default_value = "3")]
        count: usize,
    },
    /// Write the dataset verbatim to a file or stdout
    Export {
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path of the JSON lines dataset
    #[arg(long, global = true)]
    dataset: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();
    init_tracing();

    let mut config = AppConfig::default();
    if let Some(path) = args.dataset {
        config.dataset_path = path;
    }
    let writer = DatasetWriter::new(&config.dataset_path);

    // Handle each sub command
    match args.command {
        Some(Command::Chat {
            system,
            max_tokens,
            provider,
            model,
            no_review,
        }) => {
            if let Some(system) = system {
                config.system_message = system;
            }
            if let Some(n) = max_tokens {
                config.max_tokens = n;
            }
            if let Some(provider) = provider {
                config.provider = provider;
            }
            if model.is_some() {
                config.llm_model = model;
            }
            chat::run(&config, &writer, !no_review).await?;
        }
        Some(Command::Stats {}) => {
            stats::run(&writer)?;
        }
        Some(Command::Recent { count }) => {
            recent::run(&writer, count)?;
        }
        Some(Command::Export { out }) => {
            export::run(&writer, out)?;
        }
        None => {
            chat::run(&config, &writer, true).await?;
        }
    }

    Ok(())
}
