use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use vault_index::commands::{
    configure, embed_file, index_vault, remove_file, search_vault, show_status,
};
use vault_index::config::{Config, resolve_base_dir, show_config};

#[derive(Parser)]
#[command(name = "vault-index")]
#[command(about = "Incremental semantic index and search for a vault of Markdown notes")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and the vector store
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index every note under a vault, removing entries for deleted notes
    Index {
        /// Root directory of the vault
        root: PathBuf,
        /// Compact the vector store afterwards
        #[arg(long)]
        optimize: bool,
    },
    /// Embed a single note
    Embed {
        /// Note to embed
        file: PathBuf,
        /// Root directory of the vault
        #[arg(long)]
        root: PathBuf,
    },
    /// Remove a single note from the index
    Remove {
        /// Note to remove
        file: PathBuf,
        /// Root directory of the vault
        #[arg(long)]
        root: PathBuf,
    },
    /// Find notes similar to a query
    Search {
        /// Free-text query
        query: String,
        /// Root directory of the vault
        #[arg(long)]
        root: PathBuf,
        /// Maximum number of results
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show where the index lives and whether it is usable
    Status,
    /// Show or change the configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
        /// Ollama embedding model
        #[arg(long)]
        model: Option<String>,
        /// Embedding dimension of the model
        #[arg(long)]
        dimension: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let base_dir = resolve_base_dir(cli.data_dir.as_deref())?;
    let config = Config::load(&base_dir)?;

    match cli.command {
        Commands::Index { root, optimize } => {
            index_vault(config, &root, optimize).await?;
        }
        Commands::Embed { file, root } => {
            embed_file(config, &file, &root).await?;
        }
        Commands::Remove { file, root } => {
            remove_file(config, &file, &root).await?;
        }
        Commands::Search { query, root, limit } => {
            search_vault(config, &query, &root, limit).await?;
        }
        Commands::Status => {
            show_status(config).await?;
        }
        Commands::Config {
            show,
            model,
            dimension,
        } => {
            if show {
                show_config(&config)?;
            } else {
                configure(config, model, dimension)?;
            }
        }
    }

    Ok(())
}
