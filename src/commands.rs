use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::Config;
use crate::indexer::EmbedOutcome;
use crate::service::VaultIndex;

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("Invalid path: {}", path.display()))
}

/// Bring the index in line with every note under `root`
#[inline]
pub async fn index_vault(config: Config, root: &Path, optimize: bool) -> Result<()> {
    let root = absolute(root)?;
    let index = VaultIndex::from_config(config);

    println!("Indexing vault: {}", root.display());
    let report = index
        .indexer()
        .sync_corpus(&root)
        .await
        .with_context(|| format!("Failed to index vault at {}", root.display()))?;

    println!("Indexing completed!");
    println!("  Indexed: {}", report.indexed);
    println!("  Embedded: {}", report.embedded);
    println!("  Unchanged: {}", report.indexed - report.embedded);
    println!("  Removed: {}", report.removed);

    if !report.failed.is_empty() {
        println!("  Failed: {}", report.failed.len());
        for failure in &report.failed {
            println!("    {}: {}", failure.path.display(), failure.error);
        }
    }

    if optimize {
        info!("Optimizing vector store");
        index
            .store()
            .optimize()
            .await
            .context("Failed to optimize vector store")?;
        println!("Vector store optimized");
    }

    Ok(())
}

/// Embed a single note, skipping it when its content is unchanged
#[inline]
pub async fn embed_file(config: Config, file: &Path, root: &Path) -> Result<()> {
    let file = absolute(file)?;
    let root = absolute(root)?;
    let content = tokio::fs::read_to_string(&file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let outcome = VaultIndex::from_config(config)
        .indexer()
        .embed_document(&file, &content, &root)
        .await
        .with_context(|| format!("Failed to embed {}", file.display()))?;

    match outcome {
        EmbedOutcome::Embedded => println!("Embedded: {}", file.display()),
        EmbedOutcome::Unchanged => println!("Unchanged: {}", file.display()),
    }
    Ok(())
}

/// Drop a note from the index; the file itself may already be gone
#[inline]
pub async fn remove_file(config: Config, file: &Path, root: &Path) -> Result<()> {
    let file = absolute(file)?;
    let root = absolute(root)?;

    VaultIndex::from_config(config)
        .indexer()
        .remove_document(&file, &root)
        .await
        .with_context(|| format!("Failed to remove {}", file.display()))?;

    println!("Removed: {}", file.display());
    Ok(())
}

/// Print the notes most similar to `query`
#[inline]
pub async fn search_vault(
    config: Config,
    query: &str,
    root: &Path,
    limit: Option<usize>,
) -> Result<()> {
    let root = absolute(root)?;
    let limit = limit.unwrap_or(config.search.default_limit);
    let engine = VaultIndex::from_config(config).search();

    let results = match engine.try_search(query, &root, limit).await {
        Ok(results) => results,
        Err(e) if e.is_unavailable() => {
            warn!("Search is unavailable: {}", e);
            println!("Search is unavailable: {}", e);
            return Ok(());
        }
        Err(e) => {
            warn!("Search failed: {}", e);
            println!("Search failed: {}", e);
            return Ok(());
        }
    };

    if results.is_empty() {
        println!("No matching notes found.");
        return Ok(());
    }

    println!("Results for {:?} ({} found):", query, results.len());
    println!();
    for (rank, result) in results.iter().enumerate() {
        println!(
            "{:>3}. {} ({}% relevant, distance {:.4})",
            rank + 1,
            result.path.display(),
            result.relevance(),
            result.score
        );
    }

    Ok(())
}

/// Report where the index lives and whether its resources come up
#[inline]
pub async fn show_status(config: Config) -> Result<()> {
    println!("Vault Index Status");
    println!("{}", "=".repeat(50));
    println!();
    println!("Data directory: {}", config.get_base_dir().display());
    println!("Vector store:   {}", config.vector_database_path().display());
    println!("Table:          {}", config.store.table_name);
    println!(
        "Model:          {} ({} dimensions)",
        config.ollama.model, config.ollama.embedding_dimension
    );
    println!();

    let index = VaultIndex::from_config(config);

    match index.store().count().await {
        Ok(count) => println!("Vector store: Available ({} notes indexed)", count),
        Err(e) => println!("Vector store: Unavailable ({})", e),
    }

    match index.embeddings().model().await {
        Ok(model) => println!("Embedding model: Available ({})", model.name()),
        Err(e) => println!("Embedding model: Unavailable ({})", e),
    }

    Ok(())
}

/// Update model settings and persist them to `config.toml`
#[inline]
pub fn configure(mut config: Config, model: Option<String>, dimension: Option<u32>) -> Result<()> {
    if model.is_none() && dimension.is_none() {
        crate::config::show_config(&config)?;
        return Ok(());
    }

    if let Some(model) = model {
        config.ollama.set_model(model)?;
    }
    if let Some(dimension) = dimension {
        if dimension != config.ollama.embedding_dimension {
            warn!(
                "Changing the embedding dimension requires a fresh vector store at {}",
                config.vector_database_path().display()
            );
        }
        config.ollama.set_embedding_dimension(dimension)?;
    }

    config.save()?;
    println!("Configuration saved to {}", config.config_file_path().display());
    Ok(())
}
