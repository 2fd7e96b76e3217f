// Configuration management module
// TOML settings stored in the data directory alongside the vector database

pub mod settings;


pub use settings::{Config, ConfigError, CorpusConfig, OllamaConfig, SearchConfig, StoreConfig};

/// Resolve the data directory: an explicit override wins over the default location
#[inline]
pub fn resolve_base_dir(
    explicit: Option<&std::path::Path>,
) -> Result<std::path::PathBuf, ConfigError> {
    explicit.map_or_else(Config::default_base_dir, |dir| Ok(dir.to_path_buf()))
}

/// Print the effective configuration
#[inline]
pub fn show_config(config: &Config) -> anyhow::Result<()> {
    println!("Data directory: {}", config.get_base_dir().display());
    println!("Config file:    {}", config.config_file_path().display());
    println!("Vector store:   {}", config.vector_database_path().display());
    println!();
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
