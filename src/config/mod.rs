// Configuration management module
// TOML settings for the embedding and generation backends

pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{BackendKind, Config, ConfigError, HostedConfig, OllamaConfig};

/// Get the default configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::default_dir()
}
