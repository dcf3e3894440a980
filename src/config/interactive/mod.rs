
use std::path::Path;

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};

use super::{BackendKind, Config, ConfigError, HostedConfig, OllamaConfig};

#[inline]
pub fn run_interactive_config(config_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 PDF RAG Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(config_dir)?;

    let backends = &["ollama (local)", "hosted (OpenAI-compatible API)"];
    let default_backend = match config.backend {
        BackendKind::Ollama => 0,
        BackendKind::Hosted => 1,
    };
    let backend_index = Select::new()
        .with_prompt("Embedding and generation backend")
        .default(default_backend)
        .items(backends)
        .interact()?;

    eprintln!();
    if backend_index == 0 {
        config.backend = BackendKind::Ollama;

        eprintln!("{}", style("Ollama Configuration").bold().yellow());
        eprintln!("Configure your local Ollama instance for embeddings and answers.");
        eprintln!();

        configure_ollama(&mut config.ollama)?;

        eprintln!();
        eprintln!("{}", style("Testing configuration...").yellow());

        if test_ollama_connection(&config.ollama) {
            eprintln!("{}", style("✓ Ollama connection successful!").green());
        } else {
            eprintln!(
                "{}",
                style("⚠ Warning: Could not connect to Ollama").yellow()
            );
            eprintln!("You can continue, but make sure Ollama is running before ingesting.");
        }
    } else {
        config.backend = BackendKind::Hosted;

        eprintln!("{}", style("Hosted API Configuration").bold().yellow());
        eprintln!("The API key is read from an environment variable at runtime.");
        eprintln!();

        configure_hosted(&mut config.hosted)?;

        if std::env::var(&config.hosted.api_key_env).is_err() {
            eprintln!(
                "{}",
                style(format!(
                    "⚠ Warning: {} is not set in this shell",
                    config.hosted.api_key_env
                ))
                .yellow()
            );
        }
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();
    eprintln!("  Backend: {}", style(config.backend).cyan());
    eprintln!();

    match config.backend {
        BackendKind::Ollama => {
            eprintln!("{}", style("Ollama Settings:").bold().yellow());
            eprintln!("  Host: {}", style(&config.ollama.host).cyan());
            eprintln!("  Port: {}", style(config.ollama.port).cyan());
            eprintln!(
                "  Embedding Model: {}",
                style(&config.ollama.embedding_model).cyan()
            );
            eprintln!("  Chat Model: {}", style(&config.ollama.chat_model).cyan());
            eprintln!("  Batch Size: {}", style(config.ollama.batch_size).cyan());

            eprintln!();
            match config.ollama.ollama_url() {
                Ok(url) => eprintln!("  Ollama URL: {}", style(url).cyan()),
                Err(e) => eprintln!("  Ollama URL: {} ({})", style("Invalid").red(), e),
            }
        }
        BackendKind::Hosted => {
            eprintln!("{}", style("Hosted API Settings:").bold().yellow());
            eprintln!("  Base URL: {}", style(&config.hosted.base_url).cyan());
            eprintln!(
                "  Embedding Model: {}",
                style(&config.hosted.embedding_model).cyan()
            );
            eprintln!("  Chat Model: {}", style(&config.hosted.chat_model).cyan());
            eprintln!("  Batch Size: {}", style(config.hosted.batch_size).cyan());
            let key_state = if std::env::var(&config.hosted.api_key_env).is_ok() {
                style("set").green()
            } else {
                style("not set").red()
            };
            eprintln!(
                "  API Key Variable: {} ({})",
                style(&config.hosted.api_key_env).cyan(),
                key_state
            );
        }
    }

    eprintln!();
    eprintln!("Config file: {}", style(config.config_file_path().display()).dim());
    eprintln!("Index directory: {}", style(config.index_dir().display()).dim());

    Ok(())
}

fn load_existing_config(config_dir: &Path) -> Result<Config> {
    Config::load(config_dir).map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No usable configuration found. Using defaults.").yellow()
            );
            Ok(Config {
                base_dir: config_dir.to_path_buf(),
                ..Config::default()
            })
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            Ok(config)
        },
    )
}

fn configure_ollama(ollama: &mut OllamaConfig) -> Result<()> {
    let protocols = &["http", "https"];
    let default_index = protocols
        .iter()
        .position(|&p| p == ollama.protocol)
        .unwrap_or(0);

    let protocol_index = Select::new()
        .with_prompt("Ollama protocol")
        .default(default_index)
        .items(protocols)
        .interact()?;

    let protocol = protocols[protocol_index].to_string();

    let host: String = Input::new()
        .with_prompt("Ollama host")
        .default(ollama.host.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = OllamaConfig {
                protocol: protocol.clone(),
                host: input.clone(),
                ..OllamaConfig::default()
            };
            temp_config.validate()
        })
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("Ollama port")
        .default(ollama.port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let embedding_model = prompt_model("Embedding model", &ollama.embedding_model)?;
    let chat_model = prompt_model("Chat model", &ollama.chat_model)?;
    let batch_size = prompt_batch_size(ollama.batch_size)?;

    ollama.set_protocol(protocol)?;
    ollama.set_host(host)?;
    ollama.set_port(port)?;
    ollama.set_embedding_model(embedding_model)?;
    ollama.set_chat_model(chat_model)?;
    ollama.set_batch_size(batch_size)?;

    Ok(())
}

fn configure_hosted(hosted: &mut HostedConfig) -> Result<()> {
    let base_url: String = Input::new()
        .with_prompt("API base URL")
        .default(hosted.base_url.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = HostedConfig {
                base_url: input.clone(),
                ..HostedConfig::default()
            };
            temp_config.api_url().map(|_| ())
        })
        .interact_text()?;

    let embedding_model = prompt_model("Embedding model", &hosted.embedding_model)?;
    let chat_model = prompt_model("Chat model", &hosted.chat_model)?;

    let api_key_env: String = Input::new()
        .with_prompt("Environment variable holding the API key")
        .default(hosted.api_key_env.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() || input.contains('=') {
                Err("Variable name cannot be empty or contain '='")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    hosted.set_base_url(base_url)?;
    hosted.set_embedding_model(embedding_model)?;
    hosted.set_chat_model(chat_model)?;
    hosted.set_api_key_env(api_key_env)?;

    Ok(())
}

fn prompt_model(prompt: &str, current: &str) -> Result<String> {
    let model: String = Input::new()
        .with_prompt(prompt)
        .default(current.to_string())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;
    Ok(model)
}

fn prompt_batch_size(current: u32) -> Result<u32> {
    let batch_size: u32 = Input::new()
        .with_prompt("Batch size for embedding generation")
        .default(current)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if *input == 0 {
                Err("Batch size must be greater than 0")
            } else if *input > 1000 {
                Err("Batch size must be 1000 or less")
            } else {
                Ok(())
            }
        })
        .interact_text()?;
    Ok(batch_size)
}

fn test_ollama_connection(ollama: &OllamaConfig) -> bool {
    let url = format!(
        "{}://{}:{}/api/version",
        ollama.protocol, ollama.host, ollama.port
    );

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    match agent.get(&url).call() {
        Ok(_) => true,
        Err(ureq::Error::StatusCode(code)) if (400..500).contains(&code) => true,
        Err(_) => false,
    }
}
