use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, info};

use super::{logs::LogsCommand, models::ModelsCommand, run::RunCommand, sessions::SessionsCommand};
use crate::config::{Config, ConfigOverrides};
use crate::tui;

/// Chat with a local DeepSeek model from your terminal
#[derive(Parser)]
#[command(
    name = "deepseek-tui",
    version,
    about = "Chat with a local DeepSeek model from your terminal",
    long_about = r#"deepseek-tui talks to a locally running Ollama service and keeps every chat
as a JSON file under ~/.deepseek-tui/chats.

Examples:
  deepseek-tui                            # Start interactive mode
  deepseek-tui run "explain borrowing"    # Run a single prompt
  deepseek-tui --model deepseek-r1:14b    # Use another model
  deepseek-tui sessions list              # List saved chats"#
)]
pub struct Cli {
    /// Model to chat with
    #[arg(short = 'm', long = "model", global = true)]
    pub model: Option<String>,

    /// Base URL of the Ollama service
    #[arg(long = "host", global = true)]
    pub host: Option<String>,

    /// Directory for chats, logs and config.json
    #[arg(long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short = 'd', long = "debug", global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a single prompt non-interactively
    Run(RunCommand),

    /// List or delete saved chats
    Sessions(SessionsCommand),

    /// List models available on the backend
    Models(ModelsCommand),

    /// View and manage logs
    Logs(LogsCommand),
}

impl Cli {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            model: self.model.clone(),
            host: self.host.clone(),
            data_dir: self.data_dir.clone(),
        }
    }

    /// Interactive mode owns the terminal, so its logs go to a file
    pub fn is_interactive(&self) -> bool {
        self.command.is_none()
    }

    pub async fn execute(self, config: Config) -> Result<()> {
        if self.debug {
            debug!("Debug logging enabled");
        }

        match self.command {
            Some(Commands::Run(run_cmd)) => run_cmd.execute(&config).await,
            Some(Commands::Sessions(sessions_cmd)) => sessions_cmd.execute(&config).await,
            Some(Commands::Models(models_cmd)) => models_cmd.execute(&config).await,
            Some(Commands::Logs(logs_cmd)) => logs_cmd.execute(&config).await,
            None => {
                info!("Starting interactive mode");
                config.validate()?;
                tui::run(config).await?;
                info!("Application finished");
                Ok(())
            }
        }
    }
}
