use anyhow::{Context, Result};
use clap::Args;

use crate::config::Config;
use crate::llm::OllamaProvider;

/// List models available on the backend
#[derive(Debug, Args)]
pub struct ModelsCommand {}

impl ModelsCommand {
    pub async fn execute(&self, config: &Config) -> Result<()> {
        config.validate()?;
        let provider = OllamaProvider::new(config.provider_config())?;
        let models = provider
            .list_models()
            .await
            .with_context(|| format!("Failed to list models at {}", config.base_url))?;

        if models.is_empty() {
            println!("No models installed at {}", config.base_url);
            return Ok(());
        }
        for name in models {
            let marker = if name == config.model || name.starts_with(&format!("{}:", config.model)) {
                "*"
            } else {
                " "
            };
            println!("{} {}", marker, name);
        }
        Ok(())
    }
}
