use anyhow::Result;
use clap::Parser;
use std::{fs::OpenOptions, path::Path, sync::Mutex};
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod app;
mod cli;
mod config;
mod llm;
mod session;
mod tui;

use cli::Cli;
use config::Config;

#[tokio::main]
async fn main() {
    // Set up panic hook for graceful error recovery
    std::panic::set_hook(Box::new(|panic_info| {
        error!("Application panicked: {}", panic_info);
        eprintln!("Application panicked: {}", panic_info);
        std::process::exit(1);
    }));

    // Load environment variables from .env file
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = match Config::init(&cli.overrides()).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    let log_file = cli.is_interactive().then(|| cli::log_file_path(&config));
    if let Err(e) = init_logging(cli.debug, log_file.as_deref()) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }
    if let Err(e) = dotenv {
        // A missing .env file is normal
        tracing::debug!("No .env file loaded: {}", e);
    }

    if let Err(e) = cli.execute(config).await {
        error!("Application error: {:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(debug: bool, log_file: Option<&Path>) -> Result<()> {
    // Interactive mode logs to a file at info; one-shot commands keep stderr quiet
    let default_directive = match (debug, log_file.is_some()) {
        (true, _) => "deepseek_tui=debug",
        (false, true) => "deepseek_tui=info",
        (false, false) => "deepseek_tui=warn",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_directive.into());
    let registry = tracing_subscriber::registry().with(env_filter);

    match log_file {
        Some(path) => {
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .try_init()
        }
        None => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init(),
    }
    .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;

    Ok(())
}
