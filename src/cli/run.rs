use anyhow::{anyhow, Result};
use clap::Args;
use std::{
    io::{self, Read, Write},
    sync::Arc,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::app::{AppEvent, SessionController, TurnOptions};
use crate::config::Config;
use crate::llm::OllamaProvider;
use crate::session::SessionStore;

/// Run a single prompt non-interactively
#[derive(Args)]
pub struct RunCommand {
    /// The prompt to run. If not provided, will read from stdin
    pub prompt: Vec<String>,

    /// Don't save the chat
    #[arg(long = "no-save")]
    pub no_save: bool,
}

impl RunCommand {
    pub async fn execute(&self, config: &Config) -> Result<()> {
        debug!("Executing run command");

        let prompt = self.get_prompt()?;
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(anyhow!("No prompt provided. Use arguments or pipe input via stdin."));
        }

        info!("Running prompt: {}", prompt.chars().take(50).collect::<String>());
        config.validate()?;

        let provider = Arc::new(OllamaProvider::new(config.provider_config())?);
        let options = TurnOptions {
            stream: config.stream,
            system_message: config.system_message.clone(),
        };
        let mut controller =
            SessionController::new(SessionStore::new(config.chats_path()), provider, options);
        if self.no_save {
            controller = controller.without_autosave();
        }

        let (id, _) = controller.submit_to_active(prompt)?;
        let mut stdout = io::stdout();
        let mut printed = 0;
        let mut failure = None;

        while controller.is_busy() {
            tokio::select! {
                event = controller.next_event() => {
                    let Some(event) = event else { break };
                    if let AppEvent::TurnEnded { error: Some(e), .. } = &event {
                        failure = Some(e.to_string());
                    }
                    if controller.apply(event) == Some(id) {
                        write_new_text(&mut stdout, &controller, &id, &mut printed)?;
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    if controller.cancel_turn(id) {
                        failure = Some("cancelled".to_string());
                    }
                }
            }
        }
        // A cancelled turn that isn't saved ends without another update.
        write_new_text(&mut stdout, &controller, &id, &mut printed)?;
        writeln!(stdout)?;

        if let Some(entry) = controller.entry(&id) {
            for notice in &entry.notices {
                eprintln!("{}", notice);
            }
            if let Some(path) = entry.session.binding() {
                eprintln!("Saved to {}", path.display());
            }
        }

        match failure {
            Some(reason) => Err(anyhow!("Reply failed: {}", reason)),
            None => Ok(()),
        }
    }

    fn get_prompt(&self) -> Result<String> {
        if !self.prompt.is_empty() {
            Ok(self.prompt.join(" "))
        } else {
            debug!("Reading prompt from stdin");
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|e| anyhow!("Failed to read from stdin: {}", e))?;
            Ok(buffer)
        }
    }
}

/// Write the part of the reply that hasn't been printed yet
fn write_new_text(
    out: &mut impl Write,
    controller: &SessionController,
    id: &Uuid,
    printed: &mut usize,
) -> io::Result<()> {
    let text = controller
        .session(id)
        .and_then(|s| s.last_message())
        .and_then(|m| m.content.get(*printed..))
        .unwrap_or_default();
    if !text.is_empty() {
        write!(out, "{}", text)?;
        out.flush()?;
        *printed += text.len();
    }
    Ok(())
}
