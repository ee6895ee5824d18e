use anyhow::{anyhow, Context, Result};
use clap::{Args, Subcommand};
use std::io::{self, BufRead, Write};
use uuid::Uuid;

use crate::config::Config;
use crate::session::{ChatSession, SessionStore};

/// List or delete saved chats
#[derive(Debug, Args)]
pub struct SessionsCommand {
    #[command(subcommand)]
    pub command: SessionsSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum SessionsSubcommand {
    /// List saved chats, oldest first
    List,
    /// Delete a saved chat permanently
    Delete {
        /// Id of the chat to delete
        id: Uuid,
        /// Skip the confirmation prompt
        #[arg(short = 'y', long = "yes")]
        yes: bool,
    },
}

impl SessionsCommand {
    pub async fn execute(&self, config: &Config) -> Result<()> {
        let store = SessionStore::new(config.chats_path());
        let report = store
            .load_all()
            .await
            .with_context(|| format!("Failed to load chats from {}", store.dir().display()))?;
        for skipped in &report.skipped {
            eprintln!("Skipped {}: {}", skipped.path.display(), skipped.reason);
        }

        match &self.command {
            SessionsSubcommand::List => {
                let mut sessions: Vec<&ChatSession> = report.sessions.values().collect();
                sessions.sort_by_key(|s| s.created_at);
                if sessions.is_empty() {
                    println!("No saved chats in {}", store.dir().display());
                }
                for session in sessions {
                    println!("{}", describe(session));
                }
                Ok(())
            }
            SessionsSubcommand::Delete { id, yes } => {
                let session = report
                    .sessions
                    .get(id)
                    .ok_or_else(|| anyhow!("No saved chat with id {}", id))?;

                if !yes && !confirm(&format!("Delete '{}' permanently? [y/N] ", session.title))? {
                    println!("Cancelled.");
                    return Ok(());
                }

                store.delete(session).await?;
                println!("Deleted {}", id);
                Ok(())
            }
        }
    }
}

fn describe(session: &ChatSession) -> String {
    format!(
        "{}  {}  {:>3} messages  {}",
        session.id,
        session.created_at.format("%Y-%m-%d %H:%M"),
        session.message_count(),
        session.title
    )
}

fn confirm(question: &str) -> Result<bool> {
    print!("{}", question);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
