//! Terminal User Interface module using ratatui
//!
//! The interface only reads from the session controller and asks it to do
//! things; every change to sessions happens inside the controller.

mod app;
mod components;
mod events;
mod keys;
mod styles;
mod utils;

pub use app::App;
use events::EventHandler;

use anyhow::Result;
use crossterm::event::{DisableBracketedPaste, EnableBracketedPaste};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::{io, sync::Arc, time::Duration};
use tracing::{info, warn};

use crate::app::{SessionController, TurnOptions};
use crate::config::Config;
use crate::llm::OllamaProvider;
use crate::session::SessionStore;

pub type Backend = CrosstermBackend<io::Stdout>;
pub type Frame<'a> = ratatui::Frame<'a>;

/// How long quitting waits for in-flight saves
const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

/// Initialize the terminal for TUI mode
pub fn init_terminal() -> Result<Terminal<Backend>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

/// Restore the terminal to normal mode
pub fn restore_terminal(terminal: &mut Terminal<Backend>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableBracketedPaste
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Put the terminal back before a panic message is printed
fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        previous(panic_info);
    }));
}

/// Main TUI entry point
pub async fn run(config: Config) -> Result<()> {
    let provider = Arc::new(OllamaProvider::new(config.provider_config())?);
    let reachable = provider.health_check().await;
    if !reachable {
        warn!("Ollama is not reachable at {}", config.base_url);
    }

    let store = SessionStore::new(config.chats_path());
    let options = TurnOptions {
        stream: config.stream,
        system_message: config.system_message.clone(),
    };
    let mut app = App::new(SessionController::new(store, provider, options));
    app.load_sessions().await;
    if !reachable {
        app.set_status(format!("Cannot reach Ollama at {}", config.base_url));
    }

    let mut terminal = init_terminal()?;
    install_panic_hook();
    let mut event_handler = EventHandler::new();

    let result = run_app(&mut terminal, &mut app, &mut event_handler).await;

    restore_terminal(&mut terminal)?;
    app.shutdown(SHUTDOWN_GRACE).await;
    info!("Terminal restored");
    result
}

/// Main application loop
async fn run_app(
    terminal: &mut Terminal<Backend>,
    app: &mut App,
    event_handler: &mut EventHandler,
) -> Result<()> {
    loop {
        terminal.draw(|frame| app.render(frame))?;

        tokio::select! {
            event = event_handler.next() => {
                match event {
                    Some(event) => {
                        if app.handle_event(event).await? {
                            break; // Exit requested
                        }
                    }
                    None => break,
                }
            }
            update = app.next_update() => {
                if let Some(update) = update {
                    app.apply_update(update);
                }
            }
        }
    }
    Ok(())
}
