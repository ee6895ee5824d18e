use anyhow::Result;
use crossterm::event::KeyEvent;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::widgets::Paragraph;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::app::{AppEvent, ControllerError, SessionController};
use crate::tui::{
    components::{
        render_transcript, ConfirmDialog, DialogAction, InputAction, InputBox, Sidebar,
        SidebarItem, SidebarRow,
    },
    events::Event,
    keys::KeyMap,
    styles::Theme,
    Frame,
};

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const SIDEBAR_WIDTH: u16 = 28;

/// Which pane receives keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Sidebar,
    Input,
}

/// Main application state
pub struct App {
    controller: SessionController,

    /// Key mappings for the application
    pub key_map: KeyMap,

    /// Current theme for styling
    pub theme: Theme,

    focus: Focus,
    sidebar: Sidebar,
    input: InputBox,

    /// Open while a delete is waiting for confirmation
    confirm: Option<ConfirmDialog>,

    /// Status message to display
    status_message: Option<String>,

    spinner_frame: usize,
    should_quit: bool,
}

impl App {
    /// Create a new application instance around a loaded controller
    pub fn new(controller: SessionController) -> Self {
        Self {
            controller,
            key_map: KeyMap::default(),
            theme: Theme::default(),
            focus: Focus::Input,
            sidebar: Sidebar::new(),
            input: InputBox::new(),
            confirm: None,
            status_message: None,
            spinner_frame: 0,
            should_quit: false,
        }
    }

    /// Fill the sidebar from the store.
    ///
    /// A store that can't be read leaves the list empty and says so in the
    /// status bar; new chats still work.
    pub async fn load_sessions(&mut self) {
        match self.controller.load().await {
            Ok(skipped) => {
                info!(sessions = self.controller.len(), skipped = skipped.len(), "Loaded chats");
                if !skipped.is_empty() {
                    self.set_status(format!("Skipped {} unreadable chat file(s)", skipped.len()));
                }
            }
            Err(e) => {
                warn!("Failed to load chats: {}", e);
                self.set_status(format!("Could not load chats: {}", e));
            }
        }
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
    }

    /// Wait for the next update from background turns and saves
    pub async fn next_update(&mut self) -> Option<AppEvent> {
        self.controller.next_event().await
    }

    pub fn apply_update(&mut self, update: AppEvent) {
        self.controller.apply(update);
        self.controller.drain();
    }

    /// Cancel in-flight turns and wait briefly for their saves
    pub async fn shutdown(&mut self, grace: Duration) {
        self.controller.shutdown(grace).await;
    }

    fn sidebar_items(&self) -> Vec<SidebarItem> {
        let active = self.controller.active_id();
        self.controller
            .sessions()
            .map(|entry| SidebarItem {
                id: entry.session.id,
                title: entry.session.title.clone(),
                active: Some(entry.session.id) == active,
                busy: !entry.turn.is_idle(),
            })
            .collect()
    }

    /// Point the sidebar cursor at the selected session
    fn sync_sidebar(&mut self) {
        let row = self
            .controller
            .active_id()
            .and_then(|id| self.controller.sessions().position(|e| e.session.id == id))
            .map_or(0, |pos| pos + 1);
        self.sidebar.set_cursor(row);
    }

    /// Handle incoming events; returns true when the app should exit
    pub async fn handle_event(&mut self, event: Event) -> Result<bool> {
        match event {
            Event::Key(key_event) => self.handle_key_event(key_event).await,
            Event::Paste(text) => {
                if self.focus == Focus::Input && self.confirm.is_none() {
                    self.input.insert_str(&text);
                }
            }
            Event::Resize(..) => {}
            Event::Tick => {
                if self.controller.is_busy() {
                    self.spinner_frame = (self.spinner_frame + 1) % SPINNER_FRAMES.len();
                }
            }
        }

        Ok(self.should_quit)
    }

    async fn handle_key_event(&mut self, key_event: KeyEvent) {
        if self.key_map.should_quit(&key_event) {
            self.should_quit = true;
            return;
        }

        if let Some(dialog) = self.confirm.as_mut() {
            match dialog.handle_key_event(&key_event) {
                DialogAction::Confirm(id) => {
                    self.confirm = None;
                    self.delete(id).await;
                }
                DialogAction::Cancel => self.confirm = None,
                DialogAction::None => {}
            }
            return;
        }

        if self.key_map.switch_focus.matches(&key_event) {
            self.focus = match self.focus {
                Focus::Sidebar => Focus::Input,
                Focus::Input => Focus::Sidebar,
            };
            return;
        }

        match self.focus {
            Focus::Sidebar => self.handle_sidebar_key(&key_event),
            Focus::Input => {
                if self.key_map.cancel.matches(&key_event) {
                    self.focus = Focus::Sidebar;
                    return;
                }
                if let InputAction::Submit(text) = self.input.handle_key_event(&key_event) {
                    self.submit(text);
                }
            }
        }
    }

    fn handle_sidebar_key(&mut self, key_event: &KeyEvent) {
        let items = self.sidebar_items();

        if self.key_map.up.matches(key_event) {
            self.sidebar.move_up();
        } else if self.key_map.down.matches(key_event) {
            self.sidebar.move_down(items.len());
        } else if self.key_map.select.matches(key_event) {
            match self.sidebar.row(&items) {
                SidebarRow::NewChat => self.controller.clear_selection(),
                SidebarRow::Session(id) => {
                    if let Err(e) = self.controller.select_session(id) {
                        self.set_status(e.to_string());
                    }
                }
            }
            self.focus = Focus::Input;
        } else if self.key_map.delete.matches(key_event) {
            if let SidebarRow::Session(id) = self.sidebar.row(&items) {
                let title = items
                    .iter()
                    .find(|item| item.id == id)
                    .map(|item| item.title.clone())
                    .unwrap_or_default();
                self.confirm = Some(ConfirmDialog::new(id, title));
            }
        }
    }

    fn submit(&mut self, text: String) {
        match self.controller.submit_to_active(text.clone()) {
            Ok((id, turn)) => {
                debug!(session_id = %id, %turn, "Submitted message");
                self.status_message = None;
                self.sync_sidebar();
            }
            Err(ControllerError::TurnInProgress { .. }) => {
                self.input.restore(text);
                self.set_status("Wait for the current reply to finish");
            }
            Err(e) => {
                warn!("Submit failed: {}", e);
                self.input.restore(text);
                self.set_status(e.to_string());
            }
        }
    }

    async fn delete(&mut self, id: uuid::Uuid) {
        match self.controller.delete_session(id).await {
            Ok(()) => self.set_status("Chat deleted"),
            Err(ControllerError::TurnInProgress { .. }) => {
                self.set_status("The chat is still being saved; try again in a moment")
            }
            Err(ControllerError::NotPersisted { .. }) => {
                self.set_status("This chat has not been saved yet")
            }
            Err(e) => self.set_status(e.to_string()),
        }
        self.sidebar.clamp(self.controller.len());
    }

    /// Render the application UI
    pub fn render(&mut self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(1),    // Main content
                Constraint::Length(1), // Status bar
            ])
            .split(frame.size());

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(1)])
            .split(chunks[0]);

        let right = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(3)])
            .split(columns[1]);

        let spinner = SPINNER_FRAMES[self.spinner_frame];
        let items = self.sidebar_items();
        self.sidebar.render(
            frame,
            columns[0],
            &self.theme,
            &items,
            self.focus == Focus::Sidebar && self.confirm.is_none(),
            spinner,
        );

        render_transcript(
            frame,
            right[0],
            &self.theme,
            self.controller.active_entry(),
            spinner,
        );

        self.input.render(
            frame,
            right[1],
            &self.theme,
            self.focus == Focus::Input && self.confirm.is_none(),
        );

        self.render_status_bar(frame, chunks[1]);

        if let Some(dialog) = &self.confirm {
            dialog.render(frame, &self.theme);
        }
    }

    /// Render the status bar
    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        let status_text = match &self.status_message {
            Some(message) => message.clone(),
            None => {
                let state = self
                    .controller
                    .active_entry()
                    .map_or("idle", |entry| entry.turn.label());
                format!(
                    "{} | {} chats | {} | {}",
                    self.controller.agent().model_name(),
                    self.controller.len(),
                    state,
                    self.key_map.help_text()
                )
            }
        };

        frame.render_widget(
            Paragraph::new(status_text).style(self.theme.status_bar_style()),
            area,
        );
    }
}
