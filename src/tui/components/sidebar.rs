//! Chat list with a "New Chat" row on top

use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState},
};
use uuid::Uuid;

use crate::tui::{styles::Theme, Frame};

pub const NEW_CHAT_LABEL: &str = "+ New Chat";

/// What a sidebar row stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidebarRow {
    NewChat,
    Session(Uuid),
}

/// A session as the sidebar shows it
#[derive(Debug, Clone)]
pub struct SidebarItem {
    pub id: Uuid,
    pub title: String,
    pub active: bool,
    pub busy: bool,
}

/// Cursor over the rows; row 0 is "New Chat"
#[derive(Debug, Default)]
pub struct Sidebar {
    list_state: ListState,
}

impl Sidebar {
    pub fn new() -> Self {
        let mut list_state = ListState::default();
        list_state.select(Some(0));
        Self { list_state }
    }

    pub fn cursor(&self) -> usize {
        self.list_state.selected().unwrap_or(0)
    }

    pub fn set_cursor(&mut self, row: usize) {
        self.list_state.select(Some(row));
    }

    pub fn move_up(&mut self) {
        self.set_cursor(self.cursor().saturating_sub(1));
    }

    pub fn move_down(&mut self, session_count: usize) {
        self.set_cursor((self.cursor() + 1).min(session_count));
    }

    /// Keep the cursor on a real row after the list shrank
    pub fn clamp(&mut self, session_count: usize) {
        self.set_cursor(self.cursor().min(session_count));
    }

    pub fn row(&self, items: &[SidebarItem]) -> SidebarRow {
        match self.cursor() {
            0 => SidebarRow::NewChat,
            row => items
                .get(row - 1)
                .map_or(SidebarRow::NewChat, |item| SidebarRow::Session(item.id)),
        }
    }

    pub fn render(
        &mut self,
        frame: &mut Frame,
        area: Rect,
        theme: &Theme,
        items: &[SidebarItem],
        focused: bool,
        spinner: &str,
    ) {
        let mut rows = Vec::with_capacity(items.len() + 1);
        rows.push(ListItem::new(Line::from(Span::styled(
            NEW_CHAT_LABEL,
            theme.role_style(crate::llm::MessageRole::User),
        ))));

        for item in items {
            let marker = if item.busy {
                Span::styled(format!("{} ", spinner), theme.indicator_style())
            } else if item.active {
                Span::styled("● ", theme.role_style(crate::llm::MessageRole::Assistant))
            } else {
                Span::raw("  ")
            };
            rows.push(ListItem::new(Line::from(vec![
                marker,
                Span::styled(item.title.clone(), theme.text_style()),
            ])));
        }

        let list = List::new(rows)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" Chats ")
                    .border_style(theme.border_style(focused)),
            )
            .highlight_style(theme.selection_style());

        frame.render_stateful_widget(list, area, &mut self.list_state);
    }
}
