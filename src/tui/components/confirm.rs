//! Confirmation dialog for deleting a chat
//!
//! Deleting is permanent, so the dialog opens with Cancel selected.

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout},
    style::Style,
    text::Line,
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};
use uuid::Uuid;

use crate::tui::{styles::Theme, utils::layout::centered_rect, Frame};

pub const DELETE_QUESTION: &str = "Delete this chat permanently?";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogAction {
    None,
    Confirm(Uuid),
    Cancel,
}

/// Asks before deleting the chat `target`
#[derive(Debug, Clone)]
pub struct ConfirmDialog {
    target: Uuid,
    title: String,
    delete_selected: bool,
}

impl ConfirmDialog {
    pub fn new(target: Uuid, title: impl Into<String>) -> Self {
        Self {
            target,
            title: title.into(),
            delete_selected: false,
        }
    }

    pub fn handle_key_event(&mut self, event: &KeyEvent) -> DialogAction {
        match event.code {
            KeyCode::Left | KeyCode::Right | KeyCode::Tab | KeyCode::BackTab => {
                self.delete_selected = !self.delete_selected;
                DialogAction::None
            }
            KeyCode::Enter if self.delete_selected => DialogAction::Confirm(self.target),
            KeyCode::Enter | KeyCode::Esc => DialogAction::Cancel,
            KeyCode::Char('y') => DialogAction::Confirm(self.target),
            KeyCode::Char('n') => DialogAction::Cancel,
            _ => DialogAction::None,
        }
    }

    pub fn render(&self, frame: &mut Frame, theme: &Theme) {
        let area = centered_rect(44, 8, frame.size());
        frame.render_widget(Clear, area);

        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!(" {} ", self.title))
            .border_style(Style::default().fg(theme.error))
            .style(theme.base_style());
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(1)])
            .margin(1)
            .split(inner);

        frame.render_widget(
            Paragraph::new(Line::from(DELETE_QUESTION))
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true })
                .style(theme.text_style()),
            rows[0],
        );

        let buttons = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(rows[1]);

        let button_style = |selected: bool| {
            if selected {
                theme.selection_style()
            } else {
                theme.text_style()
            }
        };
        frame.render_widget(
            Paragraph::new(" Cancel ")
                .alignment(Alignment::Center)
                .style(button_style(!self.delete_selected)),
            buttons[0],
        );
        frame.render_widget(
            Paragraph::new(" Delete ")
                .alignment(Alignment::Center)
                .style(button_style(self.delete_selected)),
            buttons[1],
        );
    }
}
