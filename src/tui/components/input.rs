//! Single-line message input

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use unicode_width::UnicodeWidthStr;

use crate::tui::{styles::Theme, Frame};

/// What the input wants the app to do after a key press
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    None,
    Submit(String),
}

/// Editable line with a byte-indexed cursor
#[derive(Debug, Default)]
pub struct InputBox {
    text: String,
    cursor: usize,
}

impl InputBox {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn insert_char(&mut self, c: char) {
        self.text.insert(self.cursor, c);
        self.cursor += c.len_utf8();
    }

    /// Insert pasted text; line breaks become spaces
    pub fn insert_str(&mut self, s: &str) {
        let cleaned: String = s
            .chars()
            .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
            .filter(|c| !c.is_control())
            .collect();
        self.text.insert_str(self.cursor, &cleaned);
        self.cursor += cleaned.len();
    }

    pub fn delete_previous_char(&mut self) {
        if let Some((idx, _)) = self.text[..self.cursor].char_indices().next_back() {
            self.text.remove(idx);
            self.cursor = idx;
        }
    }

    pub fn delete_char(&mut self) {
        if self.cursor < self.text.len() {
            self.text.remove(self.cursor);
        }
    }

    pub fn move_left(&mut self) {
        if let Some((idx, _)) = self.text[..self.cursor].char_indices().next_back() {
            self.cursor = idx;
        }
    }

    pub fn move_right(&mut self) {
        if let Some(c) = self.text[self.cursor..].chars().next() {
            self.cursor += c.len_utf8();
        }
    }

    fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }

    /// Handle an editing key. Enter submits non-blank text and clears the line.
    pub fn handle_key_event(&mut self, event: &KeyEvent) -> InputAction {
        match (event.code, event.modifiers) {
            (KeyCode::Enter, _) => {
                let text = self.text.trim();
                if text.is_empty() {
                    return InputAction::None;
                }
                let text = text.to_string();
                self.clear();
                return InputAction::Submit(text);
            }
            (KeyCode::Char('u'), KeyModifiers::CONTROL) => self.clear(),
            (KeyCode::Char(c), KeyModifiers::NONE) | (KeyCode::Char(c), KeyModifiers::SHIFT) => {
                self.insert_char(c)
            }
            (KeyCode::Backspace, _) => self.delete_previous_char(),
            (KeyCode::Delete, _) => self.delete_char(),
            (KeyCode::Left, _) => self.move_left(),
            (KeyCode::Right, _) => self.move_right(),
            (KeyCode::Home, _) => self.cursor = 0,
            (KeyCode::End, _) => self.cursor = self.text.len(),
            _ => {}
        }
        InputAction::None
    }

    /// Give the submitted text back, e.g. when the controller refused it
    pub fn restore(&mut self, text: String) {
        self.cursor = text.len();
        self.text = text;
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, theme: &Theme, focused: bool) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Message ")
            .border_style(theme.border_style(focused));
        let inner = block.inner(area);

        let cursor_col = self.text[..self.cursor].width() as u16;
        let offset = cursor_col.saturating_sub(inner.width.saturating_sub(1));

        let line = if self.text.is_empty() {
            Line::from(Span::styled(
                "Type a message and press Enter",
                theme.placeholder_style(),
            ))
        } else {
            Line::from(Span::styled(self.text.as_str(), theme.text_style()))
        };

        frame.render_widget(Paragraph::new(line).block(block).scroll((0, offset)), area);

        if focused {
            frame.set_cursor(inner.x + cursor_col - offset, inner.y);
        }
    }
}
