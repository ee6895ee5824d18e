use ratatui::layout::{Constraint, Direction, Layout, Rect};
use unicode_width::UnicodeWidthStr;

/// Layout utilities for TUI components
pub mod layout {
    use super::*;

    /// Create a centered rectangle with given width and height
    pub fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
        let popup_layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length((area.height.saturating_sub(height)) / 2),
                Constraint::Length(height.min(area.height)),
                Constraint::Min(0),
            ])
            .split(area);

        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Length((area.width.saturating_sub(width)) / 2),
                Constraint::Length(width.min(area.width)),
                Constraint::Min(0),
            ])
            .split(popup_layout[1])[1]
    }
}

/// Rows a line of text takes when word-wrapped to `width` columns
pub fn wrapped_rows(text: &str, width: u16) -> usize {
    let width = width.max(1) as usize;
    let mut rows = 1;
    let mut used = 0;

    for word in text.split_inclusive(' ') {
        let mut word_width = word.width();
        if used + word_width.saturating_sub(word.ends_with(' ') as usize) <= width {
            used += word_width;
            continue;
        }
        if used > 0 {
            rows += 1;
        }
        // Words wider than a row are broken across rows.
        while word_width > width {
            rows += 1;
            word_width -= width;
        }
        used = word_width;
    }

    rows
}
