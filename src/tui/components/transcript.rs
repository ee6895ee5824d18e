//! Transcript of the selected chat

use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};

use crate::{
    app::SessionEntry,
    llm::{utils::sanitize_content, MessageRole},
    tui::{styles::Theme, utils::wrapped_rows, Frame},
};

fn role_label(role: MessageRole) -> &'static str {
    match role {
        MessageRole::User => "You",
        MessageRole::Assistant => "DeepSeek",
        MessageRole::System => "System",
    }
}

/// Lines for a session: each message under a role header, then any notices
pub fn transcript_lines(entry: &SessionEntry, theme: &Theme, spinner: &str) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let streaming = entry.turn.is_streaming();
    let last = entry.session.messages.len().saturating_sub(1);

    for (idx, message) in entry.session.messages.iter().enumerate() {
        let mut header = vec![Span::styled(
            format!("{}:", role_label(message.role)),
            theme.role_style(message.role),
        )];
        if streaming && idx == last && message.role == MessageRole::Assistant {
            header.push(Span::styled(format!(" {}", spinner), theme.indicator_style()));
        }
        lines.push(Line::from(header));

        let content = sanitize_content(&message.content);
        for text in content.lines() {
            lines.push(Line::from(Span::styled(text.to_string(), theme.text_style())));
        }
        lines.push(Line::default());
    }

    for notice in &entry.notices {
        lines.push(Line::from(Span::styled(notice.clone(), theme.notice_style())));
    }

    lines
}

fn welcome_lines(theme: &Theme) -> Vec<Line<'static>> {
    vec![
        Line::from(Span::styled("No chat selected.", theme.text_style())),
        Line::from(Span::styled(
            "Type a message below to start a new chat.",
            theme.placeholder_style(),
        )),
    ]
}

pub fn render_transcript(
    frame: &mut Frame,
    area: Rect,
    theme: &Theme,
    entry: Option<&SessionEntry>,
    spinner: &str,
) {
    let title = entry
        .map(|e| format!(" {} ", e.session.title))
        .unwrap_or_else(|| " DeepSeek ".to_string());
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(theme.border_style(false));
    let inner = block.inner(area);

    let lines = match entry {
        Some(entry) => transcript_lines(entry, theme, spinner),
        None => welcome_lines(theme),
    };

    // Follow the newest text
    let total: usize = lines
        .iter()
        .map(|line| {
            let text: String = line.spans.iter().map(|s| s.content.as_ref()).collect();
            wrapped_rows(&text, inner.width)
        })
        .sum();
    let scroll = total.saturating_sub(inner.height as usize).min(u16::MAX as usize) as u16;

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    frame.render_widget(paragraph, area);
}
