use crossterm::event::{Event as CrosstermEvent, EventStream, KeyEvent, KeyEventKind};
use futures::StreamExt;
use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::warn;

/// Application events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Keyboard input event
    Key(KeyEvent),

    /// Bracketed paste
    Paste(String),

    /// Terminal resize event
    Resize(u16, u16),

    /// Periodic tick event
    Tick,
}

/// Event handler for terminal input and the render tick
pub struct EventHandler {
    reader: EventStream,
    ticker: Interval,
}

impl EventHandler {
    /// Create a new event handler
    pub fn new() -> Self {
        let mut ticker = interval(Duration::from_millis(100)); // 10 FPS
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        Self {
            reader: EventStream::new(),
            ticker,
        }
    }

    /// Get the next event; `None` once terminal input is gone
    pub async fn next(&mut self) -> Option<Event> {
        loop {
            tokio::select! {
                maybe_event = self.reader.next() => match maybe_event {
                    Some(Ok(event)) => {
                        if let Some(event) = convert_crossterm_event(event) {
                            return Some(event);
                        }
                    }
                    Some(Err(e)) => {
                        warn!("Failed to read terminal input: {}", e);
                        return None;
                    }
                    None => return None,
                },
                _ = self.ticker.tick() => return Some(Event::Tick),
            }
        }
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert crossterm events to application events
fn convert_crossterm_event(event: CrosstermEvent) -> Option<Event> {
    match event {
        CrosstermEvent::Key(key_event) if key_event.kind != KeyEventKind::Release => {
            Some(Event::Key(key_event))
        }
        CrosstermEvent::Paste(text) => Some(Event::Paste(text)),
        CrosstermEvent::Resize(width, height) => Some(Event::Resize(width, height)),
        _ => None,
    }
}
