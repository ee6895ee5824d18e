use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Key binding configuration
#[derive(Debug, Clone)]
pub struct KeyBinding {
    pub keys: Vec<(KeyCode, KeyModifiers)>,
    pub label: &'static str,
    pub description: &'static str,
}

impl KeyBinding {
    pub fn new(key: KeyCode, modifiers: KeyModifiers, label: &'static str, description: &'static str) -> Self {
        Self {
            keys: vec![(key, modifiers)],
            label,
            description,
        }
    }

    /// Also trigger on another key
    pub fn or(mut self, key: KeyCode, modifiers: KeyModifiers) -> Self {
        self.keys.push((key, modifiers));
        self
    }

    pub fn matches(&self, event: &KeyEvent) -> bool {
        self.keys
            .iter()
            .any(|(key, modifiers)| *key == event.code && *modifiers == event.modifiers)
    }
}

/// Application key mappings
#[derive(Debug, Clone)]
pub struct KeyMap {
    /// Quit application
    pub quit: KeyBinding,

    /// Move focus between the sidebar and the input line
    pub switch_focus: KeyBinding,

    pub up: KeyBinding,
    pub down: KeyBinding,

    /// Select a sidebar row or submit the input line
    pub select: KeyBinding,

    /// Ask to delete the highlighted chat
    pub delete: KeyBinding,

    /// Close a dialog or leave the input line
    pub cancel: KeyBinding,
}

impl Default for KeyMap {
    fn default() -> Self {
        Self {
            quit: KeyBinding::new(KeyCode::Char('c'), KeyModifiers::CONTROL, "Ctrl+C", "quit"),
            switch_focus: KeyBinding::new(KeyCode::Tab, KeyModifiers::NONE, "Tab", "switch focus")
                .or(KeyCode::BackTab, KeyModifiers::SHIFT),
            up: KeyBinding::new(KeyCode::Up, KeyModifiers::NONE, "↑", "up"),
            down: KeyBinding::new(KeyCode::Down, KeyModifiers::NONE, "↓", "down"),
            select: KeyBinding::new(KeyCode::Enter, KeyModifiers::NONE, "Enter", "select/send"),
            delete: KeyBinding::new(KeyCode::Char('d'), KeyModifiers::NONE, "d", "delete chat")
                .or(KeyCode::Delete, KeyModifiers::NONE),
            cancel: KeyBinding::new(KeyCode::Esc, KeyModifiers::NONE, "Esc", "back"),
        }
    }
}

impl KeyMap {
    /// Check if the event should quit the application
    pub fn should_quit(&self, event: &KeyEvent) -> bool {
        self.quit.matches(event)
    }

    /// One-line hint for the status bar
    pub fn help_text(&self) -> String {
        [&self.switch_focus, &self.select, &self.delete, &self.quit]
            .iter()
            .map(|binding| format!("{}: {}", binding.label, binding.description))
            .collect::<Vec<_>>()
            .join("  ")
    }
}
