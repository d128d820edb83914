#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    Char(char),
    Backspace,
    Enter {
        shift: bool,
        /// An IME composition is in progress; Enter commits it rather than sending.
        composing: bool,
    },
}

/// Text entry for the chat prompt.
#[derive(Debug, Default)]
pub struct InputBuffer {
    text: String,
    disabled: bool,
}

impl InputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    pub fn can_submit(&self) -> bool {
        !self.disabled && !self.text.trim().is_empty()
    }

    /// Applies one key press. Returns the trimmed text when it submits.
    pub fn handle_key(&mut self, key: KeyInput) -> Option<String> {
        match key {
            KeyInput::Char(c) => {
                self.text.push(c);
                None
            }
            KeyInput::Backspace => {
                self.text.pop();
                None
            }
            KeyInput::Enter { composing: true, .. } => None,
            KeyInput::Enter { shift: true, .. } => {
                self.text.push('\n');
                None
            }
            KeyInput::Enter { .. } => self.submit(),
        }
    }

    pub fn submit(&mut self) -> Option<String> {
        if !self.can_submit() {
            return None;
        }
        let content = self.text.trim().to_string();
        self.text.clear();
        Some(content)
    }
}
